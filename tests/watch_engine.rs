mod common;
use crate::common::builders::{mtime, transform_with};
use crate::common::init_tracing;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::bail;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use filemill::fs::mock::MockFileSystem;
use filemill::hash::content_hash_namer;
use filemill::pipeline::{IncludeFn, Manifest, ManifestEntry, Pipeline, Processor, TransformOutput};
use filemill::watch::{ErrorAction, PollConfig, WatchOptions};

type TestResult = Result<(), Box<dyn Error>>;

const INTERVAL: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(5);

fn poll_options(cancel: &CancellationToken) -> WatchOptions {
    WatchOptions {
        cancel: cancel.clone(),
        poll: PollConfig::with_interval(INTERVAL),
        on_error: None,
    }
}

/// Give the watch engine time to finish the poller's initial scan before
/// the test mutates the tree.
async fn settle() {
    tokio::time::sleep(INTERVAL * 2).await;
}

/// Receive snapshots until one matches, panicking on errors or stream end.
async fn next_matching(
    snapshots: &mut mpsc::Receiver<anyhow::Result<Manifest>>,
    pred: impl Fn(&Manifest) -> bool,
) -> Manifest {
    timeout(WAIT, async {
        loop {
            match snapshots.recv().await {
                Some(Ok(manifest)) if pred(&manifest) => return manifest,
                Some(Ok(_)) => continue,
                Some(Err(err)) => panic!("unexpected watch error: {err:#}"),
                None => panic!("snapshot stream ended unexpectedly"),
            }
        }
    })
    .await
    .expect("timed out waiting for a matching snapshot")
}

#[tokio::test]
async fn change_event_updates_the_manifest_incrementally() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));

    let pipeline = Pipeline::with_fs(
        vec![Processor::rename("dist", content_hash_namer(8))],
        Arc::new(fs.clone()),
    );
    let cancel = CancellationToken::new();
    let mut snapshots = pipeline.watch("src", poll_options(&cancel));

    let initial = next_matching(&mut snapshots, |_| true).await;
    assert_eq!(
        initial.get(0, "a.txt"),
        Some(&ManifestEntry::Single("a-8ED3F6AD.txt".to_string()))
    );
    settle().await;

    fs.add_file_with_mtime("src/a.txt", "alpha2", mtime(2));

    let updated = next_matching(&mut snapshots, |m| {
        m.get(0, "a.txt") == Some(&ManifestEntry::Single("a-0B87D006.txt".to_string()))
    })
    .await;
    assert_eq!(updated.maps()[0].len(), 1);

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn deletion_removes_the_key_from_every_section() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));
    fs.add_file_with_mtime("src/b.txt", "beta", mtime(1));

    let pipeline = Pipeline::with_fs(
        vec![Processor::copy("one"), Processor::copy("two")],
        Arc::new(fs.clone()),
    );
    let cancel = CancellationToken::new();
    let mut snapshots = pipeline.watch("src", poll_options(&cancel));

    let initial = next_matching(&mut snapshots, |_| true).await;
    assert!(initial.get(0, "a.txt").is_some());
    assert!(initial.get(1, "a.txt").is_some());
    settle().await;

    fs.remove_file("src/a.txt");

    let updated = next_matching(&mut snapshots, |m| m.get(0, "a.txt").is_none()).await;
    assert!(updated.get(1, "a.txt").is_none());
    assert!(updated.get(0, "b.txt").is_some());
    assert!(updated.get(1, "b.txt").is_some());

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn change_for_an_unknown_file_is_processed_as_a_creation() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));
    fs.add_file_with_mtime("src/d.txt", "skip", mtime(1));

    // Files whose content says "skip" are dropped, so d.txt starts outside
    // the manifest.
    let transform = transform_with(|contents, _name| {
        if contents == b"skip".as_slice() {
            TransformOutput::Drop
        } else {
            TransformOutput::Copy(contents.to_vec())
        }
    });
    let pipeline = Pipeline::with_fs(
        vec![Processor::transform("dist", transform)],
        Arc::new(fs.clone()),
    );
    let cancel = CancellationToken::new();
    let mut snapshots = pipeline.watch("src", poll_options(&cancel));

    let initial = next_matching(&mut snapshots, |_| true).await;
    assert!(initial.get(0, "d.txt").is_none());
    settle().await;

    fs.add_file_with_mtime("src/d.txt", "keep", mtime(9));

    let updated = next_matching(&mut snapshots, |m| m.get(0, "d.txt").is_some()).await;
    assert_eq!(
        updated.get(0, "d.txt"),
        Some(&ManifestEntry::Single("d.txt".to_string()))
    );

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn cancellation_ends_the_snapshot_stream() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));

    let pipeline = Pipeline::with_fs(vec![Processor::copy("dist")], Arc::new(fs));
    let cancel = CancellationToken::new();
    let mut snapshots = pipeline.watch("src", poll_options(&cancel));

    next_matching(&mut snapshots, |_| true).await;

    cancel.cancel();

    let end = timeout(WAIT, async {
        loop {
            if snapshots.recv().await.is_none() {
                return;
            }
        }
    })
    .await;
    assert!(end.is_ok(), "stream should close after cancellation");
    Ok(())
}

/// Include predicate that fails on files whose content is "boom".
fn boom_include() -> IncludeFn {
    Arc::new(|_path, is_dir, loader| {
        Box::pin(async move {
            if is_dir {
                return Ok(true);
            }
            let contents = match &loader {
                Some(loader) => loader.load().await?,
                None => None,
            };
            if let Some(contents) = contents {
                if contents.as_slice() == b"boom" {
                    bail!("refusing to look at a boom file");
                }
            }
            Ok(true)
        })
    })
}

#[tokio::test]
async fn error_hook_continue_keeps_the_watch_alive() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));

    let hook_calls = Arc::new(AtomicUsize::new(0));
    let hook = {
        let hook_calls = Arc::clone(&hook_calls);
        Arc::new(move |_err: &anyhow::Error| {
            hook_calls.fetch_add(1, Ordering::SeqCst);
            ErrorAction::Continue
        })
    };

    let pipeline = Pipeline::with_fs(
        vec![Processor::copy("dist").with_include(boom_include())],
        Arc::new(fs.clone()),
    );
    let cancel = CancellationToken::new();
    let options = WatchOptions {
        cancel: cancel.clone(),
        poll: PollConfig::with_interval(INTERVAL),
        on_error: Some(hook),
    };
    let mut snapshots = pipeline.watch("src", options);

    next_matching(&mut snapshots, |_| true).await;
    settle().await;

    // The failing event is abandoned without a snapshot...
    fs.add_file_with_mtime("src/a.txt", "boom", mtime(2));
    tokio::time::sleep(INTERVAL * 6).await;
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);

    // ...and the loop keeps consuming afterwards.
    fs.add_file_with_mtime("src/a.txt", "alpha2", mtime(3));
    next_matching(&mut snapshots, |m| m.get(0, "a.txt").is_some()).await;

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn error_hook_stop_forwards_the_error_and_terminates() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));

    let pipeline = Pipeline::with_fs(
        vec![Processor::copy("dist").with_include(boom_include())],
        Arc::new(fs.clone()),
    );
    let cancel = CancellationToken::new();
    let options = WatchOptions {
        cancel: cancel.clone(),
        poll: PollConfig::with_interval(INTERVAL),
        on_error: Some(Arc::new(|_err: &anyhow::Error| ErrorAction::Stop)),
    };
    let mut snapshots = pipeline.watch("src", options);

    next_matching(&mut snapshots, |_| true).await;
    settle().await;

    fs.add_file_with_mtime("src/a.txt", "boom", mtime(2));

    let outcome = timeout(WAIT, async {
        loop {
            match snapshots.recv().await {
                Some(Err(_)) => return "error",
                Some(Ok(_)) => continue,
                None => return "closed-without-error",
            }
        }
    })
    .await?;
    assert_eq!(outcome, "error");

    // After the forwarded error the stream closes.
    let end = timeout(WAIT, snapshots.recv()).await?;
    assert!(end.is_none());
    Ok(())
}

mod common;
use crate::common::builders::mtime;
use crate::common::init_tracing;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use filemill::fs::mock::MockFileSystem;
use filemill::watch::{EventKind, EventQueue, Poller, WatchEvent};

type TestResult = Result<(), Box<dyn Error>>;

const INTERVAL: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(2);

fn start_poller(
    fs: MockFileSystem,
    cancel: CancellationToken,
) -> Arc<EventQueue<WatchEvent>> {
    let queue = Arc::new(EventQueue::new());
    let poller = Poller::new(
        Arc::new(fs),
        PathBuf::from("src"),
        PathBuf::from("src"),
        true,
        INTERVAL,
        cancel,
    );
    let producer_queue = Arc::clone(&queue);
    tokio::spawn(async move {
        let _ = poller.run(Arc::clone(&producer_queue)).await;
        producer_queue.done(false);
    });
    queue
}

/// Give the spawned poller a chance to take its initial scan before the
/// test mutates the tree.
async fn settle() {
    tokio::time::sleep(INTERVAL * 2).await;
}

#[tokio::test]
async fn mtime_bump_yields_exactly_one_change_event() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));

    let cancel = CancellationToken::new();
    let queue = start_poller(fs.clone(), cancel.clone());
    settle().await;

    fs.touch("src/a.txt", mtime(2));

    let event = timeout(WAIT, queue.pop()).await?;
    assert_eq!(
        event,
        Some(WatchEvent {
            kind: EventKind::Change,
            path: "a.txt".to_string(),
        })
    );

    // The retained state was replaced, so the same mtime does not fire again.
    assert!(timeout(INTERVAL * 5, queue.pop()).await.is_err());

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn deletion_yields_a_rename_event() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));
    fs.add_file_with_mtime("src/sub/b.txt", "beta", mtime(1));

    let cancel = CancellationToken::new();
    let queue = start_poller(fs.clone(), cancel.clone());
    settle().await;

    fs.remove_file("src/sub/b.txt");

    let event = timeout(WAIT, queue.pop()).await?;
    assert_eq!(
        event,
        Some(WatchEvent {
            kind: EventKind::Rename,
            path: "sub/b.txt".to_string(),
        })
    );

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn new_files_are_silent_until_they_change_again() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));

    let cancel = CancellationToken::new();
    let queue = start_poller(fs.clone(), cancel.clone());
    settle().await;

    // A path appearing between cycles enters the retained state without an
    // event; only a later mtime change surfaces it.
    fs.add_file_with_mtime("src/new.txt", "fresh", mtime(5));
    assert!(timeout(INTERVAL * 6, queue.pop()).await.is_err());

    fs.touch("src/new.txt", mtime(6));
    let event = timeout(WAIT, queue.pop()).await?;
    assert_eq!(
        event,
        Some(WatchEvent {
            kind: EventKind::Change,
            path: "new.txt".to_string(),
        })
    );

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn cancellation_stops_the_poller() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file_with_mtime("src/a.txt", "alpha", mtime(1));

    let cancel = CancellationToken::new();
    let queue = start_poller(fs, cancel.clone());

    cancel.cancel();

    // The producer marks the queue done on its way out.
    let event = timeout(WAIT, queue.pop()).await?;
    assert_eq!(event, None);
    Ok(())
}

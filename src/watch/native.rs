// src/watch/native.rs

//! Native filesystem event source built on `notify`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use notify::event::ModifyKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::path_utils::relative_str;
use crate::watch::queue::EventQueue;
use crate::watch::{EventKind, WatchEvent};

/// Spawn the native watcher on `target` and forward its events into `queue`
/// as relative-path [`WatchEvent`]s until the source ends or `cancel` fires.
///
/// - `target` is the entry being watched (file or directory).
/// - `rel_root` is the directory event paths are made relative to.
///
/// The returned task owns the `RecommendedWatcher`; when the task finishes
/// the watcher is dropped and watching stops. The task marks the queue done
/// (non-abort) on its way out.
pub fn spawn_native_watch(
    target: PathBuf,
    rel_root: PathBuf,
    recursive: bool,
    cancel: CancellationToken,
    queue: Arc<EventQueue<WatchEvent>>,
) -> Result<tokio::task::JoinHandle<()>> {
    // Canonicalize once so event paths (which notify reports absolute)
    // strip cleanly.
    let rel_root = rel_root.canonicalize().unwrap_or(rel_root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // We can't log via tracing here easily, so fallback to stderr.
                    eprintln!("filemill: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("filemill: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher.watch(&target, mode)?;

    info!("native watcher started on {:?}", target);

    let handle = tokio::spawn(async move {
        // Keep the watcher alive for as long as this task runs.
        let _watcher = watcher;

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = event_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            // The queue may have been aborted while this event was in
            // flight; pushing after that is a misuse.
            if cancel.is_cancelled() {
                break;
            }

            let Some(kind) = map_kind(&event.kind) else {
                continue;
            };
            for path in &event.paths {
                match relative_str(&rel_root, path) {
                    Some(rel) => {
                        debug!(kind = ?kind, path = %rel, "native event");
                        queue.push(WatchEvent {
                            kind,
                            path: rel,
                        });
                    }
                    None => {
                        warn!("could not relativize event path {path:?} against {rel_root:?}");
                    }
                }
            }
        }

        queue.done(false);
        debug!("native watcher event loop finished");
    });

    Ok(handle)
}

/// Collapse notify's event taxonomy into the two kinds the engine knows:
/// appear/disappear/rename -> Rename, content changes -> Change.
fn map_kind(kind: &notify::EventKind) -> Option<EventKind> {
    match kind {
        notify::EventKind::Create(_) | notify::EventKind::Remove(_) => Some(EventKind::Rename),
        notify::EventKind::Modify(ModifyKind::Name(_)) => Some(EventKind::Rename),
        notify::EventKind::Modify(ModifyKind::Metadata(_)) => None,
        notify::EventKind::Modify(_) => Some(EventKind::Change),
        notify::EventKind::Access(_) => None,
        notify::EventKind::Any | notify::EventKind::Other => None,
    }
}

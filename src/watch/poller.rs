// src/watch/poller.rs

//! Polling fallback event source: periodic mtime diffing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, anyhow};
use futures::future::{BoxFuture, try_join_all};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::fs::FileSystem;
use crate::path_utils::relative_str;
use crate::watch::queue::EventQueue;
use crate::watch::{EventKind, WatchEvent};

/// Relative path -> last-seen modification time. Owned exclusively by one
/// poller run and rebuilt from scratch every cycle.
type PollState = HashMap<String, SystemTime>;

/// Fallback change-event source for filesystems without native watch
/// support (and for tests): diffs a full listing of the entry against the
/// previous cycle's listing and synthesizes rename/change events.
pub struct Poller {
    fs: Arc<dyn FileSystem>,
    entry: PathBuf,
    /// Base for the relative paths carried in events. Equal to `entry` for a
    /// directory entry, its parent for a single-file entry.
    rel_root: PathBuf,
    recursive: bool,
    interval: Duration,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        entry: PathBuf,
        rel_root: PathBuf,
        recursive: bool,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fs,
            entry,
            rel_root,
            recursive,
            interval,
            cancel,
        }
    }

    /// Run the poll loop, pushing events into `queue` until cancelled.
    ///
    /// Every previously known path missing from the fresh listing yields a
    /// rename (deletion) event; every previously known path with a changed
    /// mtime yields a change event. Paths first seen in a cycle enter the
    /// retained state silently and only surface through a later mtime
    /// change.
    pub async fn run(self, queue: Arc<EventQueue<WatchEvent>>) -> Result<()> {
        let mut state = self.scan().await?;
        debug!(files = state.len(), interval = ?self.interval, "poller started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            if self.cancel.is_cancelled() {
                break;
            }
            let fresh = self.scan().await?;
            if self.cancel.is_cancelled() {
                break;
            }

            for (path, mtime) in &state {
                match fresh.get(path) {
                    None => queue.push(WatchEvent {
                        kind: EventKind::Rename,
                        path: path.clone(),
                    }),
                    Some(current) if current != mtime => queue.push(WatchEvent {
                        kind: EventKind::Change,
                        path: path.clone(),
                    }),
                    Some(_) => {}
                }
            }

            state = fresh;
        }

        debug!("poller stopped");
        Ok(())
    }

    async fn scan(&self) -> Result<PollState> {
        let mut state = PollState::new();
        let stat = self
            .fs
            .stat(&self.entry)
            .await
            .with_context(|| format!("stat poll entry {:?}", self.entry))?;
        if !stat.is_dir {
            let rel = self.rel(&self.entry)?;
            state.insert(rel, stat.modified);
            return Ok(state);
        }
        for (rel, mtime) in self.scan_dir(self.entry.clone()).await? {
            state.insert(rel, mtime);
        }
        Ok(state)
    }

    /// Walk one directory level, recursing when configured. All child stats
    /// run concurrently.
    fn scan_dir(&self, dir: PathBuf) -> BoxFuture<'_, Result<Vec<(String, SystemTime)>>> {
        Box::pin(async move {
            let children = self
                .fs
                .read_dir(&dir)
                .await
                .with_context(|| format!("reading dir {dir:?}"))?;

            let visits = children.into_iter().map(|child| async move {
                let stat = self
                    .fs
                    .stat(&child)
                    .await
                    .with_context(|| format!("stat {child:?}"))?;
                if stat.is_dir {
                    if self.recursive {
                        self.scan_dir(child).await
                    } else {
                        Ok(Vec::new())
                    }
                } else {
                    Ok(vec![(self.rel(&child)?, stat.modified)])
                }
            });

            let nested = try_join_all(visits).await?;
            Ok(nested.into_iter().flatten().collect())
        })
    }

    fn rel(&self, path: &Path) -> Result<String> {
        relative_str(&self.rel_root, path)
            .ok_or_else(|| anyhow!("cannot relativize {path:?} against {:?}", self.rel_root))
    }
}

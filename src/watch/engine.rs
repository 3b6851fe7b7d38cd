// src/watch/engine.rs

//! The watch engine: one initial compile, then incremental recompiles
//! driven by the event queue, yielding manifest snapshots over time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use futures::future::try_join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::path_utils::containing_dir;
use crate::pipeline::{ContentLoader, Manifest, ManifestSet, Pipeline, Processor};
use crate::watch::native::spawn_native_watch;
use crate::watch::poller::Poller;
use crate::watch::queue::EventQueue;
use crate::watch::{ErrorAction, ErrorHook, EventKind, PollConfig, WatchEvent, WatchOptions};

impl Pipeline {
    /// Compile once, then keep recompiling incrementally on filesystem
    /// events. Every manifest change is sent as a fresh snapshot; the stream
    /// ends when the cancellation signal in `options` fires, when the event
    /// source ends, or when the error hook stops the watch (the error is
    /// forwarded as the final item).
    pub fn watch(
        &self,
        entry: impl Into<PathBuf>,
        options: WatchOptions,
    ) -> mpsc::Receiver<Result<Manifest>> {
        let (tx, rx) = mpsc::channel(16);
        let engine = WatchEngine {
            pipeline: self.clone(),
            entry: entry.into(),
            options,
            snapshots: tx,
        };
        tokio::spawn(engine.run());
        rx
    }
}

/// Default error hook: strict in CI-like contexts (stop the watch),
/// log-and-continue otherwise.
fn default_error_hook() -> ErrorHook {
    let strict = std::env::var_os("CI").is_some();
    Arc::new(move |err| {
        if strict {
            ErrorAction::Stop
        } else {
            warn!("{err:#}");
            ErrorAction::Continue
        }
    })
}

/// One running watch: Initializing (first compile) -> Watching (event loop)
/// -> Terminated.
pub struct WatchEngine {
    pipeline: Pipeline,
    entry: PathBuf,
    options: WatchOptions,
    snapshots: mpsc::Sender<Result<Manifest>>,
}

impl WatchEngine {
    async fn run(self) {
        let hook = self
            .options
            .on_error
            .clone()
            .unwrap_or_else(default_error_hook);

        // Initializing: one full compile. On failure the watch keeps going
        // without a manifest; the first successful event handling recompiles
        // from scratch.
        let mut manifest: Option<ManifestSet> = None;
        match self.pipeline.compile_set(&self.entry).await {
            Ok(set) => {
                if self.send_snapshot(&set).await.is_err() {
                    return;
                }
                manifest = Some(set);
            }
            Err(err) => {
                if self.report(&hook, err).await.is_err() {
                    return;
                }
            }
        }

        let stat = match self.pipeline.fs().stat(&self.entry).await {
            Ok(stat) => stat,
            Err(err) => {
                let err = anyhow::Error::from(err)
                    .context(format!("stat watch entry {:?}", self.entry));
                let _ = hook(&err);
                let _ = self.snapshots.send(Err(err)).await;
                return;
            }
        };
        let base_dir = containing_dir(&self.entry, stat.is_dir);
        // Native recursion only applies when the entry is a directory.
        let recursive =
            stat.is_dir && self.pipeline.processors().iter().any(|p| p.recursive);

        // Watching: start the event source and bridge it through the queue.
        // A child token lets the engine stop its own producers when the
        // snapshot receiver goes away without cancelling the caller's token.
        let cancel = self.options.cancel.child_token();
        let queue = Arc::new(EventQueue::new());

        {
            let cancel = cancel.clone();
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                cancel.cancelled().await;
                queue.done(true);
            });
        }

        match self.options.poll {
            PollConfig::Enabled { interval } => {
                let poller = Poller::new(
                    Arc::clone(self.pipeline.fs()),
                    self.entry.clone(),
                    base_dir.clone(),
                    recursive,
                    interval,
                    cancel.clone(),
                );
                let queue = Arc::clone(&queue);
                let hook = Arc::clone(&hook);
                let snapshots = self.snapshots.clone();
                tokio::spawn(async move {
                    if let Err(err) = poller.run(Arc::clone(&queue)).await {
                        if hook(&err) == ErrorAction::Stop {
                            let _ = snapshots.send(Err(err)).await;
                        }
                    }
                    queue.done(false);
                });
            }
            PollConfig::Disabled => {
                let spawned = spawn_native_watch(
                    self.entry.clone(),
                    base_dir.clone(),
                    recursive,
                    cancel.clone(),
                    Arc::clone(&queue),
                );
                if let Err(err) = spawned {
                    let err = err.context(format!("starting native watch on {:?}", self.entry));
                    let _ = hook(&err);
                    let _ = self.snapshots.send(Err(err)).await;
                    cancel.cancel();
                    return;
                }
            }
        }

        info!(entry = ?self.entry, "watching for changes");

        // Consume strictly in arrival order; each event's handling completes
        // (including writes) before the next one is dequeued, so the
        // manifest is never mutated concurrently.
        while let Some(event) = queue.pop().await {
            match self.handle_event(&mut manifest, &base_dir, event).await {
                Ok(true) => {
                    let snapshot_sent = match &manifest {
                        Some(set) => self.send_snapshot(set).await,
                        None => Ok(()),
                    };
                    if snapshot_sent.is_err() {
                        break;
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    // The triggering event is abandoned; the manifest was
                    // not touched.
                    if self.report(&hook, err).await.is_err() {
                        break;
                    }
                }
            }
        }

        cancel.cancel();
        debug!("watch engine terminated");
    }

    /// Apply one event to the manifest. Returns whether a new snapshot
    /// should be emitted.
    async fn handle_event(
        &self,
        manifest: &mut Option<ManifestSet>,
        base_dir: &Path,
        event: WatchEvent,
    ) -> Result<bool> {
        debug!(?event, "handling watch event");

        let Some(set) = manifest else {
            // The initial compile failed; recover with a full pass.
            *manifest = Some(self.pipeline.compile_set(&self.entry).await?);
            return Ok(true);
        };

        if event.kind == EventKind::Rename && set.contains(&event.path) {
            set.remove(&event.path);
            debug!(path = %event.path, "removed from manifest");
            return Ok(true);
        }

        // Change events, and rename events for paths the manifest does not
        // know: the latter are treated as possible creations and handled
        // exactly like a change, as a single combined case.
        let file = base_dir.join(&event.path);

        let checks = self.pipeline.processors().iter().map(|processor| {
            let processor = Arc::clone(processor);
            let rel = event.path.clone();
            // A file may vanish between the event and the read; the
            // tolerant loader reports that as "no content" so predicates
            // can still decide relevance.
            let loader = ContentLoader::tolerant(Arc::clone(self.pipeline.fs()), file.clone());
            async move {
                let included = match &processor.include {
                    None => true,
                    Some(include) => include(rel, false, Some(loader)).await?,
                };
                anyhow::Ok(included.then_some(processor))
            }
        });
        let active: Vec<Option<Arc<Processor>>> = try_join_all(checks).await?;

        if active.iter().all(Option::is_none) {
            return Ok(false);
        }

        let fragments =
            crate::pipeline::process::process_file(self.pipeline.fs(), &file, base_dir, &active)
                .await
                .with_context(|| format!("processing changed file {file:?}"))?;

        for (idx, fragment) in fragments.into_iter().enumerate() {
            if let Some((input, entry)) = fragment {
                set.insert(idx, input, entry);
            }
        }
        Ok(true)
    }

    async fn send_snapshot(&self, set: &ManifestSet) -> Result<()> {
        self.snapshots
            .send(Ok(set.snapshot()))
            .await
            .map_err(|_| anyhow!("snapshot receiver dropped"))
    }

    /// Route an error through the hook; `Err` means the watch should stop.
    async fn report(&self, hook: &ErrorHook, err: anyhow::Error) -> Result<()> {
        match hook(&err) {
            ErrorAction::Continue => Ok(()),
            ErrorAction::Stop => {
                let _ = self.snapshots.send(Err(err)).await;
                Err(anyhow!("watch stopped by error hook"))
            }
        }
    }
}

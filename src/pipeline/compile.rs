// src/pipeline/compile.rs

//! The recursive directory walker behind `compile`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use futures::future::{BoxFuture, try_join_all};
use tracing::debug;

use crate::fs::{FileSystem, RealFileSystem};
use crate::path_utils::{containing_dir, relative_str};
use crate::pipeline::manifest::{Manifest, ManifestEntry, ManifestSet};
use crate::pipeline::process::process_file;
use crate::pipeline::processor::{ContentLoader, Processor};

/// (processor index, input path, output entry) produced somewhere in the walk.
type Fragment = (usize, String, ManifestEntry);

/// A configured pipeline: an ordered set of processors bound to a filesystem
/// provider. Cloning is cheap and shares both.
#[derive(Debug, Clone)]
pub struct Pipeline {
    fs: Arc<dyn FileSystem>,
    processors: Vec<Arc<Processor>>,
}

impl Pipeline {
    /// Pipeline over the real filesystem.
    pub fn new(processors: Vec<Processor>) -> Self {
        Self::with_fs(processors, Arc::new(RealFileSystem))
    }

    /// Pipeline over an injected filesystem provider.
    pub fn with_fs(processors: Vec<Processor>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            processors: processors.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn processors(&self) -> &[Arc<Processor>] {
        &self.processors
    }

    pub(crate) fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Walk `entry`, apply every relevant processor to every included file,
    /// and return the resulting manifest: the single mapping directly when
    /// one processor is configured, the ordered list otherwise.
    pub async fn compile(&self, entry: impl AsRef<Path>) -> Result<Manifest> {
        Ok(self.compile_set(entry.as_ref()).await?.snapshot())
    }

    /// Like [`Pipeline::compile`] but keeping the internal fixed-size shape;
    /// the watch engine mutates this across events.
    pub(crate) async fn compile_set(&self, entry: &Path) -> Result<ManifestSet> {
        let stat = self
            .fs
            .stat(entry)
            .await
            .with_context(|| format!("stat entry {entry:?}"))?;
        let entry_dir = containing_dir(entry, stat.is_dir);

        debug!(?entry, is_dir = stat.is_dir, "compile pass started");

        let all: Vec<Option<Arc<Processor>>> =
            self.processors.iter().cloned().map(Some).collect();
        let fragments = self.visit(entry.to_path_buf(), &entry_dir, true, all).await?;

        let mut set = ManifestSet::new(self.processors.len());
        for (idx, input, output) in fragments {
            set.insert(idx, input, output);
        }
        debug!(
            files = set.maps().iter().map(|m| m.len()).sum::<usize>(),
            "compile pass finished"
        );
        Ok(set)
    }

    /// Visit one node. Directories narrow the processor set positionally
    /// (irrelevant slots become `None`) and recurse over all children
    /// concurrently; files are handed to the file processor once at least one
    /// processor includes them. Sibling visits and per-processor checks run
    /// concurrently; the walk result is only final once every branch joined.
    fn visit<'a>(
        &'a self,
        path: PathBuf,
        entry_dir: &'a Path,
        is_entry: bool,
        processors: Vec<Option<Arc<Processor>>>,
    ) -> BoxFuture<'a, Result<Vec<Fragment>>> {
        Box::pin(async move {
            let stat = self
                .fs
                .stat(&path)
                .await
                .with_context(|| format!("stat {path:?}"))?;

            let rel = relative_str(entry_dir, &path)
                .ok_or_else(|| anyhow!("cannot relativize {path:?} against {entry_dir:?}"))?;

            if stat.is_dir {
                let checks = processors.iter().map(|slot| {
                    let slot = slot.clone();
                    let rel = rel.clone();
                    async move {
                        let Some(processor) = slot else {
                            return anyhow::Ok(None);
                        };
                        // The entry itself is always relevant; below it the
                        // recursive flag and the include predicate gate
                        // descent per processor.
                        let relevant = is_entry
                            || (processor.recursive
                                && match &processor.include {
                                    None => true,
                                    Some(include) => include(rel, true, None).await?,
                                });
                        Ok(relevant.then_some(processor))
                    }
                });
                let dir_processors: Vec<Option<Arc<Processor>>> = try_join_all(checks).await?;

                if dir_processors.iter().all(Option::is_none) {
                    return Ok(Vec::new());
                }

                let children = self
                    .fs
                    .read_dir(&path)
                    .await
                    .with_context(|| format!("reading dir {path:?}"))?;
                let nested = try_join_all(
                    children
                        .into_iter()
                        .map(|child| self.visit(child, entry_dir, false, dir_processors.clone())),
                )
                .await?;
                Ok(nested.into_iter().flatten().collect())
            } else {
                let checks = processors.iter().map(|slot| {
                    let slot = slot.clone();
                    let rel = rel.clone();
                    let loader = ContentLoader::new(Arc::clone(&self.fs), path.clone());
                    async move {
                        let Some(processor) = slot else {
                            return anyhow::Ok(None);
                        };
                        let included = match &processor.include {
                            None => true,
                            Some(include) => include(rel, false, Some(loader)).await?,
                        };
                        Ok(included.then_some(processor))
                    }
                });
                let file_processors: Vec<Option<Arc<Processor>>> = try_join_all(checks).await?;

                if file_processors.iter().all(Option::is_none) {
                    // No read, no write.
                    return Ok(Vec::new());
                }

                let fragments =
                    process_file(&self.fs, &path, entry_dir, &file_processors).await?;
                Ok(fragments
                    .into_iter()
                    .enumerate()
                    .filter_map(|(idx, frag)| frag.map(|(input, entry)| (idx, input, entry)))
                    .collect())
            }
        })
    }
}

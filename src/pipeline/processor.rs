// src/pipeline/processor.rs

//! Processor configuration: the unit of work the walker multiplexes over.
//!
//! A processor either renames-and-copies matching files or transforms their
//! content into zero, one or many outputs. Which of the two it does is an
//! explicit enum discriminant ([`ProcessorAction`]), never probed at runtime.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use futures::future::BoxFuture;

use crate::fs::FileSystem;

/// File contents read once and shared across every callback for that file.
pub type Contents = Arc<Vec<u8>>;

/// Async inclusion predicate over (path relative to the entry directory,
/// is-directory, lazy content reader). `None` reader means content is not
/// available for this check (directories, and dir-descent checks).
pub type IncludeFn = Arc<
    dyn Fn(String, bool, Option<ContentLoader>) -> BoxFuture<'static, anyhow::Result<bool>>
        + Send
        + Sync,
>;

/// Naming hook for rename units: (relative input name, contents) -> new file
/// name. Returning `None` keeps the original basename.
pub type RenameFn = Arc<
    dyn Fn(String, Contents) -> BoxFuture<'static, anyhow::Result<Option<String>>> + Send + Sync,
>;

/// Content transform: (contents, relative input name) -> outputs.
pub type TransformFn = Arc<
    dyn Fn(Contents, String) -> BoxFuture<'static, anyhow::Result<TransformOutput>> + Send + Sync,
>;

/// One output file produced by a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub content: Vec<u8>,
    pub name: String,
}

/// What a transform decided to do with one input file.
#[derive(Debug, Clone)]
pub enum TransformOutput {
    /// No manifest entry, no write.
    Drop,
    /// Write the given bytes under the original basename.
    Copy(Vec<u8>),
    /// Write a single output under a new name.
    Single(OutputFile),
    /// Write an ordered list of outputs; the manifest preserves the order.
    /// An empty list behaves like [`TransformOutput::Drop`].
    Many(Vec<OutputFile>),
}

/// The two processor variants.
pub enum ProcessorAction {
    /// Copy content unchanged; `rename` picks the output name, the original
    /// basename is kept when it is absent or yields `None`.
    Rename { rename: Option<RenameFn> },
    /// Map content to outputs. A `rename` hook on a transform unit is a
    /// configuration defect: it is warned about and never invoked.
    Transform {
        transform: TransformFn,
        rename: Option<RenameFn>,
    },
}

/// One configured unit of the pipeline.
pub struct Processor {
    /// Output root this unit writes under.
    pub out_dir: PathBuf,
    /// Whether the walker descends into subdirectories for this unit.
    pub recursive: bool,
    /// Optional inclusion predicate; absent means everything is included.
    pub include: Option<IncludeFn>,
    pub action: ProcessorAction,
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("out_dir", &self.out_dir)
            .field("recursive", &self.recursive)
            .field("has_include", &self.include.is_some())
            .field("action", &self.action_name())
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// Rename unit without a naming hook: a plain copy.
    pub fn copy(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            recursive: true,
            include: None,
            action: ProcessorAction::Rename { rename: None },
        }
    }

    /// Rename unit with a naming hook.
    pub fn rename(out_dir: impl Into<PathBuf>, rename: RenameFn) -> Self {
        Self {
            out_dir: out_dir.into(),
            recursive: true,
            include: None,
            action: ProcessorAction::Rename {
                rename: Some(rename),
            },
        }
    }

    /// Transform unit.
    pub fn transform(out_dir: impl Into<PathBuf>, transform: TransformFn) -> Self {
        Self {
            out_dir: out_dir.into(),
            recursive: true,
            include: None,
            action: ProcessorAction::Transform {
                transform,
                rename: None,
            },
        }
    }

    pub fn with_include(mut self, include: IncludeFn) -> Self {
        self.include = Some(include);
        self
    }

    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Attach a naming hook. On a transform unit this deliberately creates
    /// the warned-about configuration defect.
    pub fn with_rename(mut self, hook: RenameFn) -> Self {
        match &mut self.action {
            ProcessorAction::Rename { rename } => *rename = Some(hook),
            ProcessorAction::Transform { rename, .. } => *rename = Some(hook),
        }
        self
    }

    fn action_name(&self) -> &'static str {
        match self.action {
            ProcessorAction::Rename { .. } => "rename",
            ProcessorAction::Transform { .. } => "transform",
        }
    }
}

/// Lazily reads one file's bytes for inclusion predicates.
///
/// The read only happens if the predicate asks for it. A tolerant loader
/// reports a missing file as `None` instead of failing, so predicates can
/// still decide relevance for a file that disappeared between an event and
/// the read.
#[derive(Debug, Clone)]
pub struct ContentLoader {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    tolerate_missing: bool,
}

impl ContentLoader {
    pub(crate) fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Self {
            fs,
            path,
            tolerate_missing: false,
        }
    }

    pub(crate) fn tolerant(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Self {
            fs,
            path,
            tolerate_missing: true,
        }
    }

    pub async fn load(&self) -> anyhow::Result<Option<Contents>> {
        match self.fs.read(&self.path).await {
            Ok(bytes) => Ok(Some(Arc::new(bytes))),
            Err(err) if self.tolerate_missing && err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("reading file {:?} for include", self.path))
            }
        }
    }
}

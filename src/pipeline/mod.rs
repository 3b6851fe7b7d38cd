// src/pipeline/mod.rs

//! The file-processing core.
//!
//! This module is responsible for:
//! - The processor model: rename-and-copy vs. full-transform units with
//!   per-unit output directories and async inclusion predicates.
//! - The recursive directory walker (`compile`) that multiplexes every
//!   configured processor over one traversal.
//! - The single-pass file processor that shares one read across all active
//!   units and writes their outputs.
//! - The manifest mapping input paths to output paths, one section per
//!   processor.
//!
//! It does **not** know about file watching; the watch engine in
//! [`crate::watch`] drives incremental recompiles through the same walker
//! and file processor.

pub mod compile;
pub mod manifest;
pub mod process;
pub mod processor;

pub use compile::Pipeline;
pub use manifest::{Manifest, ManifestEntry, ManifestMap, ManifestSet};
pub use processor::{
    ContentLoader, Contents, IncludeFn, OutputFile, Processor, ProcessorAction, RenameFn,
    TransformFn, TransformOutput,
};

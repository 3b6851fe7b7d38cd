// src/config/model.rs

//! TOML configuration model for the CLI.
//!
//! Transform processors are code-level configuration; the config file can
//! express the declarative subset: copy and hash-rename units with glob
//! based inclusion and optional content-change filtering.

use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::errors::{FilemillError, Result};
use crate::hash::{ChangeTracker, content_hash_namer};
use crate::pipeline::{IncludeFn, Processor};

/// Raw, unvalidated deserialization target for `Filemill.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,
    #[serde(default, rename = "processor")]
    pub processors: Vec<ProcessorConfig>,
}

/// Global `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigSection {
    /// Root file or directory the pipeline operates from.
    pub entry: String,
    /// Forced-polling interval for watch mode, in milliseconds. Unset means
    /// native watching (or whatever `FILEMILL_POLL` says).
    pub poll_interval_ms: Option<u64>,
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            entry: ".".to_string(),
            poll_interval_ms: None,
        }
    }
}

/// One `[[processor]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Output root this unit writes under.
    pub out_dir: String,
    #[serde(default = "default_true")]
    pub recursive: bool,
    /// Glob patterns for files to include; empty means everything.
    #[serde(default)]
    pub include: Vec<String>,
    /// Glob patterns excluding files and whole directories.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub action: ProcessorActionConfig,
    /// Hash suffix length for `hash-rename`.
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,
    /// Skip files whose content did not change since they were last
    /// processed in this run.
    #[serde(default)]
    pub only_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessorActionConfig {
    #[default]
    Copy,
    HashRename,
}

fn default_true() -> bool {
    true
}

fn default_hash_length() -> usize {
    8
}

/// Validated configuration. Constructed via `TryFrom<RawConfigFile>` in
/// `validate.rs`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    processors: Vec<ProcessorConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, processors: Vec<ProcessorConfig>) -> Self {
        Self { config, processors }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn processors(&self) -> &[ProcessorConfig] {
        &self.processors
    }

    /// Turn the declarative processor tables into pipeline processors.
    pub fn build_processors(&self) -> Result<Vec<Processor>> {
        self.processors.iter().map(build_processor).collect()
    }
}

fn build_processor(cfg: &ProcessorConfig) -> Result<Processor> {
    let include = if cfg.include.is_empty() {
        None
    } else {
        Some(build_globset(&cfg.include)?)
    };
    let exclude = if cfg.exclude.is_empty() {
        None
    } else {
        Some(build_globset(&cfg.exclude)?)
    };
    let tracker = cfg.only_changed.then(|| Arc::new(ChangeTracker::new()));

    let mut processor = match cfg.action {
        ProcessorActionConfig::Copy => Processor::copy(&cfg.out_dir),
        ProcessorActionConfig::HashRename => {
            Processor::rename(&cfg.out_dir, content_hash_namer(cfg.hash_length))
        }
    };
    if !cfg.recursive {
        processor = processor.non_recursive();
    }
    if include.is_some() || exclude.is_some() || tracker.is_some() {
        processor = processor.with_include(glob_include(include, exclude, tracker));
    }
    Ok(processor)
}

/// Inclusion predicate combining glob filtering with optional content-change
/// tracking. Directories only answer the exclude set, so descent is not cut
/// off by file-shaped include patterns.
fn glob_include(
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    tracker: Option<Arc<ChangeTracker>>,
) -> IncludeFn {
    let changed = tracker.as_ref().map(ChangeTracker::include_filter);
    Arc::new(move |path, is_dir, loader| {
        let include = include.clone();
        let exclude = exclude.clone();
        let changed = changed.clone();
        Box::pin(async move {
            if let Some(exclude) = &exclude {
                if exclude.is_match(&path) {
                    return Ok(false);
                }
            }
            if !is_dir {
                if let Some(include) = &include {
                    if !include.is_match(&path) {
                        return Ok(false);
                    }
                }
            }
            match &changed {
                Some(filter) => filter(path, is_dir, loader).await,
                None => Ok(true),
            }
        })
    })
}

pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| {
            FilemillError::ConfigError(format!("invalid glob pattern '{pattern}': {err}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| FilemillError::ConfigError(format!("building glob set: {err}")))
}

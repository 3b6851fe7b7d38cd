// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, build_globset};
use crate::errors::{FilemillError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FilemillError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.processors))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_processors(cfg)?;
    validate_global_config(cfg)?;
    validate_processors(cfg)?;
    Ok(())
}

fn ensure_has_processors(cfg: &RawConfigFile) -> Result<()> {
    if cfg.processors.is_empty() {
        return Err(FilemillError::ConfigError(
            "config must contain at least one [[processor]] table".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.entry.is_empty() {
        return Err(FilemillError::ConfigError(
            "[config].entry must not be empty".to_string(),
        ));
    }
    if cfg.config.poll_interval_ms == Some(0) {
        return Err(FilemillError::ConfigError(
            "[config].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_processors(cfg: &RawConfigFile) -> Result<()> {
    for (idx, processor) in cfg.processors.iter().enumerate() {
        if processor.out_dir.is_empty() {
            return Err(FilemillError::ConfigError(format!(
                "processor #{idx}: out_dir must not be empty"
            )));
        }
        if !(1..=64).contains(&processor.hash_length) {
            return Err(FilemillError::ConfigError(format!(
                "processor #{idx}: hash_length must be between 1 and 64 (got {})",
                processor.hash_length
            )));
        }
        // Compile the globs up front so bad patterns fail at load time, not
        // in the middle of a watch.
        build_globset(&processor.include)?;
        build_globset(&processor.exclude)?;
    }
    Ok(())
}

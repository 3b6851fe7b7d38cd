// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod hash;
pub mod logging;
pub mod path_utils;
pub mod pipeline;
pub mod watch;

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::errors::Result;

pub use crate::errors::FilemillError;
pub use crate::pipeline::{
    Manifest, ManifestEntry, ManifestMap, OutputFile, Pipeline, Processor, TransformOutput,
};
pub use crate::watch::{ErrorAction, PollConfig, WatchOptions};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the pipeline (one-shot compile or watch mode)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let processors = cfg.build_processors()?;
    let pipeline = Pipeline::new(processors);
    let entry = PathBuf::from(&cfg.config().entry);

    if !args.watch {
        let manifest = pipeline.compile(&entry).await?;
        print_manifest(&manifest)?;
        return Ok(());
    }

    // Ctrl-C → graceful shutdown.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            cancel.cancel();
        });
    }

    // CLI flag > config file > environment.
    let poll = match (args.poll, cfg.config().poll_interval_ms) {
        (Some(ms), _) | (None, Some(ms)) => PollConfig::with_interval(Duration::from_millis(ms)),
        (None, None) => PollConfig::from_env(),
    };

    let options = WatchOptions {
        cancel,
        poll,
        on_error: None,
    };

    let mut snapshots = pipeline.watch(entry, options);
    while let Some(snapshot) = snapshots.recv().await {
        match snapshot {
            Ok(manifest) => print_manifest(&manifest)?,
            Err(err) => return Err(err.into()),
        }
    }

    info!("watch ended");
    Ok(())
}

/// Print a manifest to stdout as TOML, one `[[manifest]]` table per
/// processor section.
fn print_manifest(manifest: &Manifest) -> Result<()> {
    #[derive(serde::Serialize)]
    struct Doc<'a> {
        manifest: &'a [ManifestMap],
    }

    let doc = Doc {
        manifest: manifest.maps(),
    };
    println!("{}", toml::to_string(&doc)?);
    Ok(())
}

/// Simple dry-run output: print the entry and the configured processors.
fn print_dry_run(cfg: &ConfigFile) {
    println!("filemill dry-run");
    println!("  config.entry = {}", cfg.config().entry);
    if let Some(ms) = cfg.config().poll_interval_ms {
        println!("  config.poll_interval_ms = {ms}");
    }
    println!();

    println!("processors ({}):", cfg.processors().len());
    for processor in cfg.processors() {
        println!("  - out_dir: {}", processor.out_dir);
        println!("      action: {:?}", processor.action);
        if !processor.recursive {
            println!("      recursive: false");
        }
        if !processor.include.is_empty() {
            println!("      include: {:?}", processor.include);
        }
        if !processor.exclude.is_empty() {
            println!("      exclude: {:?}", processor.exclude);
        }
        if processor.only_changed {
            println!("      only_changed: true");
        }
    }
}

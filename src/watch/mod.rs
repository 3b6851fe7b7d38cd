// src/watch/mod.rs

//! Live-watch mode: incremental recompiles driven by filesystem events.
//!
//! This module is responsible for:
//! - The event queue bridging one event producer and the engine loop.
//! - The two event sources: the native `notify`-based watcher and the
//!   mtime-polling fallback.
//! - The watch engine itself: one initial compile, then one manifest
//!   mutation per event, each completed before the next event is consumed.
//!
//! It does **not** decide what happens to a file; inclusion and processing
//! are delegated back to [`crate::pipeline`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub mod engine;
pub mod native;
pub mod poller;
pub mod queue;

pub use poller::Poller;
pub use queue::EventQueue;

/// Environment variable forcing poll mode: empty/unset disables, an integer
/// sets the interval in milliseconds, anything else enables the default
/// interval.
pub const POLL_ENV_VAR: &str = "FILEMILL_POLL";

/// What kind of change an event source observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A file appeared or disappeared (also: was renamed).
    Rename,
    /// A file's content changed.
    Change,
}

/// One filesystem event, with the path relative to the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub path: String,
}

/// What the error hook wants the watch loop to do after a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Keep consuming events.
    Continue,
    /// Forward the error to the snapshot stream and terminate.
    Stop,
}

/// Hook receiving every error the watch loop would otherwise swallow.
pub type ErrorHook = Arc<dyn Fn(&anyhow::Error) -> ErrorAction + Send + Sync>;

/// Whether to force the polling fallback instead of the native watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollConfig {
    Disabled,
    Enabled { interval: Duration },
}

impl PollConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(300);

    pub fn enabled() -> Self {
        PollConfig::Enabled {
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        PollConfig::Enabled { interval }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, PollConfig::Enabled { .. })
    }

    /// Read the forced-polling toggle from `FILEMILL_POLL`.
    pub fn from_env() -> Self {
        match std::env::var(POLL_ENV_VAR) {
            Err(_) => PollConfig::Disabled,
            Ok(value) if value.is_empty() => PollConfig::Disabled,
            Ok(value) => match value.parse::<u64>() {
                Ok(ms) => PollConfig::Enabled {
                    interval: Duration::from_millis(ms),
                },
                Err(_) => Self::enabled(),
            },
        }
    }
}

/// Options for [`crate::Pipeline::watch`].
#[derive(Clone)]
pub struct WatchOptions {
    /// External cancellation signal; cancelling it terminates the watch.
    pub cancel: CancellationToken,
    /// Forced-polling toggle with optional interval override.
    pub poll: PollConfig,
    /// Error hook; `None` uses the default (stop in CI, log and continue
    /// otherwise).
    pub on_error: Option<ErrorHook>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            poll: PollConfig::from_env(),
            on_error: None,
        }
    }
}

impl std::fmt::Debug for WatchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchOptions")
            .field("poll", &self.poll)
            .field("has_error_hook", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

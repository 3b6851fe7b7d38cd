//! Small helpers for building processors and mock trees in tests.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filemill::pipeline::{IncludeFn, TransformFn, TransformOutput};

/// A `SystemTime` at a fixed offset from the epoch, for deterministic
/// mtimes in the mock filesystem.
#[allow(dead_code)]
pub fn mtime(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// Include only files whose relative path ends with `suffix`. Directories
/// always pass so descent is not cut off.
#[allow(dead_code)]
pub fn include_suffix(suffix: &str) -> IncludeFn {
    let suffix = suffix.to_string();
    Arc::new(move |path, is_dir, _loader| {
        let suffix = suffix.clone();
        Box::pin(async move { Ok(is_dir || path.ends_with(&suffix)) })
    })
}

/// Lift a synchronous content mapping into a `TransformFn`.
#[allow(dead_code)]
pub fn transform_with<F>(f: F) -> TransformFn
where
    F: Fn(&[u8], &str) -> TransformOutput + Send + Sync + 'static,
{
    Arc::new(move |contents, name| {
        let out = f(&contents, &name);
        Box::pin(async move { Ok(out) })
    })
}

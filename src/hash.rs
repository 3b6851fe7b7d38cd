// src/hash.rs

//! Content hashing helpers: the hash-suffix file namer and the
//! content-change inclusion filter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::path_utils::{base_name, split_ext};
use crate::pipeline::{IncludeFn, RenameFn};

/// Lowercase hex sha256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Rename hook that suffixes the file stem with the first `length` hex
/// characters of the content's sha256, uppercased:
/// `a.txt` with contents B becomes `a-<HASH>.txt`.
pub fn content_hash_namer(length: usize) -> RenameFn {
    Arc::new(move |name, contents| {
        Box::pin(async move {
            let file_name = base_name(&name);
            let (stem, ext) = split_ext(&file_name);
            let digest = sha256_hex(&contents);
            let short = digest[..length.min(digest.len())].to_uppercase();
            Ok(Some(format!("{stem}-{short}{ext}")))
        })
    })
}

/// Per-pipeline content-change state backing [`ChangeTracker::include_filter`].
///
/// Construct one per pipeline instance and share it by reference; the state
/// is deliberately not global, so two pipelines never see each other's
/// checksums.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    seen: Mutex<HashMap<String, String>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusion predicate that admits a file only when its sha256 differs
    /// from the last admitted one, recording the new checksum. Directories
    /// and files whose content is unavailable are always admitted.
    pub fn include_filter(self: &Arc<Self>) -> IncludeFn {
        let tracker = Arc::clone(self);
        Arc::new(move |name, is_dir, loader| {
            let tracker = Arc::clone(&tracker);
            Box::pin(async move {
                let contents = match &loader {
                    Some(loader) => loader.load().await?,
                    None => None,
                };
                let Some(contents) = contents else {
                    return Ok(true);
                };
                if is_dir {
                    return Ok(true);
                }
                let checksum = sha256_hex(&contents);
                Ok(tracker.admit(&name, checksum))
            })
        })
    }

    fn admit(&self, name: &str, checksum: String) -> bool {
        let mut seen = self.seen.lock().expect("change tracker lock poisoned");
        match seen.get(name) {
            Some(prev) if *prev == checksum => {
                debug!(file = %name, "content unchanged; excluded");
                false
            }
            _ => {
                seen.insert(name.to_string(), checksum);
                true
            }
        }
    }
}

// src/path_utils.rs

//! Utility functions for path handling in the walker and the watcher.

use std::path::{Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// This is intentionally robust:
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
/// - Only if both attempts fail do we give up.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    // Fast path: path already starts with our root.
    if let Ok(rel) = path.strip_prefix(root) {
        let s = rel.to_string_lossy().replace('\\', "/");
        return Some(s);
    }

    // More robust path: canonicalize both, then try again. This helps on
    // platforms (notably macOS) where different absolute prefixes may be used
    // for the same underlying directory (e.g. symlinks, /private/var/...).
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            let s = rel.to_string_lossy().replace('\\', "/");
            return Some(s);
        }
    }

    None
}

/// Last component of a relative path string.
pub fn base_name(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None => rel_path.to_string(),
    }
}

/// Split a file name into (stem, extension), keeping the dot on the
/// extension: `"a.txt"` -> `("a", ".txt")`, `"Makefile"` -> `("Makefile", "")`.
/// A leading dot alone does not count as an extension.
pub fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// The directory that contains `entry`: the entry itself when it is a
/// directory, its parent otherwise.
pub fn containing_dir(entry: &Path, is_dir: bool) -> PathBuf {
    if is_dir {
        entry.to_path_buf()
    } else {
        match entry.parent() {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::new(),
        }
    }
}

// src/pipeline/manifest.rs

use std::collections::BTreeMap;

use serde::Serialize;

/// Output path(s) one processor produced for one input file, relative to
/// that processor's own output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Single(String),
    /// Ordered: index i corresponds to the i-th output the transform
    /// returned. A one-element transform list stays a list.
    Many(Vec<String>),
}

/// One processor's section: input path (relative to the entry directory,
/// forward slashes) -> output path(s).
pub type ManifestMap = BTreeMap<String, ManifestEntry>;

/// The internal manifest: a fixed-size ordered collection with exactly one
/// section per configured processor, aligned positionally. It keeps this
/// shape at all times; flattening for the single-processor case happens only
/// at the external boundary via [`ManifestSet::snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSet {
    maps: Vec<ManifestMap>,
}

impl ManifestSet {
    pub fn new(processor_count: usize) -> Self {
        Self {
            maps: vec![ManifestMap::new(); processor_count],
        }
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn maps(&self) -> &[ManifestMap] {
        &self.maps
    }

    /// Merge one processor's fragment for one input file.
    pub fn insert(&mut self, processor_idx: usize, input: String, entry: ManifestEntry) {
        if let Some(map) = self.maps.get_mut(processor_idx) {
            map.insert(input, entry);
        }
    }

    /// Whether any section still maps this input path.
    pub fn contains(&self, input: &str) -> bool {
        self.maps.iter().any(|m| m.contains_key(input))
    }

    /// Remove an input path from every section. Returns true if any section
    /// had it.
    pub fn remove(&mut self, input: &str) -> bool {
        let mut removed = false;
        for map in &mut self.maps {
            removed |= map.remove(input).is_some();
        }
        removed
    }

    /// Clone the current state into the externally visible shape: the single
    /// section directly when one processor is configured, the ordered list
    /// otherwise.
    pub fn snapshot(&self) -> Manifest {
        match self.maps.as_slice() {
            [single] => Manifest::Single(single.clone()),
            _ => Manifest::Many(self.maps.clone()),
        }
    }
}

/// Manifest as handed to callers of `compile` and `watch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Manifest {
    /// Exactly one processor configured.
    Single(ManifestMap),
    /// One section per processor, in processor order.
    Many(Vec<ManifestMap>),
}

impl Manifest {
    /// Uniform view over both shapes.
    pub fn maps(&self) -> &[ManifestMap] {
        match self {
            Manifest::Single(map) => std::slice::from_ref(map),
            Manifest::Many(maps) => maps,
        }
    }

    /// Look up one input path in one processor section.
    pub fn get(&self, processor_idx: usize, input: &str) -> Option<&ManifestEntry> {
        self.maps().get(processor_idx).and_then(|m| m.get(input))
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded result caches
//!
//! Preview redraws recompute the same volumes many times per second. These
//! caches key results by a content hash and only ever speed things up: a
//! cleared cache produces identical output.

use cursorbox_model::ReferenceFrame;
use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};

/// Hit/miss counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Hash-keyed cache with a fixed capacity and arbitrary eviction
///
/// When full, whichever entry the map yields first is dropped. That is not
/// LRU, which is fine for a redraw accelerator.
#[derive(Debug)]
pub struct BoundedCache<V> {
    entries: FxHashMap<u64, V>,
    capacity: usize,
    stats: CacheStats,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Look up a key, counting the hit or miss
    pub fn get(&mut self, key: u64) -> Option<V> {
        match self.entries.get(&key) {
            Some(value) => {
                self.stats.hits += 1;
                Some(value.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: u64, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(&victim) = self.entries.keys().next() {
                self.entries.remove(&victim);
                self.stats.evictions += 1;
            }
        }
        self.entries.insert(key, value);
    }

    /// Return the cached value or compute and store it
    ///
    /// Errors are passed through and never cached.
    pub fn get_or_try_insert<E>(
        &mut self,
        key: u64,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Content hash of a point set, an optional frame pose and scalar parameters
pub fn content_hash(points: &[Point3<f64>], frame: Option<&ReferenceFrame>, params: &[f64]) -> u64 {
    let mut hasher = FxHasher::default();

    points.len().hash(&mut hasher);
    for p in points {
        for c in p.coords.iter() {
            c.to_bits().hash(&mut hasher);
        }
    }

    if let Some(frame) = frame {
        for c in frame.position().coords.iter() {
            c.to_bits().hash(&mut hasher);
        }
        for c in frame.rotation().matrix().iter() {
            c.to_bits().hash(&mut hasher);
        }
    }

    for p in params {
        p.to_bits().hash(&mut hasher);
    }

    hasher.finish()
}

// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Grace-period eviction cache.
//!
//! Bundles that have just lost their last reference are put here once. While
//! a key is present its bundle is not physically unloaded; it becomes an unload
//! candidate only after newer zero-referenced bundles push it out. Presence in
//! the cache never counts as a reference.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Fixed-capacity, insertion-ordered key cache
pub struct EvictionCache {
    entries: Option<LruCache<String, ()>>,
}

impl EvictionCache {
    /// Create a cache holding at most `capacity` keys (0 disables caching)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Insert `key`, evicting the oldest key when over capacity.
    ///
    /// Returns the evicted key, if any.
    pub fn put(&mut self, key: &str) -> Option<String> {
        let entries = self.entries.as_mut()?;
        match entries.push(key.to_owned(), ()) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }

    /// Membership test; does not refresh the key's position
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .as_ref()
            .is_some_and(|entries| entries.contains(key))
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries
            .as_mut()
            .and_then(|entries| entries.pop(key))
            .is_some()
    }

    pub fn capacity(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.cap().get())
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    /// Keys from most to least recently inserted
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .as_ref()
            .map(|entries| entries.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default()
    }
}

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

//! Network-backed loader.
//!
//! One loader per group. Fetched objects are cached by URL and reference
//! counted per object; there is no dependency graph. Concurrent requests for
//! the same URL share one fetch.

use ahash::AHashMap;
use std::sync::Arc;

use crate::eviction::EvictionCache;
use crate::handle::{AssetHandle, AssetObject};
use crate::reference::RefManager;
use crate::request::{LoadRequest, RequestState, WEB_BYTES_KEY};

/// Progress of a network fetch
#[derive(Debug)]
pub enum FetchPoll {
    Pending,
    /// Response decoded into an object of the requested type
    Decoded(AssetObject),
    /// Response of a type the fetcher does not decode
    Raw(Vec<u8>),
    Failed(String),
}

pub trait PendingFetch: Send {
    fn poll(&mut self) -> FetchPoll;
}

/// Issues network requests. A caller-built request object, when present,
/// is attached to the request under
/// [`WEB_REQUEST_KEY`](crate::request::WEB_REQUEST_KEY).
pub trait WebFetcher: Send + Sync {
    fn fetch(&self, request: &LoadRequest) -> Box<dyn PendingFetch>;
}

struct WebEntry {
    object: AssetObject,
    unused_since: Option<u64>,
}

struct Fetching {
    url: String,
    pending: Box<dyn PendingFetch>,
    waiters: Vec<LoadRequest>,
}

/// Loader for one network group
pub struct WebLoader {
    group: String,
    fetcher: Arc<dyn WebFetcher>,
    refs: RefManager<String>,
    loaded: AHashMap<String, WebEntry>,
    lru: EvictionCache,
    fetching: Vec<Fetching>,
    grace_ticks: u64,
    now: u64,
}

impl WebLoader {
    pub fn new(group: &str, fetcher: Arc<dyn WebFetcher>, cache_capacity: usize, grace_ticks: u64) -> Self {
        Self {
            group: group.to_owned(),
            fetcher,
            refs: RefManager::new(),
            loaded: AHashMap::new(),
            lru: EvictionCache::new(cache_capacity),
            fetching: Vec::new(),
            grace_ticks,
            now: 0,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn set_tick(&mut self, tick: u64) {
        self.now = tick;
    }

    /// Serve `request` from the cache, join an outstanding fetch for the
    /// same URL, or start a new fetch.
    pub fn load(&mut self, mut request: LoadRequest, done: &mut Vec<LoadRequest>) {
        if let Some(entry) = self.loaded.get_mut(&request.path) {
            entry.unused_since = None;
            let handle = AssetHandle::new(
                entry.object.clone(),
                self.refs.get_or_create(request.path.as_str()),
            );
            request.complete(handle);
            done.push(request);
            return;
        }

        request.set_state(RequestState::AsyncServicing);
        if let Some(fetching) = self.fetching.iter_mut().find(|f| f.url == request.path) {
            fetching.waiters.push(request);
            return;
        }

        tracing::debug!(group = %self.group, url = %request.path, "fetch");
        let pending = self.fetcher.fetch(&request);
        self.fetching.push(Fetching {
            url: request.path.clone(),
            pending,
            waiters: vec![request],
        });
    }

    /// Poll outstanding fetches; each waiter is completed exactly once
    pub fn poll(&mut self, done: &mut Vec<LoadRequest>) {
        if self.fetching.is_empty() {
            return;
        }
        for mut fetching in std::mem::take(&mut self.fetching) {
            match fetching.pending.poll() {
                FetchPoll::Pending => self.fetching.push(fetching),
                FetchPoll::Decoded(object) => {
                    let reference = self.refs.get_or_create(fetching.url.as_str());
                    for mut request in fetching.waiters.drain(..) {
                        request.complete(AssetHandle::new(object.clone(), reference.clone()));
                        done.push(request);
                    }
                    self.loaded.insert(
                        fetching.url,
                        WebEntry {
                            object,
                            unused_since: None,
                        },
                    );
                }
                FetchPoll::Raw(bytes) => {
                    for mut request in fetching.waiters.drain(..) {
                        request.set_data(WEB_BYTES_KEY, bytes.clone());
                        request.complete(AssetHandle::invalid());
                        done.push(request);
                    }
                }
                FetchPoll::Failed(error) => {
                    tracing::error!(group = %self.group, url = %fetching.url, "fetch failed: {error}");
                    for mut request in fetching.waiters.drain(..) {
                        request.complete(AssetHandle::invalid());
                        done.push(request);
                    }
                }
            }
        }
    }

    /// Unload zero-referenced objects that have left the grace window.
    /// Returns the number unloaded.
    pub fn unload_unused(&mut self) -> usize {
        let now = self.now;
        let mut expired = Vec::new();
        for (url, entry) in self.loaded.iter_mut() {
            if self.refs.has_any_reference(url.as_str()) {
                entry.unused_since = None;
                continue;
            }
            let since = match entry.unused_since {
                Some(since) => since,
                None => {
                    entry.unused_since = Some(now);
                    self.lru.put(url);
                    now
                }
            };
            if now.saturating_sub(since) < self.grace_ticks || self.lru.contains(url) {
                continue;
            }
            expired.push(url.clone());
        }

        for url in &expired {
            self.loaded.remove(url);
            self.refs.destroy(url.as_str());
            tracing::debug!(group = %self.group, url = %url, "unload web object");
        }
        expired.len()
    }

    /// Complete outstanding fetches invalid, drop every object and reference
    pub fn release(&mut self, done: &mut Vec<LoadRequest>) {
        for mut fetching in self.fetching.drain(..) {
            for mut request in fetching.waiters.drain(..) {
                request.complete(AssetHandle::invalid());
                done.push(request);
            }
        }
        self.refs.clear();
        self.loaded.clear();
        self.lru.clear();
    }

    pub fn is_loaded(&self, url: &str) -> bool {
        self.loaded.contains_key(url)
    }

    pub fn has_any_reference(&self, url: &str) -> bool {
        self.refs.has_any_reference(url)
    }

    /// Requests waiting on outstanding fetches
    pub fn waiting_count(&self) -> usize {
        self.fetching.iter().map(|f| f.waiters.len()).sum()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }
}

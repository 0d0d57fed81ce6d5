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

//! Bundle loader for one mounted root.
//!
//! Keeps the resident-bundle table for its root. Loading a bundle first makes
//! every direct and transitive dependency resident, then opens the bundle and
//! has it hold one reference on each direct dependency, so a dependency cannot
//! be unloaded while any dependent is resident.
//!
//! Unloading only ever touches bundles with zero references that have no
//! asynchronous read outstanding.

use ahash::AHashMap;
use smallvec::SmallVec;
use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archive::{
    join_path, BundleArchive, BundleSource, ByteTransform, CachePolicy, Manifest, PendingRead,
    ReadPoll,
};
use crate::config::{AssetConfig, RootConfig};
use crate::error::Result;
use crate::eviction::EvictionCache;
use crate::handle::{AssetHandle, AssetObject, LoadedBundle};
use crate::path_map::{BundleMap, ResolvedPath};
use crate::reference::{RefList, RefManager};
use crate::request::{LoadRequest, RequestState, PRIORITY_MAX};
use crate::stats::LoaderStats;

type DepList = SmallVec<[String; 4]>;

struct BundleEntry {
    archive: Box<dyn BundleArchive>,
    /// Bundle-level payload handed out by `load_bundle`
    object: AssetObject,
    /// Holds on each direct dependency
    deps: RefList,
    used_tick: u64,
    /// Tick at which the sweep first saw the bundle unreferenced
    unused_since: Option<u64>,
    transformed: bool,
}

struct InFlightRead {
    bundle: String,
    asset_name: String,
    request: LoadRequest,
    pending: Box<dyn PendingRead>,
}

/// Per-sweep budget. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UnloadLimits {
    pub max_count: Option<usize>,
    pub max_millis: Option<f64>,
}

impl UnloadLimits {
    pub const UNBOUNDED: Self = Self {
        max_count: None,
        max_millis: None,
    };

    pub fn from_config(config: &AssetConfig) -> Self {
        Self {
            max_count: Some(config.max_unloads_per_tick),
            max_millis: Some(config.max_unload_millis),
        }
    }
}

/// Resident-bundle table and dependency graph of one root
pub struct BundleLoader {
    root: String,
    source: Arc<dyn BundleSource>,
    map: BundleMap,
    manifest: Arc<dyn Manifest>,
    transform: Option<ByteTransform>,
    cache_policy: Option<CachePolicy>,
    min_unused_age: u64,
    grace_ticks: u64,
    bundles: AHashMap<String, BundleEntry>,
    dep_cache: AHashMap<String, DepList>,
    refs: RefManager<String>,
    lru: EvictionCache,
    /// Outstanding async reads per bundle
    in_flight: AHashMap<String, usize>,
    reads: Vec<InFlightRead>,
    stats: LoaderStats,
    now: u64,
}

impl BundleLoader {
    /// Mount `root`: read its bundle map and dependency manifest
    pub fn mount(
        root: &str,
        source: Arc<dyn BundleSource>,
        root_config: RootConfig,
        config: &AssetConfig,
    ) -> Result<Self> {
        let map = source.read_bundle_map(root)?;
        let manifest = source.load_manifest(root)?;
        tracing::info!(root, assets = map.len(), "mounted bundle root");

        Ok(Self {
            root: root.to_owned(),
            source,
            map,
            manifest,
            transform: root_config.transform,
            cache_policy: root_config.cache_policy,
            min_unused_age: config.min_unused_age_ticks,
            grace_ticks: config.grace_ticks,
            bundles: AHashMap::new(),
            dep_cache: AHashMap::new(),
            refs: RefManager::new(),
            lru: EvictionCache::new(root_config.cache_capacity),
            in_flight: AHashMap::new(),
            reads: Vec::new(),
            stats: LoaderStats::default(),
            now: 0,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Advance the loader's notion of the current tick
    pub fn set_tick(&mut self, tick: u64) {
        self.now = tick;
    }

    pub fn resolve(&self, path: &str) -> Option<ResolvedPath> {
        self.map.resolve(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.map.contains(path)
    }

    /// Load a bundle (and its dependencies) and return its bundle-level handle
    pub fn load_bundle(&mut self, bundle: &str) -> AssetHandle {
        if !self.ensure_resident(bundle, 0, &mut Vec::new()) {
            return AssetHandle::invalid();
        }
        match self.bundles.get(bundle) {
            Some(entry) => AssetHandle::new(entry.object.clone(), self.refs.get_or_create(bundle)),
            None => AssetHandle::invalid(),
        }
    }

    /// Load a named object synchronously. The handle's reference is the
    /// containing bundle's.
    pub fn load_object(&mut self, bundle: &str, asset_name: &str, ty: Option<TypeId>) -> AssetHandle {
        if !self.ensure_resident(bundle, 0, &mut Vec::new()) {
            return AssetHandle::invalid();
        }
        let Some(entry) = self.bundles.get_mut(bundle) else {
            return AssetHandle::invalid();
        };
        match entry.archive.load_object(asset_name, ty) {
            Some(object) => AssetHandle::new(object, self.refs.get_or_create(bundle)),
            None => {
                if entry.archive.contains(asset_name) {
                    tracing::warn!(root = %self.root, "load failed: {bundle}/{asset_name}");
                } else {
                    tracing::error!(root = %self.root, "bundle {bundle} does not contain {asset_name}");
                }
                AssetHandle::invalid()
            }
        }
    }

    /// Start an asynchronous object read. A request that cannot be started
    /// is completed invalid and pushed to `done`.
    pub fn load_object_async(
        &mut self,
        mut request: LoadRequest,
        bundle: &str,
        asset_name: &str,
        done: &mut Vec<LoadRequest>,
    ) {
        if !self.ensure_resident(bundle, 0, &mut Vec::new()) {
            request.complete(AssetHandle::invalid());
            done.push(request);
            return;
        }

        // Archives treat larger priorities as more urgent
        let archive_priority = PRIORITY_MAX - request.priority;
        let pending = self.bundles.get_mut(bundle).and_then(|entry| {
            entry
                .archive
                .load_object_async(asset_name, request.asset_type, archive_priority)
        });

        match pending {
            Some(pending) => {
                request.set_state(RequestState::AsyncServicing);
                *self.in_flight.entry(bundle.to_owned()).or_insert(0) += 1;
                self.reads.push(InFlightRead {
                    bundle: bundle.to_owned(),
                    asset_name: asset_name.to_owned(),
                    request,
                    pending,
                });
            }
            None => {
                tracing::error!(root = %self.root, "async read could not start: {bundle}/{asset_name}");
                request.complete(AssetHandle::invalid());
                done.push(request);
            }
        }
    }

    /// Poll outstanding reads; finished requests are pushed to `done` in
    /// the order they were started.
    pub fn poll_in_flight(&mut self, done: &mut Vec<LoadRequest>) {
        if self.reads.is_empty() {
            return;
        }
        for mut read in std::mem::take(&mut self.reads) {
            match read.pending.poll() {
                ReadPoll::Pending => self.reads.push(read),
                ReadPoll::Ready(object) => {
                    self.finish_read(&read.bundle);
                    let handle = match object {
                        Some(object) => {
                            AssetHandle::new(object, self.refs.get_or_create(read.bundle.as_str()))
                        }
                        None => {
                            tracing::warn!(
                                root = %self.root,
                                "load failed: {}/{}",
                                read.bundle,
                                read.asset_name
                            );
                            AssetHandle::invalid()
                        }
                    };
                    read.request.complete(handle);
                    done.push(read.request);
                }
            }
        }
    }

    /// Complete every outstanding read as invalid
    pub fn cancel_in_flight(&mut self, done: &mut Vec<LoadRequest>) {
        for mut read in self.reads.drain(..) {
            read.request.complete(AssetHandle::invalid());
            done.push(read.request);
        }
        self.in_flight.clear();
    }

    fn finish_read(&mut self, bundle: &str) {
        if let Some(count) = self.in_flight.get_mut(bundle) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(bundle);
            }
        }
        if let Some(entry) = self.bundles.get_mut(bundle) {
            entry.used_tick = self.now;
        }
    }

    /// Direct dependencies of `bundle`, self-edges removed. Cached per bundle.
    pub fn dependencies_of(&mut self, bundle: &str) -> DepList {
        if let Some(deps) = self.dep_cache.get(bundle) {
            return deps.clone();
        }
        let mut deps: DepList = SmallVec::new();
        for dep in self.manifest.direct_dependencies(bundle) {
            if dep != bundle && !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        self.dep_cache.insert(bundle.to_owned(), deps.clone());
        deps
    }

    /// Make `bundle` resident, dependencies first. `visiting` is the chain of
    /// bundles currently being opened; an edge back into it is a cycle and is
    /// skipped.
    fn ensure_resident(&mut self, bundle: &str, depth: usize, visiting: &mut Vec<String>) -> bool {
        self.stats.loads += 1;
        if let Some(entry) = self.bundles.get_mut(bundle) {
            entry.used_tick = self.now;
            entry.unused_since = None;
            if self.lru.contains(bundle) {
                self.stats.cache_hits += 1;
            }
            return true;
        }

        visiting.push(bundle.to_owned());
        let mut deps = RefList::new();
        for dep in self.dependencies_of(bundle) {
            if visiting.contains(&dep) {
                tracing::error!(root = %self.root, "dependency cycle: {bundle} -> {dep}, edge skipped");
                continue;
            }
            if self.ensure_resident(&dep, depth + 1, visiting) {
                deps.add(self.refs.get_or_create(dep.as_str()));
            }
        }
        visiting.pop();

        let (archive, transformed) = match self.open_archive(bundle) {
            Ok(opened) => opened,
            Err(e) => {
                self.stats.open_failures += 1;
                tracing::error!(root = %self.root, "failed to open bundle {bundle}: {e}");
                return false;
            }
        };
        self.stats.opens += 1;

        if depth == 0 {
            tracing::info!(root = %self.root, tick = self.now, "load bundle {bundle}");
        } else {
            tracing::debug!(
                root = %self.root,
                "{:->width$}> load dependency {bundle}",
                "",
                width = depth * 4
            );
        }

        let object = AssetObject::new(LoadedBundle {
            path: bundle.to_owned(),
            scene_paths: archive.scene_paths(),
        });
        self.bundles.insert(
            bundle.to_owned(),
            BundleEntry {
                archive,
                object,
                deps,
                used_tick: self.now,
                unused_since: None,
                transformed,
            },
        );
        true
    }

    fn open_archive(&self, bundle: &str) -> Result<(Box<dyn BundleArchive>, bool)> {
        let full_path = join_path(&self.root, bundle);
        match &self.transform {
            Some(transform) => {
                let stream = transform(&full_path)?;
                Ok((self.source.open_stream(&full_path, stream)?, true))
            }
            None => Ok((self.source.open(&full_path)?, false)),
        }
    }

    /// True while at least one reference holds `bundle`
    pub fn has_any_reference(&self, bundle: &str) -> bool {
        self.refs.has_any_reference(bundle)
    }

    pub fn is_resident(&self, bundle: &str) -> bool {
        self.bundles.contains_key(bundle)
    }

    pub fn is_in_flight(&self, bundle: &str) -> bool {
        self.in_flight.contains_key(bundle)
    }

    pub fn in_flight_count(&self) -> usize {
        self.reads.len()
    }

    pub fn resident_count(&self) -> usize {
        self.bundles.len()
    }

    /// Resident bundle paths, sorted
    pub fn resident_bundles(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.bundles.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Bundles currently held in the grace window, newest first
    pub fn cached_bundles(&self) -> Vec<String> {
        self.lru.keys()
    }

    pub fn stats(&self) -> &LoaderStats {
        &self.stats
    }

    fn unload_bundle(&mut self, bundle: &str) -> bool {
        if self.in_flight.contains_key(bundle) {
            return false;
        }
        let Some(mut entry) = self.bundles.remove(bundle) else {
            return false;
        };
        self.refs.destroy(bundle);
        // Dependencies become candidates on a later pass
        entry.deps.clear();
        entry.archive.unload();
        self.lru.remove(bundle);
        self.stats.unloads += 1;
        tracing::debug!(
            root = %self.root,
            tick = self.now,
            transformed = entry.transformed,
            "unload bundle {bundle}"
        );
        true
    }

    /// Unload every zero-referenced bundle, ignoring age and the grace window.
    ///
    /// Returns true when the pass unloaded nothing (converged).
    pub fn unload_unused_step(&mut self) -> bool {
        let unused: Vec<String> = self
            .bundles
            .keys()
            .filter(|bundle| {
                !self.refs.has_any_reference(bundle.as_str()) && !self.in_flight.contains_key(*bundle)
            })
            .cloned()
            .collect();

        let mut unloaded = 0;
        for bundle in &unused {
            if self.unload_bundle(bundle) {
                unloaded += 1;
            }
        }
        unloaded == 0
    }

    /// Repeat [`unload_unused_step`](Self::unload_unused_step) until it
    /// converges. Returns the number of passes that unloaded something.
    pub fn unload_unused_total(&mut self) -> usize {
        #[cfg(feature = "profiling")]
        let _span = info_span!("unload_unused_total", root = %self.root).entered();

        let mut passes = 0;
        while !self.unload_unused_step() {
            passes += 1;
        }
        passes
    }

    /// Policy-respecting sweep: skips recently used bundles, applies the
    /// grace window to cacheable bundles and stops at the count or time cap.
    ///
    /// Returns true when every candidate was unloaded.
    pub fn unload_unused(&mut self, limits: UnloadLimits) -> bool {
        #[cfg(feature = "profiling")]
        let _span = info_span!("reclaim_sweep", root = %self.root).entered();

        let now = self.now;
        let scan_cap = limits.max_count.map(|max| max.saturating_mul(2));
        let mut candidates: Vec<String> = Vec::new();
        let mut truncated = false;

        for (bundle, entry) in self.bundles.iter_mut() {
            if now.saturating_sub(entry.used_tick) < self.min_unused_age {
                continue;
            }
            if self.refs.has_any_reference(bundle.as_str()) {
                entry.unused_since = None;
                continue;
            }
            if self.in_flight.contains_key(bundle) {
                continue;
            }

            let cacheable = self.lru.capacity() > 0
                && self.cache_policy.as_ref().map_or(true, |policy| policy(bundle.as_str()));
            if cacheable {
                let since = match entry.unused_since {
                    Some(since) => since,
                    None => {
                        entry.unused_since = Some(now);
                        self.lru.put(bundle);
                        now
                    }
                };
                if now.saturating_sub(since) < self.grace_ticks || self.lru.contains(bundle) {
                    continue;
                }
            }

            candidates.push(bundle.clone());
            if scan_cap.is_some_and(|cap| candidates.len() >= cap) {
                truncated = true;
                break;
            }
        }

        let started = Instant::now();
        let mut unloaded = 0;
        for bundle in &candidates {
            if limits.max_count.is_some_and(|max| unloaded >= max) {
                return false;
            }
            if limits
                .max_millis
                .is_some_and(|max| started.elapsed().as_secs_f64() * 1000.0 >= max)
            {
                return false;
            }
            if self.unload_bundle(bundle) {
                unloaded += 1;
            }
        }
        !truncated
    }

    /// Drop every reference and unload everything. Outstanding reads are
    /// completed invalid into `done`.
    pub fn release(&mut self, done: &mut Vec<LoadRequest>) {
        self.cancel_in_flight(done);
        self.refs.clear();
        let count = self.bundles.len();
        self.unload_unused_total();
        self.lru.clear();
        tracing::info!(root = %self.root, bundles = count, "released bundle root");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemorySource;
    use crate::request::RequestPool;

    const ROOT: &str = "bundles";

    fn chain_source() -> MemorySource {
        let source = MemorySource::new();
        source
            .add_asset(ROOT, "a.bundle", "shared/atlas.png", 1u32)
            .add_asset(ROOT, "b.bundle", "ui/common.prefab", 2u32)
            .add_asset(ROOT, "c.bundle", "ui/panel.prefab", 3u32)
            .add_dependency(ROOT, "c.bundle", "b.bundle")
            .add_dependency(ROOT, "b.bundle", "a.bundle");
        source
    }

    fn mount(source: &MemorySource, cache_capacity: usize) -> BundleLoader {
        BundleLoader::mount(
            ROOT,
            Arc::new(source.clone()),
            RootConfig::new().with_cache_capacity(cache_capacity),
            &AssetConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_dependencies_load_leaves_first() {
        let source = chain_source();
        let mut loader = mount(&source, 0);

        let handle = loader.load_object("c.bundle", "ui/panel.prefab", None);
        assert!(handle.is_valid());
        assert_eq!(
            source.open_log(),
            vec!["bundles/a.bundle", "bundles/b.bundle", "bundles/c.bundle"]
        );
        assert!(loader.has_any_reference("a.bundle"));
        assert!(loader.has_any_reference("b.bundle"));
        assert!(!loader.has_any_reference("c.bundle"));
        assert_eq!(loader.stats().opens, 3);
    }

    #[test]
    fn test_resident_short_circuit() {
        let source = chain_source();
        let mut loader = mount(&source, 0);
        loader.load_bundle("c.bundle");
        loader.load_bundle("c.bundle");
        assert_eq!(source.open_log().len(), 3);
    }

    #[test]
    fn test_total_unload_converges() {
        let source = chain_source();
        let mut loader = mount(&source, 0);
        let handle = loader.load_object("c.bundle", "ui/panel.prefab", None);
        let mut holder = RefList::new();
        holder.add(handle.asset_ref().unwrap().clone());

        // Every bundle is held, directly or through a dependent
        loader.unload_unused_total();
        assert_eq!(loader.resident_count(), 3);

        drop(holder);
        let passes = loader.unload_unused_total();
        assert_eq!(passes, 3);
        assert_eq!(loader.resident_count(), 0);
        assert!(!handle.asset_ref().unwrap().is_valid());
    }

    #[test]
    fn test_dependency_never_unloaded_before_dependent() {
        let source = chain_source();
        let mut loader = mount(&source, 0);
        let handle = loader.load_bundle("c.bundle");
        let mut holder = RefList::new();
        holder.add(handle.asset_ref().unwrap().clone());

        loader.set_tick(1000);
        assert!(loader.unload_unused(UnloadLimits::UNBOUNDED));
        assert_eq!(loader.resident_count(), 3);
        assert!(source.unload_log().is_empty());
    }

    #[test]
    fn test_min_age_and_grace_window() {
        let source = chain_source();
        let mut loader = mount(&source, 8);
        loader.load_bundle("a.bundle");

        // Touched recently: skipped
        loader.set_tick(10);
        assert!(loader.unload_unused(UnloadLimits::UNBOUNDED));
        assert!(loader.is_resident("a.bundle"));

        // Old enough: enters the grace window
        loader.set_tick(40);
        loader.unload_unused(UnloadLimits::UNBOUNDED);
        assert!(loader.is_resident("a.bundle"));
        assert_eq!(loader.cached_bundles(), vec!["a.bundle".to_string()]);

        // Past the grace window but still cached
        loader.set_tick(100);
        loader.unload_unused(UnloadLimits::UNBOUNDED);
        assert!(loader.is_resident("a.bundle"));

        // Re-referenced inside the window: survives and counts a cache hit
        let handle = loader.load_bundle("a.bundle");
        assert_eq!(loader.stats().cache_hits, 1);
        let mut holder = RefList::new();
        holder.add(handle.asset_ref().unwrap().clone());
        loader.set_tick(500);
        loader.unload_unused(UnloadLimits::UNBOUNDED);
        assert!(loader.is_resident("a.bundle"));
    }

    #[test]
    fn test_pushed_out_of_cache_unloads() {
        let source = MemorySource::new();
        for name in ["a.bundle", "b.bundle", "c.bundle"] {
            source.add_bundle(ROOT, name);
        }
        let mut loader = mount(&source, 2);
        for name in ["a.bundle", "b.bundle", "c.bundle"] {
            loader.load_bundle(name);
        }

        loader.set_tick(30);
        loader.unload_unused(UnloadLimits::UNBOUNDED);
        assert_eq!(loader.cached_bundles().len(), 2);

        loader.set_tick(60);
        loader.unload_unused(UnloadLimits::UNBOUNDED);
        assert_eq!(loader.resident_count(), 2);
    }

    #[test]
    fn test_never_cache_policy() {
        let source = MemorySource::new();
        source.add_bundle(ROOT, "scenes/level1.bundle");
        source.add_bundle(ROOT, "ui.bundle");
        let mut loader = BundleLoader::mount(
            ROOT,
            Arc::new(source.clone()),
            RootConfig::new()
                .with_cache_capacity(8)
                .with_cache_policy(|bundle| !bundle.starts_with("scenes/")),
            &AssetConfig::default(),
        )
        .unwrap();
        loader.load_bundle("scenes/level1.bundle");
        loader.load_bundle("ui.bundle");

        loader.set_tick(30);
        loader.unload_unused(UnloadLimits::UNBOUNDED);
        assert!(!loader.is_resident("scenes/level1.bundle"));
        assert!(loader.is_resident("ui.bundle"));
    }

    #[test]
    fn test_count_cap_defers_remainder() {
        let source = MemorySource::new();
        for i in 0..7 {
            source.add_bundle(ROOT, &format!("b{i}.bundle"));
        }
        let mut loader = mount(&source, 0);
        for i in 0..7 {
            loader.load_bundle(&format!("b{i}.bundle"));
        }
        loader.set_tick(30);
        let limits = UnloadLimits {
            max_count: Some(5),
            max_millis: None,
        };
        assert!(!loader.unload_unused(limits));
        assert_eq!(loader.resident_count(), 2);
        assert!(loader.unload_unused(limits));
        assert_eq!(loader.resident_count(), 0);
    }

    #[test]
    fn test_time_cap_defers_remainder() {
        let source = MemorySource::new();
        for i in 0..4 {
            source.add_bundle(ROOT, &format!("b{i}.bundle"));
        }
        source.set_unload_delay(std::time::Duration::from_millis(5));
        let mut loader = mount(&source, 0);
        for i in 0..4 {
            loader.load_bundle(&format!("b{i}.bundle"));
        }
        loader.set_tick(30);
        let limits = UnloadLimits {
            max_count: None,
            max_millis: Some(1.0),
        };

        // One slow unload exhausts the budget
        assert!(!loader.unload_unused(limits));
        assert_eq!(loader.resident_count(), 3);
        assert!(!loader.unload_unused(limits));
        assert_eq!(loader.resident_count(), 2);

        assert!(loader.unload_unused(UnloadLimits::UNBOUNDED));
        assert_eq!(loader.resident_count(), 0);
        assert_eq!(source.unload_log().len(), 4);
    }

    #[test]
    fn test_in_flight_bundle_is_exempt() {
        let source = MemorySource::new();
        source.add_asset(ROOT, "a.bundle", "tex/a.png", 1u32);
        source.set_async_latency(2);
        let mut loader = mount(&source, 0);
        let mut pool = RequestPool::new(4);
        let mut done = Vec::new();

        for _ in 0..2 {
            let request = pool.acquire();
            loader.load_object_async(request, "a.bundle", "tex/a.png", &mut done);
        }
        assert!(loader.is_in_flight("a.bundle"));
        assert!(loader.unload_unused_step(), "nothing unloadable while reading");
        assert!(loader.is_resident("a.bundle"));

        loader.poll_in_flight(&mut done);
        assert!(done.is_empty());
        loader.poll_in_flight(&mut done);
        assert_eq!(done.len(), 2);
        assert!(done.iter().all(LoadRequest::is_valid));
        assert!(!loader.is_in_flight("a.bundle"));
        assert_eq!(source.priority_log(), vec![PRIORITY_MAX - crate::request::PRIORITY_COMMON; 2]);

        done.clear();
        loader.unload_unused_total();
        assert!(!loader.is_resident("a.bundle"));
    }

    #[test]
    fn test_open_failure_is_invalid() {
        let source = chain_source();
        source.fail_open("bundles/a.bundle");
        let mut loader = mount(&source, 0);

        // A missing dependency does not block the dependent
        let handle = loader.load_object("c.bundle", "ui/panel.prefab", None);
        assert!(handle.is_valid());
        assert!(!loader.is_resident("a.bundle"));

        let missing = loader.load_bundle("a.bundle");
        assert!(!missing.is_valid());
        assert_eq!(loader.stats().open_failures, 2);
    }

    #[test]
    fn test_async_start_failure_completes_invalid() {
        let source = MemorySource::new();
        source.add_bundle(ROOT, "a.bundle");
        source.fail_open("bundles/a.bundle");
        let mut loader = mount(&source, 0);
        let mut pool = RequestPool::new(1);
        let mut done = Vec::new();
        loader.load_object_async(pool.acquire(), "a.bundle", "x.png", &mut done);
        assert_eq!(done.len(), 1);
        assert!(done[0].is_done());
        assert!(!done[0].is_valid());
    }

    #[test]
    fn test_cycle_is_cut() {
        let source = MemorySource::new();
        source
            .add_bundle(ROOT, "a.bundle")
            .add_bundle(ROOT, "b.bundle")
            .add_dependency(ROOT, "a.bundle", "b.bundle")
            .add_dependency(ROOT, "b.bundle", "a.bundle")
            .add_dependency(ROOT, "a.bundle", "a.bundle");
        let mut loader = mount(&source, 0);

        assert!(loader.load_bundle("a.bundle").is_valid());
        assert_eq!(loader.dependencies_of("a.bundle").as_slice(), ["b.bundle".to_string()]);
        assert_eq!(source.open_log(), vec!["bundles/b.bundle", "bundles/a.bundle"]);
        assert!(loader.has_any_reference("b.bundle"));
        assert!(!loader.has_any_reference("a.bundle"));

        loader.unload_unused_total();
        assert_eq!(loader.resident_count(), 0);
    }

    #[test]
    fn test_release_unloads_everything() {
        let source = chain_source();
        let mut loader = mount(&source, 4);
        let handle = loader.load_bundle("c.bundle");
        let mut holder = RefList::new();
        holder.add(handle.asset_ref().unwrap().clone());

        let mut done = Vec::new();
        loader.release(&mut done);
        assert_eq!(loader.resident_count(), 0);
        assert_eq!(source.unload_log().len(), 3);
        assert!(!handle.asset_ref().unwrap().is_valid());
    }
}

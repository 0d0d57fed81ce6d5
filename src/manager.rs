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

//! The asset manager: an explicitly owned context tying the loaders, the
//! scheduler, the reclaimers and the cache scopes together.
//!
//! Everything is driven from [`AssetManager::tick`] on one logical thread:
//! queued requests are drained under a per-tick budget, asynchronous reads are
//! polled, finished requests are finalised (reference registered, auto-attach,
//! callback) and each root's reclaimer runs its sweep.
//!
//! # Example
//!
//! ```
//! use bundle_manager::prelude::*;
//! use std::sync::Arc;
//!
//! let source = MemorySource::new();
//! source.add_asset("bundles", "ui.bundle", "ui/panel.prefab", String::from("panel"));
//!
//! let mut manager = AssetManager::new(Arc::new(source), AssetConfig::default()).unwrap();
//! manager.add_root("bundles", RootConfig::new().with_cache_capacity(16)).unwrap();
//!
//! let owner = RefList::shared();
//! let handle = manager.load("ui/panel", None, Some(&owner)).unwrap();
//! assert!(handle.is_valid());
//! assert_eq!(handle.downcast::<String>().as_deref().map(String::as_str), Some("panel"));
//! ```

use ahash::AHashMap;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archive::BundleSource;
use crate::backend::{Backends, LoadBackend, SceneHost};
use crate::bundle::{BundleLoader, UnloadLimits};
use crate::config::{AssetConfig, RootConfig};
use crate::editor::{EditorBackend, EditorResolver};
use crate::error::{AssetError, Result};
use crate::handle::{AssetHandle, AssetObject, ObjectId};
use crate::reclaim::Reclaimer;
use crate::reference::{AssetRef, RefList, SharedRefList};
use crate::request::{
    LoadRequest, RequestId, RequestPool, RequestState, PRIORITY_FAST, WEB_GROUP_KEY,
};
use crate::scheduler::{Scheduler, ServiceMode};
use crate::stats::{LoaderStats, ManagerStats};
use crate::web::{WebFetcher, WebLoader};

/// Owns every loader, queue and cache scope
pub struct AssetManager {
    config: AssetConfig,
    source: Arc<dyn BundleSource>,
    backends: Backends,
    reclaimers: Vec<Reclaimer>,
    scheduler: Scheduler,
    pool: RequestPool,
    /// Requests finished since the last finalisation
    done: Vec<LoadRequest>,
    /// Dequeued requests by (priority, sequence). A slot fills when its
    /// request finishes and is released once every earlier slot of the same
    /// priority has been released.
    dispatched: BTreeMap<(i32, u64), Option<LoadRequest>>,
    /// Finished requests kept because `auto_release` was off
    completed: AHashMap<RequestId, LoadRequest>,
    /// Object → the reference that keeps it alive
    object_refs: AHashMap<ObjectId, AssetRef>,
    /// Released on every scene transition
    weak: RefList,
    /// Released only explicitly or at shutdown
    strong: RefList,
    tick: u64,
    last_ref_purge: u64,
}

impl AssetManager {
    pub fn new(source: Arc<dyn BundleSource>, config: AssetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pool: RequestPool::new(config.request_pool_capacity),
            config,
            source,
            backends: Backends::new(),
            reclaimers: Vec::new(),
            scheduler: Scheduler::new(),
            done: Vec::new(),
            dispatched: BTreeMap::new(),
            completed: AHashMap::new(),
            object_refs: AHashMap::new(),
            weak: RefList::new(),
            strong: RefList::new(),
            tick: 0,
            last_ref_purge: 0,
        })
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    /// Current tick
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    // ========== Mounting ==========

    /// Mount a bundle root. Mounting the same root twice is rejected.
    pub fn add_root(&mut self, root: &str, root_config: RootConfig) -> Result<()> {
        if self.backends.roots.iter().any(|loader| loader.root() == root) {
            tracing::error!("bundle root already mounted: {root}");
            return Err(AssetError::DuplicateMount(root.to_owned()));
        }
        let mut loader = BundleLoader::mount(root, self.source.clone(), root_config, &self.config)?;
        loader.set_tick(self.tick);
        self.backends.roots.push(loader);
        self.reclaimers.push(Reclaimer::new(&self.config));
        self.backends.invalidate();
        Ok(())
    }

    /// Register a network loader group
    pub fn add_web_loader(
        &mut self,
        group: &str,
        fetcher: Arc<dyn WebFetcher>,
        cache_capacity: usize,
    ) -> Result<()> {
        if self.backends.web.contains_key(group) {
            tracing::error!("web loader group already registered: {group}");
            return Err(AssetError::DuplicateWebGroup(group.to_owned()));
        }
        let mut loader = WebLoader::new(group, fetcher, cache_capacity, self.config.grace_ticks);
        loader.set_tick(self.tick);
        self.backends.web.insert(group.to_owned(), loader);
        Ok(())
    }

    /// Route every path through an editor resolver (`None` restores bundle
    /// resolution)
    pub fn set_editor_resolver(&mut self, resolver: Option<Arc<dyn EditorResolver>>) {
        if let Some(mut previous) = self.backends.editor.take() {
            previous.clear();
        }
        self.backends.editor = resolver.map(EditorBackend::new);
        self.backends.invalidate();
    }

    /// Whether any mounted root serves `path`
    pub fn contains(&self, path: &str) -> bool {
        self.backends.contains(path)
    }

    // ========== Loading ==========

    /// Synchronous load. When `attach_to` is given the result's reference is
    /// added to it; otherwise the caller must hold the reference before the
    /// reclaimer's minimum age passes.
    pub fn load(
        &mut self,
        path: &str,
        ty: Option<TypeId>,
        attach_to: Option<&SharedRefList>,
    ) -> Result<AssetHandle> {
        let backend = self.backends.resolve(path);
        let handle = self.backends.load(&backend, ty)?;
        if handle.is_valid() {
            self.register(&handle);
            if let (Some(list), Some(reference)) = (attach_to, handle.asset_ref()) {
                list.lock().add(reference.clone());
            }
        }
        Ok(handle)
    }

    /// Synchronous load of a `T`
    pub fn load_typed<T: Any>(&mut self, path: &str) -> Result<AssetHandle> {
        self.load(path, Some(TypeId::of::<T>()), None)
    }

    /// Take a pooled request for `path`, to be filled in and passed to
    /// [`start_load`](Self::start_load)
    pub fn request(&mut self, path: &str) -> LoadRequest {
        let mut request = self.pool.acquire();
        request.path.push_str(path);
        request
    }

    /// Submit a request. Requests at or below the synchronous threshold are
    /// serviced before this returns; others are queued for the tick drain.
    ///
    /// Network requests must be asynchronous: a URL request at or below
    /// [`PRIORITY_FAST`] is rejected.
    pub fn start_load(&mut self, request: LoadRequest) -> Result<RequestId> {
        if request.is_url && request.priority <= PRIORITY_FAST {
            tracing::error!("web load does not support sync mode: {}", request.path);
            let path = request.path.clone();
            self.pool.release(request);
            return Err(AssetError::InvalidOperation(format!(
                "web load does not support sync mode: {path}"
            )));
        }

        Ok(self.submit(request))
    }

    fn submit(&mut self, request: LoadRequest) -> RequestId {
        let id = request.id();
        if ServiceMode::for_priority(request.priority) == ServiceMode::Immediate {
            self.service(request);
            self.finalize();
        } else {
            self.scheduler.push(request);
        }
        id
    }

    /// Submit a load with a completion callback. At or below
    /// [`PRIORITY_SYNC`](crate::request::PRIORITY_SYNC) the callback runs before
    /// this returns.
    pub fn load_async<F>(&mut self, path: &str, ty: Option<TypeId>, priority: i32, callback: F) -> RequestId
    where
        F: FnOnce(&LoadRequest) + Send + 'static,
    {
        let mut request = self.request(path);
        request.asset_type = ty;
        request.priority = priority;
        request.set_callback(callback);
        self.submit(request)
    }

    /// Queue a network load through loader `group`
    pub fn load_web<F>(
        &mut self,
        group: &str,
        url: &str,
        ty: Option<TypeId>,
        priority: i32,
        callback: F,
    ) -> Result<RequestId>
    where
        F: FnOnce(&LoadRequest) + Send + 'static,
    {
        let mut request = self.request(url);
        request.is_url = true;
        request.asset_type = ty;
        request.priority = priority;
        request.set_data(WEB_GROUP_KEY, group.to_owned());
        request.set_callback(callback);
        self.start_load(request)
    }

    /// A finished request kept because its `auto_release` was off
    pub fn take_completed(&mut self, id: RequestId) -> Option<LoadRequest> {
        self.completed.remove(&id)
    }

    /// Return a request taken with [`take_completed`](Self::take_completed)
    pub fn recycle(&mut self, request: LoadRequest) {
        self.pool.release(request);
    }

    /// Load a bundle by full path (root + bundle path). The caller manages
    /// its reference.
    pub fn load_bundle(&mut self, full_path: &str) -> AssetHandle {
        let Some((root, bundle)) = self.split_root(full_path) else {
            tracing::error!("no mounted root serves {full_path}");
            return AssetHandle::invalid();
        };
        let handle = self.backends.roots[root].load_bundle(&bundle);
        if handle.is_valid() {
            self.register(&handle);
        }
        handle
    }

    /// Load a bundle and hold it in the weak (scene) scope
    pub fn preload_bundle(&mut self, full_path: &str) -> AssetHandle {
        let handle = self.load_bundle(full_path);
        self.weak_cache(&handle);
        handle
    }

    /// Load a bundle and hold it in the strong (process) scope
    pub fn cache_bundle(&mut self, full_path: &str) -> AssetHandle {
        let handle = self.load_bundle(full_path);
        self.strong_cache(&handle);
        handle
    }

    fn split_root(&self, full_path: &str) -> Option<(usize, String)> {
        self.backends
            .roots
            .iter()
            .enumerate()
            .find_map(|(index, loader)| {
                let rest = full_path.strip_prefix(loader.root())?;
                if !rest.starts_with(['/', '\\']) && !loader.root().ends_with(['/', '\\']) {
                    return None;
                }
                Some((index, rest.trim_start_matches(['/', '\\']).to_owned()))
            })
    }

    // ========== Tick ==========

    /// Advance one tick: drain the queue, poll outstanding reads, finalise
    /// finished requests and run the reclaimers.
    pub fn tick(&mut self) {
        self.tick += 1;
        let now = self.tick;
        for loader in &mut self.backends.roots {
            loader.set_tick(now);
        }
        for loader in self.backends.web.values_mut() {
            loader.set_tick(now);
        }

        self.drain_queue();

        for loader in &mut self.backends.roots {
            loader.poll_in_flight(&mut self.done);
        }
        for loader in self.backends.web.values_mut() {
            loader.poll(&mut self.done);
        }
        self.finalize();

        for (loader, reclaimer) in self.backends.roots.iter_mut().zip(&mut self.reclaimers) {
            reclaimer.tick(now, loader);
        }
        for loader in self.backends.web.values_mut() {
            loader.unload_unused();
        }

        if now.saturating_sub(self.last_ref_purge) >= self.config.invalid_ref_sweep_ticks {
            self.last_ref_purge = now;
            self.purge_invalid_refs();
        }
    }

    fn drain_queue(&mut self) {
        if self.scheduler.is_empty() {
            return;
        }
        #[cfg(feature = "profiling")]
        let _span = info_span!("drain_requests", queued = self.scheduler.len()).entered();

        for request in self.scheduler.next_batch(self.config.max_loads_per_tick) {
            if let Some(seq) = request.sequence() {
                self.dispatched.insert((request.priority, seq), None);
            }
            self.service(request);
        }
    }

    /// Route one dequeued request to its backend
    fn service(&mut self, mut request: LoadRequest) {
        let backend = self.backends.resolve_request(&request);
        match ServiceMode::for_priority(request.priority) {
            ServiceMode::Async => self.backends.load_async(&backend, request, &mut self.done),
            ServiceMode::Sync | ServiceMode::Immediate => {
                request.set_state(RequestState::SyncServicing);
                let handle = match self.backends.load(&backend, request.asset_type) {
                    Ok(handle) => handle,
                    Err(e) => {
                        tracing::error!("load {} failed: {e}", request.path);
                        AssetHandle::invalid()
                    }
                };
                request.complete(handle);
                self.done.push(request);
            }
        }
    }

    /// Register, attach and call back every finished request whose
    /// predecessors in its priority band have already been finalised
    fn finalize(&mut self) {
        self.finalize_with(false);
    }

    fn finalize_with(&mut self, force: bool) {
        if self.done.is_empty() && !force {
            return;
        }
        let mut done = std::mem::take(&mut self.done);
        let mut ready = Vec::with_capacity(done.len());
        for request in done.drain(..) {
            let slot = match request.sequence() {
                Some(seq) => self.dispatched.get_mut(&(request.priority, seq)),
                None => None,
            };
            match slot {
                Some(slot) => *slot = Some(request),
                None => ready.push(request),
            }
        }
        self.done = done;
        self.release_dispatched(force, &mut ready);

        for request in ready {
            self.finish(request);
        }
    }

    /// Move filled slots that head their band into `ready`. `force` takes
    /// every filled slot and forgets the rest.
    fn release_dispatched(&mut self, force: bool, ready: &mut Vec<LoadRequest>) {
        if force {
            ready.extend(std::mem::take(&mut self.dispatched).into_values().flatten());
            return;
        }
        let mut blocked = None;
        let heads: Vec<(i32, u64)> = self
            .dispatched
            .iter()
            .filter_map(|(&key, slot)| {
                if blocked == Some(key.0) {
                    return None;
                }
                if slot.is_none() {
                    blocked = Some(key.0);
                    return None;
                }
                Some(key)
            })
            .collect();
        for key in heads {
            if let Some(Some(request)) = self.dispatched.remove(&key) {
                ready.push(request);
            }
        }
    }

    fn finish(&mut self, mut request: LoadRequest) {
        let handle = request.handle().clone();
        if handle.is_valid() {
            self.register(&handle);
            if let (Some(list), Some(reference)) = (&request.attach_to, handle.asset_ref()) {
                list.lock().add(reference.clone());
            }
        }
        if let Some(callback) = request.take_callback() {
            callback(&request);
        }
        if request.auto_release {
            self.pool.release(request);
        } else {
            self.completed.insert(request.id(), request);
        }
    }

    // ========== Cache scopes and reclamation ==========

    /// Hold `handle` until the next scene transition
    pub fn weak_cache(&mut self, handle: &AssetHandle) -> bool {
        handle
            .asset_ref()
            .is_some_and(|reference| self.weak.add(reference.clone()))
    }

    pub fn release_weak_cache(&mut self, handle: &AssetHandle) -> bool {
        let released = handle
            .asset_ref()
            .is_some_and(|reference| self.weak.remove(reference));
        if released {
            self.wake_reclaimers();
        }
        released
    }

    /// Hold `handle` until released or shutdown
    pub fn strong_cache(&mut self, handle: &AssetHandle) -> bool {
        handle
            .asset_ref()
            .is_some_and(|reference| self.strong.add(reference.clone()))
    }

    pub fn release_strong_cache(&mut self, handle: &AssetHandle) -> bool {
        let released = handle
            .asset_ref()
            .is_some_and(|reference| self.strong.remove(reference));
        if released {
            self.wake_reclaimers();
        }
        released
    }

    /// Resume idle reclaimers on the next tick
    fn wake_reclaimers(&mut self) {
        for reclaimer in &mut self.reclaimers {
            reclaimer.wake();
        }
    }

    /// Reclaim unreferenced resources now. `clear_all` unloads every
    /// unreferenced bundle; otherwise the cache policy is respected and the
    /// sweep runs twice per root to catch one level of chained dependencies.
    pub fn unload_unused(&mut self, clear_all: bool) {
        for loader in &mut self.backends.roots {
            if clear_all {
                loader.unload_unused_total();
            } else {
                for _ in 0..2 {
                    loader.unload_unused(UnloadLimits::UNBOUNDED);
                }
            }
        }
        for loader in self.backends.web.values_mut() {
            loader.unload_unused();
        }
    }

    /// Transition scenes: release the weak scope, switch the host to an
    /// empty scene, reclaim, then load the scene's bundle (weak-cached) and
    /// hand its scene path to the host.
    ///
    /// Returns the scene path handed to the host, or `None` on failure.
    pub fn load_scene(
        &mut self,
        path: &str,
        clear_unused: bool,
        host: &mut dyn SceneHost,
    ) -> Result<Option<String>> {
        let backend = self.backends.resolve(path);
        if let LoadBackend::Web { group } = &backend {
            return Err(AssetError::InvalidOperation(format!(
                "web group {group} cannot load scenes"
            )));
        }

        tracing::info!(tick = self.tick, "scene transition: {path}");
        self.weak.clear();
        self.wake_reclaimers();
        host.load_empty_scene();
        self.unload_unused(clear_unused);

        match self.backends.load_scene(&backend)? {
            Some((handle, scene)) => {
                if handle.is_valid() {
                    self.register(&handle);
                    self.weak_cache(&handle);
                }
                host.load_scene(&scene);
                Ok(Some(scene))
            }
            None => {
                tracing::error!("load scene failed: {path}");
                Ok(None)
            }
        }
    }

    // ========== Object references ==========

    fn register(&mut self, handle: &AssetHandle) {
        if let (Some(object), Some(reference)) = (handle.object(), handle.asset_ref()) {
            self.object_refs.insert(object.id(), reference.clone());
        }
    }

    /// Reference keeping `object` alive, if it is still managed
    pub fn asset_ref(&mut self, object: &AssetObject) -> Option<AssetRef> {
        let reference = self.object_refs.get(&object.id())?;
        if reference.is_valid() {
            return Some(reference.clone());
        }
        self.object_refs.remove(&object.id());
        None
    }

    /// Make `list` hold the reference behind `object`
    pub fn attach_ref(&mut self, list: &SharedRefList, object: &AssetObject) -> bool {
        match self.asset_ref(object) {
            Some(reference) => list.lock().add(reference),
            None => false,
        }
    }

    pub fn detach_ref(&mut self, list: &SharedRefList, object: &AssetObject) -> bool {
        match self.asset_ref(object) {
            Some(reference) => list.lock().remove(&reference),
            None => false,
        }
    }

    /// Swap which object `list` holds: attach `new` before releasing `old`
    /// so a shared bundle is never dropped in between.
    pub fn replace_ref(&mut self, list: &SharedRefList, new: &AssetObject, old: &AssetObject) {
        if new.id() == old.id() {
            return;
        }
        let new_ref = self.asset_ref(new);
        let old_ref = self.asset_ref(old);
        // Objects from the same bundle share one reference
        if new_ref.is_some() && new_ref == old_ref {
            return;
        }
        let mut list = list.lock();
        if let Some(reference) = new_ref {
            list.add(reference);
        }
        if let Some(reference) = old_ref {
            list.remove(&reference);
        }
    }

    /// Destroy unheld editor references, then drop index entries whose
    /// reference has been destroyed
    pub fn purge_invalid_refs(&mut self) -> usize {
        if let Some(editor) = self.backends.editor.as_mut() {
            editor.purge_unreferenced();
        }
        let before = self.object_refs.len();
        self.object_refs.retain(|_, reference| reference.is_valid());
        before - self.object_refs.len()
    }

    // ========== Inspection ==========

    pub fn queued_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Whether the bundle at `full_path` is resident
    pub fn is_bundle_resident(&self, full_path: &str) -> bool {
        self.split_root(full_path)
            .is_some_and(|(root, bundle)| self.backends.roots[root].is_resident(&bundle))
    }

    /// Whether any reference holds the bundle at `full_path`
    pub fn has_any_reference(&self, full_path: &str) -> bool {
        self.split_root(full_path)
            .is_some_and(|(root, bundle)| self.backends.roots[root].has_any_reference(&bundle))
    }

    /// Counters of the root mounted at `root`
    pub fn loader_stats(&self, root: &str) -> Option<&LoaderStats> {
        self.backends
            .roots
            .iter()
            .find(|loader| loader.root() == root)
            .map(BundleLoader::stats)
    }

    pub fn stats(&self) -> ManagerStats {
        let mut bundles = LoaderStats::default();
        for loader in &self.backends.roots {
            bundles.merge(loader.stats());
        }
        ManagerStats {
            tick: self.tick,
            queued: self.scheduler.len(),
            in_flight: self
                .backends
                .roots
                .iter()
                .map(BundleLoader::in_flight_count)
                .sum::<usize>()
                + self
                    .backends
                    .web
                    .values()
                    .map(WebLoader::waiting_count)
                    .sum::<usize>(),
            resident_bundles: self
                .backends
                .roots
                .iter()
                .map(BundleLoader::resident_count)
                .sum(),
            weak_refs: self.weak.len(),
            strong_refs: self.strong.len(),
            pooled_requests: self.pool.available(),
            bundles,
        }
    }

    // ========== Teardown ==========

    /// Complete every queued and outstanding request invalid, release both
    /// cache scopes, destroy every reference and unload every bundle. The
    /// manager is left with no roots or loaders mounted.
    pub fn shutdown(&mut self) {
        for mut request in self.scheduler.drain() {
            request.complete(AssetHandle::invalid());
            self.done.push(request);
        }
        self.weak.clear();
        self.strong.clear();
        for loader in &mut self.backends.roots {
            loader.release(&mut self.done);
        }
        for loader in self.backends.web.values_mut() {
            loader.release(&mut self.done);
        }
        if let Some(editor) = self.backends.editor.as_mut() {
            editor.clear();
        }
        self.finalize_with(true);

        let roots = self.backends.roots.len();
        self.backends.roots.clear();
        self.backends.web.clear();
        self.backends.editor = None;
        self.backends.invalidate();
        self.reclaimers.clear();
        self.object_refs.clear();
        self.completed.clear();
        if roots > 0 {
            tracing::info!(roots, "asset manager shut down");
        }
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemoryEditor, MemorySource};
    use crate::request::{PRIORITY_COMMON, PRIORITY_SYNC};
    use parking_lot::Mutex;

    fn manager() -> (AssetManager, MemorySource) {
        let source = MemorySource::new();
        source
            .add_asset("bundles", "ui.bundle", "ui/panel.prefab", 1u32)
            .add_asset("bundles", "ui.bundle", "ui/icon.png", 2u32);
        let mut manager = AssetManager::new(Arc::new(source.clone()), AssetConfig::default()).unwrap();
        manager.add_root("bundles", RootConfig::new()).unwrap();
        (manager, source)
    }

    #[test]
    fn test_duplicate_mount_rejected() {
        let (mut manager, _) = manager();
        let err = manager.add_root("bundles", RootConfig::new()).unwrap_err();
        assert!(matches!(err, AssetError::DuplicateMount(_)));
        assert!(manager.contains("ui/panel"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AssetConfig {
            max_loads_per_tick: 0,
            ..AssetConfig::default()
        };
        assert!(AssetManager::new(Arc::new(MemorySource::new()), config).is_err());
    }

    #[test]
    fn test_sync_priority_bypasses_queue() {
        let (mut manager, _) = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        manager.load_async("ui/icon", None, PRIORITY_COMMON, move |r| log.lock().push(r.path.clone()));

        let mut request = manager.request("ui/panel");
        request.priority = PRIORITY_SYNC;
        let log = seen.clone();
        request.set_callback(move |r| log.lock().push(r.path.clone()));
        manager.start_load(request).unwrap();

        assert_eq!(*seen.lock(), vec!["ui/panel".to_string()]);
        assert_eq!(manager.queued_count(), 1);
        manager.tick();
        assert_eq!(*seen.lock(), vec!["ui/panel".to_string(), "ui/icon".to_string()]);
    }

    #[test]
    fn test_object_ref_index() {
        let (mut manager, _) = manager();
        let handle = manager.load("ui/panel", None, None).unwrap();
        let object = handle.object().unwrap().clone();
        assert_eq!(manager.asset_ref(&object).as_ref(), handle.asset_ref());

        let owner = RefList::shared();
        assert!(manager.attach_ref(&owner, &object));
        assert!(manager.has_any_reference("bundles/ui.bundle"));
        assert!(manager.detach_ref(&owner, &object));
        assert!(!manager.has_any_reference("bundles/ui.bundle"));

        manager.unload_unused(true);
        assert!(manager.asset_ref(&object).is_none());
        assert!(!manager.attach_ref(&owner, &object));
    }

    #[test]
    fn test_replace_ref_keeps_shared_bundle() {
        let (mut manager, source) = manager();
        let owner = RefList::shared();
        let panel = manager.load("ui/panel", None, Some(&owner)).unwrap();
        let icon = manager.load("ui/icon", None, None).unwrap();

        // Same bundle: the swap must not let it drop to zero references
        manager.replace_ref(&owner, icon.object().unwrap(), panel.object().unwrap());
        manager.unload_unused(true);
        assert!(source.is_open("bundles/ui.bundle"));
        assert_eq!(owner.lock().len(), 1);
    }

    #[test]
    fn test_purge_invalid_refs() {
        let (mut manager, _) = manager();
        manager.load("ui/panel", None, None).unwrap();
        manager.load("ui/icon", None, None).unwrap();
        manager.unload_unused(true);
        assert_eq!(manager.purge_invalid_refs(), 2);
        assert_eq!(manager.purge_invalid_refs(), 0);
    }

    #[test]
    fn test_purge_destroys_unheld_editor_refs() {
        let (mut manager, _) = manager();
        let editor = MemoryEditor::new();
        editor
            .add("Assets/UI/Panel.prefab", 1u32)
            .add("Assets/UI/Icon.png", 2u32);
        manager.set_editor_resolver(Some(Arc::new(editor)));

        let owner = RefList::shared();
        let panel = manager.load("Assets/UI/Panel", None, Some(&owner)).unwrap();
        let icon = manager.load("Assets/UI/Icon", None, None).unwrap();
        assert_eq!(manager.purge_invalid_refs(), 1);
        assert!(manager.asset_ref(panel.object().unwrap()).is_some());
        assert!(manager.asset_ref(icon.object().unwrap()).is_none());
    }

    #[test]
    fn test_load_bundle_by_full_path() {
        let (mut manager, _) = manager();
        assert!(manager.load_bundle("bundles/ui.bundle").is_valid());
        assert!(!manager.load_bundle("elsewhere/ui.bundle").is_valid());
        assert!(!manager.load_bundle("bundles2/ui.bundle").is_valid());

        let preloaded = manager.preload_bundle("bundles/ui.bundle");
        assert!(manager.has_any_reference("bundles/ui.bundle"));
        assert!(manager.release_weak_cache(&preloaded));
        assert!(!manager.has_any_reference("bundles/ui.bundle"));
    }

    #[test]
    fn test_shutdown_unloads_everything() {
        let (mut manager, source) = manager();
        let handle = manager.cache_bundle("bundles/ui.bundle");
        manager.load_async("ui/panel", None, PRIORITY_COMMON, |_| {});
        manager.shutdown();

        assert!(!source.is_open("bundles/ui.bundle"));
        assert!(!handle.asset_ref().unwrap().is_valid());
        assert_eq!(manager.queued_count(), 0);
        assert!(!manager.contains("ui/panel"));
    }
}

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

//! In-memory collaborators for tests, benchmarks and tooling.
//!
//! [`MemorySource`] stands in for the host's packaging layer, [`MockFetcher`]
//! for the network and [`MemoryEditor`] for the editor database. Each is a
//! cheap clonable handle over shared state, so a test can keep one clone for
//! inspection after handing another to the manager.

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use crate::archive::{
    join_path, BundleArchive, BundleSource, DependencyManifest, Manifest, PendingRead, ReadPoll,
};
use crate::backend::SceneHost;
use crate::editor::EditorResolver;
use crate::error::{AssetError, Result};
use crate::handle::AssetObject;
use crate::path_map::BundleMap;
use crate::request::LoadRequest;
use crate::web::{FetchPoll, PendingFetch, WebFetcher};

#[derive(Default)]
struct RootContents {
    map: BundleMap,
    manifest: DependencyManifest,
}

#[derive(Clone, Default)]
struct ArchiveContents {
    objects: AHashMap<String, AssetObject>,
    scenes: Vec<String>,
}

#[derive(Default)]
struct SourceState {
    roots: AHashMap<String, RootContents>,
    /// Keyed by full path
    archives: AHashMap<String, ArchiveContents>,
    fail_open: AHashSet<String>,
    opened: Vec<String>,
    unloaded: Vec<String>,
    priorities: Vec<i32>,
    streamed: usize,
    async_latency: usize,
    unload_delay: Option<Duration>,
}

/// Bundle roots held entirely in memory
#[derive(Clone, Default)]
pub struct MemorySource {
    state: Arc<Mutex<SourceState>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an (initially empty) bundle under `root`
    pub fn add_bundle(&self, root: &str, bundle: &str) -> &Self {
        let mut state = self.state.lock();
        state.roots.entry(root.to_owned()).or_default();
        state.archives.entry(join_path(root, bundle)).or_default();
        self
    }

    /// Package `value` as `asset_path` (with extension) inside `bundle`
    pub fn add_asset<T: Any + Send + Sync>(
        &self,
        root: &str,
        bundle: &str,
        asset_path: &str,
        value: T,
    ) -> &Self {
        let mut state = self.state.lock();
        state
            .roots
            .entry(root.to_owned())
            .or_default()
            .map
            .insert(asset_path, bundle);
        state
            .archives
            .entry(join_path(root, bundle))
            .or_default()
            .objects
            .insert(asset_path.to_lowercase(), AssetObject::new(value));
        self
    }

    pub fn add_scene(&self, root: &str, bundle: &str, scene_path: &str) -> &Self {
        let mut state = self.state.lock();
        state.roots.entry(root.to_owned()).or_default();
        state
            .archives
            .entry(join_path(root, bundle))
            .or_default()
            .scenes
            .push(scene_path.to_owned());
        self
    }

    pub fn add_dependency(&self, root: &str, bundle: &str, dependency: &str) -> &Self {
        let mut state = self.state.lock();
        state
            .roots
            .entry(root.to_owned())
            .or_default()
            .manifest
            .bundles
            .entry(bundle.to_owned())
            .or_default()
            .push(dependency.to_owned());
        self
    }

    /// Make opening `full_path` fail
    pub fn fail_open(&self, full_path: &str) -> &Self {
        self.state.lock().fail_open.insert(full_path.to_owned());
        self
    }

    /// Async reads become ready on the `polls`-th poll (0 and 1 both mean
    /// the first poll)
    pub fn set_async_latency(&self, polls: usize) -> &Self {
        self.state.lock().async_latency = polls;
        self
    }

    /// Make every archive unload block for `delay`
    pub fn set_unload_delay(&self, delay: Duration) -> &Self {
        self.state.lock().unload_delay = Some(delay);
        self
    }

    /// Full paths in the order they were opened
    pub fn open_log(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    /// Full paths in the order they were unloaded
    pub fn unload_log(&self) -> Vec<String> {
        self.state.lock().unloaded.clone()
    }

    /// Archive-level priorities of every async read started
    pub fn priority_log(&self) -> Vec<i32> {
        self.state.lock().priorities.clone()
    }

    /// Archives opened through a byte transform
    pub fn stream_count(&self) -> usize {
        self.state.lock().streamed
    }

    /// Whether `full_path` is currently open
    pub fn is_open(&self, full_path: &str) -> bool {
        let state = self.state.lock();
        let opens = state.opened.iter().filter(|p| *p == full_path).count();
        let unloads = state.unloaded.iter().filter(|p| *p == full_path).count();
        opens > unloads
    }

    fn open_archive(&self, full_path: &str) -> Result<Box<dyn BundleArchive>> {
        let mut state = self.state.lock();
        if state.fail_open.contains(full_path) {
            return Err(AssetError::LoadFailure(format!("cannot open {full_path}")));
        }
        let contents = state
            .archives
            .get(full_path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(full_path.to_owned()))?;
        state.opened.push(full_path.to_owned());
        Ok(Box::new(MemoryArchive {
            full_path: full_path.to_owned(),
            contents,
            latency: state.async_latency,
            state: self.state.clone(),
        }))
    }
}

impl BundleSource for MemorySource {
    fn read_bundle_map(&self, root: &str) -> Result<BundleMap> {
        self.state
            .lock()
            .roots
            .get(root)
            .map(|contents| contents.map.clone())
            .ok_or_else(|| AssetError::NotFound(format!("bundle root {root}")))
    }

    fn load_manifest(&self, root: &str) -> Result<Arc<dyn Manifest>> {
        let state = self.state.lock();
        let contents = state
            .roots
            .get(root)
            .ok_or_else(|| AssetError::Manifest(format!("no manifest for {root}")))?;
        Ok(Arc::new(contents.manifest.clone()))
    }

    fn open(&self, full_path: &str) -> Result<Box<dyn BundleArchive>> {
        self.open_archive(full_path)
    }

    fn open_stream(
        &self,
        full_path: &str,
        mut stream: Box<dyn Read + Send>,
    ) -> Result<Box<dyn BundleArchive>> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        self.state.lock().streamed += 1;
        self.open_archive(full_path)
    }
}

struct MemoryArchive {
    full_path: String,
    contents: ArchiveContents,
    latency: usize,
    state: Arc<Mutex<SourceState>>,
}

impl BundleArchive for MemoryArchive {
    fn load_object(&mut self, name: &str, ty: Option<TypeId>) -> Option<AssetObject> {
        self.contents
            .objects
            .get(name)
            .filter(|object| object.is_type(ty))
            .cloned()
    }

    fn load_object_async(
        &mut self,
        name: &str,
        ty: Option<TypeId>,
        priority: i32,
    ) -> Option<Box<dyn PendingRead>> {
        self.state.lock().priorities.push(priority);
        Some(Box::new(MemoryRead {
            remaining: self.latency,
            result: Some(self.load_object(name, ty)),
        }))
    }

    fn contains(&self, name: &str) -> bool {
        self.contents.objects.contains_key(name)
    }

    fn scene_paths(&self) -> Vec<String> {
        self.contents.scenes.clone()
    }

    fn unload(&mut self) {
        let delay = {
            let mut state = self.state.lock();
            state.unloaded.push(self.full_path.clone());
            state.unload_delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }
}

struct MemoryRead {
    remaining: usize,
    result: Option<Option<AssetObject>>,
}

impl PendingRead for MemoryRead {
    fn poll(&mut self) -> ReadPoll {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return ReadPoll::Pending;
        }
        ReadPoll::Ready(self.result.take().flatten())
    }
}

#[derive(Clone)]
enum MockResponse {
    Object(AssetObject),
    Bytes(Vec<u8>),
    Error(String),
}

#[derive(Default)]
struct FetcherState {
    responses: AHashMap<String, MockResponse>,
    fetches: AHashMap<String, usize>,
    latency: usize,
}

/// Canned network responses keyed by URL; unknown URLs fail
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<FetcherState>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_object<T: Any + Send + Sync>(&self, url: &str, value: T) -> &Self {
        self.respond(url, MockResponse::Object(AssetObject::new(value)))
    }

    pub fn respond_bytes(&self, url: &str, bytes: Vec<u8>) -> &Self {
        self.respond(url, MockResponse::Bytes(bytes))
    }

    pub fn respond_error(&self, url: &str, message: &str) -> &Self {
        self.respond(url, MockResponse::Error(message.to_owned()))
    }

    fn respond(&self, url: &str, response: MockResponse) -> &Self {
        self.state.lock().responses.insert(url.to_owned(), response);
        self
    }

    /// Fetches become ready on the `polls`-th poll
    pub fn set_latency(&self, polls: usize) -> &Self {
        self.state.lock().latency = polls;
        self
    }

    /// Number of fetches issued for `url`
    pub fn fetch_count(&self, url: &str) -> usize {
        self.state.lock().fetches.get(url).copied().unwrap_or(0)
    }
}

impl WebFetcher for MockFetcher {
    fn fetch(&self, request: &LoadRequest) -> Box<dyn PendingFetch> {
        let mut state = self.state.lock();
        *state.fetches.entry(request.path.clone()).or_insert(0) += 1;
        let response = state
            .responses
            .get(&request.path)
            .cloned()
            .unwrap_or_else(|| MockResponse::Error(format!("404 {}", request.path)));
        Box::new(MockFetch {
            remaining: state.latency,
            response: Some(response),
        })
    }
}

struct MockFetch {
    remaining: usize,
    response: Option<MockResponse>,
}

impl PendingFetch for MockFetch {
    fn poll(&mut self) -> FetchPoll {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return FetchPoll::Pending;
        }
        match self.response.take() {
            Some(MockResponse::Object(object)) => FetchPoll::Decoded(object),
            Some(MockResponse::Bytes(bytes)) => FetchPoll::Raw(bytes),
            Some(MockResponse::Error(message)) => FetchPoll::Failed(message),
            None => FetchPoll::Failed("polled after completion".to_string()),
        }
    }
}

/// Editor database over a path → object table
#[derive(Clone, Default)]
pub struct MemoryEditor {
    objects: Arc<Mutex<AHashMap<String, AssetObject>>>,
}

impl MemoryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` at `path` (with extension)
    pub fn add<T: Any + Send + Sync>(&self, path: &str, value: T) -> &Self {
        self.objects
            .lock()
            .insert(path.to_owned(), AssetObject::new(value));
        self
    }
}

impl EditorResolver for MemoryEditor {
    fn load_at_path(&self, path: &str, ty: Option<TypeId>) -> Option<AssetObject> {
        let objects = self.objects.lock();
        let found = objects.get(path).or_else(|| {
            // Extension omitted: match on the path without it
            objects.iter().find_map(|(full, object)| {
                let stem = full.rsplit_once('.').map_or(full.as_str(), |(stem, _)| stem);
                (stem == path).then_some(object)
            })
        });
        found.filter(|object| object.is_type(ty)).cloned()
    }
}

/// What a [`RecordingSceneHost`] was asked to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SceneEvent {
    Empty,
    Loaded(String),
}

/// Scene host that records transitions instead of performing them
#[derive(Debug, Default)]
pub struct RecordingSceneHost {
    pub events: Vec<SceneEvent>,
}

impl SceneHost for RecordingSceneHost {
    fn load_empty_scene(&mut self) {
        self.events.push(SceneEvent::Empty);
    }

    fn load_scene(&mut self, scene_path: &str) {
        self.events.push(SceneEvent::Loaded(scene_path.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_roundtrip() {
        let source = MemorySource::new();
        source
            .add_asset("root", "ui.bundle", "UI/Panel.prefab", 5u32)
            .add_dependency("root", "ui.bundle", "atlas.bundle");

        let map = source.read_bundle_map("root").unwrap();
        assert_eq!(map.bundle_of("ui/panel"), Some("ui.bundle"));
        let manifest = source.load_manifest("root").unwrap();
        assert_eq!(manifest.direct_dependencies("ui.bundle"), vec!["atlas.bundle"]);

        let mut archive = source.open("root/ui.bundle").unwrap();
        let object = archive.load_object("ui/panel.prefab", Some(TypeId::of::<u32>()));
        assert_eq!(object.and_then(|o| o.downcast::<u32>()).as_deref(), Some(&5));
        assert!(archive.load_object("ui/panel.prefab", Some(TypeId::of::<String>())).is_none());
        assert!(source.is_open("root/ui.bundle"));
        archive.unload();
        assert!(!source.is_open("root/ui.bundle"));
    }

    #[test]
    fn test_unknown_root() {
        let source = MemorySource::new();
        assert!(matches!(
            source.read_bundle_map("nowhere"),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_latency() {
        let source = MemorySource::new();
        source.add_asset("root", "a.bundle", "a.png", 1u8).set_async_latency(3);
        let mut archive = source.open("root/a.bundle").unwrap();
        let mut read = archive.load_object_async("a.png", None, 800).unwrap();
        assert!(matches!(read.poll(), ReadPoll::Pending));
        assert!(matches!(read.poll(), ReadPoll::Pending));
        assert!(matches!(read.poll(), ReadPoll::Ready(Some(_))));
        assert_eq!(source.priority_log(), vec![800]);
    }
}

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

//! Interfaces to the host's packaging layer.
//!
//! The manager never reads archive bytes itself: a [`BundleSource`] opens
//! archives, serves the bundle map and dependency manifest of each root, and
//! each opened [`BundleArchive`] extracts objects by name.

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::error::{AssetError, Result};
use crate::handle::AssetObject;
use crate::path_map::BundleMap;

/// File name of the dependency manifest inside a bundle root
pub const MANIFEST_FILE: &str = "bundle_manifest.json";

/// Decides whether a zero-referenced bundle may linger in the eviction cache
pub type CachePolicy = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Opens a transformed byte stream for an archive path (decryption,
/// decompression, ...). The stream is handed to [`BundleSource::open_stream`].
pub type ByteTransform = Arc<dyn Fn(&str) -> std::io::Result<Box<dyn Read + Send>> + Send + Sync>;

/// Progress of an asynchronous object read
#[derive(Debug)]
pub enum ReadPoll {
    Pending,
    /// Finished; `None` when the object was missing or of the wrong type
    Ready(Option<AssetObject>),
}

/// An outstanding asynchronous read, polled once per tick
pub trait PendingRead: Send {
    fn poll(&mut self) -> ReadPoll;
}

/// An opened archive
pub trait BundleArchive: Send {
    /// Extract an object synchronously
    fn load_object(&mut self, name: &str, ty: Option<TypeId>) -> Option<AssetObject>;

    /// Start an asynchronous extraction. `priority` is archive-level:
    /// larger is more urgent. `None` when the read cannot be started.
    fn load_object_async(
        &mut self,
        name: &str,
        ty: Option<TypeId>,
        priority: i32,
    ) -> Option<Box<dyn PendingRead>>;

    fn contains(&self, name: &str) -> bool;

    /// Scene paths packaged in this archive (empty for asset bundles)
    fn scene_paths(&self) -> Vec<String>;

    /// Release the archive and every object extracted from it
    fn unload(&mut self);
}

/// Dependency graph of one bundle root
pub trait Manifest: Send + Sync {
    /// Bundles `bundle` directly depends on
    fn direct_dependencies(&self, bundle: &str) -> Vec<String>;
}

/// Host storage for one or more bundle roots
pub trait BundleSource: Send + Sync {
    fn read_bundle_map(&self, root: &str) -> Result<BundleMap>;

    fn load_manifest(&self, root: &str) -> Result<Arc<dyn Manifest>>;

    /// Open the archive at `full_path` (root joined with bundle path)
    fn open(&self, full_path: &str) -> Result<Box<dyn BundleArchive>>;

    /// Open an archive from an already-transformed byte stream
    fn open_stream(
        &self,
        full_path: &str,
        stream: Box<dyn Read + Send>,
    ) -> Result<Box<dyn BundleArchive>>;
}

/// JSON-backed [`Manifest`]: `{ "bundles": { "c.bundle": ["b.bundle"] } }`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    #[serde(default)]
    pub bundles: BTreeMap<String, Vec<String>>,
}

impl DependencyManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dependencies<I, S>(mut self, bundle: &str, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bundles
            .insert(bundle.to_owned(), deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| AssetError::Manifest(e.to_string()))
    }

    /// Load `bundle_manifest.json` from a root directory on disk
    pub fn load_file(root: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(root.as_ref().join(MANIFEST_FILE))?;
        Self::from_json_str(&text)
    }
}

impl Manifest for DependencyManifest {
    fn direct_dependencies(&self, bundle: &str) -> Vec<String> {
        self.bundles.get(bundle).cloned().unwrap_or_default()
    }
}

/// Join a root and a bundle path into the archive's full path
pub fn join_path(root: &str, bundle: &str) -> String {
    if root.is_empty() {
        bundle.to_owned()
    } else if root.ends_with('/') {
        format!("{root}{bundle}")
    } else {
        format!("{root}/{bundle}")
    }
}

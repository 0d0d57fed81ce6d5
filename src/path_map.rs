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

//! Path resolver: logical asset path → (bundle, in-bundle asset name).
//!
//! Populated once per root from the offline-built bundle map, one record per
//! line, `assetPath.ext:bundlePath`. Keys are lower-cased so lookups are
//! insensitive to the case of the host file system. Colons inside either
//! field are not supported.

use ahash::AHashMap;
use std::path::Path;

use crate::error::Result;

/// File name of the bundle map inside a bundle root
pub const BUNDLE_MAP_FILE: &str = "bundle_map.txt";

#[derive(Clone, Debug)]
struct AssetPathInfo {
    bundle: String,
    ext: String,
}

/// Where a logical path lives
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Bundle path relative to the root
    pub bundle: String,
    /// Normalized asset path with its extension
    pub asset_name: String,
}

/// Asset path → bundle lookup table
#[derive(Clone, Debug, Default)]
pub struct BundleMap {
    assets: AHashMap<String, AssetPathInfo>,
}

impl BundleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse bundle map text. Malformed lines are logged and skipped.
    pub fn parse(text: &str) -> Self {
        let mut map = Self::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 2 || fields[0].is_empty() || fields[1].is_empty() {
                tracing::error!(line = line_no + 1, "bundle map: malformed record {line:?}");
                continue;
            }
            map.insert(fields[0], fields[1]);
        }
        map
    }

    /// Load `bundle_map.txt` from a root directory on disk
    pub fn load_file(root: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(root.as_ref().join(BUNDLE_MAP_FILE))?;
        Ok(Self::parse(&text))
    }

    /// Register one asset (`asset_path` includes its extension)
    pub fn insert(&mut self, asset_path: &str, bundle: &str) {
        let full = asset_path.to_lowercase();
        let (name, ext) = match full.rfind('.') {
            // A dot inside a directory name is not an extension
            Some(dot) if !full[dot..].contains('/') => (&full[..dot], &full[dot..]),
            _ => (full.as_str(), ""),
        };
        self.assets.insert(
            name.to_owned(),
            AssetPathInfo {
                bundle: bundle.to_owned(),
                ext: ext.to_owned(),
            },
        );
    }

    pub fn resolve(&self, path: &str) -> Option<ResolvedPath> {
        let normalized = path.to_lowercase();
        let info = self.assets.get(&normalized)?;
        Some(ResolvedPath {
            bundle: info.bundle.clone(),
            asset_name: normalized + &info.ext,
        })
    }

    /// Bundle serving `path`, without loading anything
    pub fn bundle_of(&self, path: &str) -> Option<&str> {
        self.assets
            .get(&path.to_lowercase())
            .map(|info| info.bundle.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.assets.contains_key(&path.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

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

//! Load backends and path → backend resolution.
//!
//! Every path resolves to exactly one [`LoadBackend`]; an unresolvable path
//! resolves to [`LoadBackend::Invalid`], whose operations are no-ops that
//! yield invalid results. Resolutions are memoised until the next mount.

use ahash::AHashMap;
use std::any::TypeId;

use crate::bundle::BundleLoader;
use crate::editor::EditorBackend;
use crate::error::{AssetError, Result};
use crate::handle::{AssetHandle, LoadedBundle};
use crate::request::{LoadRequest, WEB_GROUP_KEY};
use crate::web::WebLoader;

/// Host scene layer driven by scene loads
pub trait SceneHost {
    /// Switch to an empty scene so the outgoing scene's objects are released
    fn load_empty_scene(&mut self);

    fn load_scene(&mut self, scene_path: &str);
}

/// Where a path is served from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadBackend {
    Bundle {
        /// Index of the owning root in mount order
        root: usize,
        bundle: String,
        asset_name: String,
    },
    Web {
        group: String,
    },
    Editor {
        path: String,
    },
    Invalid,
}

/// Every mounted loader plus the resolution memo
#[derive(Default)]
pub struct Backends {
    pub roots: Vec<BundleLoader>,
    pub web: AHashMap<String, WebLoader>,
    pub editor: Option<EditorBackend>,
    memo: AHashMap<String, LoadBackend>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget memoised resolutions (after a mount or an editor switch)
    pub fn invalidate(&mut self) {
        self.memo.clear();
    }

    /// Resolve a logical path. Roots are searched in mount order.
    pub fn resolve(&mut self, path: &str) -> LoadBackend {
        if let Some(backend) = self.memo.get(path) {
            return backend.clone();
        }
        let backend = if self.editor.is_some() {
            LoadBackend::Editor {
                path: path.to_owned(),
            }
        } else {
            self.roots
                .iter()
                .enumerate()
                .find_map(|(root, loader)| {
                    loader.resolve(path).map(|resolved| LoadBackend::Bundle {
                        root,
                        bundle: resolved.bundle,
                        asset_name: resolved.asset_name,
                    })
                })
                .unwrap_or_else(|| {
                    tracing::error!("path not valid: {path}");
                    LoadBackend::Invalid
                })
        };
        self.memo.insert(path.to_owned(), backend.clone());
        backend
    }

    /// Backend for a queued request: URL requests go to their group
    pub fn resolve_request(&mut self, request: &LoadRequest) -> LoadBackend {
        if request.is_url {
            return match request.data::<String>(WEB_GROUP_KEY) {
                Some(group) => LoadBackend::Web {
                    group: group.clone(),
                },
                None => LoadBackend::Invalid,
            };
        }
        self.resolve(&request.path)
    }

    /// Synchronous load. Network backends cannot load synchronously.
    pub fn load(&mut self, backend: &LoadBackend, ty: Option<TypeId>) -> Result<AssetHandle> {
        match backend {
            LoadBackend::Bundle {
                root,
                bundle,
                asset_name,
            } => Ok(self
                .roots
                .get_mut(*root)
                .map_or_else(AssetHandle::invalid, |loader| {
                    loader.load_object(bundle, asset_name, ty)
                })),
            LoadBackend::Web { group } => Err(AssetError::InvalidOperation(format!(
                "web group {group} does not support synchronous loads"
            ))),
            LoadBackend::Editor { path } => Ok(self
                .editor
                .as_mut()
                .map_or_else(AssetHandle::invalid, |editor| editor.load(path, ty))),
            LoadBackend::Invalid => Ok(AssetHandle::invalid()),
        }
    }

    /// Start an asynchronous load. Requests that finish immediately (or
    /// cannot start) are pushed to `done`.
    pub fn load_async(&mut self, backend: &LoadBackend, mut request: LoadRequest, done: &mut Vec<LoadRequest>) {
        match backend {
            LoadBackend::Bundle {
                root,
                bundle,
                asset_name,
            } => match self.roots.get_mut(*root) {
                Some(loader) => loader.load_object_async(request, bundle, asset_name, done),
                None => {
                    request.complete(AssetHandle::invalid());
                    done.push(request);
                }
            },
            LoadBackend::Web { group } => match self.web.get_mut(group) {
                Some(loader) => loader.load(request, done),
                None => {
                    tracing::error!("unknown web group {group}: {}", request.path);
                    request.complete(AssetHandle::invalid());
                    done.push(request);
                }
            },
            LoadBackend::Editor { path } => {
                let handle = self
                    .editor
                    .as_mut()
                    .map_or_else(AssetHandle::invalid, |editor| editor.load(path, request.asset_type));
                request.complete(handle);
                done.push(request);
            }
            LoadBackend::Invalid => {
                request.complete(AssetHandle::invalid());
                done.push(request);
            }
        }
    }

    /// Load the bundle packaging a scene. Returns the bundle handle and the
    /// scene path to hand to the host; the editor backend hands the path
    /// through unchanged with an invalid handle.
    pub fn load_scene(&mut self, backend: &LoadBackend) -> Result<Option<(AssetHandle, String)>> {
        match backend {
            LoadBackend::Bundle { root, bundle, .. } => {
                let Some(loader) = self.roots.get_mut(*root) else {
                    return Ok(None);
                };
                let handle = loader.load_bundle(bundle);
                let scene = handle
                    .downcast::<LoadedBundle>()
                    .and_then(|loaded| loaded.scene_paths.first().cloned());
                match scene {
                    Some(scene) => Ok(Some((handle, scene))),
                    None => {
                        tracing::error!("load scene failed: {bundle} has no scene");
                        Ok(None)
                    }
                }
            }
            LoadBackend::Web { group } => Err(AssetError::InvalidOperation(format!(
                "web group {group} cannot load scenes"
            ))),
            LoadBackend::Editor { path } => Ok(Some((AssetHandle::invalid(), path.clone()))),
            LoadBackend::Invalid => Ok(None),
        }
    }

    /// Which root serves `path`, if any
    pub fn contains(&self, path: &str) -> bool {
        self.roots.iter().any(|loader| loader.contains(path))
    }
}

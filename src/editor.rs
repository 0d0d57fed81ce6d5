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

//! Development-only backend resolving paths against a live project database.

use std::any::TypeId;
use std::sync::Arc;

use crate::handle::{AssetHandle, AssetObject, ObjectId};
use crate::reference::RefManager;

/// Name → object lookup against the host's project database
pub trait EditorResolver: Send + Sync {
    /// Load the object at `path`. The extension may be omitted.
    fn load_at_path(&self, path: &str, ty: Option<TypeId>) -> Option<AssetObject>;
}

/// Wraps a resolver with its own reference manager; objects are the unit of
/// reference counting.
pub struct EditorBackend {
    resolver: Arc<dyn EditorResolver>,
    refs: RefManager<ObjectId>,
}

impl EditorBackend {
    pub fn new(resolver: Arc<dyn EditorResolver>) -> Self {
        Self {
            resolver,
            refs: RefManager::new(),
        }
    }

    pub fn load(&mut self, path: &str, ty: Option<TypeId>) -> AssetHandle {
        match self.resolver.load_at_path(path, ty) {
            Some(object) => {
                let reference = self.refs.get_or_create(&object.id());
                AssetHandle::new(object, reference)
            }
            None => {
                tracing::warn!("editor load failed: {path}");
                AssetHandle::invalid()
            }
        }
    }

    pub fn has_any_reference(&self, id: ObjectId) -> bool {
        self.refs.has_any_reference(&id)
    }

    /// Destroy references to objects nothing holds any more
    pub fn purge_unreferenced(&mut self) -> usize {
        self.refs.destroy_unreferenced()
    }

    pub fn tracked(&self) -> usize {
        self.refs.len()
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryEditor;

    #[test]
    fn test_load_and_reference() {
        let editor = MemoryEditor::new();
        editor.add("Assets/UI/Panel.prefab", String::from("panel"));
        let mut backend = EditorBackend::new(Arc::new(editor));

        let handle = backend.load("Assets/UI/Panel", None);
        assert!(handle.is_valid());
        let again = backend.load("Assets/UI/Panel.prefab", None);
        assert_eq!(handle.asset_ref(), again.asset_ref());

        assert!(!backend.load("Assets/UI/Missing", None).is_valid());

        backend.clear();
        assert!(!handle.asset_ref().unwrap().is_valid());
    }

    #[test]
    fn test_purge_drops_unheld_objects() {
        let editor = MemoryEditor::new();
        editor.add("Assets/UI/Panel.prefab", String::from("panel"));
        editor.add("Assets/UI/Icon.png", String::from("icon"));
        let mut backend = EditorBackend::new(Arc::new(editor));

        let panel = backend.load("Assets/UI/Panel", None);
        let icon = backend.load("Assets/UI/Icon", None);
        let mut owner = crate::reference::RefList::new();
        owner.add(panel.asset_ref().unwrap().clone());

        assert_eq!(backend.purge_unreferenced(), 1);
        assert_eq!(backend.tracked(), 1);
        assert!(panel.asset_ref().unwrap().is_valid());
        assert!(!icon.asset_ref().unwrap().is_valid());
    }
}

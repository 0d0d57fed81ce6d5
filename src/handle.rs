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

//! Loaded objects and the handles returned by every load path.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::reference::AssetRef;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a loaded object
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get raw ID value
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// An object extracted from a bundle, fetched over the network, or
/// resolved by the editor database.
///
/// Cloning shares the payload; identity is the [`ObjectId`].
#[derive(Clone)]
pub struct AssetObject {
    id: ObjectId,
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl AssetObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            id: ObjectId::next(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check whether this object satisfies a requested type (`None` = any)
    pub fn is_type(&self, requested: Option<TypeId>) -> bool {
        requested.map_or(true, |ty| ty == self.type_id)
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for AssetObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetObject")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .finish()
    }
}

/// Payload of the handle returned by bundle-level loads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedBundle {
    pub path: String,
    pub scene_paths: Vec<String>,
}

/// Result of a load: an object plus the reference that keeps its backing
/// bundle (or the object itself) alive.
///
/// The invalid handle is the failure value of every load path; callers must
/// check [`AssetHandle::is_valid`] before use. Holding a handle does not by
/// itself keep anything resident: its reference has to be added to a
/// [`RefList`](crate::reference::RefList).
#[derive(Clone, Debug, Default)]
pub struct AssetHandle {
    object: Option<AssetObject>,
    reference: Option<AssetRef>,
}

impl AssetHandle {
    pub fn new(object: AssetObject, reference: AssetRef) -> Self {
        Self {
            object: Some(object),
            reference: Some(reference),
        }
    }

    pub const fn invalid() -> Self {
        Self {
            object: None,
            reference: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.object.is_some()
    }

    pub fn object(&self) -> Option<&AssetObject> {
        self.object.as_ref()
    }

    pub fn asset_ref(&self) -> Option<&AssetRef> {
        self.reference.as_ref()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.as_ref()?.downcast::<T>()
    }
}

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

//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use bundle_manager::prelude::*;
//! ```

pub use crate::backend::SceneHost;
pub use crate::config::{AssetConfig, RootConfig};
pub use crate::error::{AssetError, Result};
pub use crate::handle::{AssetHandle, AssetObject, LoadedBundle};
pub use crate::manager::AssetManager;
pub use crate::mock::{MemoryEditor, MemorySource, MockFetcher};
pub use crate::reference::{AssetRef, RefList, SharedRefList};
pub use crate::request::{
    LoadRequest, RequestId, PRIORITY_COMMON, PRIORITY_FAST, PRIORITY_SYNC, PRIORITY_URGENT,
};

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

//! Error types

use thiserror::Error;

/// Bundle manager error type
///
/// Per-request failures (an unresolved path, an archive that fails to open,
/// an object missing from its bundle) are not reported through this type:
/// they surface as an invalid [`AssetHandle`](crate::handle::AssetHandle) on
/// the normal completion path. `Err` is reserved for contract violations
/// reported at the call site and for setup failures.
#[derive(Error, Debug)]
pub enum AssetError {
    /// Path or bundle could not be resolved
    #[error("Not found: {0}")]
    NotFound(String),

    /// Underlying archive or decode failed
    #[error("Load failure: {0}")]
    LoadFailure(String),

    /// Caller contract violation (e.g. a sync-only priority for a network load)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Bundle root already mounted
    #[error("Bundle root already mounted: {0}")]
    DuplicateMount(String),

    /// Network loader group already registered
    #[error("Web loader group already registered: {0}")]
    DuplicateWebGroup(String),

    /// Dependency manifest could not be read
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Configuration rejected
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AssetError>;

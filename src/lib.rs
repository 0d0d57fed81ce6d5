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

//! Bundle Manager - asset residency for packaged content bundles
//!
//! Reference-counted bundle residency with dependency-ordered loading,
//! grace-period LRU eviction, a tick-budgeted load scheduler and a
//! time-sliced reclaimer.

pub mod archive;
pub mod backend;
pub mod bundle;
pub mod config;
pub mod editor;
pub mod error;
pub mod eviction;
pub mod handle;
pub mod manager;
pub mod mock;
pub mod path_map;
pub mod prelude;
pub mod reclaim;
pub mod reference;
pub mod request;
pub mod scheduler;
pub mod stats;
pub mod web;

pub use archive::*;
pub use backend::*;
pub use bundle::*;
pub use config::*;
pub use editor::*;
pub use error::*;
pub use eviction::*;
pub use handle::*;
pub use manager::*;
pub use path_map::*;
pub use reclaim::*;
pub use reference::*;
pub use request::*;
pub use scheduler::*;
pub use stats::*;
pub use web::*;

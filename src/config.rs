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

//! Tunables for the manager, its loaders and the reclaimer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::archive::{ByteTransform, CachePolicy};
use crate::error::{AssetError, Result};

/// Manager-wide tunables
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Queued requests serviced per tick
    pub max_loads_per_tick: usize,
    /// Bundles used more recently than this are skipped by the reclaimer
    pub min_unused_age_ticks: u64,
    /// Minimum zero-referenced age of a cacheable bundle before unload
    pub grace_ticks: u64,
    /// Bundles unloaded per reclaim tick
    pub max_unloads_per_tick: usize,
    /// Wall-clock cap of one reclaim tick
    pub max_unload_millis: f64,
    /// Idle ticks after a sweep that found nothing left to unload
    pub full_drain_idle_ticks: u64,
    /// Interval of the object → reference index purge
    pub invalid_ref_sweep_ticks: u64,
    /// Finished request shells kept for reuse
    pub request_pool_capacity: usize,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            max_loads_per_tick: 4,
            min_unused_age_ticks: 30,
            grace_ticks: 30,
            max_unloads_per_tick: 5,
            max_unload_millis: 3.0,
            full_drain_idle_ticks: 150,
            invalid_ref_sweep_ticks: 300,
            request_pool_capacity: 64,
        }
    }
}

impl AssetConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject settings that would stall the drain or reclaim loops
    pub fn validate(&self) -> Result<()> {
        if self.max_loads_per_tick == 0 {
            return Err(AssetError::Config(
                "max_loads_per_tick must be at least 1".to_string(),
            ));
        }
        if self.max_unloads_per_tick == 0 {
            return Err(AssetError::Config(
                "max_unloads_per_tick must be at least 1".to_string(),
            ));
        }
        if self.max_unload_millis.is_nan() || self.max_unload_millis <= 0.0 {
            return Err(AssetError::Config(format!(
                "max_unload_millis must be positive, got {}",
                self.max_unload_millis
            )));
        }
        Ok(())
    }
}

/// Per-root mount options
#[derive(Clone, Default)]
pub struct RootConfig {
    /// Eviction cache capacity (0 disables the grace window)
    pub cache_capacity: usize,
    /// Whether a zero-referenced bundle may linger in the eviction cache.
    /// `None` caches everything when `cache_capacity > 0`.
    pub cache_policy: Option<CachePolicy>,
    /// Byte-level transform applied before an archive is opened
    pub transform: Option<ByteTransform>,
}

impl RootConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_cache_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.cache_policy = Some(std::sync::Arc::new(policy));
        self
    }

    pub fn with_transform(mut self, transform: ByteTransform) -> Self {
        self.transform = Some(transform);
        self
    }
}

impl fmt::Debug for RootConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootConfig")
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_policy", &self.cache_policy.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

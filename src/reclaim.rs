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

//! Unused-resource reclaimer.
//!
//! Runs one root's policy-respecting sweep per tick. A sweep that drains
//! every candidate puts the root to sleep for an idle interval; a sweep cut
//! short by its budget resumes on the next tick.

use crate::bundle::{BundleLoader, UnloadLimits};
use crate::config::AssetConfig;

#[derive(Clone, Debug)]
pub struct Reclaimer {
    limits: UnloadLimits,
    idle_interval: u64,
    resume_at: u64,
}

impl Reclaimer {
    pub fn new(config: &AssetConfig) -> Self {
        Self {
            limits: UnloadLimits::from_config(config),
            idle_interval: config.full_drain_idle_ticks,
            resume_at: 0,
        }
    }

    /// Sweep `loader` if due. Returns `Some(fully_drained)` when a sweep ran.
    pub fn tick(&mut self, now: u64, loader: &mut BundleLoader) -> Option<bool> {
        if now < self.resume_at {
            return None;
        }
        let drained = loader.unload_unused(self.limits);
        if drained {
            self.resume_at = now.saturating_add(self.idle_interval);
        }
        Some(drained)
    }

    pub fn is_idle(&self, now: u64) -> bool {
        now < self.resume_at
    }

    /// Cancel the idle interval; the next tick sweeps
    pub fn wake(&mut self) {
        self.resume_at = 0;
    }
}

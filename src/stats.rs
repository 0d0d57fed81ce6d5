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

//! Load and cache instrumentation.

use serde::Serialize;

/// Per-loader counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
    /// Bundle-level load attempts, dependencies included
    pub loads: u64,
    /// Loads that found the bundle still sitting in the eviction cache
    pub cache_hits: u64,
    /// Archives physically opened
    pub opens: u64,
    pub open_failures: u64,
    /// Archives physically unloaded
    pub unloads: u64,
}

impl LoaderStats {
    /// Share of loads served from the grace window (0.0 when nothing loaded)
    pub fn cache_hit_ratio(&self) -> f32 {
        if self.loads == 0 {
            0.0
        } else {
            self.cache_hits as f32 / self.loads as f32
        }
    }

    pub fn merge(&mut self, other: &LoaderStats) {
        self.loads += other.loads;
        self.cache_hits += other.cache_hits;
        self.opens += other.opens;
        self.open_failures += other.open_failures;
        self.unloads += other.unloads;
    }
}

/// Manager-wide snapshot
#[derive(Clone, Debug, Default, Serialize)]
pub struct ManagerStats {
    pub tick: u64,
    pub queued: usize,
    pub in_flight: usize,
    pub resident_bundles: usize,
    pub weak_refs: usize,
    pub strong_refs: usize,
    pub pooled_requests: usize,
    pub bundles: LoaderStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let mut stats = LoaderStats::default();
        assert_eq!(stats.cache_hit_ratio(), 0.0);
        stats.loads = 4;
        stats.cache_hits = 1;
        assert!((stats.cache_hit_ratio() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merge() {
        let mut total = LoaderStats::default();
        let part = LoaderStats {
            loads: 3,
            cache_hits: 1,
            opens: 2,
            open_failures: 0,
            unloads: 1,
        };
        total.merge(&part);
        total.merge(&part);
        assert_eq!(total.loads, 6);
        assert_eq!(total.unloads, 2);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = ManagerStats::default();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"resident_bundles\":0"));
    }
}

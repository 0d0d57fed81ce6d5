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

//! Load requests, priorities and the request pool.

use ahash::AHashMap;
use std::any::{Any, TypeId};
use std::fmt;

use crate::handle::AssetHandle;
use crate::reference::SharedRefList;

/// At or below this a request is serviced inline, bypassing the queue
pub const PRIORITY_SYNC: i32 = 0;
/// Queued, but serviced synchronously when dequeued
pub const PRIORITY_URGENT: i32 = 50;
/// At or above this a dequeued request is serviced asynchronously
pub const PRIORITY_FAST: i32 = 100;
pub const PRIORITY_COMMON: i32 = 200;
pub const PRIORITY_MAX: i32 = 1000;

/// Side-channel key selecting the network loader group
pub const WEB_GROUP_KEY: &str = "web.group";
/// Side-channel key under which network loads attach the raw response bytes
pub const WEB_BYTES_KEY: &str = "web.bytes";
/// Side-channel key for a caller-built network request object
pub const WEB_REQUEST_KEY: &str = "web.request";

/// Identity of one queued load
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// Pooled or not yet submitted
    Idle,
    Queued,
    SyncServicing,
    AsyncServicing,
    Completed,
}

/// Completion callback; runs exactly once, after the result is recorded
pub type LoadCallback = Box<dyn FnOnce(&LoadRequest) + Send>;

/// A pending load and, once completed, its result
pub struct LoadRequest {
    id: RequestId,
    /// Logical asset path or URL
    pub path: String,
    pub is_url: bool,
    /// Requested object type (`None` accepts any)
    pub asset_type: Option<TypeId>,
    pub priority: i32,
    /// Reference list the result's reference is added to on success
    pub attach_to: Option<SharedRefList>,
    /// Return the request to the pool after completion. When false the
    /// completed request is kept for [`take_completed`](crate::manager::AssetManager::take_completed).
    pub auto_release: bool,
    callback: Option<LoadCallback>,
    data: AHashMap<String, Box<dyn Any + Send>>,
    handle: AssetHandle,
    state: RequestState,
    /// Arrival order within the queue; `None` for requests serviced inline
    sequence: Option<u64>,
}

impl LoadRequest {
    fn with_id(id: RequestId) -> Self {
        Self {
            id,
            path: String::new(),
            is_url: false,
            asset_type: None,
            priority: PRIORITY_COMMON,
            attach_to: None,
            auto_release: true,
            callback: None,
            data: AHashMap::new(),
            handle: AssetHandle::invalid(),
            state: RequestState::Idle,
            sequence: None,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == RequestState::Completed
    }

    /// Result handle (invalid until completed, or on failure)
    pub fn handle(&self) -> &AssetHandle {
        &self.handle
    }

    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnOnce(&LoadRequest) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn set_data<T: Any + Send>(&mut self, key: &str, value: T) {
        self.data.insert(key.to_owned(), Box::new(value));
    }

    pub fn data<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key)?.downcast_ref::<T>()
    }

    pub fn has_data(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn take_data<T: Any>(&mut self, key: &str) -> Option<T> {
        let boxed = self.data.remove(key)?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(boxed) => {
                self.data.insert(key.to_owned(), boxed);
                None
            }
        }
    }

    pub(crate) fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = Some(sequence);
    }

    pub(crate) fn set_state(&mut self, state: RequestState) {
        self.state = state;
    }

    /// Record the result. A request is fulfilled once; later calls are ignored.
    pub(crate) fn complete(&mut self, handle: AssetHandle) -> bool {
        if self.state == RequestState::Completed {
            return false;
        }
        self.handle = handle;
        self.state = RequestState::Completed;
        true
    }

    pub(crate) fn take_callback(&mut self) -> Option<LoadCallback> {
        self.callback.take()
    }

    fn reset(&mut self, id: RequestId) {
        self.id = id;
        self.path.clear();
        self.is_url = false;
        self.asset_type = None;
        self.priority = PRIORITY_COMMON;
        self.attach_to = None;
        self.auto_release = true;
        self.callback = None;
        self.data.clear();
        self.handle = AssetHandle::invalid();
        self.state = RequestState::Idle;
        self.sequence = None;
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("valid", &self.handle.is_valid())
            .finish()
    }
}

/// Recycles request shells so steady-state loading does not allocate
pub struct RequestPool {
    free: Vec<LoadRequest>,
    capacity: usize,
    next_id: u64,
}

impl RequestPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity.min(64)),
            capacity,
            next_id: 1,
        }
    }

    /// Take a reset request with a fresh id
    pub fn acquire(&mut self) -> LoadRequest {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        match self.free.pop() {
            Some(mut request) => {
                request.reset(id);
                request
            }
            None => LoadRequest::with_id(id),
        }
    }

    /// Return a finished request; dropped when the pool is full
    pub fn release(&mut self, mut request: LoadRequest) {
        if self.free.len() >= self.capacity {
            return;
        }
        // Drop held references and payloads now rather than on reuse
        request.attach_to = None;
        request.callback = None;
        request.data.clear();
        request.handle = AssetHandle::invalid();
        self.free.push(request);
    }

    /// Pooled shells ready for reuse
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuses_with_fresh_ids() {
        let mut pool = RequestPool::new(4);
        let mut first = pool.acquire();
        first.path.push_str("ui/panel");
        first.set_data("k", 7u32);
        let first_id = first.id();
        pool.release(first);
        assert_eq!(pool.available(), 1);

        let second = pool.acquire();
        assert_ne!(second.id(), first_id);
        assert!(second.path.is_empty());
        assert!(!second.has_data("k"));
        assert_eq!(second.state(), RequestState::Idle);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_pool_capacity() {
        let mut pool = RequestPool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_complete_once() {
        let mut pool = RequestPool::new(1);
        let mut request = pool.acquire();
        assert!(request.complete(AssetHandle::invalid()));
        assert!(!request.complete(AssetHandle::invalid()));
        assert!(request.is_done());
        assert!(!request.is_valid());
    }

    #[test]
    fn test_side_channel_data() {
        let mut pool = RequestPool::new(1);
        let mut request = pool.acquire();
        request.set_data(WEB_GROUP_KEY, String::from("cdn"));
        assert_eq!(request.data::<String>(WEB_GROUP_KEY).map(String::as_str), Some("cdn"));
        assert!(request.data::<u32>(WEB_GROUP_KEY).is_none());
        assert!(request.take_data::<u32>(WEB_GROUP_KEY).is_none());
        assert_eq!(request.take_data::<String>(WEB_GROUP_KEY).as_deref(), Some("cdn"));
        assert!(!request.has_data(WEB_GROUP_KEY));
    }
}

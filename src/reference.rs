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

//! Reference tokens, the per-loader reference manager and reference lists.
//!
//! A reference target (a resident bundle, a network object, an editor object)
//! owns one slot in a generational arena. An [`AssetRef`] is the slot key plus
//! a pointer to its arena, so destroying the target removes the slot and every
//! outstanding token to it reads as invalid in O(1).
//!
//! Liveness is counted in holds: a [`RefList`] takes one hold per distinct
//! reference it contains. A target is referenced iff its slot has at least one
//! hold.

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

new_key_type! {
    /// Generational key of a reference slot.
    pub struct RefKey;
}

#[derive(Debug, Default)]
struct RefSlot {
    holds: usize,
}

type RefArena = Arc<Mutex<SlotMap<RefKey, RefSlot>>>;

/// Capability token bound to one bundle or object
#[derive(Clone)]
pub struct AssetRef {
    key: RefKey,
    arena: RefArena,
}

impl AssetRef {
    pub fn key(&self) -> RefKey {
        self.key
    }

    /// False once the target has been destroyed
    pub fn is_valid(&self) -> bool {
        self.arena.lock().contains_key(self.key)
    }

    /// Number of holds currently taken on the target (0 when invalid)
    pub fn hold_count(&self) -> usize {
        self.arena.lock().get(self.key).map_or(0, |slot| slot.holds)
    }

    fn retain(&self) -> bool {
        match self.arena.lock().get_mut(self.key) {
            Some(slot) => {
                slot.holds += 1;
                true
            }
            None => false,
        }
    }

    fn release(&self) {
        if let Some(slot) = self.arena.lock().get_mut(self.key) {
            slot.holds = slot.holds.saturating_sub(1);
        }
    }
}

impl PartialEq for AssetRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && Arc::ptr_eq(&self.arena, &other.arena)
    }
}

impl Eq for AssetRef {}

impl Hash for AssetRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        (Arc::as_ptr(&self.arena) as usize).hash(state);
    }
}

impl fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRef")
            .field("key", &self.key)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Issues and tracks references for the targets of one loader
pub struct RefManager<K> {
    targets: AHashMap<K, AssetRef>,
    arena: RefArena,
}

impl<K: Eq + Hash + Clone> RefManager<K> {
    pub fn new() -> Self {
        Self {
            targets: AHashMap::new(),
            arena: Arc::new(Mutex::new(SlotMap::with_key())),
        }
    }

    /// Get the live reference for `target`, creating a slot on first use.
    ///
    /// Repeated calls for the same live target return equal references.
    pub fn get_or_create<Q>(&mut self, target: &Q) -> AssetRef
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(existing) = self.targets.get(target) {
            if existing.is_valid() {
                return existing.clone();
            }
        }

        let key = self.arena.lock().insert(RefSlot::default());
        let reference = AssetRef {
            key,
            arena: self.arena.clone(),
        };
        self.targets.insert(target.to_owned(), reference.clone());
        reference
    }

    pub fn has_any_reference<Q>(&self, target: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.targets
            .get(target)
            .is_some_and(|reference| reference.hold_count() > 0)
    }

    /// Invalidate every outstanding reference to `target`
    pub fn destroy<Q>(&mut self, target: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.targets.remove(target) {
            Some(reference) => self.arena.lock().remove(reference.key).is_some(),
            None => false,
        }
    }

    /// Destroy every target no list holds. Returns how many were destroyed.
    pub fn destroy_unreferenced(&mut self) -> usize {
        let mut arena = self.arena.lock();
        let before = self.targets.len();
        self.targets.retain(|_, reference| {
            let held = arena.get(reference.key).is_some_and(|slot| slot.holds > 0);
            if !held {
                arena.remove(reference.key);
            }
            held
        });
        before - self.targets.len()
    }

    /// Destroy every target
    pub fn clear(&mut self) {
        self.targets.clear();
        self.arena.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for RefManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Unordered set of references, each holding its target once.
///
/// Dropping the list releases every hold it took.
#[derive(Default)]
pub struct RefList {
    refs: AHashSet<AssetRef>,
}

/// Reference list owned by a consumer and shared with load requests
pub type SharedRefList = Arc<Mutex<RefList>>;

impl RefList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRefList {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Hold `reference`. Returns false if already held or if its target is gone.
    pub fn add(&mut self, reference: AssetRef) -> bool {
        if self.refs.contains(&reference) {
            return false;
        }
        if !reference.retain() {
            return false;
        }
        self.refs.insert(reference)
    }

    pub fn remove(&mut self, reference: &AssetRef) -> bool {
        match self.refs.take(reference) {
            Some(held) => {
                held.release();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, reference: &AssetRef) -> bool {
        self.refs.contains(reference)
    }

    pub fn clear(&mut self) {
        for reference in self.refs.drain() {
            reference.release();
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetRef> {
        self.refs.iter()
    }
}

impl Drop for RefList {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for RefList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefList").field("len", &self.refs.len()).finish()
    }
}

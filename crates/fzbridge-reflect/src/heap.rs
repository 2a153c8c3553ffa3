//! Handle-indexed object heap.
//!
//! Objects are keyed by identity (the payload allocation), so boxing the
//! same instance twice yields the same handle. Collection is driven from
//! outside: the caller reports which handles the sheet still references and
//! everything else may go.
//!
//! Allocation and collection coordinate through a generation watermark: a
//! cycle only considers handles allocated before it started, so an object
//! boxed while a cycle runs survives until at least the next one.

use std::collections::HashSet;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fzbridge_common::{Handle, ObjectHandle};
use parking_lot::RwLock;

use crate::native::{NativeValue, ObjectRef};

pub struct Heap {
    next: AtomicU64,
    objects: DashMap<Handle, ObjectRef>,
    identities: DashMap<usize, Handle>,
    /// Held shared while a handle is allocated, exclusively while a cycle
    /// reads its watermark.
    gate: RwLock<()>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            objects: DashMap::new(),
            identities: DashMap::new(),
            gate: RwLock::new(()),
        }
    }

    /// Handle for `object`, allocating one on first sight.
    pub fn get_handle(&self, object: &ObjectRef) -> Handle {
        let _alloc = self.gate.read();
        match self.identities.entry(object.identity()) {
            Entry::Occupied(mut slot) => {
                let existing = *slot.get();
                if self.objects.contains_key(&existing) {
                    return existing;
                }
                // collected between the two maps being updated
                let fresh = self.allocate(object);
                slot.insert(fresh);
                fresh
            }
            Entry::Vacant(slot) => {
                let fresh = self.allocate(object);
                slot.insert(fresh);
                fresh
            }
        }
    }

    fn allocate(&self, object: &ObjectRef) -> Handle {
        let handle = Handle(self.next.fetch_add(1, Ordering::Relaxed));
        self.objects.insert(handle, object.clone());
        handle
    }

    pub fn get_object(&self, handle: Handle) -> Option<ObjectRef> {
        self.objects.get(&handle).map(|entry| entry.value().clone())
    }

    /// Boxes any non-null value: objects keep their identity, everything else
    /// is wrapped in a fresh instance. `None` for `Null`.
    pub fn box_value(&self, value: NativeValue) -> Option<ObjectHandle> {
        let object = match value {
            NativeValue::Null => return None,
            NativeValue::Object(object) => object,
            other => ObjectRef::boxed(other),
        };
        let handle = self.get_handle(&object);
        Some(ObjectHandle::new(handle, object.class().name()))
    }

    /// Drops every handle absent from `active`; returns how many went.
    pub fn cycle_gc<S: BuildHasher>(&self, active: &HashSet<Handle, S>) -> usize {
        let watermark = {
            let _exclusive = self.gate.write();
            self.next.load(Ordering::Acquire)
        };

        let mut removed: Vec<(Handle, usize)> = Vec::new();
        self.objects.retain(|handle, object| {
            if handle.0 >= watermark || active.contains(handle) {
                true
            } else {
                removed.push((*handle, object.identity()));
                false
            }
        });
        for (handle, identity) in &removed {
            self.identities.remove_if(identity, |_, current| current == handle);
        }

        tracing::debug!(
            collected = removed.len(),
            live = self.objects.len(),
            "heap gc cycle"
        );
        removed.len()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

//! Shared handles to cached resources.

use std::fmt;
use std::sync::{Arc, RwLockReadGuard};

use crate::resource::{Complexity, LoadState, Resource, ResourceFlags, ResourceNode, Slot};

/// Strong reference to a resource instance.
///
/// Cloning a handle makes the caller a holder; a resource is only reclaimed
/// once every handle outside its container is gone.
pub struct Handle<T: Resource> {
    slot: Arc<Slot<T>>,
}

impl<T: Resource> Handle<T> {
    pub(crate) fn from_slot(slot: Arc<Slot<T>>) -> Self {
        Self { slot }
    }

    pub(crate) fn slot(&self) -> &Arc<Slot<T>> {
        &self.slot
    }

    pub(crate) fn node(&self) -> Arc<dyn ResourceNode> {
        self.slot.clone()
    }

    pub fn name(&self) -> &str {
        self.slot.name()
    }

    pub fn class_label(&self) -> &'static str {
        T::CLASS_LABEL
    }

    pub fn complexity(&self) -> Complexity {
        T::COMPLEXITY
    }

    pub fn flags(&self) -> ResourceFlags {
        self.slot.flags()
    }

    pub fn state(&self) -> LoadState {
        self.slot.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LoadState::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.state() == LoadState::Failed
    }

    /// Whether the resource is still settling.
    pub fn is_loading(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Read access to the payload.
    ///
    /// The payload may be partial while the resource is not `Ready`.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.slot.read()
    }

    /// Number of strong references, the container's own excluded.
    pub fn holder_count(&self) -> usize {
        Arc::strong_count(&self.slot).saturating_sub(1)
    }

    pub fn dependency_count(&self) -> usize {
        self.slot.dependency_count()
    }

    pub fn pending_dependencies(&self) -> usize {
        self.slot.pending_dependencies()
    }

    /// No live resource depends on this one.
    pub fn is_top_resource(&self) -> bool {
        self.slot.dependent_count() == 0
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: Resource> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Resource> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("class", &T::CLASS_LABEL)
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

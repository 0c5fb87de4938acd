//! Resource lifecycle.
//!
//! Every instantiated resource lives in a [`Slot`]: the payload of the concrete
//! type plus the bookkeeping every type shares (load state, outgoing
//! dependencies, dependents observing this resource).
//!
//! State machine:
//! ```text
//! Unloaded -> Loading -> WaitingDependencies -> Ready
//!                \               |
//!                 `-------------+----------> Failed
//! ```
//! `Ready` and `Failed` are terminal. Terminal transitions notify observers
//! synchronously, which is how a dependency chain unwinds without polling.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::LoadContext;
use crate::descriptor::PayloadSource;
use crate::error::DependencyError;

/// Load state of a resource instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    /// Instantiated, loading not started.
    #[default]
    Unloaded,
    /// Own payload is being acquired.
    Loading,
    /// Payload acquired, some dependencies are not settled yet.
    WaitingDependencies,
    /// Payload and every dependency are ready.
    Ready,
    /// Payload, a dependency or the validation hook failed.
    Failed,
}

impl LoadState {
    /// Whether the state can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Unloaded => "Unloaded",
            LoadState::Loading => "Loading",
            LoadState::WaitingDependencies => "WaitingDependencies",
            LoadState::Ready => "Ready",
            LoadState::Failed => "Failed",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum dependency depth a resource type can introduce.
///
/// Fixed per type. Reclamation visits containers from the most complex class
/// down, so a complex resource releases its dependencies before their own
/// containers are swept.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Complexity {
    /// Self-contained.
    None = 0,
    /// A single dependency.
    One = 1,
    /// A handful of dependencies.
    Few = 2,
    /// Many or nested dependencies.
    Complex = 3,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Complexity::None => "None",
            Complexity::One => "One",
            Complexity::Few => "Few",
            Complexity::Complex => "Complex",
        };
        f.write_str(s)
    }
}

bitflags::bitflags! {
    /// Per-instance flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        const NONE = 0;
        /// Built procedurally by a builder instead of from a store descriptor.
        const MANUAL = 1 << 31;
        // Remaining bits belong to the caller.
        const _ = !0;
    }
}

impl Default for ResourceFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// Capability contract every concrete resource type implements.
///
/// The core only drives this interface; it never looks at payload bytes.
/// `Default` builds the empty payload a fresh instance starts from.
pub trait Resource: Default + Send + Sync + 'static {
    /// Label used in diagnostics, e.g. `"Texture2D"`.
    const CLASS_LABEL: &'static str;
    /// Logical store the descriptors of this type come from. Empty when the
    /// type is only ever built procedurally.
    const STORE: &'static str;
    /// Dependency complexity of the type.
    const COMPLEXITY: Complexity;

    /// Payload of the container's fallback instance. Must not fail.
    fn fallback() -> Self {
        Self::default()
    }

    /// Starts acquiring the payload described by `source`.
    ///
    /// Dependencies are declared through [`LoadContext::add_dependency`].
    /// Returning `Ok` without calling [`LoadContext::defer`] means the payload
    /// is complete.
    fn begin_load(
        &mut self,
        source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()>;

    /// Validation hook run once every dependency is ready.
    fn on_dependencies_loaded(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Self-reported footprint in bytes.
    fn memory_occupied(&self) -> usize {
        std::mem::size_of_val(self)
    }
}

/// Type-erased view of a slot, used for dependency edges across types.
pub(crate) trait ResourceNode: Send + Sync {
    fn name(&self) -> &str;

    fn class_label(&self) -> &'static str;

    fn state(&self) -> LoadState;

    fn dependencies(&self) -> Vec<Arc<dyn ResourceNode>>;

    /// Records `observer` as a dependent. Returns the state observed at
    /// subscription time; observers only hear about terminal transitions
    /// that happen after it.
    fn subscribe(&self, observer: Weak<dyn ResourceNode>) -> LoadState;

    /// Called by a dependency when it reaches a terminal state.
    fn dependency_settled(&self, dependency: &str, success: bool);
}

fn node_addr(node: &dyn ResourceNode) -> *const () {
    node as *const dyn ResourceNode as *const ()
}

/// Whether `target` is reachable from `from` through dependency edges.
fn reaches(from: &Arc<dyn ResourceNode>, target: &dyn ResourceNode) -> bool {
    let target = node_addr(target);
    let mut visited = HashSet::new();
    let mut stack = vec![from.clone()];
    while let Some(node) = stack.pop() {
        let addr = node_addr(node.as_ref());
        if addr == target {
            return true;
        }
        if visited.insert(addr) {
            stack.extend(node.dependencies());
        }
    }
    false
}

#[derive(Default)]
struct Lifecycle {
    state: LoadState,
    dependencies: Vec<Arc<dyn ResourceNode>>,
    pending: usize,
    dependency_failed: bool,
    observers: Vec<Weak<dyn ResourceNode>>,
}

/// Storage for one resource instance.
pub(crate) struct Slot<T: Resource> {
    name: String,
    flags: ResourceFlags,
    verbose: Arc<AtomicBool>,
    payload: RwLock<T>,
    lifecycle: Mutex<Lifecycle>,
    this: Weak<Slot<T>>,
}

impl<T: Resource> Slot<T> {
    /// Creates an `Unloaded` instance with an empty payload.
    pub(crate) fn new(name: &str, flags: ResourceFlags, verbose: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new_cyclic(|this| Slot {
            name: name.to_string(),
            flags,
            verbose,
            payload: RwLock::new(T::default()),
            lifecycle: Mutex::new(Lifecycle::default()),
            this: this.clone(),
        })
    }

    /// Creates the fallback instance, `Ready` from the start.
    pub(crate) fn new_fallback(name: &str, verbose: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new_cyclic(|this| Slot {
            name: name.to_string(),
            flags: ResourceFlags::NONE,
            verbose,
            payload: RwLock::new(T::fallback()),
            lifecycle: Mutex::new(Lifecycle {
                state: LoadState::Ready,
                ..Lifecycle::default()
            }),
            this: this.clone(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn flags(&self) -> ResourceFlags {
        self.flags
    }

    fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        self.payload.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.payload.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.lifecycle().dependencies.len()
    }

    pub(crate) fn pending_dependencies(&self) -> usize {
        self.lifecycle().pending
    }

    /// Live resources that declared this one as a dependency.
    pub(crate) fn dependent_count(&self) -> usize {
        self.lifecycle()
            .observers
            .iter()
            .filter(|observer| observer.strong_count() > 0)
            .count()
    }

    /// `Unloaded -> Loading`.
    pub(crate) fn begin(&self) -> bool {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != LoadState::Unloaded {
            warn!(
                resource = %self.name,
                class = T::CLASS_LABEL,
                state = %lifecycle.state,
                "Resource cannot begin loading twice"
            );
            return false;
        }
        lifecycle.state = LoadState::Loading;
        drop(lifecycle);

        if self.is_verbose() {
            info!(resource = %self.name, class = T::CLASS_LABEL, "Beginning resource load");
        }
        true
    }

    /// Declares an outgoing edge to `dependency`.
    pub(crate) fn add_dependency(
        &self,
        dependency: Arc<dyn ResourceNode>,
    ) -> Result<(), DependencyError> {
        let state = self.state();
        if state != LoadState::Loading {
            return Err(DependencyError::NotLoading {
                resource: self.name.clone(),
                state,
            });
        }
        if node_addr(dependency.as_ref()) == node_addr(self) {
            return Err(DependencyError::SelfDependency {
                resource: self.name.clone(),
            });
        }
        if reaches(&dependency, self) {
            return Err(DependencyError::Cycle {
                resource: self.name.clone(),
                dependency: dependency.name().to_string(),
            });
        }

        let already_declared = self
            .lifecycle()
            .dependencies
            .iter()
            .any(|known| node_addr(known.as_ref()) == node_addr(dependency.as_ref()));
        if already_declared {
            return Ok(());
        }

        // Counted before subscribing: a settle landing between the two
        // decrements an edge that already exists.
        {
            let mut lifecycle = self.lifecycle();
            lifecycle.dependencies.push(dependency.clone());
            lifecycle.pending += 1;
        }
        let observer: Weak<dyn ResourceNode> = self.this.clone();
        let dependency_state = dependency.subscribe(observer);

        let mut lifecycle = self.lifecycle();
        match dependency_state {
            LoadState::Ready => lifecycle.pending = lifecycle.pending.saturating_sub(1),
            LoadState::Failed => {
                lifecycle.pending = lifecycle.pending.saturating_sub(1);
                lifecycle.dependency_failed = true;
            }
            _ => {}
        }
        let pending = lifecycle.pending;
        drop(lifecycle);

        if self.is_verbose() {
            info!(
                resource = %self.name,
                class = T::CLASS_LABEL,
                dependency = %dependency.name(),
                dependency_class = dependency.class_label(),
                pending,
                "Dependency added"
            );
        }

        if dependency_state == LoadState::Failed {
            self.fail(&format!("dependency '{}' has already failed", dependency.name()));
        }
        Ok(())
    }

    /// Reports the outcome of the own-payload acquisition.
    pub(crate) fn finish_payload(&self, outcome: anyhow::Result<()>) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != LoadState::Loading {
            debug!(
                resource = %self.name,
                class = T::CLASS_LABEL,
                state = %lifecycle.state,
                "Ignoring payload completion"
            );
            return;
        }
        match outcome {
            Ok(()) => {
                lifecycle.state = LoadState::WaitingDependencies;
                drop(lifecycle);
                self.check_dependencies();
            }
            Err(e) => {
                drop(lifecycle);
                self.fail(&format!("{e:#}"));
            }
        }
    }

    fn check_dependencies(&self) {
        let lifecycle = self.lifecycle();
        if lifecycle.state != LoadState::WaitingDependencies {
            return;
        }
        if lifecycle.dependency_failed {
            drop(lifecycle);
            self.fail("a dependency failed to load");
            return;
        }
        if lifecycle.pending > 0 {
            return;
        }
        drop(lifecycle);

        let validation = self.write().on_dependencies_loaded();
        match validation {
            Ok(()) => self.settle(LoadState::Ready),
            Err(e) => self.fail(&format!("validation failed: {e:#}")),
        }
    }

    fn fail(&self, reason: &str) {
        warn!(resource = %self.name, class = T::CLASS_LABEL, %reason, "Resource failed to load");
        self.settle(LoadState::Failed);
    }

    fn settle(&self, state: LoadState) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state.is_terminal() {
            return;
        }
        lifecycle.state = state;
        let observers = lifecycle.observers.clone();
        drop(lifecycle);

        if state == LoadState::Ready && self.is_verbose() {
            info!(resource = %self.name, class = T::CLASS_LABEL, "Resource loaded");
        }

        let success = state == LoadState::Ready;
        for observer in observers.iter().filter_map(Weak::upgrade) {
            observer.dependency_settled(&self.name, success);
        }
    }
}

impl<T: Resource> ResourceNode for Slot<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_label(&self) -> &'static str {
        T::CLASS_LABEL
    }

    fn state(&self) -> LoadState {
        self.lifecycle().state
    }

    fn dependencies(&self) -> Vec<Arc<dyn ResourceNode>> {
        self.lifecycle().dependencies.clone()
    }

    fn subscribe(&self, observer: Weak<dyn ResourceNode>) -> LoadState {
        let mut lifecycle = self.lifecycle();
        lifecycle.observers.retain(|known| known.strong_count() > 0);
        lifecycle.observers.push(observer);
        lifecycle.state
    }

    fn dependency_settled(&self, dependency: &str, success: bool) {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state.is_terminal() {
            return;
        }
        lifecycle.pending = lifecycle.pending.saturating_sub(1);
        if !success {
            lifecycle.dependency_failed = true;
        }
        let state = lifecycle.state;
        drop(lifecycle);

        if self.is_verbose() {
            info!(
                resource = %self.name,
                class = T::CLASS_LABEL,
                %dependency,
                success,
                "Dependency settled"
            );
        }

        if !success {
            self.fail(&format!("dependency '{dependency}' failed to load"));
        } else if state == LoadState::WaitingDependencies {
            self.check_dependencies();
        }
    }
}

impl<T: Resource> Drop for Slot<T> {
    fn drop(&mut self) {
        let state = self.lifecycle().state;
        if matches!(state, LoadState::Loading | LoadState::WaitingDependencies) {
            warn!(
                resource = %self.name,
                class = T::CLASS_LABEL,
                %state,
                "Resource destroyed while still loading"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Leaf, Node};

    fn slot<T: Resource>(name: &str) -> Arc<Slot<T>> {
        Slot::new(name, ResourceFlags::NONE, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn payload_without_dependencies_becomes_ready() {
        let leaf = slot::<Leaf>("leaf");
        assert_eq!(leaf.state(), LoadState::Unloaded);
        assert!(leaf.begin());
        assert_eq!(leaf.state(), LoadState::Loading);
        leaf.finish_payload(Ok(()));
        assert_eq!(leaf.state(), LoadState::Ready);
    }

    #[test]
    fn begin_twice_is_refused() {
        let leaf = slot::<Leaf>("leaf");
        assert!(leaf.begin());
        assert!(!leaf.begin());
    }

    #[test]
    fn waits_for_dependency_then_becomes_ready() {
        let dep = slot::<Leaf>("dep");
        let parent = slot::<Node>("parent");
        dep.begin();
        parent.begin();

        parent.add_dependency(dep.clone()).unwrap();
        assert_eq!(parent.pending_dependencies(), 1);
        parent.finish_payload(Ok(()));
        assert_eq!(parent.state(), LoadState::WaitingDependencies);

        dep.finish_payload(Ok(()));
        assert_eq!(dep.state(), LoadState::Ready);
        assert_eq!(parent.pending_dependencies(), 0);
        assert_eq!(parent.state(), LoadState::Ready);
        assert_eq!(dep.dependent_count(), 1);
        drop(parent);
        assert_eq!(dep.dependent_count(), 0);
    }

    #[test]
    fn dependency_ready_before_payload_finishes() {
        let dep = slot::<Leaf>("dep");
        let parent = slot::<Node>("parent");
        dep.begin();
        parent.begin();
        parent.add_dependency(dep.clone()).unwrap();

        dep.finish_payload(Ok(()));
        assert_eq!(parent.state(), LoadState::Loading);
        parent.finish_payload(Ok(()));
        assert_eq!(parent.state(), LoadState::Ready);
    }

    #[test]
    fn dependency_failure_propagates() {
        let dep = slot::<Leaf>("dep");
        let parent = slot::<Node>("parent");
        dep.begin();
        parent.begin();
        parent.add_dependency(dep.clone()).unwrap();
        parent.finish_payload(Ok(()));

        dep.finish_payload(Err(anyhow::anyhow!("corrupt")));
        assert_eq!(dep.state(), LoadState::Failed);
        assert_eq!(parent.state(), LoadState::Failed);
    }

    #[test]
    fn already_failed_dependency_fails_dependent() {
        let dep = slot::<Leaf>("dep");
        dep.begin();
        dep.finish_payload(Err(anyhow::anyhow!("missing file")));

        let parent = slot::<Node>("parent");
        parent.begin();
        parent.add_dependency(dep.clone()).unwrap();
        assert_eq!(parent.state(), LoadState::Failed);
        parent.finish_payload(Ok(()));
        assert_eq!(parent.state(), LoadState::Failed);
    }

    #[test]
    fn validation_hook_failure_fails_resource() {
        let node = slot::<Node>("node");
        node.write().reject_validation = true;
        node.begin();
        node.finish_payload(Ok(()));
        assert_eq!(node.state(), LoadState::Failed);
    }

    #[test]
    fn self_dependency_is_rejected() {
        let node = slot::<Node>("node");
        node.begin();
        let err = node.add_dependency(node.clone()).unwrap_err();
        assert_eq!(
            err,
            DependencyError::SelfDependency {
                resource: "node".to_string()
            }
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let a = slot::<Node>("a");
        let b = slot::<Node>("b");
        a.begin();
        b.begin();
        a.add_dependency(b.clone()).unwrap();
        let err = b.add_dependency(a.clone()).unwrap_err();
        assert!(matches!(err, DependencyError::Cycle { .. }));
    }

    #[test]
    fn dependency_after_payload_is_rejected() {
        let dep = slot::<Leaf>("dep");
        let node = slot::<Node>("node");
        node.begin();
        node.finish_payload(Ok(()));
        let err = node.add_dependency(dep).unwrap_err();
        assert!(matches!(
            err,
            DependencyError::NotLoading {
                state: LoadState::Ready,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_dependency_counts_once() {
        let dep = slot::<Leaf>("dep");
        let node = slot::<Node>("node");
        dep.begin();
        node.begin();
        node.add_dependency(dep.clone()).unwrap();
        node.add_dependency(dep.clone()).unwrap();
        assert_eq!(node.dependency_count(), 1);
        assert_eq!(node.pending_dependencies(), 1);
    }

    #[test]
    fn late_completion_is_ignored_after_failure() {
        let leaf = slot::<Leaf>("leaf");
        leaf.begin();
        leaf.finish_payload(Err(anyhow::anyhow!("boom")));
        leaf.finish_payload(Ok(()));
        assert_eq!(leaf.state(), LoadState::Failed);
    }

    /// Dependency that settles on another thread while being subscribed to.
    struct SettlesDuringSubscribe;

    impl ResourceNode for SettlesDuringSubscribe {
        fn name(&self) -> &str {
            "racer"
        }

        fn class_label(&self) -> &'static str {
            "Racer"
        }

        fn state(&self) -> LoadState {
            LoadState::Ready
        }

        fn dependencies(&self) -> Vec<Arc<dyn ResourceNode>> {
            Vec::new()
        }

        fn subscribe(&self, observer: Weak<dyn ResourceNode>) -> LoadState {
            if let Some(observer) = observer.upgrade() {
                observer.dependency_settled(self.name(), true);
            }
            LoadState::Loading
        }

        fn dependency_settled(&self, _dependency: &str, _success: bool) {}
    }

    #[test]
    fn settle_during_subscription_is_not_lost() {
        let parent = slot::<Node>("parent");
        parent.begin();
        parent.add_dependency(Arc::new(SettlesDuringSubscribe)).unwrap();
        assert_eq!(parent.pending_dependencies(), 0);
        parent.finish_payload(Ok(()));
        assert_eq!(parent.state(), LoadState::Ready);
    }

    #[test]
    fn caller_flag_bits_are_kept() {
        let flags = ResourceFlags::from_bits_retain(0b101) | ResourceFlags::MANUAL;
        assert!(flags.contains(ResourceFlags::MANUAL));
        assert_eq!(flags.bits() & 0b101, 0b101);
    }
}

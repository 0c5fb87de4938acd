//! Per-type resource containers.
//!
//! A container owns the registry of instantiated resources of one type and
//! the type's fallback instance. Lookups never block on loading and never
//! come back empty: unknown names resolve to the fallback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use crate::context::LoadContext;
use crate::descriptor::{Descriptor, PayloadSource, DEFAULT_NAME};
use crate::handle::Handle;
use crate::manager::ResourceManager;
use crate::resource::{Complexity, Resource, ResourceFlags, Slot};
use crate::stores::Stores;

/// Type-erased container operations the manager drives.
pub trait ResourceContainer: Send + Sync {
    fn label(&self) -> &'static str;

    fn store_name(&self) -> &'static str;

    fn complexity(&self) -> Complexity;

    /// Evicts every resource nobody holds. Returns how many were evicted.
    fn unload_unused(&self) -> usize;

    fn memory_occupied(&self) -> usize;

    fn unused_memory_occupied(&self) -> usize;

    /// Instantiated resources, the fallback excluded.
    fn resource_count(&self) -> usize;

    /// Instantiated resources that have not settled yet.
    fn loading_count(&self) -> usize;

    fn set_verbosity(&self, verbose: bool);

    /// Drops every registry entry. The fallback stays.
    fn clear(&self);
}

/// Registry and fallback of resources of type `T`.
pub struct Container<T: Resource> {
    stores: Arc<Stores>,
    manager: Weak<ResourceManager>,
    verbose: Arc<AtomicBool>,
    download_enabled: bool,
    registry: Mutex<HashMap<String, Handle<T>>>,
    default_resource: Handle<T>,
}

impl<T: Resource> Container<T> {
    pub(crate) fn new(
        manager: Weak<ResourceManager>,
        stores: Arc<Stores>,
        verbose: bool,
        download_enabled: bool,
    ) -> Self {
        if !T::STORE.is_empty() {
            stores.touch(T::STORE);
        }
        let verbose = Arc::new(AtomicBool::new(verbose));
        let default_resource = Handle::from_slot(Slot::new_fallback(DEFAULT_NAME, verbose.clone()));
        Self {
            stores,
            manager,
            verbose,
            download_enabled,
            registry: Mutex::new(HashMap::new()),
            default_resource,
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Handle<T>>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    /// Returns the resource called `name`, instantiating it from the store on
    /// first request. Unknown names give the fallback.
    pub fn get(&self, name: &str, warn_if_missing: bool) -> Handle<T> {
        if name.is_empty() || name == DEFAULT_NAME {
            return self.get_default();
        }

        let mut registry = self.registry();
        if let Some(existing) = registry.get(name) {
            return existing.clone();
        }
        let Some(descriptor) = self.stores.descriptor(T::STORE, name) else {
            drop(registry);
            if warn_if_missing {
                warn!(
                    resource = %name,
                    class = T::CLASS_LABEL,
                    store = T::STORE,
                    "Resource not found, using default"
                );
            }
            return self.get_default();
        };

        self.instantiate_declared(registry, name, &descriptor, ResourceFlags::NONE)
    }

    /// Registers `name` and loads it from its store declaration. Takes the
    /// registry guard so the entry is visible before the loader runs.
    fn instantiate_declared(
        &self,
        mut registry: MutexGuard<'_, HashMap<String, Handle<T>>>,
        name: &str,
        descriptor: &Descriptor,
        flags: ResourceFlags,
    ) -> Handle<T> {
        let slot = Slot::<T>::new(name, flags, self.verbose.clone());
        let handle = Handle::from_slot(slot.clone());
        registry.insert(name.to_string(), handle.clone());
        drop(registry);

        self.run_loader(&slot, Some(descriptor.source()), |payload, ctx| {
            payload.begin_load(descriptor.source(), ctx)
        });
        handle
    }

    /// Returns the resource called `name`. A name declared in the store loads
    /// from its declaration like [`Container::get`]; otherwise `builder` runs
    /// on first request and the instance is flagged [`ResourceFlags::MANUAL`].
    /// Later calls return the cached instance and never run their builder,
    /// whatever its outcome was the first time.
    pub fn get_or_create<F>(&self, name: &str, builder: F, flags: ResourceFlags) -> Handle<T>
    where
        F: FnOnce(&mut T, &mut LoadContext<'_, T>) -> anyhow::Result<()>,
    {
        if name.is_empty() {
            warn!(class = T::CLASS_LABEL, "Cannot create a resource without a name, using default");
            return self.get_default();
        }
        if name == DEFAULT_NAME {
            return self.get_default();
        }

        let mut registry = self.registry();
        if let Some(existing) = registry.get(name) {
            return existing.clone();
        }

        if let Some(descriptor) = self.stores.descriptor(T::STORE, name) {
            return self.instantiate_declared(registry, name, &descriptor, flags);
        }

        let slot = Slot::<T>::new(name, flags | ResourceFlags::MANUAL, self.verbose.clone());
        let handle = Handle::from_slot(slot.clone());
        registry.insert(name.to_string(), handle.clone());
        drop(registry);

        self.run_loader(&slot, None, builder);
        handle
    }

    /// Drives `Unloaded -> Loading` and runs `load` with the payload locked.
    fn run_loader<F>(&self, slot: &Arc<Slot<T>>, source: Option<&PayloadSource>, load: F)
    where
        F: FnOnce(&mut T, &mut LoadContext<'_, T>) -> anyhow::Result<()>,
    {
        if !slot.begin() {
            return;
        }
        if let Some(PayloadSource::RemoteRef(url)) = source {
            if !self.download_enabled {
                slot.finish_payload(Err(anyhow::anyhow!(
                    "downloads are disabled, cannot fetch {url}"
                )));
                return;
            }
        }
        let Some(manager) = self.manager.upgrade() else {
            slot.finish_payload(Err(anyhow::anyhow!("resource manager has been dropped")));
            return;
        };

        let mut ctx = LoadContext::new(&manager, slot);
        let outcome = {
            let mut payload = slot.write();
            load(&mut *payload, &mut ctx)
        };
        match outcome {
            Err(e) => slot.finish_payload(Err(e)),
            Ok(()) if !ctx.is_deferred() => slot.finish_payload(Ok(())),
            Ok(()) => debug!(resource = %slot.name(), class = T::CLASS_LABEL, "Payload load deferred"),
        }
    }

    /// The fallback instance. Always `Ready`.
    pub fn get_default(&self) -> Handle<T> {
        self.default_resource.clone()
    }

    /// A random declared resource, or the fallback when the store is empty.
    pub fn get_random(&self) -> Handle<T> {
        match self.stores.random_name(T::STORE) {
            Some(name) => self.get(&name, true),
            None => self.get_default(),
        }
    }

    /// Whether `name` is instantiated and `Ready`.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.registry().get(name).is_some_and(Handle::is_ready)
    }

    /// Whether `name` is instantiated or declared in the store.
    pub fn exists(&self, name: &str) -> bool {
        self.registry().contains_key(name) || self.stores.contains(T::STORE, name)
    }

    /// Names declared in the store.
    pub fn resource_names(&self) -> Vec<String> {
        self.stores.names(T::STORE)
    }

    /// Instantiates a declared resource ahead of use. Returns `false` when
    /// `name` is not declared or failed to load.
    pub fn preload(&self, name: &str) -> bool {
        if !self.stores.contains(T::STORE, name) {
            warn!(resource = %name, class = T::CLASS_LABEL, "Cannot preload undeclared resource");
            return false;
        }
        !self.get(name, false).is_failed()
    }

    /// Preloads each of `names`. Returns how many could not be preloaded.
    pub fn preload_many<S: AsRef<str>>(&self, names: &[S]) -> usize {
        names
            .iter()
            .filter(|name| !self.preload(name.as_ref()))
            .count()
    }

    /// Registry handles, cloned so payloads are read without the registry lock.
    fn snapshot(&self) -> Vec<Handle<T>> {
        self.registry().values().cloned().collect()
    }

    /// Terminal and referenced by `expected` strong handles only.
    fn is_unused(handle: &Handle<T>, expected: usize) -> bool {
        Arc::strong_count(handle.slot()) == expected && handle.state().is_terminal()
    }
}

impl<T: Resource> ResourceContainer for Container<T> {
    fn label(&self) -> &'static str {
        T::CLASS_LABEL
    }

    fn store_name(&self) -> &'static str {
        T::STORE
    }

    fn complexity(&self) -> Complexity {
        T::COMPLEXITY
    }

    fn unload_unused(&self) -> usize {
        let mut count = 0;
        // Releasing a batch can leave same-type dependencies unheld, so the
        // registry is swept until a sweep evicts nothing.
        loop {
            let evicted: Vec<Handle<T>> = {
                let mut registry = self.registry();
                let unused: Vec<String> = registry
                    .iter()
                    .filter(|(_, handle)| Self::is_unused(handle, 1))
                    .map(|(name, _)| name.clone())
                    .collect();
                unused
                    .iter()
                    .filter_map(|name| registry.remove(name))
                    .collect()
            };
            if evicted.is_empty() {
                break;
            }

            if self.is_verbose() {
                for handle in &evicted {
                    info!(resource = %handle.name(), class = T::CLASS_LABEL, "Resource unloaded");
                }
            }
            count += evicted.len();
            // Dropped outside the registry lock: releasing a resource may
            // release its dependencies in other containers.
            drop(evicted);
        }
        count
    }

    fn memory_occupied(&self) -> usize {
        let mut handles = self.snapshot();
        handles.push(self.get_default());
        handles
            .iter()
            .map(|handle| handle.read().memory_occupied())
            .sum()
    }

    fn unused_memory_occupied(&self) -> usize {
        // The snapshot clone is one extra holder.
        self.snapshot()
            .iter()
            .filter(|handle| Self::is_unused(handle, 2))
            .map(|handle| handle.read().memory_occupied())
            .sum()
    }

    fn resource_count(&self) -> usize {
        self.registry().len()
    }

    fn loading_count(&self) -> usize {
        self.registry().values().filter(|handle| handle.is_loading()).count()
    }

    fn set_verbosity(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    fn clear(&self) {
        let dropped: Vec<Handle<T>> = self.registry().drain().map(|(_, handle)| handle).collect();
        if !dropped.is_empty() {
            debug!(class = T::CLASS_LABEL, count = dropped.len(), "Container cleared");
        }
    }
}

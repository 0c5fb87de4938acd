//! Resource manager.
//!
//! Owns one container per resource type (created on first use), the merged
//! descriptor stores and the load-completion queue. Reclamation across
//! containers runs from the most complex class down and repeats until a full
//! pass evicts nothing, so chains of released dependencies are reclaimed in a
//! single call.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;
use tracing::{debug, info};

use crate::completion::{CompletionQueue, CompletionSender};
use crate::config::ResourceConfig;
use crate::container::{Container, ResourceContainer};
use crate::handle::Handle;
use crate::resource::Resource;
use crate::stores::Stores;

struct ContainerEntry {
    any: Arc<dyn Any + Send + Sync>,
    container: Arc<dyn ResourceContainer>,
}

/// Totals of one [`ResourceManager::unload_all_unused`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Reclamation {
    pub(crate) evicted: usize,
    /// Full passes, including the closing one that evicted nothing.
    pub(crate) passes: usize,
}

/// Entry point of the cache.
pub struct ResourceManager {
    config: ResourceConfig,
    stores: Arc<Stores>,
    containers: RwLock<HashMap<TypeId, ContainerEntry>>,
    completions: CompletionQueue,
    verbose: AtomicBool,
    this: Weak<ResourceManager>,
}

impl ResourceManager {
    pub fn new(config: ResourceConfig) -> Arc<Self> {
        let verbose = config.verbose;
        Arc::new_cyclic(|this| Self {
            config,
            stores: Arc::new(Stores::new()),
            containers: RwLock::new(HashMap::new()),
            completions: CompletionQueue::new(),
            verbose: AtomicBool::new(verbose),
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Merges the index documents found in the configured data directories.
    ///
    /// Returns whether at least one index was loaded.
    pub fn initialize(&self) -> bool {
        let found = self.stores.initialize(
            &self.config.data_directories,
            &self.config.index_prefix,
            self.is_verbose(),
        );
        info!(
            stores = self.stores.store_names().len(),
            resources = self.stores.registered_resources(),
            "Resource manager initialized"
        );
        found
    }

    /// Container of `T`, created on first use.
    pub fn container<T: Resource>(&self) -> Arc<Container<T>> {
        let id = TypeId::of::<T>();
        if let Some(entry) = self.read_containers().get(&id) {
            return downcast(entry);
        }

        let mut containers = self.containers.write().unwrap_or_else(PoisonError::into_inner);
        let entry = containers.entry(id).or_insert_with(|| {
            let container = Arc::new(Container::<T>::new(
                self.this.clone(),
                self.stores.clone(),
                self.is_verbose(),
                self.config.download_enabled,
            ));
            debug!(class = T::CLASS_LABEL, store = T::STORE, "Container created");
            ContainerEntry {
                any: container.clone(),
                container,
            }
        });
        downcast(entry)
    }

    /// Creates the container of `T` ahead of first use.
    pub fn register<T: Resource>(&self) -> Arc<Container<T>> {
        self.container::<T>()
    }

    /// Shorthand for `container::<T>().get(name, warn_if_missing)`.
    pub fn get<T: Resource>(&self, name: &str, warn_if_missing: bool) -> Handle<T> {
        self.container::<T>().get(name, warn_if_missing)
    }

    /// Merges a `{"Stores": {...}}` document at runtime.
    ///
    /// Returns whether any new descriptor was added.
    pub fn merge_external_stores(&self, document: &Value) -> bool {
        self.stores.merge_document(document, self.is_verbose()) > 0
    }

    /// Applies every queued load completion. Returns how many were applied.
    pub fn process_completions(&self) -> usize {
        self.completions.drain()
    }

    pub(crate) fn completion_sender(&self) -> CompletionSender {
        self.completions.sender()
    }

    /// Evicts unused resources of every container until nothing more can be
    /// evicted. Returns the total evicted.
    pub fn unload_all_unused(&self) -> usize {
        self.reclaim().evicted
    }

    pub(crate) fn reclaim(&self) -> Reclamation {
        let containers = self.sorted_containers();

        let mut outcome = Reclamation::default();
        loop {
            outcome.passes += 1;
            let evicted: usize = containers.iter().map(|c| c.unload_unused()).sum();
            outcome.evicted += evicted;
            if evicted == 0 {
                break;
            }
        }
        debug!(passes = outcome.passes, total = outcome.evicted, "Unused resources unloaded");
        outcome
    }

    pub fn memory_occupied(&self) -> usize {
        self.all_containers().iter().map(|c| c.memory_occupied()).sum()
    }

    pub fn unused_memory_occupied(&self) -> usize {
        self.all_containers()
            .iter()
            .map(|c| c.unused_memory_occupied())
            .sum()
    }

    /// Switches per-resource progress logging on every container.
    pub fn set_verbosity(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
        for container in self.all_containers() {
            container.set_verbosity(verbose);
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    /// Every container, most complex class first.
    pub fn containers(&self) -> Vec<Arc<dyn ResourceContainer>> {
        self.sorted_containers()
    }

    /// Resources of every container still settling.
    pub fn loading_count(&self) -> usize {
        self.all_containers().iter().map(|c| c.loading_count()).sum()
    }

    pub fn container_count(&self) -> usize {
        self.read_containers().len()
    }

    /// Drops every cached resource and settles outstanding completions.
    pub fn terminate(&self) {
        let containers = self.all_containers();
        let resources: usize = containers.iter().map(|c| c.resource_count()).sum();
        for container in &containers {
            container.clear();
        }
        let settled = self.process_completions();
        info!(
            containers = containers.len(),
            resources,
            settled,
            "Resource manager terminated"
        );
    }

    fn read_containers(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<TypeId, ContainerEntry>> {
        self.containers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn all_containers(&self) -> Vec<Arc<dyn ResourceContainer>> {
        self.read_containers()
            .values()
            .map(|entry| entry.container.clone())
            .collect()
    }

    /// Most complex class first, ties by label.
    fn sorted_containers(&self) -> Vec<Arc<dyn ResourceContainer>> {
        let mut containers = self.all_containers();
        containers.sort_by(|a, b| {
            b.complexity()
                .cmp(&a.complexity())
                .then_with(|| a.label().cmp(b.label()))
        });
        containers
    }
}

fn downcast<T: Resource>(entry: &ContainerEntry) -> Arc<Container<T>> {
    entry
        .any
        .clone()
        .downcast::<Container<T>>()
        .expect("container type mismatch")
}

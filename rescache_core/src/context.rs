//! Loading context handed to [`Resource::begin_load`] and builders.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::completion::CompletionSender;
use crate::error::DependencyError;
use crate::handle::Handle;
use crate::manager::ResourceManager;
use crate::resource::{Resource, Slot};

/// Access to the rest of the cache while a resource acquires its payload.
pub struct LoadContext<'a, T: Resource> {
    manager: &'a ResourceManager,
    slot: &'a Arc<Slot<T>>,
    deferred: bool,
}

impl<'a, T: Resource> LoadContext<'a, T> {
    pub(crate) fn new(manager: &'a ResourceManager, slot: &'a Arc<Slot<T>>) -> Self {
        Self {
            manager,
            slot,
            deferred: false,
        }
    }

    /// Name of the resource being loaded.
    pub fn name(&self) -> &str {
        self.slot.name()
    }

    pub fn manager(&self) -> &ResourceManager {
        self.manager
    }

    /// Looks up another resource. Unknown names resolve to the fallback.
    pub fn get<R: Resource>(&self, name: &str) -> Handle<R> {
        self.manager.container::<R>().get(name, true)
    }

    /// Declares that the resource being loaded needs `dependency`.
    ///
    /// The resource cannot become `Ready` before `dependency` is, and fails as
    /// soon as `dependency` fails.
    pub fn add_dependency<R: Resource>(
        &mut self,
        dependency: &Handle<R>,
    ) -> Result<(), DependencyError> {
        self.slot.add_dependency(dependency.node())
    }

    /// [`get`](Self::get) followed by [`add_dependency`](Self::add_dependency).
    pub fn depend_on<R: Resource>(&mut self, name: &str) -> Result<Handle<R>, DependencyError> {
        let dependency = self.get::<R>(name);
        self.add_dependency(&dependency)?;
        Ok(dependency)
    }

    /// Resolves a logical path against the configured data directories.
    pub fn resolve_path(&self, logical_path: &str) -> Option<PathBuf> {
        self.manager.config().resolve_path(logical_path)
    }

    /// Hands the payload acquisition to an external loader.
    ///
    /// The resource stays `Loading` after `begin_load` returns; the returned
    /// token reports the outcome later through the manager's completion queue.
    pub fn defer(&mut self) -> PendingLoad<T> {
        self.deferred = true;
        PendingLoad {
            name: self.slot.name().to_string(),
            slot: Some(self.slot.clone()),
            sender: self.manager.completion_sender(),
        }
    }

    pub(crate) fn is_deferred(&self) -> bool {
        self.deferred
    }
}

/// Outstanding payload acquisition, movable to a worker thread.
///
/// Completion is applied on the thread calling
/// [`ResourceManager::process_completions`]. Dropping the token without
/// completing it fails the resource.
pub struct PendingLoad<T: Resource> {
    name: String,
    slot: Option<Arc<Slot<T>>>,
    sender: CompletionSender,
}

impl<T: Resource> PendingLoad<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reports a successful acquisition; `finish` fills in the payload.
    pub fn complete<F>(mut self, finish: F)
    where
        F: FnOnce(&mut T) -> anyhow::Result<()> + Send + 'static,
    {
        if let Some(slot) = self.slot.take() {
            self.sender.send(Box::new(move || {
                let outcome = {
                    let mut payload = slot.write();
                    finish(&mut *payload)
                };
                slot.finish_payload(outcome);
            }));
        }
    }

    /// Reports a failed acquisition.
    pub fn fail(mut self, error: anyhow::Error) {
        if let Some(slot) = self.slot.take() {
            self.sender
                .send(Box::new(move || slot.finish_payload(Err(error))));
        }
    }
}

impl<T: Resource> Drop for PendingLoad<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            debug!(resource = %self.name, class = T::CLASS_LABEL, "Pending load abandoned");
            self.sender.send(Box::new(move || {
                slot.finish_payload(Err(anyhow::anyhow!("payload acquisition was abandoned")))
            }));
        }
    }
}

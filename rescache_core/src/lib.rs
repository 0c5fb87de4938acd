//! `rescache_core`
//!
//! Dependency-aware resource cache.
//!
//! Resources are declared by name in JSON stores, instantiated on first
//! request by a per-type [`Container`], wired to the resources they depend on
//! and reclaimed once nothing holds them.
//!
//! Design goals:
//! - Lookups never block and never come back empty.
//! - Failures stay local to one descriptor or one resource.
//! - Reclamation is complexity ordered and runs to a fixed point.
//! - No `unsafe`.

pub mod completion;
pub mod config;
pub mod container;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod manager;
pub mod resource;
pub mod stores;

#[cfg(test)]
mod testing;

pub use config::ResourceConfig;
pub use container::{Container, ResourceContainer};
pub use context::{LoadContext, PendingLoad};
pub use descriptor::{resource_name_from_path, Descriptor, PayloadSource, DEFAULT_NAME};
pub use error::{DependencyError, DescriptorError};
pub use handle::Handle;
pub use manager::ResourceManager;
pub use resource::{Complexity, LoadState, Resource, ResourceFlags};
pub use stores::Stores;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::ResourceConfig;
    pub use crate::container::{Container, ResourceContainer};
    pub use crate::context::{LoadContext, PendingLoad};
    pub use crate::descriptor::PayloadSource;
    pub use crate::handle::Handle;
    pub use crate::manager::ResourceManager;
    pub use crate::resource::{Complexity, LoadState, Resource, ResourceFlags};
}

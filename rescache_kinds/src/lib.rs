//! `rescache_kinds`
//!
//! Reference resource types for the cache. Payload decoding is kept to the
//! minimum each type needs to exercise the loading paths:
//! - self-contained payloads (images, sounds, geometry),
//! - single and multiple dependencies (textures, materials, meshes),
//! - deferred completion from a worker thread (file-backed sounds),
//! - stores declared at runtime (scenes).

pub mod geometry;
pub mod image;
pub mod material;
pub mod mesh;
pub mod payload;
pub mod scene;
pub mod sound;
pub mod texture;

use rescache_core::ResourceManager;

pub use geometry::Geometry;
pub use image::Image;
pub use material::Material;
pub use mesh::Mesh;
pub use scene::SceneDefinition;
pub use sound::Sound;
pub use texture::Texture;

/// Creates the container of every type in this crate.
pub fn register_all(manager: &ResourceManager) {
    manager.register::<Image>();
    manager.register::<Sound>();
    manager.register::<Texture>();
    manager.register::<Geometry>();
    manager.register::<Material>();
    manager.register::<Mesh>();
    manager.register::<SceneDefinition>();
}

/// Preloads every declared resource of every type in this crate. Returns
/// how many could not be preloaded.
pub fn preload_all(manager: &ResourceManager) -> usize {
    fn preload<T: rescache_core::Resource>(manager: &ResourceManager) -> usize {
        let container = manager.container::<T>();
        container.preload_many(&container.resource_names())
    }

    preload::<Image>(manager)
        + preload::<Sound>(manager)
        + preload::<Texture>(manager)
        + preload::<Geometry>(manager)
        + preload::<Material>(manager)
        + preload::<Mesh>(manager)
        + preload::<SceneDefinition>(manager)
}

//! Scene definitions.
//!
//! A scene lists the meshes and sounds it places and may carry its own
//! `Stores` section. Those declarations are merged into the manager before
//! the scene resolves its dependencies, which is how downloadable content
//! adds resources at runtime.
//!
//! ```json
//! {
//!   "Stores": { "Meshes": [ { "Name": "Statue", "Source": "DirectData", "Data": { "Geometry": "Rock" } } ] },
//!   "Meshes": ["Statue", "Tree"],
//!   "Sounds": ["Wind"]
//! }
//! ```

use rescache_core::prelude::*;
use rescache_core::stores::STORES_KEY;
use serde::Deserialize;
use tracing::info;

use crate::mesh::Mesh;
use crate::payload;
use crate::sound::Sound;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SceneData {
    #[serde(default)]
    meshes: Vec<String>,
    #[serde(default)]
    sounds: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SceneDefinition {
    pub meshes: Vec<Handle<Mesh>>,
    pub sounds: Vec<Handle<Sound>>,
    /// Whether the scene declared resources of its own.
    pub extended_stores: bool,
}

impl Resource for SceneDefinition {
    const CLASS_LABEL: &'static str = "SceneDefinition";
    const STORE: &'static str = "Scenes";
    const COMPLEXITY: Complexity = Complexity::Complex;

    fn begin_load(
        &mut self,
        source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let document = payload::read_json(source, ctx)?;
        if document.get(STORES_KEY).is_some() {
            self.extended_stores = ctx.manager().merge_external_stores(&document);
            if self.extended_stores {
                info!(scene = %ctx.name(), "Scene declared additional resources");
            }
        }

        let data: SceneData = serde_json::from_value(document)?;
        for name in &data.meshes {
            self.meshes.push(ctx.depend_on::<Mesh>(name)?);
        }
        for name in &data.sounds {
            self.sounds.push(ctx.depend_on::<Sound>(name)?);
        }
        Ok(())
    }
}

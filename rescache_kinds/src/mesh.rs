//! Renderable meshes.
//!
//! ```json
//! { "Geometry": "Rock", "Materials": ["Stone", "Moss"] }
//! ```

use anyhow::bail;
use rescache_core::prelude::*;
use serde::Deserialize;

use crate::geometry::Geometry;
use crate::material::Material;
use crate::payload;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MeshData {
    geometry: String,
    #[serde(default)]
    materials: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Mesh {
    pub geometry: Option<Handle<Geometry>>,
    pub materials: Vec<Handle<Material>>,
    pub triangles: usize,
}

impl Resource for Mesh {
    const CLASS_LABEL: &'static str = "Mesh";
    const STORE: &'static str = "Meshes";
    const COMPLEXITY: Complexity = Complexity::Complex;

    fn begin_load(
        &mut self,
        source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let data: MeshData = payload::read_typed(source, ctx)?;
        self.geometry = Some(ctx.depend_on::<Geometry>(&data.geometry)?);
        for name in &data.materials {
            self.materials.push(ctx.depend_on::<Material>(name)?);
        }
        Ok(())
    }

    fn on_dependencies_loaded(&mut self) -> anyhow::Result<()> {
        let Some(geometry) = &self.geometry else {
            bail!("mesh has no geometry");
        };
        let triangles = geometry.read().triangle_count();
        if triangles == 0 {
            bail!("geometry '{}' has no triangles", geometry.name());
        }
        self.triangles = triangles;
        Ok(())
    }
}

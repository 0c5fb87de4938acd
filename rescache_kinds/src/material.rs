//! Surface materials: a tint plus the textures sampled by the shader.
//!
//! ```json
//! { "Textures": ["Grass", "GrassNormal"], "Color": [1.0, 1.0, 1.0, 1.0] }
//! ```

use rescache_core::prelude::*;
use serde::Deserialize;

use crate::payload;
use crate::texture::Texture;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MaterialData {
    #[serde(default)]
    textures: Vec<String>,
    #[serde(default = "white")]
    color: [f32; 4],
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

#[derive(Debug, Default)]
pub struct Material {
    pub color: [f32; 4],
    pub textures: Vec<Handle<Texture>>,
}

impl Resource for Material {
    const CLASS_LABEL: &'static str = "Material";
    const STORE: &'static str = "Materials";
    const COMPLEXITY: Complexity = Complexity::Few;

    fn fallback() -> Self {
        Self {
            color: white(),
            textures: Vec::new(),
        }
    }

    fn begin_load(
        &mut self,
        source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let data: MaterialData = payload::read_typed(source, ctx)?;
        self.color = data.color;
        for name in &data.textures {
            self.textures.push(ctx.depend_on::<Texture>(name)?);
        }
        Ok(())
    }
}

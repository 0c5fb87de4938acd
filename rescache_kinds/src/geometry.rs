//! Vertex and index buffers.

use anyhow::bail;
use rescache_core::prelude::*;
use serde::Deserialize;

use crate::payload;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GeometryData {
    vertices: Vec<[f32; 3]>,
    #[serde(default)]
    indices: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    pub fn triangle_count(&self) -> usize {
        if self.indices.is_empty() {
            self.vertices.len() / 3
        } else {
            self.indices.len() / 3
        }
    }
}

impl Resource for Geometry {
    const CLASS_LABEL: &'static str = "Geometry";
    const STORE: &'static str = "Geometries";
    const COMPLEXITY: Complexity = Complexity::None;

    /// Unit triangle.
    fn fallback() -> Self {
        Self {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            indices: vec![0, 1, 2],
        }
    }

    fn begin_load(
        &mut self,
        source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let data: GeometryData = payload::read_typed(source, ctx)?;
        if let Some(bad) = data.indices.iter().find(|&&i| i as usize >= data.vertices.len()) {
            bail!("index {bad} out of range for {} vertices", data.vertices.len());
        }
        if data.indices.len() % 3 != 0 {
            bail!("index count {} is not a multiple of 3", data.indices.len());
        }
        self.vertices = data.vertices;
        self.indices = data.indices;
        Ok(())
    }

    fn memory_occupied(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.vertices.len() * std::mem::size_of::<[f32; 3]>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }
}

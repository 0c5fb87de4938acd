//! GPU textures built from images.
//!
//! A texture shares its name and descriptor with the [`Image`] it is
//! uploaded from, so it is declared once in the `Images` store.

use anyhow::{bail, Context};
use rescache_core::prelude::*;

use crate::image::Image;

#[derive(Debug, Default)]
pub struct Texture {
    pub image: Option<Handle<Image>>,
    pub width: u32,
    pub height: u32,
}

impl Resource for Texture {
    const CLASS_LABEL: &'static str = "Texture2D";
    const STORE: &'static str = "Images";
    const COMPLEXITY: Complexity = Complexity::One;

    fn fallback() -> Self {
        Self {
            image: None,
            width: 1,
            height: 1,
        }
    }

    fn begin_load(
        &mut self,
        _source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let name = ctx.name().to_string();
        let image = ctx
            .depend_on::<Image>(&name)
            .with_context(|| format!("texture '{name}' needs its image"))?;
        self.image = Some(image);
        Ok(())
    }

    /// Uploads once the image is decoded.
    fn on_dependencies_loaded(&mut self) -> anyhow::Result<()> {
        let Some(image) = &self.image else {
            bail!("texture has no image");
        };
        let (width, height) = {
            let pixels = image.read();
            (pixels.width, pixels.height)
        };
        if width == 0 || height == 0 {
            bail!("image '{}' is empty", image.name());
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn memory_occupied(&self) -> usize {
        std::mem::size_of::<Self>() + self.width as usize * self.height as usize * 4
    }
}

//! Decoded images.
//!
//! The pixel decoder is out of scope; an image payload describes its
//! dimensions and, optionally, raw RGBA pixels:
//!
//! ```json
//! { "Width": 64, "Height": 64, "Channels": 4 }
//! ```

use anyhow::bail;
use rescache_core::prelude::*;
use serde::Deserialize;

use crate::payload;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageData {
    width: u32,
    height: u32,
    #[serde(default = "default_channels")]
    channels: u8,
    #[serde(default)]
    pixels: Vec<u8>,
}

fn default_channels() -> u8 {
    4
}

/// CPU-side image.
#[derive(Debug, Default)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl Image {
    fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

impl Resource for Image {
    const CLASS_LABEL: &'static str = "Image";
    const STORE: &'static str = "Images";
    const COMPLEXITY: Complexity = Complexity::None;

    /// Single magenta pixel.
    fn fallback() -> Self {
        Self {
            width: 1,
            height: 1,
            channels: 4,
            pixels: vec![255, 0, 255, 255],
        }
    }

    fn begin_load(
        &mut self,
        source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        let data: ImageData = payload::read_typed(source, ctx)?;
        if data.width == 0 || data.height == 0 {
            bail!("image has no pixels ({}x{})", data.width, data.height);
        }
        if !matches!(data.channels, 1 | 3 | 4) {
            bail!("unsupported channel count {}", data.channels);
        }
        self.width = data.width;
        self.height = data.height;
        self.channels = data.channels;
        self.pixels = data.pixels;
        if !self.pixels.is_empty() && self.pixels.len() != self.byte_len() {
            bail!(
                "pixel data holds {} bytes, expected {}",
                self.pixels.len(),
                self.byte_len()
            );
        }
        Ok(())
    }

    fn memory_occupied(&self) -> usize {
        std::mem::size_of::<Self>() + self.pixels.len().max(self.byte_len())
    }
}

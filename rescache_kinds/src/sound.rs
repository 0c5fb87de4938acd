//! Sound samples.
//!
//! File-backed sounds are read on tokio's blocking pool when a runtime is
//! available and applied on the next
//! [`ResourceManager::process_completions`]. Inline sounds carry their
//! samples directly:
//!
//! ```json
//! { "SampleRate": 22050, "Samples": [0, 12, 250] }
//! ```

use anyhow::{bail, Context};
use bytes::Bytes;
use rescache_core::prelude::*;
use serde::Deserialize;
use tracing::debug;

use crate::payload;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InlineSound {
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,
    #[serde(default)]
    samples: Vec<u8>,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

/// Raw 8-bit PCM samples.
#[derive(Debug, Clone)]
pub struct Sound {
    pub sample_rate: u32,
    pub samples: Bytes,
}

impl Default for Sound {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            samples: Bytes::new(),
        }
    }
}

impl Sound {
    /// Length in seconds.
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

impl Resource for Sound {
    const CLASS_LABEL: &'static str = "Sound";
    const STORE: &'static str = "Sounds";
    const COMPLEXITY: Complexity = Complexity::None;

    fn begin_load(
        &mut self,
        source: &PayloadSource,
        ctx: &mut LoadContext<'_, Self>,
    ) -> anyhow::Result<()> {
        match source {
            PayloadSource::Inline(data) => {
                let inline: InlineSound =
                    serde_json::from_value(data.clone()).context("decoding inline sound")?;
                if inline.sample_rate == 0 {
                    bail!("sample rate must be positive");
                }
                self.sample_rate = inline.sample_rate;
                self.samples = Bytes::from(inline.samples);
                Ok(())
            }
            PayloadSource::FileRef(path) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let resolved = payload::resolve(path, ctx)?;
                    let pending = ctx.defer();
                    debug!(resource = %pending.name(), file = %resolved.display(), "Streaming sound");
                    runtime.spawn_blocking(move || match std::fs::read(&resolved) {
                        Ok(data) => pending.complete(move |sound: &mut Sound| {
                            sound.samples = Bytes::from(data);
                            Ok(())
                        }),
                        Err(e) => pending.fail(
                            anyhow::Error::new(e)
                                .context(format!("reading {}", resolved.display())),
                        ),
                    });
                    Ok(())
                }
                Err(_) => {
                    self.samples = payload::read_bytes(path, ctx)?;
                    Ok(())
                }
            },
            PayloadSource::RemoteRef(url) => bail!("no downloader available for {url}"),
        }
    }

    fn memory_occupied(&self) -> usize {
        std::mem::size_of::<Self>() + self.samples.len()
    }
}

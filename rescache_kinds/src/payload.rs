//! Helpers shared by the payload loaders.

use std::path::PathBuf;

use anyhow::{bail, Context};
use bytes::Bytes;
use rescache_core::{LoadContext, PayloadSource, Resource};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Resolves a file reference against the data directories.
pub fn resolve<T: Resource>(logical_path: &str, ctx: &LoadContext<'_, T>) -> anyhow::Result<PathBuf> {
    ctx.resolve_path(logical_path)
        .with_context(|| format!("file '{logical_path}' not found in any data directory"))
}

/// JSON document behind `source`: the inline object or a JSON file.
pub fn read_json<T: Resource>(source: &PayloadSource, ctx: &LoadContext<'_, T>) -> anyhow::Result<Value> {
    match source {
        PayloadSource::Inline(data) => Ok(data.clone()),
        PayloadSource::FileRef(path) => {
            let resolved = resolve(path, ctx)?;
            let text = std::fs::read_to_string(&resolved)
                .with_context(|| format!("reading {}", resolved.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", resolved.display()))
        }
        PayloadSource::RemoteRef(url) => bail!("no downloader available for {url}"),
    }
}

/// [`read_json`] deserialized into `D`.
pub fn read_typed<D: DeserializeOwned, T: Resource>(
    source: &PayloadSource,
    ctx: &LoadContext<'_, T>,
) -> anyhow::Result<D> {
    let value = read_json(source, ctx)?;
    serde_json::from_value(value).with_context(|| format!("decoding {} data", T::CLASS_LABEL))
}

/// Raw bytes of a file reference.
pub fn read_bytes<T: Resource>(logical_path: &str, ctx: &LoadContext<'_, T>) -> anyhow::Result<Bytes> {
    let resolved = resolve(logical_path, ctx)?;
    let data = std::fs::read(&resolved).with_context(|| format!("reading {}", resolved.display()))?;
    Ok(Bytes::from(data))
}

//! Shared fixtures for the integration tests in `tests/`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tracing::debug;

/// Installs a test-friendly subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Writes `document` as `<data_dir>/data-stores/<prefix>.<version>.json`.
pub fn write_index(
    data_dir: &Path,
    prefix: &str,
    version: u16,
    document: &Value,
) -> anyhow::Result<PathBuf> {
    let stores_dir = data_dir.join(rescache_core::config::DATA_STORES_DIR);
    std::fs::create_dir_all(&stores_dir)
        .with_context(|| format!("creating {}", stores_dir.display()))?;
    let path = stores_dir.join(format!("{prefix}.{version:03}.json"));
    std::fs::write(&path, serde_json::to_string_pretty(document)?)
        .with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), "Index fixture written");
    Ok(path)
}

/// Writes a payload file under `data_dir`.
pub fn write_payload(data_dir: &Path, logical_path: &str, contents: &[u8]) -> anyhow::Result<PathBuf> {
    let path = data_dir.join(logical_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "Payload fixture written");
    Ok(path)
}

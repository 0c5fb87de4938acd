//! Resource cache configuration.
//!
//! Loaded from JSON strings (file IO left to the app).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Subdirectory of every data directory holding the index documents.
pub const DATA_STORES_DIR: &str = "data-stores";

/// Settings read once when the manager is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Search path for index documents and file payloads, in priority order.
    #[serde(default = "default_data_directories")]
    pub data_directories: Vec<PathBuf>,
    /// Log per-resource progress.
    #[serde(default)]
    pub verbose: bool,
    /// Allow remote payloads. When off, remote resources fail on creation.
    #[serde(default = "default_download_enabled")]
    pub download_enabled: bool,
    /// Index documents are named `<prefix>.NNN.json`.
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
}

fn default_data_directories() -> Vec<PathBuf> {
    vec![PathBuf::from("data")]
}

fn default_download_enabled() -> bool {
    true
}

fn default_index_prefix() -> String {
    "ResourcesIndex".to_string()
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            data_directories: default_data_directories(),
            verbose: false,
            download_enabled: default_download_enabled(),
            index_prefix: default_index_prefix(),
        }
    }
}

impl ResourceConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Config searching only `dir`.
    pub fn with_data_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_directories: vec![dir.into()],
            ..Self::default()
        }
    }

    /// Directories scanned for index documents.
    pub fn index_directories(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.data_directories.iter().map(|dir| dir.join(DATA_STORES_DIR))
    }

    /// Maps a logical path to the first existing file under the data
    /// directories. Absolute paths are only checked for existence.
    pub fn resolve_path(&self, logical_path: &str) -> Option<PathBuf> {
        let logical = Path::new(logical_path);
        if logical.is_absolute() {
            return logical.is_file().then(|| logical.to_path_buf());
        }
        self.data_directories
            .iter()
            .map(|dir| dir.join(logical))
            .find(|candidate| candidate.is_file())
    }
}

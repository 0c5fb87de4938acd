//! Named stores of resource descriptors.
//!
//! Stores are filled from index documents of the form
//!
//! ```json
//! { "Stores": { "Images": [ { "Name": "Grass", "Data": "images/grass.png" } ] } }
//! ```
//!
//! and only ever grow. Within a store the first registration of a name wins;
//! later duplicates are logged and dropped.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context};
use rand::seq::IteratorRandom;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::descriptor::Descriptor;

/// Top-level key of an index document.
pub const STORES_KEY: &str = "Stores";

/// Descriptors of one store, by resource name.
pub type Store = HashMap<String, Arc<Descriptor>>;

/// Every store known to a manager.
#[derive(Default)]
pub struct Stores {
    stores: Mutex<HashMap<String, Store>>,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Store>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates `store_name` empty if nobody referenced it yet.
    pub fn touch(&self, store_name: &str) {
        self.lock().entry(store_name.to_string()).or_default();
    }

    /// Parses `entries` into `store_name`. Returns how many were added.
    ///
    /// Rejected entries are logged and skipped; the rest still merge.
    pub fn merge_store(&self, store_name: &str, entries: &[Value], verbose: bool) -> usize {
        let mut stores = self.lock();
        let store = stores.entry(store_name.to_string()).or_default();

        let mut added = 0;
        for (index, entry) in entries.iter().enumerate() {
            let descriptor = match Descriptor::parse(entry) {
                Ok(d) => d,
                Err(e) => {
                    warn!(store = %store_name, index, error = %e, "Skipping resource definition");
                    continue;
                }
            };
            if store.contains_key(descriptor.name()) {
                warn!(
                    store = %store_name,
                    resource = %descriptor.name(),
                    "Resource already declared, keeping the first definition"
                );
                continue;
            }
            if verbose {
                debug!(
                    store = %store_name,
                    resource = %descriptor.name(),
                    source = descriptor.source().source_type(),
                    "Resource declared"
                );
            }
            store.insert(descriptor.name().to_string(), Arc::new(descriptor));
            added += 1;
        }
        added
    }

    /// Merges every store of an index document. Returns how many
    /// descriptors were added across all stores.
    pub fn merge_document(&self, document: &Value, verbose: bool) -> usize {
        let Some(stores) = document.get(STORES_KEY).and_then(Value::as_object) else {
            warn!("Index document has no '{STORES_KEY}' object");
            return 0;
        };

        let mut added = 0;
        for (store_name, entries) in stores {
            let Some(entries) = entries.as_array() else {
                warn!(store = %store_name, "Store must be an array of resource definitions");
                continue;
            };
            let count = self.merge_store(store_name, entries, verbose);
            if verbose {
                info!(store = %store_name, added = count, "Store merged");
            }
            added += count;
        }
        added
    }

    /// Reads and merges one index document from disk.
    pub fn load_index_file(&self, path: &Path, verbose: bool) -> anyhow::Result<usize> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading index {}", path.display()))?;
        let document: Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing index {}", path.display()))?;
        if !document.get(STORES_KEY).is_some_and(Value::is_object) {
            bail!("index {} has no '{STORES_KEY}' object", path.display());
        }
        Ok(self.merge_document(&document, verbose))
    }

    /// Merges every index document found under `directories`.
    ///
    /// Returns whether at least one document was loaded.
    pub fn initialize(&self, directories: &[PathBuf], prefix: &str, verbose: bool) -> bool {
        let mut loaded = 0;
        for path in index_files(directories, prefix) {
            match self.load_index_file(&path, verbose) {
                Ok(added) => {
                    info!(index = %path.display(), added, "Resource index loaded");
                    loaded += 1;
                }
                Err(e) => warn!(error = %format!("{e:#}"), "Skipping resource index"),
            }
        }
        if loaded == 0 {
            warn!(prefix, "No resource index found");
        }
        loaded > 0
    }

    /// Snapshot of `store_name`. Unknown stores are reported and come back empty.
    pub fn store(&self, store_name: &str) -> Store {
        match self.lock().get(store_name) {
            Some(store) => store.clone(),
            None => {
                warn!(store = %store_name, "Unknown store");
                Store::new()
            }
        }
    }

    pub fn descriptor(&self, store_name: &str, name: &str) -> Option<Arc<Descriptor>> {
        self.lock().get(store_name)?.get(name).cloned()
    }

    pub fn contains(&self, store_name: &str, name: &str) -> bool {
        self.lock()
            .get(store_name)
            .is_some_and(|store| store.contains_key(name))
    }

    /// Declared names of `store_name`, sorted.
    pub fn names(&self, store_name: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .get(store_name)
            .map(|store| store.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn store_len(&self, store_name: &str) -> usize {
        self.lock().get(store_name).map_or(0, HashMap::len)
    }

    /// Known store names, sorted.
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Any declared name of `store_name`.
    pub fn random_name(&self, store_name: &str) -> Option<String> {
        self.lock()
            .get(store_name)?
            .keys()
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    /// Total descriptors across every store.
    pub fn registered_resources(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }
}

impl fmt::Display for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stores = self.lock();
        let mut names: Vec<&String> = stores.keys().collect();
        names.sort();
        writeln!(
            f,
            "{} stores, {} resources",
            stores.len(),
            stores.values().map(HashMap::len).sum::<usize>()
        )?;
        for name in names {
            writeln!(f, "  {name}: {}", stores[name].len())?;
        }
        Ok(())
    }
}

/// Index documents under `<dir>/data-stores/` for every directory, in
/// directory order then file name order.
pub fn index_files(directories: &[PathBuf], prefix: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in directories {
        let stores_dir = dir.join(crate::config::DATA_STORES_DIR);
        let entries = match std::fs::read_dir(&stores_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %stores_dir.display(), error = %e, "No index directory");
                continue;
            }
        };
        let mut matches: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| is_index_file_name(n, prefix))
            })
            .collect();
        matches.sort();
        found.extend(matches);
    }
    found
}

/// `<prefix>.NNN.json` with exactly three digits.
fn is_index_file_name(file_name: &str, prefix: &str) -> bool {
    file_name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|version| version.len() == 3 && version.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_registration_wins() {
        let stores = Stores::new();
        let added = stores.merge_store(
            "Images",
            &[
                json!({"Name": "Grass", "Data": "a.png"}),
                json!({"Name": "Grass", "Data": "b.png"}),
            ],
            false,
        );
        assert_eq!(added, 1);
        let added = stores.merge_store("Images", &[json!({"Name": "Grass", "Data": "c.png"})], false);
        assert_eq!(added, 0);
        let d = stores.descriptor("Images", "Grass").unwrap();
        assert_eq!(
            d.source(),
            &crate::descriptor::PayloadSource::FileRef("a.png".into())
        );
    }

    #[test]
    fn bad_entries_do_not_stop_the_merge() {
        let stores = Stores::new();
        let added = stores.merge_store(
            "Sounds",
            &[
                json!({"Name": "+Reserved", "Data": "x.wav"}),
                json!("not an object"),
                json!({"Name": "Step", "Data": "step.wav"}),
            ],
            false,
        );
        assert_eq!(added, 1);
        assert!(stores.contains("Sounds", "Step"));
        assert!(!stores.contains("Sounds", "+Reserved"));
    }

    #[test]
    fn merge_document_walks_every_store() {
        let stores = Stores::new();
        let added = stores.merge_document(
            &json!({"Stores": {
                "Images": [{"Name": "A", "Data": "a.png"}, {"Name": "B", "Data": "b.png"}],
                "Sounds": [{"Name": "C", "Data": "c.wav"}],
                "Broken": {"Name": "D"}
            }}),
            true,
        );
        assert_eq!(added, 3);
        assert_eq!(stores.names("Images"), vec!["A", "B"]);
        assert_eq!(stores.store_names(), vec!["Images", "Sounds"]);
        assert_eq!(stores.registered_resources(), 3);
        assert_eq!(stores.merge_document(&json!({"Nope": {}}), false), 0);
    }

    #[test]
    fn touch_creates_empty_store() {
        let stores = Stores::new();
        assert!(stores.store("Meshes").is_empty());
        assert!(stores.store_names().is_empty());
        stores.touch("Meshes");
        assert_eq!(stores.store_names(), vec!["Meshes"]);
        assert_eq!(stores.store_len("Meshes"), 0);
        assert_eq!(stores.random_name("Meshes"), None);
    }

    #[test]
    fn random_name_comes_from_the_store() {
        let stores = Stores::new();
        stores.merge_store(
            "Sounds",
            &[json!({"Name": "A", "Data": "a"}), json!({"Name": "B", "Data": "b"})],
            false,
        );
        for _ in 0..16 {
            let name = stores.random_name("Sounds").unwrap();
            assert!(name == "A" || name == "B");
        }
    }

    #[test]
    fn display_lists_stores() {
        let stores = Stores::new();
        stores.merge_store("Images", &[json!({"Name": "A", "Data": "a"})], false);
        let text = stores.to_string();
        assert!(text.starts_with("1 stores, 1 resources"));
        assert!(text.contains("Images: 1"));
    }

    #[test]
    fn index_file_name_pattern() {
        assert!(is_index_file_name("ResourcesIndex.000.json", "ResourcesIndex"));
        assert!(is_index_file_name("ResourcesIndex.042.json", "ResourcesIndex"));
        assert!(!is_index_file_name("ResourcesIndex.42.json", "ResourcesIndex"));
        assert!(!is_index_file_name("ResourcesIndex.0001.json", "ResourcesIndex"));
        assert!(!is_index_file_name("ResourcesIndex.abc.json", "ResourcesIndex"));
        assert!(!is_index_file_name("ResourcesIndex.000.txt", "ResourcesIndex"));
        assert!(!is_index_file_name("Other.000.json", "ResourcesIndex"));
    }

    #[test]
    fn index_files_sorted_per_directory() {
        let base = tempfile::tempdir().unwrap();
        let first = base.path().join("first");
        let second = base.path().join("second");
        for dir in [&first, &second] {
            std::fs::create_dir_all(dir.join("data-stores")).unwrap();
        }
        std::fs::write(first.join("data-stores/ResourcesIndex.001.json"), "{}").unwrap();
        std::fs::write(first.join("data-stores/ResourcesIndex.000.json"), "{}").unwrap();
        std::fs::write(first.join("data-stores/notes.json"), "{}").unwrap();
        std::fs::write(second.join("data-stores/ResourcesIndex.000.json"), "{}").unwrap();

        let files = index_files(&[first.clone(), second.clone(), base.path().join("missing")], "ResourcesIndex");
        assert_eq!(
            files,
            vec![
                first.join("data-stores/ResourcesIndex.000.json"),
                first.join("data-stores/ResourcesIndex.001.json"),
                second.join("data-stores/ResourcesIndex.000.json"),
            ]
        );
    }

    #[test]
    fn load_index_file_reports_bad_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ResourcesIndex.000.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let stores = Stores::new();
        assert!(stores.load_index_file(&path, false).is_err());
        std::fs::write(&path, "{ not json").unwrap();
        assert!(stores.load_index_file(&path, false).is_err());
        assert!(stores.load_index_file(&dir.path().join("missing.json"), false).is_err());
    }
}

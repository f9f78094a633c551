//! JSON-file storage backend
//!
//! Layout under the root directory:
//! - `<slug>.json`: one pretty-printed record per token
//! - `index.json`: array of stored tokens
//! - `export.json`: default destination of [`FileStore::export_to`]

use super::traits::{storage_key, OpenStore, RecordStore, StorageError, StorageResult};
use crate::record::AdjacencyRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const INDEX_FILE: &str = "index.json";
const EXPORT_FILE: &str = "export.json";

/// File name stem for a token: lowercase, runs of non-alphanumerics
/// collapsed to `-`, leading/trailing dashes trimmed.
pub fn slugify(token: &str) -> String {
    let mut slug = String::with_capacity(token.len());
    let mut pending_dash = false;
    for c in token.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Directory-of-JSON-files record store
///
/// The index is rewritten under a mutex so concurrent saves from one process
/// do not lose entries.
pub struct FileStore {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl FileStore {
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> StorageResult<PathBuf> {
        let slug = slugify(key);
        if slug.is_empty() {
            return Err(StorageError::InvalidToken(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", slug)))
    }

    /// Token held by the record file at `path`, if it exists and parses.
    fn stored_token(path: &Path) -> Option<String> {
        let text = fs::read_to_string(path).ok()?;
        serde_json::from_str::<AdjacencyRecord>(&text)
            .ok()
            .map(|record| record.token)
    }

    fn read_index(&self) -> StorageResult<Vec<String>> {
        let path = self.root.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&fs::read_to_string(&path)?) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable index, starting fresh");
                Ok(Vec::new())
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    /// Write every stored record into one JSON object keyed by token.
    ///
    /// Defaults to `<root>/export.json`; returns the destination.
    pub fn export_to(&self, dest: Option<&Path>) -> StorageResult<PathBuf> {
        let dest = dest
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.join(EXPORT_FILE));
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let bundle = self.export_all()?;
        Self::write_json(&dest, &bundle)?;
        debug!(dest = %dest.display(), records = bundle.len(), "Exported records");
        Ok(dest)
    }
}

impl OpenStore for FileStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            index_lock: Mutex::new(()),
        })
    }
}

impl RecordStore for FileStore {
    fn load(&self, token: &str) -> StorageResult<Option<AdjacencyRecord>> {
        let key = storage_key(token)?;
        let path = self.record_path(&key)?;
        if !path.exists() {
            return Ok(None);
        }
        let record: AdjacencyRecord = serde_json::from_str(&fs::read_to_string(&path)?)?;
        // Distinct tokens can share a slug ("c++" and "c").
        if record.token != key {
            debug!(token = %key, stored = %record.token, "Slug collision, treating as absent");
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn save(&self, record: &AdjacencyRecord) -> StorageResult<String> {
        let key = storage_key(&record.token)?;
        let path = self.record_path(&key)?;

        if let Some(previous) = Self::stored_token(&path).filter(|t| *t != key) {
            warn!(
                token = %key,
                replaced = %previous,
                path = %path.display(),
                "Slug collision, overwriting another token's record"
            );
        }

        let mut stored = record.clone();
        stored.token = key.clone();
        Self::write_json(&path, &stored)?;

        let _guard = self.index_lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut index = self.read_index()?;
        if !index.contains(&key) {
            index.push(key);
            Self::write_json(&self.root.join(INDEX_FILE), &index)?;
        }
        Ok(path.display().to_string())
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let mut tokens = self.read_index()?;
        tokens.sort();
        tokens.dedup();
        Ok(tokens)
    }

    fn delete(&self, token: &str) -> StorageResult<bool> {
        let key = storage_key(token)?;
        let path = self.record_path(&key)?;
        let removed_file = match self.load(&key) {
            Ok(Some(_)) | Err(_) if path.exists() => {
                fs::remove_file(&path)?;
                true
            }
            _ => false,
        };

        let _guard = self.index_lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let index = self.read_index()?;
        let next: Vec<String> = index.iter().filter(|t| **t != key).cloned().collect();
        let removed_entry = next.len() != index.len();
        if removed_entry {
            Self::write_json(&self.root.join(INDEX_FILE), &next)?;
        }
        Ok(removed_file || removed_entry)
    }

    fn export_all(&self) -> StorageResult<BTreeMap<String, AdjacencyRecord>> {
        let mut bundle = BTreeMap::new();
        for token in self.list()? {
            match self.load(&token) {
                Ok(Some(record)) => {
                    bundle.insert(token, record);
                }
                Ok(None) => {}
                Err(e) => warn!(token = %token, error = %e, "Skipping unreadable record"),
            }
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::RelationName;

    fn create_test_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("records")).unwrap();
        (dir, store)
    }

    fn record(token: &str) -> AdjacencyRecord {
        AdjacencyRecord::empty(token, "gpt-4o-mini").with_edge(RelationName::Causes, "rain", 0.7)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("New York"), "new-york");
        assert_eq!(slugify("  --C++ lang!! "), "c-lang");
        assert_eq!(slugify("état"), "tat");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_save_and_load() {
        let (_dir, store) = create_test_store();
        let location = store.save(&record("Cloud Cover")).unwrap();
        assert!(location.ends_with("cloud-cover.json"));

        let loaded = store.load("  cloud cover ").unwrap().unwrap();
        assert_eq!(loaded.token, "cloud cover");
        assert_eq!(loaded.slot(RelationName::Causes).len(), 1);
        assert!(store.load("sunshine").unwrap().is_none());
    }

    #[test]
    fn test_persisted_json_uses_short_keys() {
        let (_dir, store) = create_test_store();
        store.save(&record("cloud")).unwrap();
        let text = fs::read_to_string(store.root().join("cloud.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["slots"]["Causes"][0]["token"], "rain");
        assert_eq!(value["slots"]["Causes"][0]["w"], 0.7);
        assert_eq!(value["meta"]["source"], "LLM");
    }

    #[test]
    fn test_list_is_sorted_and_deduplicated() {
        let (_dir, store) = create_test_store();
        store.save(&record("zebra")).unwrap();
        store.save(&record("apple")).unwrap();
        store.save(&record("apple")).unwrap();
        assert_eq!(store.list().unwrap(), vec!["apple", "zebra"]);
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = create_test_store();
        store.save(&record("apple")).unwrap();
        assert!(store.delete("Apple").unwrap());
        assert!(store.load("apple").unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
        assert!(!store.delete("apple").unwrap());
    }

    #[test]
    fn test_slug_collision_is_not_a_hit() {
        let (_dir, store) = create_test_store();
        store.save(&record("c")).unwrap();
        assert!(store.load("c!").unwrap().is_none());
    }

    #[test]
    fn test_colliding_save_replaces_the_earlier_token() {
        let (_dir, store) = create_test_store();
        store.save(&record("e-mail")).unwrap();
        let path = store.record_path("e'mail").unwrap();
        assert_eq!(FileStore::stored_token(&path).as_deref(), Some("e-mail"));

        store.save(&record("e'mail")).unwrap();
        assert_eq!(FileStore::stored_token(&path).as_deref(), Some("e'mail"));
        assert!(store.load("e-mail").unwrap().is_none());
        assert!(store.load("e'mail").unwrap().is_some());
        assert_eq!(store.list().unwrap(), vec!["e'mail", "e-mail"]);
    }

    #[test]
    fn test_blank_token_is_rejected() {
        let (_dir, store) = create_test_store();
        assert!(matches!(store.load("   "), Err(StorageError::InvalidToken(_))));
        assert!(matches!(store.load("???"), Err(StorageError::InvalidToken(_))));
    }

    #[test]
    fn test_export_to_default_destination() {
        let (_dir, store) = create_test_store();
        store.save(&record("apple")).unwrap();
        store.save(&record("pear")).unwrap();

        let dest = store.export_to(None).unwrap();
        assert_eq!(dest, store.root().join("export.json"));
        let bundle: BTreeMap<String, AdjacencyRecord> =
            serde_json::from_str(&fs::read_to_string(dest).unwrap()).unwrap();
        assert_eq!(bundle.keys().collect::<Vec<_>>(), vec!["apple", "pear"]);
    }

    #[test]
    fn test_unreadable_record_is_an_error_and_skipped_on_export() {
        let (_dir, store) = create_test_store();
        store.save(&record("apple")).unwrap();
        store.save(&record("pear")).unwrap();
        fs::write(store.root().join("pear.json"), "{ not json").unwrap();

        assert!(matches!(store.load("pear"), Err(StorageError::Serialization(_))));
        let bundle = store.export_all().unwrap();
        assert_eq!(bundle.len(), 1);
        assert!(store.delete("pear").unwrap());
    }
}

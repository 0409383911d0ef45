use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::{DocumentStore, Result, StoreError};

/// One JSON file per document: `<root>/<namespace>/<slug>-<hash>.json`.
///
/// The file body is `{"key": ..., "value": ...}` so the original key
/// survives slug sanitization.
#[derive(Debug)]
pub struct JsonDirStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDirStore {
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| StoreError::io(root, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(slug(namespace))
    }

    fn doc_path(&self, namespace: &str, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.namespace_dir(namespace)
            .join(format!("{}-{}.json", slug(key), &digest[..8]))
    }

    fn read_doc(&self, namespace: &str, path: &Path) -> Result<Option<(String, Value)>> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut doc: Value =
            serde_json::from_str(&content).map_err(|e| StoreError::decode(namespace, &label, e))?;
        let key = doc
            .get("key")
            .and_then(|k| k.as_str())
            .map(str::to_string)
            .unwrap_or(label);
        let value = doc.get_mut("value").map(Value::take).unwrap_or(Value::Null);
        Ok(Some((key, value)))
    }
}

fn slug(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(48)
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Write to `.tmp`, then rename over the target.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).map_err(|e| StoreError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

impl DocumentStore for JsonDirStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        let path = self.doc_path(namespace, key);
        Ok(self.read_doc(namespace, &path)?.map(|(_, v)| v))
    }

    fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let dir = self.namespace_dir(namespace);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let body = serde_json::to_string_pretty(&json!({ "key": key, "value": value }))
            .map_err(|e| StoreError::encode(namespace, key, e))?;
        atomic_write(&self.doc_path(namespace, key), &body)
    }

    fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>> {
        let dir = self.namespace_dir(namespace);
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };
        let mut docs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(doc) = self.read_doc(namespace, &path)? {
                docs.push(doc);
            }
        }
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(docs)
    }
}

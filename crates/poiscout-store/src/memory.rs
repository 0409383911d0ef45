use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::{DocumentStore, Result, StoreError};

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        let docs = self.docs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(docs.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: &Value) -> Result<()> {
        let mut docs = self.docs.write().map_err(|_| StoreError::Poisoned)?;
        docs.entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>> {
        let docs = self.docs.read().map_err(|_| StoreError::Poisoned)?;
        Ok(docs
            .get(namespace)
            .map(|ns| ns.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_contract() {
        crate::contract::exercise(&MemoryStore::new());
    }
}

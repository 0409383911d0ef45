//! POIs and the deduplicating POI pool.
//!
//! Identity is the `id` string. Two POIs with the same id are the same place,
//! regardless of which search step surfaced them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::IntegrityViolation;

const NAME_HASH_LEN: usize = 16;

/// A candidate point of interest with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub source_step_topic: String,
}

impl Poi {
    pub fn new(id: impl Into<String>, name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
            source_step_topic: topic.into(),
        }
    }

    /// Build a POI whose id is a content hash of its normalised name.
    ///
    /// Used when the executor has no stable source URL for a place.
    pub fn from_name(name: &str, topic: &str) -> Self {
        Self::new(name_hash(name), name.trim(), topic)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// One-line rendering used in prompts and CLI output.
    pub fn describe(&self) -> String {
        if self.attributes.is_empty() {
            return self.name.clone();
        }
        let attrs = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} ({})", self.name, attrs)
    }
}

/// Stable id for a place name: lowercase, whitespace-collapsed, SHA-256, hex prefix.
pub fn name_hash(name: &str) -> String {
    let normalised = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let digest = Sha256::digest(normalised.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(NAME_HASH_LEN);
    id
}

/// Result of merging one POI into the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Inserted,
    /// Already present; `new_attributes` keys were added to the existing record.
    Merged { new_attributes: usize },
}

/// Deduplicated, insertion-ordered POI collection. Only ever grows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoiPool {
    pois: Vec<Poi>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl PoiPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from a list, merging duplicates by id.
    pub fn from_pois(pois: impl IntoIterator<Item = Poi>) -> Result<Self, IntegrityViolation> {
        let mut pool = Self::new();
        for poi in pois {
            pool.merge(poi)?;
        }
        Ok(pool)
    }

    /// Insert a POI, or fold its attributes into the record with the same id.
    ///
    /// Attribute keys that already exist with a different value are a
    /// conflict: the existing record is left untouched and the conflict is
    /// returned to the caller.
    pub fn merge(&mut self, poi: Poi) -> Result<MergeOutcome, IntegrityViolation> {
        self.ensure_index();
        let Some(&pos) = self.index.get(&poi.id) else {
            self.index.insert(poi.id.clone(), self.pois.len());
            self.pois.push(poi);
            return Ok(MergeOutcome::Inserted);
        };

        let existing = &mut self.pois[pos];
        let conflicts: Vec<String> = poi
            .attributes
            .iter()
            .filter(|(k, v)| existing.attributes.get(*k).is_some_and(|old| old != *v))
            .map(|(k, _)| k.clone())
            .collect();
        if !conflicts.is_empty() {
            return Err(IntegrityViolation::ConflictingPoi {
                id: poi.id,
                keys: conflicts,
            });
        }

        let mut new_attributes = 0;
        for (k, v) in poi.attributes {
            if !existing.attributes.contains_key(&k) {
                existing.attributes.insert(k, v);
                new_attributes += 1;
            }
        }
        Ok(MergeOutcome::Merged { new_attributes })
    }

    pub fn get(&self, id: &str) -> Option<&Poi> {
        match self.index.get(id) {
            Some(&pos) => self.pois.get(pos),
            None => self.pois.iter().find(|p| p.id == id),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Poi> {
        self.pois.iter()
    }

    pub fn as_slice(&self) -> &[Poi] {
        &self.pois
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.pois.iter().map(|p| p.id.clone()).collect()
    }

    // Deserialized pools arrive with an empty index.
    fn ensure_index(&mut self) {
        if self.index.len() != self.pois.len() {
            self.index = self
                .pois
                .iter()
                .enumerate()
                .map(|(i, p)| (p.id.clone(), i))
                .collect();
        }
    }
}

impl IntoIterator for PoiPool {
    type Item = Poi;
    type IntoIter = std::vec::IntoIter<Poi>;

    fn into_iter(self) -> Self::IntoIter {
        self.pois.into_iter()
    }
}

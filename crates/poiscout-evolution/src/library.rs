//! Skill library: accept-or-reject insertion under a diversity threshold,
//! similarity-ranked retrieval, and a greedy diverse subset.

use std::sync::{Arc, RwLock};

use poiscout_core::capability::Embedder;
use poiscout_core::config::LibraryConfig;
use poiscout_core::observability::{audit_skill_accepted, audit_skill_rejected};
use poiscout_core::similarity::cosine_similarity;
use poiscout_core::{CapabilityError, IntegrityViolation, Skill};
use poiscout_store::{DocumentStore, SKILLS_NS};

use crate::error::LibraryError;

/// Skills in creation order. Index order is recency order.
pub struct SkillLibrary {
    skills: RwLock<Vec<Skill>>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    config: LibraryConfig,
}

impl SkillLibrary {
    /// Load every persisted skill. A document that does not decode as a
    /// skill is reported, not skipped.
    pub fn open(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        config: LibraryConfig,
    ) -> Result<Self, LibraryError> {
        let mut skills = Vec::new();
        for (key, value) in store.list(SKILLS_NS)? {
            let skill: Skill =
                serde_json::from_value(value).map_err(|e| IntegrityViolation::CorruptSkill {
                    id: key.clone(),
                    reason: e.to_string(),
                })?;
            if skill.id != key {
                return Err(IntegrityViolation::CorruptSkill {
                    id: key,
                    reason: format!("stored under a different id '{}'", skill.id),
                }
                .into());
            }
            skills.push(skill);
        }
        skills.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tracing::debug!(count = skills.len(), "skill library loaded");
        Ok(Self {
            skills: RwLock::new(skills),
            embedder,
            store,
            config,
        })
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.skills.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot in creation order.
    pub fn all(&self) -> Result<Vec<Skill>, LibraryError> {
        Ok(self.skills.read().map_err(|_| LibraryError::Poisoned)?.clone())
    }

    /// Insert `candidate` unless it is within the diversity threshold of a
    /// stored skill. Existing skills are never edited.
    ///
    /// The check and the insert happen under one write lock.
    pub fn add(&self, candidate: Skill) -> Result<bool, LibraryError> {
        if candidate.embedding.is_empty() {
            return Err(LibraryError::EmptyEmbedding(candidate.id));
        }
        if candidate.embedding.iter().any(|v| !v.is_finite()) {
            return Err(LibraryError::NonFiniteEmbedding(candidate.id));
        }
        let mut skills = self.skills.write().map_err(|_| LibraryError::Poisoned)?;

        let mut max_similarity = f32::MIN;
        for existing in skills.iter() {
            let sim = cosine_similarity(&existing.embedding, &candidate.embedding).ok_or(
                LibraryError::DimensionMismatch {
                    expected: existing.embedding.len(),
                    got: candidate.embedding.len(),
                },
            )?;
            max_similarity = max_similarity.max(sim);
        }

        let threshold = self.config.diversity_threshold;
        let duplicate_id = skills.iter().any(|s| s.id == candidate.id);
        if duplicate_id || max_similarity > threshold {
            tracing::info!(
                task = %candidate.source_task_id,
                max_similarity,
                threshold,
                "skill rejected as redundant"
            );
            audit_skill_rejected(&candidate.source_task_id, max_similarity, threshold);
            return Ok(false);
        }

        let doc = serde_json::to_value(&candidate).map_err(|e| IntegrityViolation::CorruptSkill {
            id: candidate.id.clone(),
            reason: e.to_string(),
        })?;
        self.store.put(SKILLS_NS, &candidate.id, &doc)?;
        let reported = if skills.is_empty() { 0.0 } else { max_similarity };
        tracing::info!(id = %candidate.id, task = %candidate.source_task_id, max_similarity = reported, "skill accepted");
        audit_skill_accepted(&candidate.id, &candidate.source_task_id, reported);
        skills.push(candidate);
        Ok(true)
    }

    /// Up to `k` skills most similar to `request`.
    pub async fn retrieve(&self, request: &str, k: usize) -> Result<Vec<Skill>, LibraryError> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let query = self
            .embedder
            .embed(request)
            .await
            .map_err(|e| CapabilityError::failed("embedding", e))?;
        self.retrieve_by_embedding(&query, k)
    }

    /// Ranked by similarity descending; ties go to the most recent skill.
    /// Skills whose dimension differs from `query` are not candidates, and a
    /// non-finite score ranks nothing.
    pub fn retrieve_by_embedding(&self, query: &[f32], k: usize) -> Result<Vec<Skill>, LibraryError> {
        let skills = self.skills.read().map_err(|_| LibraryError::Poisoned)?;
        let mut scored: Vec<(f32, usize)> = skills
            .iter()
            .enumerate()
            .filter_map(|(i, s)| cosine_similarity(query, &s.embedding).map(|sim| (sim, i)))
            .filter(|(sim, _)| sim.is_finite())
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, i)| skills[i].clone())
            .collect())
    }

    /// Greedy max-min selection of `k` mutually dissimilar skills, seeded
    /// with the oldest one.
    pub fn diverse(&self, k: usize) -> Result<Vec<Skill>, LibraryError> {
        let skills = self.skills.read().map_err(|_| LibraryError::Poisoned)?;
        if k == 0 || skills.is_empty() {
            return Ok(Vec::new());
        }
        let mut chosen = vec![0usize];
        // Closest similarity of each skill to anything already chosen.
        let mut nearest: Vec<f32> = skills
            .iter()
            .map(|s| cosine_similarity(&s.embedding, &skills[0].embedding).unwrap_or(1.0))
            .collect();
        while chosen.len() < k.min(skills.len()) {
            let next = (0..skills.len())
                .filter(|i| !chosen.contains(i))
                .min_by(|a, b| nearest[*a].total_cmp(&nearest[*b]).then_with(|| a.cmp(b)));
            let Some(next) = next else { break };
            chosen.push(next);
            for (i, s) in skills.iter().enumerate() {
                let sim = cosine_similarity(&s.embedding, &skills[next].embedding).unwrap_or(1.0);
                nearest[i] = nearest[i].max(sim);
            }
        }
        Ok(chosen.into_iter().map(|i| skills[i].clone()).collect())
    }
}

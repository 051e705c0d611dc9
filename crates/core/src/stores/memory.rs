use crate::traits::VectorStore;
use crate::{Record, ScoredRecord, SearchError, StoredRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

struct InMemoryCollection {
    dimensions: usize,
    entries: Vec<StoredRecord>,
}

/// Process-local store with the same collection semantics as the Milvus client.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore").finish_non_exhaustive()
    }
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|collections| {
                collections
                    .get(collection)
                    .map_or(0, |collection| collection.entries.len())
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn poisoned() -> SearchError {
    SearchError::Request("in-memory store lock poisoned".to_string())
}

fn missing(collection: &str) -> SearchError {
    SearchError::BackendResponse {
        backend: "memory".to_string(),
        details: format!("collection {collection} does not exist"),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn recreate_collection(
        &self,
        collection: &str,
        dimensions: usize,
    ) -> Result<(), SearchError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        collections.insert(
            collection.to_string(),
            InMemoryCollection {
                dimensions,
                entries: Vec::new(),
            },
        );
        Ok(())
    }

    async fn insert(&self, collection: &str, entries: &[StoredRecord]) -> Result<(), SearchError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        if let Some(entry) = entries
            .iter()
            .find(|entry| entry.vector.len() != target.dimensions)
        {
            return Err(SearchError::Request(format!(
                "embedding dimension {} != {}",
                entry.vector.len(),
                target.dimensions
            )));
        }

        target.entries.extend_from_slice(entries);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, SearchError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;

        if vector.len() != target.dimensions {
            return Err(SearchError::Request(format!(
                "query vector dim {} is not {}",
                vector.len(),
                target.dimensions
            )));
        }

        let mut scored: Vec<ScoredRecord> = target
            .entries
            .iter()
            .map(|entry| ScoredRecord {
                id: entry.id.clone(),
                score: f64::from(cosine_similarity(vector, &entry.vector)),
                record: entry.record.clone(),
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Record>, SearchError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;

        Ok(target
            .entries
            .iter()
            .take(limit)
            .map(|entry| entry.record.clone())
            .collect())
    }
}

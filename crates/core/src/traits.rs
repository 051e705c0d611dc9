use crate::{Record, ScoredRecord, SearchError, StoredRecord};
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drops `collection` if it exists and creates it empty for `dimensions`-wide vectors.
    async fn recreate_collection(&self, collection: &str, dimensions: usize)
        -> Result<(), SearchError>;

    async fn insert(&self, collection: &str, entries: &[StoredRecord]) -> Result<(), SearchError>;

    /// Nearest records first.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, SearchError>;

    /// Up to `limit` stored records in no particular ranking.
    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Record>, SearchError>;
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Record>, SearchError>;
}

use crate::config::ApiKeys;
use crate::embeddings::{EmbeddingChoice, Embedder};
use crate::traits::VectorStore;
use crate::{CollectionHandle, Record, SearchError, StoredRecord};
use tracing::info;
use uuid::Uuid;

/// Replaces `collection` with `records`, embedding them with the provider behind `choice`.
pub async fn index(
    store: &dyn VectorStore,
    records: &[Record],
    collection: &str,
    choice: EmbeddingChoice,
    keys: &ApiKeys,
) -> Result<CollectionHandle, SearchError> {
    let embedder = choice.embedder(keys)?;
    info!(collection, provider = %choice, model = choice.model(), "indexing corpus");
    index_corpus(store, &embedder, records, collection).await
}

/// Drops and recreates `collection`, then inserts every record under a fresh UUID in one batch.
/// Prior contents of the collection are discarded.
pub async fn index_corpus(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    records: &[Record],
    collection: &str,
) -> Result<CollectionHandle, SearchError> {
    let normalized: Vec<Record> = records.iter().map(Record::normalized).collect();
    let texts: Vec<String> = normalized
        .iter()
        .map(|record| record.content.clone())
        .collect();

    let vectors = embedder.embed_documents(&texts).await?;
    if vectors.len() != normalized.len() {
        return Err(SearchError::Request(format!(
            "embedding count {} doesn't match record count {}",
            vectors.len(),
            normalized.len()
        )));
    }

    let dimensions = vectors
        .first()
        .map(Vec::len)
        .unwrap_or_else(|| embedder.dimensions());

    store.recreate_collection(collection, dimensions).await?;

    let entries: Vec<StoredRecord> = normalized
        .into_iter()
        .zip(vectors)
        .map(|(record, vector)| StoredRecord {
            id: Uuid::new_v4().to_string(),
            record,
            vector,
        })
        .collect();

    store.insert(collection, &entries).await?;
    info!(collection, records = entries.len(), dimensions, "collection seeded");

    Ok(CollectionHandle {
        name: collection.to_string(),
        dimensions,
        ids: entries.into_iter().map(|entry| entry.id).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::InMemoryVectorStore;
    use crate::ScoredRecord;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[tokio::test]
    async fn reindexing_replaces_previous_corpus() {
        let store = InMemoryVectorStore::new();
        let embedder = CharacterNgramEmbedder::default();

        let first = vec![
            Record::new("Tiểu đường type 2"),
            Record::new("Tăng huyết áp"),
        ];
        let second = vec![Record::new("Influenza causes fever and cough")];

        index_corpus(&store, &embedder, &first, "X").await.unwrap();
        index_corpus(&store, &embedder, &second, "X").await.unwrap();

        let stored = store.sample("X", 50).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "Influenza causes fever and cough");
    }

    #[tokio::test]
    async fn every_record_gets_a_fresh_identifier() {
        let store = InMemoryVectorStore::new();
        let embedder = CharacterNgramEmbedder::default();
        let records = vec![Record::new("same text"), Record::new("same text")];

        let handle = index_corpus(&store, &embedder, &records, "dupes").await.unwrap();
        let unique: HashSet<_> = handle.ids.iter().collect();
        assert_eq!(handle.ids.len(), 2);
        assert_eq!(unique.len(), 2);
        assert_eq!(handle.dimensions, embedder.dimensions());
    }

    #[tokio::test]
    async fn stored_metadata_is_normalized() {
        let store = InMemoryVectorStore::new();
        let embedder = CharacterNgramEmbedder::default();
        let records = vec![Record::new("Sốt").with_metadata("source", "flu.pdf")];

        index_corpus(&store, &embedder, &records, "meta").await.unwrap();
        let stored = store.sample("meta", 1).await.unwrap();
        assert_eq!(stored[0].source(), Some("flu.pdf"));
        assert_eq!(stored[0].metadata["author"].as_text(), Some("Unknown"));
    }

    #[tokio::test]
    async fn missing_credential_is_a_configuration_error() {
        let store = InMemoryVectorStore::new();
        let result = index(
            &store,
            &[Record::new("x")],
            "X",
            EmbeddingChoice::OpenAi,
            &ApiKeys::default(),
        )
        .await;

        assert!(matches!(result, Err(SearchError::Config(_))));
        assert!(store.sample("X", 1).await.is_err());
    }

    /// Delegates to the in-memory store and records the size of every insert call.
    #[derive(Default)]
    struct InsertCountingStore {
        inner: InMemoryVectorStore,
        inserts: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorStore for InsertCountingStore {
        async fn recreate_collection(
            &self,
            collection: &str,
            dimensions: usize,
        ) -> Result<(), SearchError> {
            self.inner.recreate_collection(collection, dimensions).await
        }

        async fn insert(&self, collection: &str, entries: &[StoredRecord]) -> Result<(), SearchError> {
            self.inserts.lock().unwrap().push(entries.len());
            self.inner.insert(collection, entries).await
        }

        async fn search(
            &self,
            collection: &str,
            vector: &[f32],
            limit: usize,
        ) -> Result<Vec<ScoredRecord>, SearchError> {
            self.inner.search(collection, vector, limit).await
        }

        async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Record>, SearchError> {
            self.inner.sample(collection, limit).await
        }
    }

    #[tokio::test]
    async fn whole_corpus_is_inserted_in_one_batch() {
        let store = InsertCountingStore::default();
        let embedder = CharacterNgramEmbedder::default();
        let records: Vec<Record> = (0..250)
            .map(|page| Record::new(format!("Trang {page} về bệnh cúm")))
            .collect();

        let handle = index_corpus(&store, &embedder, &records, "batch").await.unwrap();

        assert_eq!(*store.inserts.lock().unwrap(), vec![250]);
        assert_eq!(handle.ids.len(), 250);
        assert_eq!(store.inner.len("batch"), 250);
    }
}


use crate::config::ApiKeys;
use crate::embeddings::{EmbeddingChoice, Embedder};
use crate::lexical::LexicalRetriever;
use crate::traits::{Retriever, VectorStore};
use crate::{Record, RetrieverOptions, SearchError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const VECTOR_WEIGHT: f64 = 0.7;
pub const LEXICAL_WEIGHT: f64 = 0.3;
const RRF_K: f64 = 60.0;

const HEALTH_CHECK_QUERY: &str = "y tế";

pub const EMPTY_CORPUS_MESSAGE: &str = "Không tìm thấy tài liệu nào.";
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Có lỗi xảy ra khi kết nối database. Vui lòng thử lại sau.";

pub struct VectorRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    k: usize,
}

impl VectorRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        collection: impl Into<String>,
        k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            collection: collection.into(),
            k,
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn search(&self, query: &str) -> Result<Vec<Record>, SearchError> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self.store.search(&self.collection, &vector, self.k).await?;
        Ok(hits.into_iter().map(|hit| hit.record).collect())
    }
}

struct FusedRecord {
    record: Record,
    score: f64,
}

/// Weighted reciprocal rank fusion keyed by record text. Ties keep first-seen order,
/// walking the lists in the order given.
pub fn fuse_rankings(rankings: &[(&[Record], f64)], top_k: usize) -> Vec<(Record, f64)> {
    let mut fused: Vec<FusedRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (ranking, weight) in rankings {
        for (rank, record) in ranking.iter().enumerate() {
            let contribution = weight / (rank as f64 + 1.0 + RRF_K);
            match positions.get(&record.content) {
                Some(index) => fused[*index].score += contribution,
                None => {
                    positions.insert(record.content.clone(), fused.len());
                    fused.push(FusedRecord {
                        record: record.clone(),
                        score: contribution,
                    });
                }
            }
        }
    }

    fused.sort_by(|left, right| right.score.total_cmp(&left.score));
    fused
        .into_iter()
        .take(top_k)
        .map(|item| (item.record, item.score))
        .collect()
}

pub struct HybridRetriever {
    vector: VectorRetriever,
    lexical: LexicalRetriever,
    top_k: usize,
}

impl HybridRetriever {
    pub fn new(vector: VectorRetriever, lexical: LexicalRetriever, top_k: usize) -> Self {
        Self {
            vector,
            lexical,
            top_k,
        }
    }

    /// Fused results. A failing vector leg is logged and the lexical ranking is used alone.
    pub async fn search_scored(&self, query: &str) -> Result<Vec<(Record, f64)>, SearchError> {
        let vector_hits = match self.vector.search(query).await {
            Ok(hits) => hits,
            Err(error) => {
                warn!(%error, "vector search failed, using lexical results only");
                Vec::new()
            }
        };
        let lexical_hits = self.lexical.top(query);

        Ok(fuse_rankings(
            &[
                (vector_hits.as_slice(), VECTOR_WEIGHT),
                (lexical_hits.as_slice(), LEXICAL_WEIGHT),
            ],
            self.top_k,
        ))
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    async fn search(&self, query: &str) -> Result<Vec<Record>, SearchError> {
        let scored = self.search_scored(query).await?;
        Ok(scored.into_iter().map(|(record, _)| record).collect())
    }
}

/// The retriever handed to the answer agent: the hybrid retriever when the
/// collection was reachable, otherwise a one-record lexical placeholder.
pub enum MedicalRetriever {
    Hybrid(HybridRetriever),
    Fallback(LexicalRetriever),
}

impl MedicalRetriever {
    pub fn fallback(message: &str, source: &str) -> Self {
        let placeholder = Record::new(message).with_metadata("source", source);
        MedicalRetriever::Fallback(LexicalRetriever::from_records(vec![placeholder], 1))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MedicalRetriever::Fallback(_))
    }
}

#[async_trait]
impl Retriever for MedicalRetriever {
    async fn search(&self, query: &str) -> Result<Vec<Record>, SearchError> {
        match self {
            MedicalRetriever::Hybrid(retriever) => retriever.search(query).await,
            MedicalRetriever::Fallback(retriever) => retriever.search(query).await,
        }
    }
}

/// Builds the session retriever for `choice`. Never fails: a missing credential, an
/// unreachable collection or an unreachable embedding provider yields the placeholder
/// retriever instead.
pub async fn build_retriever(
    store: Arc<dyn VectorStore>,
    choice: EmbeddingChoice,
    keys: &ApiKeys,
    options: &RetrieverOptions,
) -> MedicalRetriever {
    match choice.embedder(keys) {
        Ok(embedder) => build_retriever_with_embedder(store, Arc::new(embedder), options).await,
        Err(error) => {
            warn!(%error, "retriever falls back to placeholder");
            MedicalRetriever::fallback(CONNECTION_ERROR_MESSAGE, "error")
        }
    }
}

pub async fn build_retriever_with_embedder(
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    options: &RetrieverOptions,
) -> MedicalRetriever {
    let snapshot = match store
        .sample(&options.collection, options.snapshot_limit)
        .await
    {
        Ok(snapshot) => snapshot,
        Err(error) => {
            warn!(collection = %options.collection, %error, "retriever falls back to placeholder");
            return MedicalRetriever::fallback(CONNECTION_ERROR_MESSAGE, "error");
        }
    };

    if let Err(error) = embedder.embed_query(HEALTH_CHECK_QUERY).await {
        warn!(%error, "embedding provider unavailable, retriever falls back to placeholder");
        return MedicalRetriever::fallback(CONNECTION_ERROR_MESSAGE, "error");
    }

    let corpus = if snapshot.is_empty() {
        vec![Record::new(EMPTY_CORPUS_MESSAGE).with_metadata("source", "none")]
    } else {
        snapshot
    };
    info!(
        collection = %options.collection,
        lexical_records = corpus.len(),
        top_k = options.top_k,
        "hybrid retriever ready"
    );

    let vector = VectorRetriever::new(store, embedder, options.collection.clone(), options.top_k);
    let lexical = LexicalRetriever::from_records(corpus, options.top_k);
    MedicalRetriever::Hybrid(HybridRetriever::new(vector, lexical, options.top_k))
}

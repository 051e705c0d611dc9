pub mod agent;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod hybrid;
pub mod indexer;
pub mod ingest;
pub mod lexical;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod session;
pub mod stores;
pub mod traits;

pub use agent::{build_agent, AgentOutput, AgentStep, AnswerAgent, MAX_ITERATIONS};
pub use chunking::{split_records, split_text, ChunkingConfig};
pub use config::{ApiKeys, Vendor, DEFAULT_COLLECTION, DEFAULT_MILVUS_URI};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingChoice, HttpEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{AgentError, ConfigError, IngestError, SearchError};
pub use extractor::{extract_pdf, ExtractedPdf, LopdfExtractor, PageText, PdfExtractor};
pub use hybrid::{
    build_retriever, build_retriever_with_embedder, fuse_rankings, HybridRetriever,
    MedicalRetriever, VectorRetriever,
};
pub use indexer::{index, index_corpus};
pub use ingest::{
    discover_pdf_files, load_pdf_documents, load_records, save_records, IngestionReport,
    SkippedPdf,
};
pub use lexical::LexicalRetriever;
pub use llm::{ChatModel, ModelChoice, OpenAiCompatibleChat};
pub use models::{
    CollectionHandle, ConversationTurn, IngestionOptions, Metadata, MetadataValue, Record,
    RetrieverOptions, Role, ScoredRecord, StoredRecord,
};
pub use session::ChatSession;
pub use stores::{InMemoryVectorStore, MilvusStore};
pub use traits::{Retriever, VectorStore};

pub mod memory;
pub mod milvus;

pub use memory::InMemoryVectorStore;
pub use milvus::MilvusStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Text(String),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            MetadataValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(value) => Some(*value),
            MetadataValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Integer(value) => write!(f, "{value}"),
            MetadataValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Metadata keys kept in the vector store, with the value used when a record lacks one.
pub const INDEXED_METADATA_DEFAULTS: [(&str, DefaultValue); 10] = [
    ("title", DefaultValue::Text("Default Title")),
    ("producer", DefaultValue::Text("Unknown")),
    ("creator", DefaultValue::Text("Unknown")),
    ("creationdate", DefaultValue::Text("Unknown")),
    ("moddate", DefaultValue::Text("Unknown")),
    ("author", DefaultValue::Text("Unknown")),
    ("source", DefaultValue::Text("Unknown")),
    ("total_pages", DefaultValue::Integer(0)),
    ("page", DefaultValue::Integer(0)),
    ("page_label", DefaultValue::Text("1")),
];

#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Text(&'static str),
    Integer(i64),
}

impl From<DefaultValue> for MetadataValue {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Text(text) => MetadataValue::Text(text.to_string()),
            DefaultValue::Integer(value) => MetadataValue::Integer(value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(rename = "page_content")]
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Record {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(MetadataValue::as_text)
    }

    /// Restricts metadata to the indexed key set, filling in defaults for missing keys.
    pub fn normalized(&self) -> Record {
        let metadata = INDEXED_METADATA_DEFAULTS
            .iter()
            .map(|(key, default)| {
                let value = self
                    .metadata
                    .get(*key)
                    .cloned()
                    .unwrap_or_else(|| MetadataValue::from(*default));
                ((*key).to_string(), value)
            })
            .collect();

        Record {
            content: self.content.clone(),
            metadata,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub record: Record,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f64,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub name: String,
    pub dimensions: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub recursive: bool,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 5_000,
            chunk_overlap: 200,
            recursive: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    pub collection: String,
    pub top_k: usize,
    pub snapshot_limit: usize,
}

impl RetrieverOptions {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            collection: "medical_data".to_string(),
            top_k: 4,
            snapshot_limit: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_page_content_on_the_wire() {
        let record = Record::new("Sốt cao kéo dài")
            .with_metadata("source", "data/cum.pdf")
            .with_metadata("page", 3);

        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded["page_content"], "Sốt cao kéo dài");
        assert_eq!(encoded["metadata"]["page"], 3);

        let decoded: Record = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn normalization_fills_defaults_and_drops_unknown_keys() {
        let record = Record::new("text")
            .with_metadata("source", "a.pdf")
            .with_metadata("page", 2)
            .with_metadata("trapped", "/False");

        let normalized = record.normalized();
        assert_eq!(normalized.metadata.len(), INDEXED_METADATA_DEFAULTS.len());
        assert_eq!(normalized.source(), Some("a.pdf"));
        assert_eq!(normalized.metadata["page"], MetadataValue::Integer(2));
        assert_eq!(normalized.metadata["title"], MetadataValue::from("Default Title"));
        assert_eq!(normalized.metadata["page_label"], MetadataValue::from("1"));
        assert!(!normalized.metadata.contains_key("trapped"));
    }

    #[test]
    fn turn_roles_serialize_lowercase() {
        let turn = ConversationTurn::human("xin chào");
        let encoded = serde_json::to_value(&turn).unwrap();
        assert_eq!(encoded["role"], "human");
    }
}

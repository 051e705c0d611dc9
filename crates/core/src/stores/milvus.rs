use crate::traits::VectorStore;
use crate::{ConfigError, Metadata, Record, ScoredRecord, SearchError, StoredRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

const BACKEND: &str = "milvus";
const PRIMARY_FIELD: &str = "pk";
const VECTOR_FIELD: &str = "vector";
const TEXT_FIELD: &str = "text";
const METADATA_FIELD: &str = "metadata";
const PRIMARY_KEY_MAX_LENGTH: usize = 64;

/// Milvus client over the v2 RESTful API.
pub struct MilvusStore {
    endpoint: String,
    token: Option<String>,
    client: Client,
}

impl MilvusStore {
    pub fn new(uri: &str, token: Option<String>) -> Result<Self, ConfigError> {
        let parsed = Url::parse(uri)?;
        Ok(Self {
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            token: token.filter(|value| !value.trim().is_empty()),
            client: Client::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, path: &str, body: Value) -> Result<Value, SearchError> {
        let mut request = self
            .client
            .post(format!("{}/v2/vectordb/{}", self.endpoint, path))
            .json(&body);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        check_code(parsed)
    }

    async fn has_collection(&self, collection: &str) -> Result<bool, SearchError> {
        let data = self
            .call("collections/has", json!({ "collectionName": collection }))
            .await?;
        Ok(data
            .pointer("/data/has")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }
}

fn check_code(parsed: Value) -> Result<Value, SearchError> {
    let code = parsed.pointer("/code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = parsed
            .pointer("/message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("code {code}: {message}"),
        });
    }
    Ok(parsed)
}

fn create_collection_body(collection: &str, dimensions: usize) -> Value {
    json!({
        "collectionName": collection,
        "dimension": dimensions,
        "metricType": "COSINE",
        "idType": "VarChar",
        "primaryFieldName": PRIMARY_FIELD,
        "vectorFieldName": VECTOR_FIELD,
        "params": {
            "max_length": PRIMARY_KEY_MAX_LENGTH,
            "enableDynamicField": true,
        },
    })
}

fn entity_row(entry: &StoredRecord) -> Value {
    json!({
        PRIMARY_FIELD: entry.id,
        VECTOR_FIELD: entry.vector,
        TEXT_FIELD: entry.record.content,
        METADATA_FIELD: entry.record.metadata,
    })
}

fn parse_entity(hit: &Value) -> (String, Record) {
    let id = match hit.get(PRIMARY_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let content = hit
        .get(TEXT_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let metadata: Metadata = hit
        .get(METADATA_FIELD)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();

    (id, Record { content, metadata })
}

fn data_rows(parsed: &Value) -> Vec<Value> {
    parsed
        .pointer("/data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl VectorStore for MilvusStore {
    async fn recreate_collection(
        &self,
        collection: &str,
        dimensions: usize,
    ) -> Result<(), SearchError> {
        if self.has_collection(collection).await? {
            info!(collection, "dropping existing collection");
            self.call("collections/drop", json!({ "collectionName": collection }))
                .await?;
        }

        self.call(
            "collections/create",
            create_collection_body(collection, dimensions),
        )
        .await?;
        info!(collection, dimensions, "collection created");
        Ok(())
    }

    async fn insert(&self, collection: &str, entries: &[StoredRecord]) -> Result<(), SearchError> {
        if entries.is_empty() {
            return Ok(());
        }

        let rows = entries.iter().map(entity_row).collect::<Vec<_>>();
        let parsed = self
            .call(
                "entities/insert",
                json!({ "collectionName": collection, "data": rows }),
            )
            .await?;

        let inserted = parsed
            .pointer("/data/insertCount")
            .and_then(Value::as_u64)
            .unwrap_or(entries.len() as u64);
        debug!(collection, inserted, "entities inserted");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, SearchError> {
        let parsed = self
            .call(
                "entities/search",
                json!({
                    "collectionName": collection,
                    "data": [vector],
                    "annsField": VECTOR_FIELD,
                    "limit": limit,
                    "outputFields": [PRIMARY_FIELD, TEXT_FIELD, METADATA_FIELD],
                }),
            )
            .await?;

        let mut result = Vec::new();
        for hit in data_rows(&parsed) {
            let (id, record) = parse_entity(&hit);
            let score = hit.pointer("/distance").and_then(Value::as_f64).unwrap_or(0.0);
            result.push(ScoredRecord { id, score, record });
        }

        Ok(result)
    }

    async fn sample(&self, collection: &str, limit: usize) -> Result<Vec<Record>, SearchError> {
        let parsed = self
            .call(
                "entities/query",
                json!({
                    "collectionName": collection,
                    "filter": "",
                    "limit": limit,
                    "outputFields": [PRIMARY_FIELD, TEXT_FIELD, METADATA_FIELD],
                }),
            )
            .await?;

        Ok(data_rows(&parsed)
            .iter()
            .map(|hit| parse_entity(hit).1)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetadataValue;

    #[test]
    fn invalid_uri_is_a_config_error() {
        assert!(matches!(
            MilvusStore::new("not a uri", None),
            Err(ConfigError::InvalidUri(_))
        ));
    }

    #[test]
    fn endpoint_drops_trailing_slash() {
        let store = MilvusStore::new("http://localhost:19530/", Some(" ".to_string())).unwrap();
        assert_eq!(store.endpoint(), "http://localhost:19530");
        assert!(store.token.is_none());
    }

    #[test]
    fn nonzero_code_is_a_backend_error() {
        let result = check_code(json!({"code": 100, "message": "collection not found"}));
        match result {
            Err(SearchError::BackendResponse { backend, details }) => {
                assert_eq!(backend, "milvus");
                assert!(details.contains("collection not found"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check_code(json!({"code": 0, "data": []})).is_ok());
    }

    #[test]
    fn entity_rows_carry_text_and_metadata() {
        let entry = StoredRecord {
            id: "5f0c".to_string(),
            record: Record::new("Cúm gây sốt").with_metadata("page", 2),
            vector: vec![0.5, 0.5],
        };
        let row = entity_row(&entry);
        assert_eq!(row["pk"], "5f0c");
        assert_eq!(row["text"], "Cúm gây sốt");
        assert_eq!(row["metadata"]["page"], 2);
        assert_eq!(row["vector"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn search_hits_are_parsed() {
        let hit = json!({
            "pk": "a1",
            "distance": 0.83,
            "text": "Influenza causes fever and cough",
            "metadata": {"source": "flu.pdf", "page": 0}
        });
        let (id, record) = parse_entity(&hit);
        assert_eq!(id, "a1");
        assert_eq!(record.source(), Some("flu.pdf"));
        assert_eq!(record.metadata["page"], MetadataValue::Integer(0));
    }

    #[test]
    fn create_body_uses_cosine_and_varchar_keys() {
        let body = create_collection_body("medical_data", 768);
        assert_eq!(body["dimension"], 768);
        assert_eq!(body["metricType"], "COSINE");
        assert_eq!(body["idType"], "VarChar");
    }

    #[tokio::test]
    async fn unreachable_server_errors() {
        let store = MilvusStore::new("http://127.0.0.1:1", None).unwrap();
        let result = store.sample("medical_data", 50).await;
        assert!(matches!(result, Err(SearchError::Http(_))));
    }
}

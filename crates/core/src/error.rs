use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("directory {0} not found")]
    MissingDirectory(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{variable} not found in environment variables (required by {provider})")]
    MissingCredential {
        provider: &'static str,
        variable: &'static str,
    },

    #[error("invalid vector store uri: {0}")]
    InvalidUri(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("embedding provider {provider} failed: {details}")]
    Embedding { provider: String, details: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{provider} rate limited the request")]
    RateLimited { provider: String },

    #[error("{provider} request failed: {details}")]
    Provider { provider: String, details: String },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("tool execution failed: {0}")]
    Tool(#[from] SearchError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

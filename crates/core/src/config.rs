use crate::error::ConfigError;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

pub const DEFAULT_MILVUS_URI: &str = "http://localhost:19530";
pub const DEFAULT_COLLECTION: &str = "medical_data";

/// The two provider credentials. Blank strings are treated as absent.
#[derive(Clone, Default)]
pub struct ApiKeys {
    openai: Option<String>,
    google: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.as_ref().map(|_| "<redacted>"))
            .field("google", &self.google.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ApiKeys {
    pub fn new(openai: Option<String>, google: Option<String>) -> Self {
        Self {
            openai: non_blank(openai),
            google: non_blank(google),
        }
    }

    pub fn has(&self, vendor: Vendor) -> bool {
        self.slot(vendor).is_some()
    }

    pub fn require(&self, vendor: Vendor) -> Result<&str, ConfigError> {
        self.slot(vendor)
            .map(String::as_str)
            .ok_or(ConfigError::MissingCredential {
                provider: vendor.name(),
                variable: vendor.credential_variable(),
            })
    }

    fn slot(&self, vendor: Vendor) -> Option<&String> {
        match vendor {
            Vendor::OpenAi => self.openai.as_ref(),
            Vendor::Google => self.google.as_ref(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    OpenAi,
    Google,
}

impl Vendor {
    pub fn name(self) -> &'static str {
        match self {
            Vendor::OpenAi => "openai",
            Vendor::Google => "google",
        }
    }

    pub fn credential_variable(self) -> &'static str {
        match self {
            Vendor::OpenAi => OPENAI_API_KEY,
            Vendor::Google => GOOGLE_API_KEY,
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Vendor::OpenAi => OPENAI_BASE_URL,
            Vendor::Google => GOOGLE_BASE_URL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_count_as_missing() {
        let keys = ApiKeys::new(Some("  ".to_string()), Some("g-key".to_string()));
        assert!(!keys.has(Vendor::OpenAi));
        assert_eq!(keys.require(Vendor::Google).unwrap(), "g-key");

        let error = keys.require(Vendor::OpenAi).unwrap_err();
        assert!(error.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let keys = ApiKeys::new(Some("sk-secret".to_string()), None);
        let rendered = format!("{keys:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}

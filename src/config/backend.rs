// Backend selection entry

use serde::{Deserialize, Serialize};

/// Which model backend a session talks to.
///
/// Serializes with a `type` tag, e.g.:
/// ```toml
/// [backend]
/// type = "mistral"
/// api_key = "..."
/// request_interval_ms = 500
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEntry {
    /// A llama.cpp-style server with grammar support.
    LlamaServer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Mistral {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Minimum spacing between requests; 0 disables spacing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_interval_ms: Option<u64>,
    },
    Anthropic {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Runpod {
        endpoint_id: String,
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

impl BackendEntry {
    /// Short tag matching the backend's `name()`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LlamaServer { .. } => "http",
            Self::Mistral { .. } => "mistral",
            Self::Anthropic { .. } => "anthropic",
            Self::Runpod { .. } => "runpod",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_toml() {
        let entry: BackendEntry = toml::from_str(
            r#"
            type = "runpod"
            endpoint_id = "abc123"
            api_key = "rp-key"
            "#,
        )
        .unwrap();
        assert_eq!(
            entry,
            BackendEntry::Runpod {
                endpoint_id: "abc123".into(),
                api_key: "rp-key".into(),
                base_url: None,
            }
        );
        assert_eq!(entry.kind(), "runpod");
    }

    #[test]
    fn test_llama_server_url_optional() {
        let entry: BackendEntry = toml::from_str("type = \"llama_server\"").unwrap();
        assert_eq!(entry, BackendEntry::LlamaServer { url: None });
        assert_eq!(entry.kind(), "http");
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(toml::from_str::<BackendEntry>("type = \"in_memory\"").is_err());
    }
}

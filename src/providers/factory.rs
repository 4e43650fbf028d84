// Backend factory
//
// Builds the one shared backend a process uses from its configuration.

use std::sync::Arc;
use std::time::Duration;

use super::anthropic::AnthropicBackend;
use super::openai::{OpenAiCompatBackend, DEFAULT_LLAMA_SERVER_URL};
use super::runpod::RunpodBackend;
use super::ModelBackend;
use crate::config::BackendEntry;
use crate::errors::Result;

/// Create a backend from a `BackendEntry`.
///
/// Missing credentials fail here with `BackendConfiguration`, before any
/// session starts.
pub fn create_backend(entry: &BackendEntry) -> Result<Arc<dyn ModelBackend>> {
    match entry {
        BackendEntry::LlamaServer { url } => {
            let url = url.as_deref().unwrap_or(DEFAULT_LLAMA_SERVER_URL);
            Ok(Arc::new(OpenAiCompatBackend::llama_server(url)?))
        }

        BackendEntry::Mistral {
            api_key,
            url,
            model,
            request_interval_ms,
        } => {
            let mut backend = OpenAiCompatBackend::mistral(api_key.clone())?;
            if let Some(u) = url {
                backend = backend.with_url(u.clone());
            }
            if let Some(m) = model {
                backend = backend.with_model(m.clone());
            }
            if let Some(ms) = request_interval_ms {
                let interval = (*ms > 0).then(|| Duration::from_millis(*ms));
                backend = backend.with_request_interval(interval);
            }
            Ok(Arc::new(backend))
        }

        BackendEntry::Anthropic {
            api_key,
            model,
            url,
        } => {
            let mut backend = AnthropicBackend::new(api_key.clone())?;
            if let Some(m) = model {
                backend = backend.with_model(m.clone());
            }
            if let Some(u) = url {
                backend = backend.with_url(u.clone());
            }
            Ok(Arc::new(backend))
        }

        BackendEntry::Runpod {
            endpoint_id,
            api_key,
            base_url,
        } => {
            let mut backend = RunpodBackend::new(endpoint_id.clone(), api_key.clone())?;
            if let Some(b) = base_url {
                backend = backend.with_base_url(b.clone());
            }
            Ok(Arc::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ChillError;

    #[test]
    fn test_create_each_backend() {
        let entries = [
            BackendEntry::LlamaServer { url: None },
            BackendEntry::Mistral {
                api_key: "mk".into(),
                url: None,
                model: Some("mistral-large-latest".into()),
                request_interval_ms: Some(0),
            },
            BackendEntry::Anthropic {
                api_key: "sk-ant".into(),
                model: None,
                url: None,
            },
            BackendEntry::Runpod {
                endpoint_id: "ep".into(),
                api_key: "rk".into(),
                base_url: None,
            },
        ];

        for entry in &entries {
            let backend = create_backend(entry).unwrap();
            assert_eq!(backend.name(), entry.kind());
        }
    }

    #[test]
    fn test_model_override() {
        let backend = create_backend(&BackendEntry::Mistral {
            api_key: "mk".into(),
            url: None,
            model: Some("mistral-large-latest".into()),
            request_interval_ms: None,
        })
        .unwrap();
        assert_eq!(backend.model(), Some("mistral-large-latest"));
    }

    #[test]
    fn test_missing_credentials() {
        let err = create_backend(&BackendEntry::Anthropic {
            api_key: String::new(),
            model: None,
            url: None,
        })
        .err()
        .unwrap();
        assert!(matches!(err, ChillError::BackendConfiguration(_)));

        let err = create_backend(&BackendEntry::Runpod {
            endpoint_id: "ep".into(),
            api_key: " ".into(),
            base_url: None,
        })
        .err()
        .unwrap();
        assert!(matches!(err, ChillError::BackendConfiguration(_)));
    }
}

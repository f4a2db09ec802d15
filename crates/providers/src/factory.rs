use std::sync::Arc;

use tracing::{info, warn};
use tusker_core::config::BackendConfig;

use crate::{LanguageBackend, OllamaBackend};

/// Infer the provider from a model prefix such as "ollama/llama3".
pub fn infer_provider_from_model(model: &str) -> Option<&'static str> {
    if model.starts_with("ollama/") {
        Some("ollama")
    } else {
        None
    }
}

/// Build the configured backend. `None` means the robot runs without one:
/// every command then goes through the direct table only.
pub fn create_backend(config: &BackendConfig) -> Option<Arc<dyn LanguageBackend>> {
    if !config.enabled {
        info!("Language backend disabled by config");
        return None;
    }

    let provider = infer_provider_from_model(&config.model).unwrap_or(config.provider.as_str());
    match provider {
        "ollama" => {
            let backend = OllamaBackend::new_with_proxy(
                config.api_base.as_deref(),
                &config.model,
                config.temperature,
                config.proxy.as_deref(),
            );
            info!(
                provider = %provider,
                model = %backend.model(),
                api_base = %backend.api_base(),
                "Language backend configured"
            );
            Some(Arc::new(backend))
        }
        other => {
            warn!(provider = %other, "Unknown backend provider, running without one");
            None
        }
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use tusker_core::{Error, Result};

use crate::client::build_http_client;
use crate::LanguageBackend;

pub const DEFAULT_OLLAMA_BASE: &str = "http://localhost:11434";

/// Local inference can be slow on the robot's board; per-call deadlines are
/// enforced above this layer.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(300);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

pub struct OllamaBackend {
    client: Client,
    api_base: String,
    model: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(api_base: Option<&str>, model: &str, temperature: f32) -> Self {
        Self::new_with_proxy(api_base, model, temperature, None)
    }

    pub fn new_with_proxy(
        api_base: Option<&str>,
        model: &str,
        temperature: f32,
        proxy: Option<&str>,
    ) -> Self {
        let resolved_base = api_base
            .unwrap_or(DEFAULT_OLLAMA_BASE)
            .trim_end_matches('/')
            .to_string();
        let client = build_http_client(proxy, &resolved_base, TRANSPORT_TIMEOUT);
        Self {
            client,
            api_base: resolved_base,
            model: model.to_string(),
            temperature,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Config may store "ollama/llama3" but the API expects "llama3".
    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("ollama/").unwrap_or(model)
    }

    fn parse_generate(raw_body: &str) -> Result<String> {
        let resp: GenerateResponse = serde_json::from_str(raw_body).map_err(|e| {
            let preview_end = raw_body
                .char_indices()
                .nth(200)
                .map(|(i, _)| i)
                .unwrap_or(raw_body.len());
            Error::Backend(format!(
                "Failed to parse Ollama response: {}. Body: {}",
                e,
                &raw_body[..preview_end]
            ))
        })?;
        Ok(resp.response.trim().to_string())
    }

    /// An untagged model name matches its `:latest` tag.
    fn model_listed(raw_body: &str, model: &str) -> bool {
        let Ok(tags) = serde_json::from_str::<TagsResponse>(raw_body) else {
            return false;
        };
        let latest = format!("{}:latest", model);
        tags.models
            .iter()
            .any(|m| m.name == model || m.name == latest)
    }
}

#[async_trait]
impl LanguageBackend for OllamaBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.api_base);
        let model = Self::normalize_model(&self.model);

        let request = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
            }
        });

        debug!(model = %model, prompt_len = prompt.len(), "Ollama generate request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Backend(format!(
                "Ollama API error {}: {}",
                status, raw_body
            )));
        }

        let text = Self::parse_generate(&raw_body)?;
        debug!(model = %model, response_len = text.len(), "Ollama response parsed");
        Ok(text)
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.api_base);
        let model = Self::normalize_model(&self.model);

        let response = match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(api_base = %self.api_base, error = %e, "Ollama not reachable");
                return false;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "Ollama tags request failed");
            return false;
        }

        let body = response.text().await.unwrap_or_default();
        let available = Self::model_listed(&body, model);
        if available {
            info!(model = %model, "Ollama backend available");
        } else {
            warn!(model = %model, "Ollama is running but the model is not pulled");
        }
        available
    }

    fn model(&self) -> &str {
        Self::normalize_model(&self.model)
    }
}

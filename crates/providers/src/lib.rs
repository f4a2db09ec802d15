pub mod client;
pub mod factory;
pub mod ollama;

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;
use tusker_core::Result;

/// A text-completion service used to interpret free-form commands.
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Whether the service is reachable and the configured model is present.
    async fn probe(&self) -> bool;

    fn model(&self) -> &str;
}

/// Outcome of one bounded completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    /// The deadline elapsed; the call was abandoned.
    Timeout,
    /// The backend answered with a transport or API error.
    Unavailable(String),
}

pub async fn complete_with_timeout(
    backend: &dyn LanguageBackend,
    prompt: &str,
    timeout: Duration,
) -> Completion {
    match tokio::time::timeout(timeout, backend.complete(prompt)).await {
        Ok(Ok(text)) => Completion::Text(text),
        Ok(Err(e)) => {
            warn!(model = %backend.model(), error = %e, "Backend call failed");
            Completion::Unavailable(e.to_string())
        }
        Err(_) => {
            warn!(
                model = %backend.model(),
                timeout_ms = timeout.as_millis() as u64,
                "Backend call timed out"
            );
            Completion::Timeout
        }
    }
}

pub use factory::{create_backend, infer_provider_from_model};
pub use ollama::{OllamaBackend, DEFAULT_OLLAMA_BASE};

#[cfg(test)]
mod tests {
    use super::*;
    use tusker_core::Error;

    struct Slow;

    #[async_trait]
    impl LanguageBackend for Slow {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        }
        async fn probe(&self) -> bool {
            true
        }
        fn model(&self) -> &str {
            "slow"
        }
    }

    struct Broken;

    #[async_trait]
    impl LanguageBackend for Broken {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(Error::Backend("connection refused".to_string()))
        }
        async fn probe(&self) -> bool {
            false
        }
        fn model(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_call() {
        let out = complete_with_timeout(&Slow, "p", Duration::from_secs(10)).await;
        assert_eq!(out, Completion::Timeout);
    }

    #[tokio::test]
    async fn test_error_is_reported_as_unavailable() {
        let out = complete_with_timeout(&Broken, "p", Duration::from_secs(1)).await;
        assert!(matches!(out, Completion::Unavailable(msg) if msg.contains("connection refused")));
    }
}

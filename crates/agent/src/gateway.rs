use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use tusker_core::Role;
use tusker_providers::{complete_with_timeout, Completion};
use tusker_storage::ResponseCache;

use crate::health::BackendHealth;

/// What came back for one prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Cached(String),
    Fresh(String),
    /// The call hit its deadline; an empty answer was cached for the prompt.
    TimedOut,
    /// No backend, a failed probe, or a transport error. Nothing was cached.
    Unavailable,
}

impl Answer {
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Cached(t) | Answer::Fresh(t) => Some(t),
            Answer::TimedOut | Answer::Unavailable => None,
        }
    }
}

/// Cache-first access to the language backend with a hard per-call deadline.
pub struct BackendGateway {
    cache: Arc<ResponseCache>,
    health: Arc<BackendHealth>,
    timeout: Duration,
}

impl BackendGateway {
    pub fn new(cache: Arc<ResponseCache>, health: Arc<BackendHealth>, timeout: Duration) -> Self {
        Self {
            cache,
            health,
            timeout,
        }
    }

    pub async fn available(&self) -> bool {
        self.health.available().await
    }

    pub async fn ask(&self, role: Role, prompt: &str) -> Answer {
        let Some(backend) = self.health.usable().await else {
            return Answer::Unavailable;
        };

        if let Some(hit) = self.cache.get(role, prompt) {
            debug!(role = %role, "Backend answer served from cache");
            return Answer::Cached(hit);
        }

        match complete_with_timeout(backend.as_ref(), prompt, self.timeout).await {
            Completion::Text(text) => {
                self.store(role, prompt, &text);
                Answer::Fresh(text)
            }
            Completion::Timeout => {
                self.store(role, prompt, "");
                Answer::TimedOut
            }
            Completion::Unavailable(_) => Answer::Unavailable,
        }
    }

    fn store(&self, role: Role, prompt: &str, text: &str) {
        if let Err(e) = self.cache.put(role, prompt, text) {
            warn!(role = %role, error = %e, "Failed to cache backend answer");
        }
    }
}

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};
use tusker_providers::LanguageBackend;

/// Process-wide view of whether the language backend can be used.
///
/// The probe runs at most once; every role reads the same answer. A backend
/// that failed its probe stays unavailable until the process restarts.
pub struct BackendHealth {
    backend: Option<Arc<dyn LanguageBackend>>,
    probed: OnceCell<bool>,
}

impl BackendHealth {
    pub fn new(backend: Option<Arc<dyn LanguageBackend>>) -> Self {
        Self {
            backend,
            probed: OnceCell::new(),
        }
    }

    pub fn absent() -> Self {
        Self::new(None)
    }

    pub async fn available(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        *self
            .probed
            .get_or_init(|| async move {
                let ok = backend.probe().await;
                if ok {
                    info!(model = %backend.model(), "Language backend healthy");
                } else {
                    warn!(model = %backend.model(), "Language backend unavailable, direct commands only");
                }
                ok
            })
            .await
    }

    /// The backend, if it passed its probe.
    pub async fn usable(&self) -> Option<&Arc<dyn LanguageBackend>> {
        if self.available().await {
            self.backend.as_ref()
        } else {
            None
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    #[tokio::test]
    async fn test_absent_is_unavailable() {
        let health = BackendHealth::absent();
        assert!(!health.available().await);
        assert!(health.usable().await.is_none());
        assert!(health.model().is_none());
    }

    #[tokio::test]
    async fn test_probe_runs_once() {
        let backend = Arc::new(ScriptedBackend::replying("stop"));
        let health = BackendHealth::new(Some(backend.clone()));
        assert!(health.available().await);
        assert!(health.available().await);
        assert_eq!(backend.probes(), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_sticks() {
        let backend = Arc::new(ScriptedBackend::replying("stop").offline());
        let health = BackendHealth::new(Some(backend.clone()));
        assert!(!health.available().await);
        assert!(health.usable().await.is_none());
        assert_eq!(backend.calls(), 0);
    }
}

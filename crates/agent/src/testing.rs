//! Fakes shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tusker_core::{Config, Error, Paths, Result};
use tusker_providers::LanguageBackend;

use crate::services::AgentServices;

/// A backend that answers from a script and counts how it was used.
pub struct ScriptedBackend {
    default_reply: String,
    queued: Mutex<VecDeque<String>>,
    delay: Option<Duration>,
    online: bool,
    failing: bool,
    calls: AtomicUsize,
    probes: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn replying(text: &str) -> Self {
        Self {
            default_reply: text.to_string(),
            queued: Mutex::new(VecDeque::new()),
            delay: None,
            online: true,
            failing: false,
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::replying("")
        }
    }

    /// Answers in order, then falls back to the default reply.
    pub fn then(self, text: &str) -> Self {
        self.queued.lock().unwrap().push_back(text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(Error::Backend("connection refused".to_string()));
        }
        let queued = self.queued.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| self.default_reply.clone()))
    }

    async fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.online
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

pub fn test_paths() -> (Paths, TempDir) {
    let dir = TempDir::new().unwrap();
    (Paths::with_base(dir.path().to_path_buf()), dir)
}

/// Services over a temp directory with an optional scripted backend.
pub fn test_services(
    backend: Option<ScriptedBackend>,
) -> (Arc<AgentServices>, Option<Arc<ScriptedBackend>>, TempDir) {
    let (paths, dir) = test_paths();
    let backend = backend.map(Arc::new);
    let services = AgentServices::new(
        Config::default(),
        paths,
        backend.clone().map(|b| b as Arc<dyn LanguageBackend>),
    );
    (Arc::new(services), backend, dir)
}

use std::sync::Arc;

use tusker_core::{Config, Paths};
use tusker_providers::LanguageBackend;
use tusker_storage::{ExperienceRecorder, ResponseCache};

use crate::bus::MessageBus;
use crate::gateway::BackendGateway;
use crate::health::BackendHealth;

/// Everything the role runtimes share. Built once per process.
pub struct AgentServices {
    pub config: Config,
    pub paths: Paths,
    pub bus: Arc<MessageBus>,
    pub gateway: Arc<BackendGateway>,
    pub recorder: Arc<ExperienceRecorder>,
}

impl AgentServices {
    pub fn new(config: Config, paths: Paths, backend: Option<Arc<dyn LanguageBackend>>) -> Self {
        let cache = Arc::new(
            ResponseCache::new(paths.clone()).with_memory_cap(config.cache.max_memory_entries),
        );
        let health = Arc::new(BackendHealth::new(backend));
        let gateway = Arc::new(BackendGateway::new(cache, health, config.backend.timeout()));
        Self {
            recorder: Arc::new(ExperienceRecorder::new(paths.clone())),
            bus: Arc::new(MessageBus::new()),
            gateway,
            config,
            paths,
        }
    }
}

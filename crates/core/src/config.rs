use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::Paths;
use crate::types::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Set to false to run with the language backend permanently absent.
    #[serde(default = "default_backend_enabled")]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// `None` follows HTTPS_PROXY/HTTP_PROXY, `Some("")` forces a direct connection.
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_backend_enabled() -> bool {
    true
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_temperature() -> f32 {
    0.2
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: default_backend_enabled(),
            provider: default_provider(),
            api_base: None,
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Longest a role waits for its first message in one tick.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Most messages a role drains in one tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_roles")]
    pub roles: Vec<Role>,
}

fn default_tick_ms() -> u64 {
    100
}

fn default_batch_size() -> usize {
    32
}

fn default_roles() -> Vec<Role> {
    Role::ALL.to_vec()
}

impl RuntimeConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            batch_size: default_batch_size(),
            roles: default_roles(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Commands below this confidence resolve to `unknown`. Unset disables gating.
    #[serde(default)]
    pub min_confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Cap on the in-memory layer only; the on-disk cache is never evicted.
    #[serde(default)]
    pub max_memory_entries: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionConfig {
    #[serde(default = "default_scene_interval_secs")]
    pub scene_interval_secs: u64,
}

fn default_scene_interval_secs() -> u64 {
    5
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            scene_interval_secs: default_scene_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub vision: VisionConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

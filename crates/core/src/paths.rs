use std::path::PathBuf;

use crate::types::Role;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".tusker"))
            .unwrap_or_else(|| PathBuf::from(".tusker"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Root of the response cache; one subdirectory per role.
    pub fn cache_dir(&self) -> PathBuf {
        self.base.join("llm_cache")
    }

    pub fn role_cache_dir(&self, role: Role) -> PathBuf {
        self.cache_dir().join(role.as_str())
    }

    pub fn contexts_dir(&self) -> PathBuf {
        self.base.join("contexts")
    }

    pub fn context_file(&self, role: Role) -> PathBuf {
        self.contexts_dir()
            .join(format!("{}_context.json", role.as_str()))
    }

    pub fn rl_data_dir(&self) -> PathBuf {
        self.base.join("rl_data")
    }

    pub fn experience_file(&self, role: Role) -> PathBuf {
        self.rl_data_dir().join(format!("{}.jsonl", role.as_str()))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.cache_dir())?;
        std::fs::create_dir_all(self.contexts_dir())?;
        std::fs::create_dir_all(self.rl_data_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;
use tusker_core::{Paths, Result, Role};

/// On-disk form of one memoized backend answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub role: Role,
    pub prompt_hash: String,
    pub response: String,
    pub created_at: String,
}

/// Deterministic key for a prompt. Only surrounding whitespace is ignored.
pub fn prompt_hash(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

type CacheKey = (Role, String);

#[derive(Default)]
struct MemoryLayer {
    entries: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
}

impl MemoryLayer {
    fn insert(&mut self, key: CacheKey, response: String, cap: Option<usize>) {
        if self.entries.insert(key.clone(), response).is_none() {
            self.order.push_back(key);
        }
        if let Some(cap) = cap {
            while self.entries.len() > cap {
                match self.order.pop_front() {
                    Some(old) => {
                        self.entries.remove(&old);
                    }
                    None => break,
                }
            }
        }
    }
}

/// Memoization table for backend completions, keyed by `(role, prompt hash)`.
///
/// Disk is authoritative and never expires. The in-memory layer may be capped
/// with `max_memory_entries`; evicted keys are simply re-read from disk.
/// Concurrent writers for one key are last-write-wins via atomic rename.
pub struct ResponseCache {
    paths: Paths,
    max_memory_entries: Option<usize>,
    memory: Mutex<MemoryLayer>,
}

impl ResponseCache {
    pub fn new(paths: Paths) -> Self {
        Self {
            paths,
            max_memory_entries: None,
            memory: Mutex::new(MemoryLayer::default()),
        }
    }

    pub fn with_memory_cap(mut self, cap: Option<usize>) -> Self {
        self.max_memory_entries = cap;
        self
    }

    fn entry_path(&self, role: Role, hash: &str) -> PathBuf {
        self.paths.role_cache_dir(role).join(format!("{}.json", hash))
    }

    pub fn get(&self, role: Role, prompt: &str) -> Option<String> {
        let hash = prompt_hash(prompt);
        let key = (role, hash.clone());

        {
            let memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = memory.entries.get(&key) {
                return Some(hit.clone());
            }
        }

        let path = self.entry_path(role, &hash);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CachedResponse>(&content) {
            Ok(entry) => {
                let mut memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
                memory.insert(key, entry.response.clone(), self.max_memory_entries);
                Some(entry.response)
            }
            Err(e) => {
                debug!(role = %role, error = %e, "Corrupt cache entry treated as miss");
                None
            }
        }
    }

    pub fn put(&self, role: Role, prompt: &str, response: &str) -> Result<()> {
        let hash = prompt_hash(prompt);
        let entry = CachedResponse {
            role,
            prompt_hash: hash.clone(),
            response: response.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let path = self.entry_path(role, &hash);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let written = std::fs::write(&tmp_path, serde_json::to_string(&entry)?)
            .and_then(|()| std::fs::rename(&tmp_path, &path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        let mut memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
        memory.insert((role, hash), entry.response, self.max_memory_entries);
        Ok(())
    }

    /// Number of entries currently held in memory.
    pub fn memory_len(&self) -> usize {
        self.memory
            .lock()
            .map(|m| m.entries.len())
            .unwrap_or(0)
    }
}

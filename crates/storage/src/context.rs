use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::{Deref, DerefMut};
use std::path::Path;

use tracing::{debug, info, warn};
use tusker_core::{AgentContext, Paths, Result, Role};

/// Short- and long-term memory for the roles owned by one runtime.
///
/// Each role's context is mutated only by that role's runtime. Durable copies
/// live at `contexts/<role>_context.json` and are written atomically.
pub struct ContextStore {
    paths: Paths,
    contexts: HashMap<Role, AgentContext>,
}

impl ContextStore {
    pub fn new(paths: Paths) -> Self {
        Self {
            paths,
            contexts: HashMap::new(),
        }
    }

    fn context_mut(&mut self, role: Role) -> &mut AgentContext {
        self.contexts.entry(role).or_default()
    }

    /// Push onto the short-term window, evicting the oldest entry past 20.
    pub fn append_short_term(&mut self, role: Role, entry: impl Into<String>) {
        self.context_mut(role).push_short_term(entry);
    }

    /// Push onto the last-actions window, evicting the oldest entry past 10.
    pub fn record_last_action(&mut self, role: Role, action: impl Into<String>) {
        self.context_mut(role).push_last_action(action);
    }

    pub fn remember(&mut self, role: Role, key: &str, value: serde_json::Value) {
        self.context_mut(role)
            .long_term_memory
            .insert(key.to_string(), value);
    }

    pub fn recall(&self, role: Role, key: &str) -> Option<&serde_json::Value> {
        self.contexts
            .get(&role)
            .and_then(|c| c.long_term_memory.get(key))
    }

    /// Read-only copy, used to build prompts and RL state.
    pub fn snapshot(&self, role: Role) -> AgentContext {
        self.contexts.get(&role).cloned().unwrap_or_default()
    }

    pub fn persist(&self, role: Role) -> Result<()> {
        let path = self.paths.context_file(role);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let empty = AgentContext::default();
        let context = self.contexts.get(&role).unwrap_or(&empty);

        let tmp_path = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, context)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            e
        })?;

        debug!(role = %role, path = %path.display(), "Context persisted");
        Ok(())
    }

    /// Load the durable copy. A missing or unreadable file yields a fresh context.
    pub fn restore(&mut self, role: Role) -> &AgentContext {
        let path = self.paths.context_file(role);
        let context = match read_context(&path) {
            Ok(Some(mut ctx)) => {
                ctx.enforce_bounds();
                info!(
                    role = %role,
                    short_term = ctx.short_term_memory.len(),
                    last_actions = ctx.last_actions.len(),
                    "Context restored"
                );
                ctx
            }
            Ok(None) => {
                debug!(role = %role, "No saved context, starting fresh");
                AgentContext::default()
            }
            Err(e) => {
                warn!(role = %role, error = %e, "Saved context unreadable, starting fresh");
                AgentContext::default()
            }
        };
        self.contexts.insert(role, context);
        self.context_mut(role)
    }
}

fn read_context(path: &Path) -> Result<Option<AgentContext>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Holds a role's [`ContextStore`] and persists it when released.
///
/// Dropping the guard persists too, so memory is flushed even when the
/// owning loop unwinds from a panic.
pub struct ContextGuard {
    store: ContextStore,
    role: Role,
    released: bool,
}

impl ContextGuard {
    /// Restore `role` from disk and take ownership of the store.
    pub fn acquire(mut store: ContextStore, role: Role) -> Self {
        store.restore(role);
        Self {
            store,
            role,
            released: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Persist now and give the store back.
    pub fn release(mut self) -> Result<ContextStore> {
        self.released = true;
        self.store.persist(self.role)?;
        let paths = self.store.paths.clone();
        Ok(std::mem::replace(&mut self.store, ContextStore::new(paths)))
    }
}

impl Deref for ContextGuard {
    type Target = ContextStore;

    fn deref(&self) -> &ContextStore {
        &self.store
    }
}

impl DerefMut for ContextGuard {
    fn deref_mut(&mut self) -> &mut ContextStore {
        &mut self.store
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.store.persist(self.role) {
            warn!(role = %self.role, error = %e, "Failed to persist context on release");
        }
    }
}

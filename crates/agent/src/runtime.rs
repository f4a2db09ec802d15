use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};
use tusker_core::{Result, Role};
use tusker_storage::{ContextGuard, ContextStore};

use crate::roles::{handler_for, RoleHandler};
use crate::services::AgentServices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Initializing,
    Ready,
    Running,
    ShuttingDown,
    Stopped,
}

/// Drives one role: restores its memory, drains its topics in bounded ticks
/// and persists memory on the way out.
pub struct AgentRuntime {
    role: Role,
    services: Arc<AgentServices>,
    handler: Box<dyn RoleHandler>,
    state: RuntimeState,
}

impl AgentRuntime {
    pub fn new(role: Role, services: Arc<AgentServices>) -> Self {
        let handler = handler_for(role, services.clone());
        Self::with_handler(handler, services)
    }

    pub fn with_handler(handler: Box<dyn RoleHandler>, services: Arc<AgentServices>) -> Self {
        Self {
            role: handler.role(),
            services,
            handler,
            state: RuntimeState::Initializing,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    fn transition(&mut self, next: RuntimeState) {
        debug!(role = %self.role, from = ?self.state, to = ?next, "Runtime state change");
        self.state = next;
    }

    /// Run until `shutdown_rx` fires or the bus is closed.
    ///
    /// Shutdown is observed between messages only; a running action sequence
    /// always completes first.
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let runtime = &self.services.config.runtime;
        let tick = runtime.tick();
        let batch_size = runtime.batch_size.max(1);

        let mut subscription = self.services.bus.subscribe_many(self.handler.topics());
        let mut guard = ContextGuard::acquire(ContextStore::new(self.services.paths.clone()), self.role);
        let backend_ready = self.services.gateway.available().await;
        self.transition(RuntimeState::Ready);
        info!(
            role = %self.role,
            backend = backend_ready,
            topics = self.handler.topics().len(),
            "Agent runtime ready"
        );

        self.transition(RuntimeState::Running);
        let mut batch = Vec::with_capacity(batch_size);
        loop {
            match shutdown_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }

            let first = tokio::select! {
                _ = shutdown_rx.recv() => break,
                next = tokio::time::timeout(tick, subscription.recv()) => next,
            };
            let first = match first {
                Err(_) => continue,
                Ok(None) => {
                    info!(role = %self.role, "Message bus closed");
                    break;
                }
                Ok(Some(envelope)) => envelope,
            };

            batch.push(first);
            while batch.len() < batch_size {
                match subscription.try_recv() {
                    Some(envelope) => batch.push(envelope),
                    None => break,
                }
            }

            for envelope in batch.drain(..) {
                let topic = envelope.topic;
                if let Err(e) = self.handler.handle(&mut guard, envelope).await {
                    warn!(role = %self.role, topic = %topic, error = %e, "Handler error");
                }
            }
        }

        self.transition(RuntimeState::ShuttingDown);
        let result = guard.release().map(|_| ());
        if let Err(e) = &result {
            warn!(role = %self.role, error = %e, "Failed to persist context at shutdown");
        }
        self.transition(RuntimeState::Stopped);
        info!(role = %self.role, "Agent runtime stopped");
        result
    }
}

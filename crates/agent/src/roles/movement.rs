use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use tusker_core::{Action, ActionCategory, Envelope, Payload, Result, Role, Topic};
use tusker_storage::ContextStore;

use super::RoleHandler;
use crate::enrich::{Enricher, MovementStrategy};
use crate::services::AgentServices;

const TOPICS: &[Topic] = &[Topic::MovementCmd, Topic::SceneDescription];

/// Refines movement commands into drive parameters for the current terrain.
pub struct MovementHandler {
    services: Arc<AgentServices>,
    enricher: Enricher,
    latest_scene: Option<Value>,
}

impl MovementHandler {
    pub fn new(services: Arc<AgentServices>) -> Self {
        Self {
            enricher: Enricher::new(services.gateway.clone()),
            latest_scene: None,
            services,
        }
    }

    fn prompt(&self, action: &str) -> String {
        let environment = self
            .latest_scene
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "Suggest optimal movement parameters for a robotic elephant based on:\n\
             - Command: {}\n\
             - Environment: {}\n\n\
             Consider:\n\
             - Speed adjustments\n\
             - Step patterns\n\
             - Obstacle navigation\n\n\
             Return JSON with:\n\
             - action (must match original command)\n\
             - speed_factor (0.1-1.0)\n\
             - step_pattern (description)",
            action, environment
        )
    }

    async fn strategy(&self, action: &str) -> MovementStrategy {
        if !self.enricher.available().await {
            return MovementStrategy::default_for(action);
        }
        match self
            .enricher
            .json::<MovementStrategy>(Role::Movement, &self.prompt(action))
            .await
        {
            Some(strategy) => strategy.validated(action),
            None => MovementStrategy::default_for(action),
        }
    }
}

#[async_trait]
impl RoleHandler for MovementHandler {
    fn role(&self) -> Role {
        Role::Movement
    }

    fn topics(&self) -> &'static [Topic] {
        TOPICS
    }

    async fn handle(&mut self, store: &mut ContextStore, envelope: Envelope) -> Result<()> {
        match envelope.topic {
            Topic::SceneDescription => {
                if let Payload::Json(scene) = envelope.payload {
                    self.latest_scene = Some(scene);
                }
            }
            Topic::MovementCmd => {
                let name = envelope.payload.as_text().unwrap_or_default().trim();
                let Some(action) = Action::parse(name)
                    .filter(|a| a.category() == ActionCategory::Movement)
                else {
                    warn!(command = %name, "Not a movement action, ignoring");
                    return Ok(());
                };

                let strategy = self.strategy(action.as_str()).await;
                store.append_short_term(
                    Role::Movement,
                    format!("Movement strategy: {} -> {}", action, strategy.step_pattern),
                );
                store.record_last_action(Role::Movement, action.as_str());
                debug!(
                    action = %action,
                    speed_factor = strategy.speed_factor,
                    "Movement strategy ready"
                );
                self.services
                    .bus
                    .publish(Topic::MovementDrive, Payload::json(&strategy)?)?;
            }
            other => debug!(topic = %other, "Ignoring message"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_services, ScriptedBackend};

    fn movement(action: &str) -> Envelope {
        Envelope {
            topic: Topic::MovementCmd,
            payload: Payload::text(action),
            published_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_backend_strategy_is_clamped() {
        let (services, backend, _dir) = test_services(Some(ScriptedBackend::replying(
            r#"{"action":"forward","speed_factor":4.0,"step_pattern":"slow on mud"}"#,
        )));
        let mut drive = services.bus.subscribe(Topic::MovementDrive);
        let mut handler = MovementHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());

        let scene = Envelope {
            topic: Topic::SceneDescription,
            payload: Payload::Json(serde_json::json!({"environment": "muddy"})),
            published_at_ms: 0,
        };
        handler.handle(&mut store, scene).await.unwrap();
        handler.handle(&mut store, movement("forward")).await.unwrap();

        let strategy: MovementStrategy = drive.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(strategy.speed_factor, 1.0);
        assert_eq!(strategy.step_pattern, "slow on mud");
        assert!(backend.unwrap().prompts()[0].contains("muddy"));
        assert_eq!(
            store.snapshot(Role::Movement).last_actions.back().map(String::as_str),
            Some("forward")
        );
    }

    #[tokio::test]
    async fn test_mismatched_strategy_falls_back() {
        let (services, _backend, _dir) = test_services(Some(ScriptedBackend::replying(
            r#"{"action":"backward","speed_factor":0.5,"step_pattern":"shuffle"}"#,
        )));
        let mut drive = services.bus.subscribe(Topic::MovementDrive);
        let mut handler = MovementHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());

        handler.handle(&mut store, movement("turn_left")).await.unwrap();
        let strategy: MovementStrategy = drive.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(strategy, MovementStrategy::default_for("turn_left"));
    }

    #[tokio::test]
    async fn test_default_without_backend() {
        let (services, _none, _dir) = test_services(None);
        let mut drive = services.bus.subscribe(Topic::MovementDrive);
        let mut handler = MovementHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());

        handler.handle(&mut store, movement("stop")).await.unwrap();
        handler.handle(&mut store, movement("ear_flap")).await.unwrap();

        let strategy: MovementStrategy = drive.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(strategy, MovementStrategy::default_for("stop"));
        assert!(drive.try_recv().is_none());
    }
}

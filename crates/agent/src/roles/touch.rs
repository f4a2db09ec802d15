use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use tusker_core::{
    Envelope, Payload, Result, Role, Topic, TouchEvent, TouchReading, TouchResponse,
};
use tusker_storage::ContextStore;

use super::RoleHandler;
use crate::enrich::Enricher;
use crate::services::AgentServices;

const TOPICS: &[Topic] = &[Topic::TouchReading];

/// Recent touches included when interpreting a new one.
const RECENT_TOUCHES: usize = 3;

/// Classifies touch readings into how the elephant should respond.
pub struct TouchHandler {
    services: Arc<AgentServices>,
    enricher: Enricher,
}

impl TouchHandler {
    pub fn new(services: Arc<AgentServices>) -> Self {
        Self {
            enricher: Enricher::new(services.gateway.clone()),
            services,
        }
    }

    async fn interpret(&self, store: &mut ContextStore, reading: &TouchReading) -> TouchResponse {
        if !self.enricher.available().await {
            return TouchResponse::Basic;
        }

        let recent = store
            .snapshot(Role::Touch)
            .recent_short_term(RECENT_TOUCHES);
        let prompt = format!(
            "Interpret this touch pattern for a robotic elephant:\n\
             Location: {}\n\
             Duration: {}\n\
             Intensity: {}\n\
             Recent touches: {:?}\n\n\
             Suggest an appropriate response from:\n\
             - affectionate (gentle trunk movement)\n\
             - playful (ear flapping and tail wagging)\n\
             - defensive (move back slightly)\n\
             - curious (turn toward touch)\n\
             - none (no response)\n\n\
             Return only the response type:",
            reading.location, reading.duration, reading.intensity, recent
        );

        let response = match self.enricher.text(Role::Touch, &prompt).await {
            Some(text) => TouchResponse::parse(&text).unwrap_or_else(|| {
                warn!(response = %text, "Unrecognised touch response, ignoring touch");
                TouchResponse::Ignore
            }),
            None => TouchResponse::Ignore,
        };
        store.append_short_term(
            Role::Touch,
            format!("Touch at {} -> {}", reading.location, response.as_str()),
        );
        response
    }
}

#[async_trait]
impl RoleHandler for TouchHandler {
    fn role(&self) -> Role {
        Role::Touch
    }

    fn topics(&self) -> &'static [Topic] {
        TOPICS
    }

    async fn handle(&mut self, store: &mut ContextStore, envelope: Envelope) -> Result<()> {
        let reading: TouchReading = envelope.payload.decode()?;
        let response = self.interpret(store, &reading).await;
        debug!(location = %reading.location, response = %response.as_str(), "Touch interpreted");

        let event = TouchEvent {
            location: reading.location,
            response,
        };
        self.services
            .bus
            .publish(Topic::TouchEvent, Payload::json(&event)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_services, ScriptedBackend};

    fn touch(location: &str, intensity: f64) -> Envelope {
        let reading = TouchReading {
            location: location.to_string(),
            duration: 1.5,
            intensity,
        };
        Envelope {
            topic: Topic::TouchReading,
            payload: Payload::json(&reading).unwrap(),
            published_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_backend_classification() {
        let (services, _backend, _dir) =
            test_services(Some(ScriptedBackend::replying(" Playful\n")));
        let mut events = services.bus.subscribe(Topic::TouchEvent);
        let mut handler = TouchHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());

        handler.handle(&mut store, touch("trunk", 0.4)).await.unwrap();

        let event: TouchEvent = events.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(event.response, TouchResponse::Playful);
        assert_eq!(
            store.snapshot(Role::Touch).short_term_memory.back().map(String::as_str),
            Some("Touch at trunk -> playful")
        );
    }

    #[tokio::test]
    async fn test_basic_response_without_backend() {
        let (services, _none, _dir) = test_services(None);
        let mut events = services.bus.subscribe(Topic::TouchEvent);
        let mut handler = TouchHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());

        handler.handle(&mut store, touch("head", 0.9)).await.unwrap();
        let event: TouchEvent = events.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(event.response, TouchResponse::Basic);
    }

    #[tokio::test]
    async fn test_garbage_answer_is_none() {
        let (services, _backend, _dir) =
            test_services(Some(ScriptedBackend::replying("maybe tickle it back?")));
        let mut events = services.bus.subscribe(Topic::TouchEvent);
        let mut handler = TouchHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());

        handler.handle(&mut store, touch("tail", 0.2)).await.unwrap();
        let event: TouchEvent = events.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(event.response, TouchResponse::Ignore);
    }
}

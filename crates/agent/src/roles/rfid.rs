use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};
use tusker_core::{Envelope, Error, MahoutInfo, Payload, Result, Role, SightingSource, Topic};
use tusker_storage::ContextStore;

use super::{now_secs, RoleHandler};
use crate::enrich::{Enricher, Personalization};
use crate::services::AgentServices;

const TOPICS: &[Topic] = &[Topic::RfidTag];

/// Past interactions kept per mahout in long-term memory.
const HISTORY_LIMIT: usize = 10;
/// Past interactions shown to the backend.
const PROMPT_HISTORY: usize = 3;

fn history_key(tag_id: i64) -> String {
    format!("mahout.{}", tag_id)
}

/// Recognises mahouts by tag and personalises the interaction from history.
pub struct RfidHandler {
    services: Arc<AgentServices>,
    enricher: Enricher,
}

impl RfidHandler {
    pub fn new(services: Arc<AgentServices>) -> Self {
        Self {
            enricher: Enricher::new(services.gateway.clone()),
            services,
        }
    }

    fn history(store: &ContextStore, tag_id: i64) -> Vec<Value> {
        store
            .recall(Role::Rfid, &history_key(tag_id))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    async fn personalize(&self, tag_id: i64, history: &[Value]) -> Personalization {
        if !self.enricher.available().await {
            return Personalization::standard();
        }
        let recent = if history.is_empty() {
            "None".to_string()
        } else {
            let skip = history.len().saturating_sub(PROMPT_HISTORY);
            Value::Array(history[skip..].to_vec()).to_string()
        };
        let prompt = format!(
            "Generate a personalized interaction for mahout {} based on:\n\
             Previous interactions: {}\n\n\
             Suggest:\n\
             - greeting_style (formal, playful, affectionate)\n\
             - preferred_gestures (list)\n\
             - interaction_length (short, medium, long)\n\n\
             Return JSON with these keys: greeting_style, preferred_gestures, interaction_length",
            tag_id, recent
        );
        self.enricher
            .json::<Personalization>(Role::Rfid, &prompt)
            .await
            .unwrap_or_else(Personalization::standard)
    }
}

#[async_trait]
impl RoleHandler for RfidHandler {
    fn role(&self) -> Role {
        Role::Rfid
    }

    fn topics(&self) -> &'static [Topic] {
        TOPICS
    }

    async fn handle(&mut self, store: &mut ContextStore, envelope: Envelope) -> Result<()> {
        let tag_id = envelope
            .payload
            .as_int()
            .ok_or_else(|| Error::Validation("rfid tag must be an integer".to_string()))?;
        info!(tag_id = tag_id, "Mahout tag read");

        let sighting = MahoutInfo {
            tag_id: Some(tag_id),
            confidence: 1.0,
            source: Some(SightingSource::Rfid),
            ..MahoutInfo::default()
        };
        if let Err(e) = self
            .services
            .bus
            .publish(Topic::MahoutDetected, Payload::json(&sighting)?)
        {
            warn!(error = %e, "Failed to publish mahout sighting");
        }

        let mut history = Self::history(store, tag_id);
        let personalization = self.personalize(tag_id, &history).await;

        store.append_short_term(
            Role::Rfid,
            format!(
                "Personalized interaction for {}: {}",
                tag_id, personalization.greeting_style
            ),
        );
        history.push(json!({
            "greeting_style": personalization.greeting_style,
            "timestamp": now_secs(),
        }));
        let skip = history.len().saturating_sub(HISTORY_LIMIT);
        store.remember(Role::Rfid, &history_key(tag_id), Value::Array(history.split_off(skip)));

        let mut body = serde_json::to_value(&personalization)?;
        body["mahout_id"] = json!(tag_id);
        self.services
            .bus
            .publish(Topic::Personalization, Payload::Json(body))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_services, ScriptedBackend};

    fn tag(id: i64) -> Envelope {
        Envelope {
            topic: Topic::RfidTag,
            payload: Payload::Int(id),
            published_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_personalization_from_backend() {
        let (services, backend, _dir) = test_services(Some(ScriptedBackend::replying(
            r#"{"greeting_style":"playful","preferred_gestures":["tail_wag"],"interaction_length":"long"}"#,
        )));
        let backend = backend.unwrap();
        let mut mahout = services.bus.subscribe(Topic::MahoutDetected);
        let mut personal = services.bus.subscribe(Topic::Personalization);
        let mut handler = RfidHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());

        handler.handle(&mut store, tag(42)).await.unwrap();

        let seen: MahoutInfo = mahout.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(seen.tag_id, Some(42));
        let Payload::Json(body) = personal.try_recv().unwrap().payload else {
            panic!("personalization must be JSON");
        };
        assert_eq!(body["greeting_style"], "playful");
        assert_eq!(body["mahout_id"], 42);
        assert!(backend.prompts()[0].contains("Previous interactions: None"));

        handler.handle(&mut store, tag(42)).await.unwrap();
        assert!(backend.prompts()[1].contains("playful"));
        assert_eq!(RfidHandler::history(&store, 42).len(), 2);
    }

    #[tokio::test]
    async fn test_standard_without_backend() {
        let (services, _none, _dir) = test_services(None);
        let mut personal = services.bus.subscribe(Topic::Personalization);
        let mut handler = RfidHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());

        handler.handle(&mut store, tag(7)).await.unwrap();
        let Payload::Json(body) = personal.try_recv().unwrap().payload else {
            panic!("personalization must be JSON");
        };
        assert_eq!(body["greeting_style"], "standard");
        assert_eq!(body["preferred_gestures"], json!(["ear_flap"]));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let (services, _none, _dir) = test_services(None);
        let mut handler = RfidHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());
        for _ in 0..15 {
            handler.handle(&mut store, tag(3)).await.unwrap();
        }
        assert_eq!(RfidHandler::history(&store, 3).len(), HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn test_non_integer_tag_is_rejected() {
        let (services, _none, _dir) = test_services(None);
        let mut handler = RfidHandler::new(services.clone());
        let mut store = ContextStore::new(services.paths.clone());
        let bad = Envelope {
            topic: Topic::RfidTag,
            payload: Payload::text("42"),
            published_at_ms: 0,
        };
        assert!(handler.handle(&mut store, bad).await.is_err());
    }
}

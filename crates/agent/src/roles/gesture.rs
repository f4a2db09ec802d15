use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use tusker_core::{Action, ActionCategory, Envelope, Payload, Result, Role, Topic};
use tusker_storage::ContextStore;

use super::RoleHandler;
use crate::enrich::{parse_json, EmotionReading, Enricher, GestureStyle};
use crate::services::AgentServices;

const TOPICS: &[Topic] = &[Topic::GestureCmd, Topic::EmotionDetected];

/// Emotion detections arrive as JSON text; plain words are accepted too.
fn emotion_from(text: &str) -> Option<String> {
    let emotion = match parse_json::<EmotionReading>(text) {
        Some(reading) => reading.dominant_emotion,
        None => text.trim().to_string(),
    };
    let emotion = emotion.trim().to_lowercase();
    (!emotion.is_empty()).then_some(emotion)
}

/// Shapes gestures to the mood of the people around the elephant.
pub struct GestureHandler {
    services: Arc<AgentServices>,
    enricher: Enricher,
    emotional_state: String,
}

impl GestureHandler {
    pub fn new(services: Arc<AgentServices>) -> Self {
        Self {
            enricher: Enricher::new(services.gateway.clone()),
            emotional_state: "neutral".to_string(),
            services,
        }
    }

    pub fn emotional_state(&self) -> &str {
        &self.emotional_state
    }

    async fn style(&self, gesture: &str) -> Option<GestureStyle> {
        if !self.enricher.available().await {
            return None;
        }
        let prompt = format!(
            "Adjust this robotic elephant gesture for the current emotional context:\n\
             - Base gesture: {}\n\
             - Current emotion: {}\n\n\
             Suggest modifications to:\n\
             - Speed of movement\n\
             - Amplitude\n\
             - Repetition\n\n\
             Return JSON with:\n\
             - gesture (name)\n\
             - speed_factor (0.1-2.0)\n\
             - amplitude_factor (0.1-2.0)\n\
             - repeat_count (1-5)",
            gesture, self.emotional_state
        );
        self.enricher
            .json::<GestureStyle>(Role::Gesture, &prompt)
            .await
            .map(|style| style.validated(gesture))
    }
}

#[async_trait]
impl RoleHandler for GestureHandler {
    fn role(&self) -> Role {
        Role::Gesture
    }

    fn topics(&self) -> &'static [Topic] {
        TOPICS
    }

    async fn handle(&mut self, store: &mut ContextStore, envelope: Envelope) -> Result<()> {
        match envelope.topic {
            Topic::EmotionDetected => {
                let text = envelope.payload.as_text().unwrap_or_default();
                if let Some(emotion) = emotion_from(text) {
                    info!(emotion = %emotion, "Emotional context updated");
                    self.emotional_state = emotion;
                }
            }
            Topic::GestureCmd => {
                let name = envelope.payload.as_text().unwrap_or_default().trim();
                let Some(action) = Action::parse(name)
                    .filter(|a| a.category() == ActionCategory::Gesture)
                else {
                    warn!(command = %name, "Not a gesture action, ignoring");
                    return Ok(());
                };

                let style = match self.style(action.as_str()).await {
                    Some(style) => {
                        store.append_short_term(
                            Role::Gesture,
                            format!(
                                "Adapted {} for {}: speed {:.1}, amplitude {:.1}, x{}",
                                action,
                                self.emotional_state,
                                style.speed_factor,
                                style.amplitude_factor,
                                style.repeat_count
                            ),
                        );
                        style
                    }
                    None => GestureStyle::default_for(action.as_str()),
                };
                store.record_last_action(Role::Gesture, action.as_str());
                debug!(gesture = %action, repeat = style.repeat_count, "Gesture style ready");
                self.services
                    .bus
                    .publish(Topic::GestureDrive, Payload::json(&style)?)?;
            }
            other => debug!(topic = %other, "Ignoring message"),
        }
        Ok(())
    }
}

//! Structured enrichments: the backend is asked for a small JSON object, the
//! answer is parsed strictly and clamped into range. Anything unparsable
//! falls back to a fixed default.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use tusker_core::Role;

use crate::gateway::BackendGateway;

/// Parse a JSON object out of backend text, tolerating markdown fences and
/// prose around the object.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str(unfenced.trim()) {
        return Some(value);
    }
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&unfenced[start..=end]).ok()
}

fn one() -> f64 {
    1.0
}

fn one_repeat() -> u32 {
    1
}

fn default_pattern() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementStrategy {
    pub action: String,
    #[serde(default = "one")]
    pub speed_factor: f64,
    #[serde(default = "default_pattern")]
    pub step_pattern: String,
}

impl MovementStrategy {
    pub fn default_for(action: &str) -> Self {
        Self {
            action: action.to_string(),
            speed_factor: 1.0,
            step_pattern: default_pattern(),
        }
    }

    /// Keep the strategy only if it is for the commanded action.
    pub fn validated(self, action: &str) -> Self {
        if self.action != action {
            warn!(expected = %action, got = %self.action, "Strategy for a different action, using default");
            return Self::default_for(action);
        }
        Self {
            speed_factor: self.speed_factor.clamp(0.1, 1.0),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureStyle {
    pub gesture: String,
    #[serde(default = "one")]
    pub speed_factor: f64,
    #[serde(default = "one")]
    pub amplitude_factor: f64,
    #[serde(default = "one_repeat")]
    pub repeat_count: u32,
}

impl GestureStyle {
    pub fn default_for(gesture: &str) -> Self {
        Self {
            gesture: gesture.to_string(),
            speed_factor: 1.0,
            amplitude_factor: 1.0,
            repeat_count: 1,
        }
    }

    pub fn validated(self, gesture: &str) -> Self {
        Self {
            gesture: gesture.to_string(),
            speed_factor: self.speed_factor.clamp(0.1, 2.0),
            amplitude_factor: self.amplitude_factor.clamp(0.1, 2.0),
            repeat_count: self.repeat_count.clamp(1, 5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personalization {
    pub greeting_style: String,
    #[serde(default)]
    pub preferred_gestures: Vec<String>,
    pub interaction_length: String,
}

impl Personalization {
    pub fn standard() -> Self {
        Self {
            greeting_style: "standard".to_string(),
            preferred_gestures: vec!["ear_flap".to_string()],
            interaction_length: "short".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAnalysis {
    pub environment: String,
    #[serde(default)]
    pub objects: Value,
    #[serde(default)]
    pub obstacles: Value,
    #[serde(default)]
    pub emotional_tone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    pub dominant_emotion: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
}

/// Asks the backend for JSON enrichments through the shared cache.
pub struct Enricher {
    gateway: Arc<BackendGateway>,
}

impl Enricher {
    pub fn new(gateway: Arc<BackendGateway>) -> Self {
        Self { gateway }
    }

    pub async fn available(&self) -> bool {
        self.gateway.available().await
    }

    /// `None` when the backend is absent, timed out, or answered garbage.
    pub async fn json<T: DeserializeOwned>(&self, role: Role, prompt: &str) -> Option<T> {
        let answer = self.gateway.ask(role, prompt).await;
        let raw = answer.text()?;
        let parsed = parse_json(raw);
        if parsed.is_none() {
            warn!(role = %role, response_len = raw.len(), "Malformed JSON from backend");
        }
        parsed
    }

    /// Raw text answer, trimmed. Empty answers count as none.
    pub async fn text(&self, role: Role, prompt: &str) -> Option<String> {
        let answer = self.gateway.ask(role, prompt).await;
        answer
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_services, ScriptedBackend};

    #[test]
    fn test_parse_json_fenced_and_wrapped() {
        let fenced = "```json\n{\"dominant_emotion\": \"happy\", \"confidence\": 0.9}\n```";
        let reading: EmotionReading = parse_json(fenced).unwrap();
        assert_eq!(reading.dominant_emotion, "happy");

        let wrapped = "Sure! {\"greeting_style\": \"playful\", \"interaction_length\": \"long\"} Enjoy.";
        let p: Personalization = parse_json(wrapped).unwrap();
        assert_eq!(p.greeting_style, "playful");
        assert!(p.preferred_gestures.is_empty());

        assert!(parse_json::<EmotionReading>("no json here").is_none());
        assert!(parse_json::<EmotionReading>("} backwards {").is_none());
    }

    #[test]
    fn test_movement_strategy_clamped_and_checked() {
        let s: MovementStrategy =
            parse_json(r#"{"action":"forward","speed_factor":3.5,"step_pattern":"careful"}"#).unwrap();
        let s = s.validated("forward");
        assert_eq!(s.speed_factor, 1.0);
        assert_eq!(s.step_pattern, "careful");

        let other: MovementStrategy =
            parse_json(r#"{"action":"backward","speed_factor":0.5}"#).unwrap();
        assert_eq!(other.validated("forward"), MovementStrategy::default_for("forward"));
    }

    #[test]
    fn test_gesture_style_clamped() {
        let g: GestureStyle = parse_json(
            r#"{"gesture":"wave","speed_factor":0.01,"amplitude_factor":9,"repeat_count":12}"#,
        )
        .unwrap();
        let g = g.validated("ear_flap");
        assert_eq!(g.gesture, "ear_flap");
        assert_eq!(g.speed_factor, 0.1);
        assert_eq!(g.amplitude_factor, 2.0);
        assert_eq!(g.repeat_count, 5);
    }

    #[tokio::test]
    async fn test_malformed_answer_is_none() {
        let (services, _backend, _dir) =
            test_services(Some(ScriptedBackend::replying("I think it is sunny")));
        let enricher = Enricher::new(services.gateway.clone());
        assert!(enricher.json::<SceneAnalysis>(Role::Vision, "scene").await.is_none());
    }

    #[tokio::test]
    async fn test_absent_backend_is_none() {
        let (services, _none, _dir) = test_services(None);
        let enricher = Enricher::new(services.gateway.clone());
        assert!(!enricher.available().await);
        assert!(enricher.text(Role::Audio, "hello").await.is_none());
    }
}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Wire shape a topic carries. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Text,
    Json,
    Int,
}

/// The named channels agents coordinate over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    CommandReceived,
    MahoutDetected,
    ObstacleDetected,
    TouchEvent,
    MovementCmd,
    GestureCmd,
    Status,
    LlmDebug,
    SpeechText,
    Conversation,
    SpeechOut,
    SceneObservation,
    SceneDescription,
    EmotionDetected,
    TouchReading,
    RfidTag,
    Personalization,
    MovementDrive,
    GestureDrive,
    Feedback,
}

impl Topic {
    pub const ALL: [Topic; 20] = [
        Topic::CommandReceived,
        Topic::MahoutDetected,
        Topic::ObstacleDetected,
        Topic::TouchEvent,
        Topic::MovementCmd,
        Topic::GestureCmd,
        Topic::Status,
        Topic::LlmDebug,
        Topic::SpeechText,
        Topic::Conversation,
        Topic::SpeechOut,
        Topic::SceneObservation,
        Topic::SceneDescription,
        Topic::EmotionDetected,
        Topic::TouchReading,
        Topic::RfidTag,
        Topic::Personalization,
        Topic::MovementDrive,
        Topic::GestureDrive,
        Topic::Feedback,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Topic::CommandReceived => "/elephant/command_received",
            Topic::MahoutDetected => "/elephant/mahout_detected",
            Topic::ObstacleDetected => "/elephant/obstacle_detected",
            Topic::TouchEvent => "/elephant/touch_event",
            Topic::MovementCmd => "/elephant/movement_cmd",
            Topic::GestureCmd => "/elephant/gesture_cmd",
            Topic::Status => "/elephant/status",
            Topic::LlmDebug => "/elephant/llm_debug",
            Topic::SpeechText => "/elephant/speech_text",
            Topic::Conversation => "/elephant/conversation",
            Topic::SpeechOut => "/elephant/speech_out",
            Topic::SceneObservation => "/elephant/scene_observation",
            Topic::SceneDescription => "/elephant/scene_description",
            Topic::EmotionDetected => "/elephant/emotion_detected",
            Topic::TouchReading => "/elephant/touch_reading",
            Topic::RfidTag => "/elephant/rfid_tag",
            Topic::Personalization => "/elephant/personalization",
            Topic::MovementDrive => "/elephant/movement_drive",
            Topic::GestureDrive => "/elephant/gesture_drive",
            Topic::Feedback => "/elephant/feedback",
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Topic::ObstacleDetected
            | Topic::MovementCmd
            | Topic::GestureCmd
            | Topic::SpeechOut
            | Topic::EmotionDetected => PayloadKind::Text,
            Topic::RfidTag => PayloadKind::Int,
            _ => PayloadKind::Json,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Topic::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single message body travelling over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
    Int(i64),
}

impl Payload {
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Text(s.into())
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Text(_) => PayloadKind::Text,
            Payload::Json(_) => PayloadKind::Json,
            Payload::Int(_) => PayloadKind::Int,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Decode a JSON payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Payload::Json(v) => Ok(serde_json::from_value(v.clone())?),
            other => Err(Error::Validation(format!(
                "expected JSON payload, got {:?}",
                other.kind()
            ))),
        }
    }
}

/// A payload together with the topic it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub topic: Topic,
    pub payload: Payload,
    pub published_at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Command, CommandSource};

    #[test]
    fn test_topic_names_unique() {
        let mut names: Vec<&str> = Topic::ALL.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Topic::ALL.len());
        assert_eq!(
            Topic::from_name("/elephant/movement_cmd"),
            Some(Topic::MovementCmd)
        );
    }

    #[test]
    fn test_decode_json_payload() {
        let cmd = Command::new("turn left", 0.9, CommandSource::Voice);
        let payload = Payload::json(&cmd).unwrap();
        assert_eq!(payload.kind(), PayloadKind::Json);
        let back: Command = payload.decode().unwrap();
        assert_eq!(back.text, "turn left");
    }

    #[test]
    fn test_decode_rejects_text() {
        let payload = Payload::text("stop");
        assert!(payload.decode::<Command>().is_err());
        assert_eq!(payload.as_text(), Some("stop"));
    }

    #[test]
    fn test_every_kind_has_a_topic() {
        for kind in [PayloadKind::Text, PayloadKind::Json, PayloadKind::Int] {
            assert!(Topic::ALL.iter().any(|t| t.kind() == kind), "{:?}", kind);
        }
        assert_eq!(Topic::RfidTag.kind(), PayloadKind::Int);
        assert_eq!(Topic::SpeechOut.kind(), PayloadKind::Text);
    }
}

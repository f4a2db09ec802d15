use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::message::Topic;

/// Short-term memory window per role; oldest entries are evicted first.
pub const SHORT_TERM_CAPACITY: usize = 20;

/// Number of dispatched actions remembered per role.
pub const LAST_ACTIONS_CAPACITY: usize = 10;

/// Sentinel emitted when input cannot be mapped onto the vocabulary.
pub const UNKNOWN_ACTION: &str = "unknown";

/// One of the seven agent identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Supervising,
    Vision,
    Audio,
    Movement,
    Gesture,
    Touch,
    Rfid,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Supervising,
        Role::Vision,
        Role::Audio,
        Role::Movement,
        Role::Gesture,
        Role::Touch,
        Role::Rfid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Supervising => "supervising",
            Role::Vision => "vision",
            Role::Audio => "audio",
            Role::Movement => "movement",
            Role::Gesture => "gesture",
            Role::Touch => "touch",
            Role::Rfid => "rfid",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| Error::Validation(format!("unknown role '{}'", s)))
    }
}

/// Fixed reward classes used when logging experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Movement,
    Gesture,
    Complex,
    Unknown,
}

impl ActionCategory {
    pub fn reward(&self) -> f64 {
        match self {
            ActionCategory::Movement => 0.5,
            ActionCategory::Gesture => 0.3,
            ActionCategory::Complex => 1.0,
            ActionCategory::Unknown => -0.1,
        }
    }

    /// Classify any action name. Anything outside the vocabulary is `Unknown`.
    pub fn of_name(name: &str) -> Self {
        Action::parse(name)
            .map(|a| a.category())
            .unwrap_or(ActionCategory::Unknown)
    }
}

/// Closed action vocabulary understood by the actuation drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
    TrunkRaise,
    TrunkLower,
    EarFlap,
    EyeBlink,
    TailWag,
    LookLeft,
    LookRight,
    PerformDance,
    PerformGreeting,
    GoToSleep,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Action::Forward,
        Action::Backward,
        Action::TurnLeft,
        Action::TurnRight,
        Action::Stop,
        Action::TrunkRaise,
        Action::TrunkLower,
        Action::EarFlap,
        Action::EyeBlink,
        Action::TailWag,
        Action::LookLeft,
        Action::LookRight,
        Action::PerformDance,
        Action::PerformGreeting,
        Action::GoToSleep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::Backward => "backward",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::Stop => "stop",
            Action::TrunkRaise => "trunk_raise",
            Action::TrunkLower => "trunk_lower",
            Action::EarFlap => "ear_flap",
            Action::EyeBlink => "eye_blink",
            Action::TailWag => "tail_wag",
            Action::LookLeft => "look_left",
            Action::LookRight => "look_right",
            Action::PerformDance => "perform_dance",
            Action::PerformGreeting => "perform_greeting",
            Action::GoToSleep => "go_to_sleep",
        }
    }

    /// Exact, case-sensitive lookup of a vocabulary name.
    pub fn parse(name: &str) -> Option<Self> {
        Action::ALL.iter().copied().find(|a| a.as_str() == name)
    }

    pub fn category(&self) -> ActionCategory {
        match self {
            Action::Forward
            | Action::Backward
            | Action::TurnLeft
            | Action::TurnRight
            | Action::Stop => ActionCategory::Movement,
            Action::TrunkRaise
            | Action::TrunkLower
            | Action::EarFlap
            | Action::EyeBlink
            | Action::TailWag
            | Action::LookLeft
            | Action::LookRight => ActionCategory::Gesture,
            Action::PerformDance | Action::PerformGreeting | Action::GoToSleep => {
                ActionCategory::Complex
            }
        }
    }

    /// Topic a primitive action is published on. Complex actions have none.
    pub fn topic(&self) -> Option<Topic> {
        match self.category() {
            ActionCategory::Movement => Some(Topic::MovementCmd),
            ActionCategory::Gesture => Some(Topic::GestureCmd),
            _ => None,
        }
    }

    /// Comma separated vocabulary, used when prompting the backend.
    pub fn vocabulary() -> String {
        Action::ALL
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a possibly-unresolved action, `unknown` for `None`.
pub fn action_name(action: Option<Action>) -> &'static str {
    action.map(|a| a.as_str()).unwrap_or(UNKNOWN_ACTION)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    Voice,
    Gesture,
    Touch,
    Rfid,
}

/// A sensed instruction, produced once by a sensing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub text: String,
    pub confidence: f32,
    pub timestamp_ms: i64,
    pub source: CommandSource,
}

impl Command {
    pub fn new(text: &str, confidence: f32, source: CommandSource) -> Self {
        Self {
            text: text.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source,
        }
    }

    pub fn voice(text: &str) -> Self {
        Self::new(text, 0.8, CommandSource::Voice)
    }
}

/// Sensor that produced a mahout sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SightingSource {
    Rfid,
    Face,
}

/// The currently detected handler. Overwritten in place on every detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MahoutInfo {
    #[serde(default)]
    pub tag_id: Option<i64>,
    #[serde(default)]
    pub face_recognized: bool,
    #[serde(default)]
    pub voice_recognized: bool,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub confidence: f64,
    /// Unset means the update describes the whole view.
    #[serde(default)]
    pub source: Option<SightingSource>,
}

impl MahoutInfo {
    pub fn present(&self) -> bool {
        self.tag_id.is_some() || self.face_recognized
    }

    /// Apply a detection. A sourced update overwrites only that sensor's fields,
    /// including clearing them; an unsourced one replaces the whole view.
    pub fn merge(&mut self, update: &MahoutInfo) {
        match update.source {
            Some(SightingSource::Rfid) => {
                self.tag_id = update.tag_id;
                self.confidence = update.confidence;
            }
            Some(SightingSource::Face) => {
                self.face_recognized = update.face_recognized;
                self.distance = update.distance;
            }
            None => *self = update.clone(),
        }
        self.source = None;
    }
}

/// Per-role interaction memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    #[serde(default)]
    pub short_term_memory: VecDeque<String>,
    #[serde(default)]
    pub long_term_memory: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub last_actions: VecDeque<String>,
}

impl AgentContext {
    pub fn push_short_term(&mut self, entry: impl Into<String>) {
        self.short_term_memory.push_back(entry.into());
        while self.short_term_memory.len() > SHORT_TERM_CAPACITY {
            self.short_term_memory.pop_front();
        }
    }

    pub fn push_last_action(&mut self, action: impl Into<String>) {
        self.last_actions.push_back(action.into());
        while self.last_actions.len() > LAST_ACTIONS_CAPACITY {
            self.last_actions.pop_front();
        }
    }

    /// The newest `n` short-term entries, oldest first.
    pub fn recent_short_term(&self, n: usize) -> Vec<String> {
        let skip = self.short_term_memory.len().saturating_sub(n);
        self.short_term_memory.iter().skip(skip).cloned().collect()
    }

    /// The newest `n` dispatched actions, oldest first.
    pub fn recent_actions(&self, n: usize) -> Vec<String> {
        let skip = self.last_actions.len().saturating_sub(n);
        self.last_actions.iter().skip(skip).cloned().collect()
    }

    /// Drop anything beyond the bounded windows, e.g. after loading an old file.
    pub fn enforce_bounds(&mut self) {
        while self.short_term_memory.len() > SHORT_TERM_CAPACITY {
            self.short_term_memory.pop_front();
        }
        while self.last_actions.len() > LAST_ACTIONS_CAPACITY {
            self.last_actions.pop_front();
        }
    }
}

/// Recognition feedback submitted by a handler through the web layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub voice_sample: Option<String>,
    pub detected_command: String,
    pub is_correct: bool,
    #[serde(default)]
    pub language: Option<String>,
}

/// A raw reading from a touch sensor pad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchReading {
    pub location: String,
    /// Seconds of contact.
    pub duration: f64,
    /// Normalised pressure in `[0, 1]`.
    pub intensity: f64,
}

/// How the touch role decided to answer a touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchResponse {
    Affectionate,
    Playful,
    Defensive,
    Curious,
    #[serde(rename = "none")]
    Ignore,
    #[serde(rename = "basic_response")]
    Basic,
}

impl TouchResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TouchResponse::Affectionate => "affectionate",
            TouchResponse::Playful => "playful",
            TouchResponse::Defensive => "defensive",
            TouchResponse::Curious => "curious",
            TouchResponse::Ignore => "none",
            TouchResponse::Basic => "basic_response",
        }
    }

    /// Parse a backend answer. Only the five interpretable responses are accepted.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "affectionate" => Some(TouchResponse::Affectionate),
            "playful" => Some(TouchResponse::Playful),
            "defensive" => Some(TouchResponse::Defensive),
            "curious" => Some(TouchResponse::Curious),
            "none" => Some(TouchResponse::Ignore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub location: String,
    pub response: TouchResponse,
}

/// What the camera collaborator reports for one analysed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneObservation {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub faces: u32,
    #[serde(default)]
    pub obstacles: Vec<String>,
}

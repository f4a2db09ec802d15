pub mod config;
pub mod error;
pub mod message;
pub mod paths;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use message::{Envelope, Payload, PayloadKind, Topic};
pub use paths::Paths;
pub use types::{
    action_name, Action, ActionCategory, AgentContext, Command, CommandSource, Feedback,
    MahoutInfo, Role, SceneObservation, SightingSource, TouchEvent, TouchReading, TouchResponse,
    LAST_ACTIONS_CAPACITY, SHORT_TERM_CAPACITY, UNKNOWN_ACTION,
};

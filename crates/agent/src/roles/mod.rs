//! Per-role message handlers driven by [`AgentRuntime`](crate::runtime::AgentRuntime).

mod audio;
mod gesture;
mod movement;
mod rfid;
mod supervising;
mod touch;
mod vision;

use std::sync::Arc;

use async_trait::async_trait;
use tusker_core::{Envelope, Result, Role, Topic};
use tusker_storage::ContextStore;

use crate::services::AgentServices;

pub use audio::AudioHandler;
pub use gesture::GestureHandler;
pub use movement::MovementHandler;
pub use rfid::RfidHandler;
pub use supervising::{CountingFeedback, FeedbackHook, SupervisingHandler};
pub use touch::TouchHandler;
pub use vision::VisionHandler;

/// Reacts to the messages of one role. Called sequentially by the runtime.
#[async_trait]
pub trait RoleHandler: Send {
    fn role(&self) -> Role;

    fn topics(&self) -> &'static [Topic];

    async fn handle(&mut self, store: &mut ContextStore, envelope: Envelope) -> Result<()>;
}

pub fn handler_for(role: Role, services: Arc<AgentServices>) -> Box<dyn RoleHandler> {
    match role {
        Role::Supervising => Box::new(SupervisingHandler::new(services)),
        Role::Vision => Box::new(VisionHandler::new(services)),
        Role::Audio => Box::new(AudioHandler::new(services)),
        Role::Movement => Box::new(MovementHandler::new(services)),
        Role::Gesture => Box::new(GestureHandler::new(services)),
        Role::Touch => Box::new(TouchHandler::new(services)),
        Role::Rfid => Box::new(RfidHandler::new(services)),
    }
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

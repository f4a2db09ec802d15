pub mod bus;
pub mod enrich;
pub mod gateway;
pub mod health;
pub mod resolver;
pub mod roles;
pub mod runtime;
pub mod sequencer;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use bus::{MessageBus, Subscription};
pub use enrich::{
    parse_json, EmotionReading, Enricher, GestureStyle, MovementStrategy, Personalization,
    SceneAnalysis,
};
pub use gateway::{Answer, BackendGateway};
pub use health::BackendHealth;
pub use resolver::{build_prompt, classify, direct_lookup, CommandResolver, Resolution, Situation, Verdict};
pub use roles::{handler_for, CountingFeedback, FeedbackHook, RoleHandler, SupervisingHandler};
pub use runtime::{AgentRuntime, RuntimeState};
pub use sequencer::{ActionSequencer, BodyState, Dispatch, Step};
pub use services::AgentServices;

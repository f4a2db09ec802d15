use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tusker_core::{Action, ActionCategory, Payload};

use crate::bus::MessageBus;

/// Posture of the supervising coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyState {
    #[default]
    Idle,
    Sleeping,
}

impl BodyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyState::Idle => "idle",
            BodyState::Sleeping => "sleeping",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Publish each action, in order, without pausing between them.
    Publish(&'static [Action]),
    Delay(Duration),
}

const fn secs(n: u64) -> Step {
    Step::Delay(Duration::from_secs(n))
}

const DANCE: &[Step] = &[
    Step::Publish(&[Action::TurnLeft]),
    secs(1),
    Step::Publish(&[Action::TurnRight]),
    secs(1),
    Step::Publish(&[Action::EarFlap, Action::TailWag]),
    secs(2),
    Step::Publish(&[Action::Stop]),
];

const GREETING: &[Step] = &[
    Step::Publish(&[Action::TrunkRaise, Action::EyeBlink]),
    secs(1),
    Step::Publish(&[Action::TrunkLower]),
];

const SLEEP: &[Step] = &[
    Step::Publish(&[Action::Stop, Action::TrunkLower]),
    secs(1),
    Step::Publish(&[Action::EyeBlink]),
];

/// The fixed script for a complex action. Primitives have none.
pub fn script(action: Action) -> Option<&'static [Step]> {
    match action {
        Action::PerformDance => Some(DANCE),
        Action::PerformGreeting => Some(GREETING),
        Action::GoToSleep => Some(SLEEP),
        _ => None,
    }
}

/// What a dispatch put on the bus.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub published: Vec<Action>,
    pub state_change: Option<BodyState>,
}

/// Publishes resolved actions onto the actuation topics.
///
/// Complex actions run their whole script before returning; nothing
/// interrupts a script once started.
pub struct ActionSequencer {
    bus: Arc<MessageBus>,
}

impl ActionSequencer {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self { bus }
    }

    pub async fn dispatch(&self, action: Option<Action>) -> Dispatch {
        let mut dispatch = Dispatch::default();
        let Some(action) = action else {
            warn!("Unknown action, nothing dispatched");
            return dispatch;
        };

        match action.category() {
            ActionCategory::Complex => {
                let Some(steps) = script(action) else {
                    return dispatch;
                };
                info!(action = %action, steps = steps.len(), "Running action sequence");
                for step in steps {
                    match step {
                        Step::Publish(actions) => {
                            for primitive in actions.iter() {
                                self.publish(*primitive, &mut dispatch);
                            }
                        }
                        Step::Delay(d) => tokio::time::sleep(*d).await,
                    }
                }
                if action == Action::GoToSleep {
                    dispatch.state_change = Some(BodyState::Sleeping);
                }
            }
            _ => self.publish(action, &mut dispatch),
        }
        dispatch
    }

    fn publish(&self, action: Action, dispatch: &mut Dispatch) {
        let Some(topic) = action.topic() else {
            return;
        };
        match self.bus.publish(topic, Payload::text(action.as_str())) {
            Ok(_) => dispatch.published.push(action),
            Err(e) => warn!(action = %action, error = %e, "Failed to publish action"),
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use tusker_core::{
    action_name, Action, Command, Envelope, Feedback, MahoutInfo, Payload, Result, Role, Topic,
    TouchEvent, TouchResponse,
};
use tusker_storage::ContextStore;

use super::{now_secs, RoleHandler};
use crate::resolver::{CommandResolver, Situation, Verdict};
use crate::sequencer::{ActionSequencer, BodyState};
use crate::services::AgentServices;

/// Entries of `last_actions` carried in an experience state.
const RL_STATE_ACTIONS: usize = 3;

const TOPICS: &[Topic] = &[
    Topic::CommandReceived,
    Topic::MahoutDetected,
    Topic::ObstacleDetected,
    Topic::TouchEvent,
    Topic::Feedback,
];

/// Re-evaluation hook run for every piece of recognition feedback.
pub trait FeedbackHook: Send {
    fn on_feedback(&mut self, store: &mut ContextStore, feedback: &Feedback);
}

/// Counts correct and incorrect recognitions per command under
/// `feedback.<command>` in long-term memory.
pub struct CountingFeedback;

impl FeedbackHook for CountingFeedback {
    fn on_feedback(&mut self, store: &mut ContextStore, feedback: &Feedback) {
        let key = format!("feedback.{}", feedback.detected_command);
        let mut counts = store
            .recall(Role::Supervising, &key)
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| json!({"correct": 0, "incorrect": 0}));

        let field = if feedback.is_correct { "correct" } else { "incorrect" };
        let n = counts.get(field).and_then(Value::as_u64).unwrap_or(0) + 1;
        counts[field] = json!(n);
        store.remember(Role::Supervising, &key, counts);

        if feedback.is_correct {
            info!(command = %feedback.detected_command, "Recognition confirmed");
        } else {
            warn!(
                command = %feedback.detected_command,
                language = ?feedback.language,
                incorrect = n,
                "Recognition marked incorrect"
            );
        }
    }
}

/// How the body answers a classified touch.
fn touch_action(event: &TouchEvent) -> Option<Action> {
    match event.response {
        TouchResponse::Affectionate => Some(Action::TrunkRaise),
        TouchResponse::Playful => Some(Action::EarFlap),
        TouchResponse::Defensive => Some(Action::Backward),
        TouchResponse::Curious if event.location.contains("right") => Some(Action::LookRight),
        TouchResponse::Curious => Some(Action::LookLeft),
        TouchResponse::Basic => Some(Action::EyeBlink),
        TouchResponse::Ignore => None,
    }
}

/// The coordinator: resolves commands, dispatches actions and logs experience.
pub struct SupervisingHandler {
    services: Arc<AgentServices>,
    resolver: CommandResolver,
    sequencer: ActionSequencer,
    state: BodyState,
    mahout: MahoutInfo,
    feedback: Box<dyn FeedbackHook>,
}

impl SupervisingHandler {
    pub fn new(services: Arc<AgentServices>) -> Self {
        let resolver = CommandResolver::new(services.gateway.clone())
            .with_min_confidence(services.config.resolver.min_confidence);
        Self {
            sequencer: ActionSequencer::new(services.bus.clone()),
            resolver,
            state: BodyState::Idle,
            mahout: MahoutInfo::default(),
            feedback: Box::new(CountingFeedback),
            services,
        }
    }

    pub fn with_feedback_hook(mut self, hook: Box<dyn FeedbackHook>) -> Self {
        self.feedback = hook;
        self
    }

    pub fn state(&self) -> BodyState {
        self.state
    }

    pub fn mahout(&self) -> &MahoutInfo {
        &self.mahout
    }

    fn publish(&self, topic: Topic, payload: Payload) {
        if let Err(e) = self.services.bus.publish(topic, payload) {
            warn!(topic = %topic, error = %e, "Publish failed");
        }
    }

    fn rl_state(&self, last_actions: &[String]) -> Value {
        json!({
            "current_state": self.state.as_str(),
            "mahout_present": self.mahout.present(),
            "last_actions": last_actions,
        })
    }

    async fn on_command(&mut self, store: &mut ContextStore, command: Command) {
        let situation = Situation {
            supervising_state: self.state.as_str().to_string(),
            mahout_present: self.mahout.present(),
        };
        let resolution = self
            .resolver
            .resolve(Role::Supervising, &command, store, &situation)
            .await;
        if resolution.verdict == Verdict::Skipped {
            debug!("Empty command, nothing to do");
            return;
        }

        if let Some(output) = &resolution.backend_output {
            self.publish(
                Topic::LlmDebug,
                Payload::Json(json!({
                    "input": command.text,
                    "output": output,
                    "timestamp": now_secs(),
                })),
            );
        }
        self.execute(store, resolution.action).await;
    }

    /// Dispatch one resolved action and log its experience. `None` is `unknown`.
    pub async fn execute(&mut self, store: &mut ContextStore, action: Option<Action>) {
        let name = action_name(action);
        info!(action = %name, state = %self.state.as_str(), "Executing action");

        let recent = store
            .snapshot(Role::Supervising)
            .recent_actions(RL_STATE_ACTIONS);
        let prior_state = self.rl_state(&recent);

        if self.state == BodyState::Sleeping && action.is_some_and(|a| a != Action::GoToSleep) {
            info!(action = %name, "Waking up");
            self.state = BodyState::Idle;
        }

        let dispatch = self.sequencer.dispatch(action).await;
        if let Some(state) = dispatch.state_change {
            self.state = state;
        }

        let mut next_actions = recent;
        next_actions.push(name.to_string());
        let skip = next_actions.len().saturating_sub(RL_STATE_ACTIONS);
        let next_state = self.rl_state(&next_actions[skip..]);

        self.services
            .recorder
            .record(Role::Supervising, prior_state, name, next_state);
        store.record_last_action(Role::Supervising, name);

        let published: Vec<&str> = dispatch.published.iter().map(|a| a.as_str()).collect();
        self.publish(
            Topic::Status,
            Payload::Json(json!({
                "state": self.state.as_str(),
                "last_action": name,
                "published": published,
                "mahout_present": self.mahout.present(),
                "timestamp": now_secs(),
            })),
        );
    }
}

#[async_trait]
impl RoleHandler for SupervisingHandler {
    fn role(&self) -> Role {
        Role::Supervising
    }

    fn topics(&self) -> &'static [Topic] {
        TOPICS
    }

    async fn handle(&mut self, store: &mut ContextStore, envelope: Envelope) -> Result<()> {
        match envelope.topic {
            Topic::CommandReceived => {
                let command: Command = envelope.payload.decode()?;
                self.on_command(store, command).await;
            }
            Topic::MahoutDetected => {
                let update: MahoutInfo = envelope.payload.decode()?;
                self.mahout.merge(&update);
                info!(
                    tag_id = ?self.mahout.tag_id,
                    face = self.mahout.face_recognized,
                    "Mahout detected"
                );
            }
            Topic::ObstacleDetected => {
                let obstacle = envelope.payload.as_text().unwrap_or_default();
                warn!(obstacle = %obstacle, "Obstacle ahead, stopping");
                self.execute(store, Some(Action::Stop)).await;
            }
            Topic::TouchEvent => {
                let event: TouchEvent = envelope.payload.decode()?;
                match touch_action(&event) {
                    Some(action) => self.execute(store, Some(action)).await,
                    None => debug!(location = %event.location, "Touch needs no response"),
                }
            }
            Topic::Feedback => {
                let feedback: Feedback = envelope.payload.decode()?;
                self.feedback.on_feedback(store, &feedback);
            }
            other => debug!(topic = %other, "Ignoring message"),
        }
        Ok(())
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};
use tusker_core::{Command, Envelope, Payload, Result, Role, Topic};
use tusker_storage::ContextStore;

use super::{now_secs, RoleHandler};
use crate::enrich::Enricher;
use crate::services::AgentServices;

const TOPICS: &[Topic] = &[Topic::SpeechText];

const GREETING_WORDS: &[&str] = &["hello", "hi"];
const GREETING_PHRASES: &[&str] = &["how are you"];
const START_CONVERSATION: &[&str] = &["let's talk", "lets talk", "let's chat"];
const END_CONVERSATION: &[&str] = &["bye", "goodbye"];

fn has_word(text: &str, words: &[&str]) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|w| words.contains(&w))
}

fn is_greeting(lower: &str) -> bool {
    has_word(lower, GREETING_WORDS) || GREETING_PHRASES.iter().any(|p| lower.contains(p))
}

/// Splits recognised speech into conversation and commands.
pub struct AudioHandler {
    services: Arc<AgentServices>,
    enricher: Enricher,
    conversation_mode: bool,
}

impl AudioHandler {
    pub fn new(services: Arc<AgentServices>) -> Self {
        Self {
            enricher: Enricher::new(services.gateway.clone()),
            conversation_mode: false,
            services,
        }
    }

    pub fn in_conversation(&self) -> bool {
        self.conversation_mode
    }

    fn publish(&self, topic: Topic, payload: Payload) {
        if let Err(e) = self.services.bus.publish(topic, payload) {
            warn!(topic = %topic, error = %e, "Publish failed");
        }
    }

    async fn converse(&mut self, store: &mut ContextStore, text: &str) {
        let history = store.snapshot(Role::Audio).short_term_memory;
        let history: Vec<String> = history.into_iter().collect();
        let prompt = format!(
            "You are a friendly robotic elephant. Respond to the human conversation naturally.\n\n\
             Previous context:\n{}\n\n\
             Human says: \"{}\"\n\n\
             Your response (keep it short and friendly):",
            history.join("\n"),
            text
        );

        let Some(reply) = self.enricher.text(Role::Audio, &prompt).await else {
            debug!(text = %text, "No conversational reply available");
            return;
        };

        self.publish(
            Topic::Conversation,
            Payload::Json(json!({
                "human": text,
                "elephant": reply,
                "timestamp": now_secs(),
            })),
        );
        self.publish(Topic::SpeechOut, Payload::text(reply.clone()));

        store.append_short_term(Role::Audio, format!("Human: {}", text));
        store.append_short_term(Role::Audio, format!("Elephant: {}", reply));
        info!(reply_len = reply.len(), "Conversation turn");
    }
}

#[async_trait]
impl RoleHandler for AudioHandler {
    fn role(&self) -> Role {
        Role::Audio
    }

    fn topics(&self) -> &'static [Topic] {
        TOPICS
    }

    async fn handle(&mut self, store: &mut ContextStore, envelope: Envelope) -> Result<()> {
        let heard: Command = envelope.payload.decode()?;
        let text = heard.text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let lower = text.to_lowercase();

        if START_CONVERSATION.iter().any(|p| lower.contains(p)) {
            self.conversation_mode = true;
        }

        if self.conversation_mode || is_greeting(&lower) {
            self.converse(store, text).await;
            if has_word(&lower, END_CONVERSATION) {
                self.conversation_mode = false;
            }
            return Ok(());
        }

        let command = Command::new(text, heard.confidence, heard.source);
        debug!(command = %command.text, "Forwarding voice command");
        self.publish(Topic::CommandReceived, Payload::json(&command)?);
        Ok(())
    }
}

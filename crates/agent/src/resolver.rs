use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, info};
use tusker_core::{action_name, Action, Command, Role, UNKNOWN_ACTION};
use tusker_storage::ContextStore;

use crate::gateway::{Answer, BackendGateway};

/// Number of short-term entries included in an interpretation prompt.
const PROMPT_CONTEXT_ENTRIES: usize = 5;

const DIRECT_COMMANDS: &[(&str, Action)] = &[
    ("move forward", Action::Forward),
    ("walk forward", Action::Forward),
    ("move backward", Action::Backward),
    ("walk backward", Action::Backward),
    ("turn left", Action::TurnLeft),
    ("turn right", Action::TurnRight),
    ("stop", Action::Stop),
    ("trunk up", Action::TrunkRaise),
    ("trunk down", Action::TrunkLower),
    ("flap ears", Action::EarFlap),
    ("blink", Action::EyeBlink),
    ("wag tail", Action::TailWag),
    ("look left", Action::LookLeft),
    ("look right", Action::LookRight),
    ("dance", Action::PerformDance),
    ("greet", Action::PerformGreeting),
    ("sleep", Action::GoToSleep),
    // Mahout commands in Malayalam, Hindi and Gujarati.
    ("ഇടത്താനെ", Action::TurnLeft),
    ("बाएं", Action::TurnLeft),
    ("ડાબે", Action::TurnLeft),
    ("വലത്താനെ", Action::TurnRight),
    ("दाएं", Action::TurnRight),
    ("જમણે", Action::TurnRight),
    ("നടയാനെ", Action::Forward),
    ("चल", Action::Forward),
    ("ચાલ", Action::Forward),
    ("സെറ്റാനെ", Action::Backward),
    ("पीछे", Action::Backward),
    ("પાછળ", Action::Backward),
    ("നില്ലാനെ", Action::Stop),
    ("ठहर", Action::Stop),
    ("થોભ", Action::Stop),
];

static DIRECT_TABLE: Lazy<HashMap<String, Action>> = Lazy::new(|| {
    DIRECT_COMMANDS
        .iter()
        .map(|(phrase, action)| (phrase.to_lowercase(), *action))
        .collect()
});

/// Case-insensitive lookup of a trimmed phrase in the fixed command table.
pub fn direct_lookup(text: &str) -> Option<Action> {
    DIRECT_TABLE.get(&text.trim().to_lowercase()).copied()
}

/// How a resolution was reached.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Found in the direct table; the backend was not consulted.
    Direct,
    Matched(Action),
    /// The backend answered with nothing usable.
    Malformed,
    OutOfVocabulary(String),
    Timeout,
    Unavailable,
    /// Empty input.
    Skipped,
    BelowConfidence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// `None` is the `unknown` action.
    pub action: Option<Action>,
    pub verdict: Verdict,
    /// Raw backend text, present whenever the backend path produced an answer.
    pub backend_output: Option<String>,
}

impl Resolution {
    fn without_backend(action: Option<Action>, verdict: Verdict) -> Self {
        Self {
            action,
            verdict,
            backend_output: None,
        }
    }

    pub fn action_name(&self) -> &'static str {
        action_name(self.action)
    }
}

/// What the supervising role knows about its surroundings when resolving.
#[derive(Debug, Clone)]
pub struct Situation {
    pub supervising_state: String,
    pub mahout_present: bool,
}

/// Strict parse of backend text: only an exact vocabulary name is accepted.
pub fn classify(raw: &str) -> Verdict {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Verdict::Malformed;
    }
    match Action::parse(trimmed) {
        Some(action) => Verdict::Matched(action),
        None => Verdict::OutOfVocabulary(trimmed.to_string()),
    }
}

pub fn build_prompt(recent: &[String], text: &str, situation: &Situation) -> String {
    format!(
        "Recent context (oldest first):\n{}\n\n\
         Interpret this command for a robotic elephant and return only the action name:\n\
         Command: \"{}\"\n\n\
         Available actions: {}\n\n\
         Consider the current state: {}\n\
         Mahout presence: {}\n\n\
         Return only the action name or '{}' if unclear:",
        recent.join("\n"),
        text,
        Action::vocabulary(),
        situation.supervising_state,
        situation.mahout_present,
        UNKNOWN_ACTION,
    )
}

/// Turns command text into a canonical action: direct table first, then the
/// cached or live backend.
pub struct CommandResolver {
    gateway: Arc<BackendGateway>,
    min_confidence: Option<f32>,
}

impl CommandResolver {
    pub fn new(gateway: Arc<BackendGateway>) -> Self {
        Self {
            gateway,
            min_confidence: None,
        }
    }

    /// Commands sensed below `min_confidence` resolve to `unknown`.
    pub fn with_min_confidence(mut self, min_confidence: Option<f32>) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub async fn resolve(
        &self,
        role: Role,
        command: &Command,
        store: &mut ContextStore,
        situation: &Situation,
    ) -> Resolution {
        let text = command.text.trim();
        if text.is_empty() {
            return Resolution::without_backend(None, Verdict::Skipped);
        }

        if let Some(min) = self.min_confidence {
            if command.confidence < min {
                info!(
                    role = %role,
                    confidence = command.confidence,
                    min_confidence = min,
                    "Command below confidence threshold"
                );
                return Resolution::without_backend(None, Verdict::BelowConfidence);
            }
        }

        if let Some(action) = direct_lookup(text) {
            debug!(role = %role, command = %text, action = %action, "Direct command match");
            return Resolution::without_backend(Some(action), Verdict::Direct);
        }

        if !self.gateway.available().await {
            debug!(role = %role, command = %text, "No backend, command unresolved");
            return Resolution::without_backend(None, Verdict::Unavailable);
        }

        let recent = store.snapshot(role).recent_short_term(PROMPT_CONTEXT_ENTRIES);
        let prompt = build_prompt(&recent, &command.text, situation);

        let (raw, verdict) = match self.gateway.ask(role, &prompt).await {
            Answer::Cached(raw) | Answer::Fresh(raw) => {
                let verdict = classify(&raw);
                (raw, verdict)
            }
            Answer::TimedOut => (String::new(), Verdict::Timeout),
            Answer::Unavailable => (String::new(), Verdict::Unavailable),
        };

        let action = match &verdict {
            Verdict::Matched(action) => Some(*action),
            _ => None,
        };
        let remembered = if raw.trim().is_empty() {
            UNKNOWN_ACTION
        } else {
            raw.trim()
        };
        store.append_short_term(
            role,
            format!("Command: {} -> Action: {}", command.text, remembered),
        );

        info!(
            role = %role,
            command = %text,
            action = %action_name(action),
            verdict = ?verdict,
            "Command interpreted by backend"
        );

        Resolution {
            action,
            verdict,
            backend_output: Some(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_services, ScriptedBackend};
    use std::time::Duration;
    use tusker_core::CommandSource;

    fn idle() -> Situation {
        Situation {
            supervising_state: "idle".to_string(),
            mahout_present: false,
        }
    }

    #[test]
    fn test_direct_lookup_is_case_insensitive_and_trimmed() {
        assert_eq!(direct_lookup("  Turn LEFT "), Some(Action::TurnLeft));
        assert_eq!(direct_lookup("wag tail"), Some(Action::TailWag));
        assert_eq!(direct_lookup("ठहर"), Some(Action::Stop));
        assert_eq!(direct_lookup("ചാടുക"), None);
        assert_eq!(direct_lookup("turn  left"), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(" perform_dance\n"), Verdict::Matched(Action::PerformDance));
        assert_eq!(classify("fly"), Verdict::OutOfVocabulary("fly".to_string()));
        assert_eq!(classify("Turn_Left"), Verdict::OutOfVocabulary("Turn_Left".to_string()));
        assert_eq!(classify("   "), Verdict::Malformed);
    }

    #[test]
    fn test_prompt_carries_context_and_situation() {
        let recent = vec!["Command: a -> Action: stop".to_string()];
        let situation = Situation {
            supervising_state: "sleeping".to_string(),
            mahout_present: true,
        };
        let prompt = build_prompt(&recent, "do a happy dance", &situation);
        assert!(prompt.contains("Command: a -> Action: stop"));
        assert!(prompt.contains("Command: \"do a happy dance\""));
        assert!(prompt.contains("perform_dance"));
        assert!(prompt.contains("current state: sleeping"));
        assert!(prompt.contains("Mahout presence: true"));
    }

    #[tokio::test]
    async fn test_direct_phrase_never_calls_backend() {
        let (services, backend, _dir) = test_services(Some(ScriptedBackend::replying("stop")));
        let backend = backend.unwrap();
        let resolver = CommandResolver::new(services.gateway.clone());
        let mut store = ContextStore::new(services.paths.clone());

        for (phrase, expected) in DIRECT_COMMANDS {
            for text in [phrase.to_string(), format!("  {}  ", phrase.to_uppercase())] {
                let res = resolver
                    .resolve(Role::Supervising, &Command::voice(&text), &mut store, &idle())
                    .await;
                assert_eq!(res.action, Some(*expected), "phrase {:?}", text);
                assert_eq!(res.verdict, Verdict::Direct, "phrase {:?}", text);
                assert!(res.backend_output.is_none());
            }
        }
        assert_eq!(backend.calls(), 0);
        assert_eq!(backend.probes(), 0);
        assert!(store.snapshot(Role::Supervising).short_term_memory.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_changes_nothing() {
        let (services, backend, _dir) = test_services(Some(ScriptedBackend::replying("stop")));
        let resolver = CommandResolver::new(services.gateway.clone());
        let mut store = ContextStore::new(services.paths.clone());

        let res = resolver
            .resolve(Role::Supervising, &Command::voice("   "), &mut store, &idle())
            .await;
        assert_eq!(res.action, None);
        assert_eq!(res.verdict, Verdict::Skipped);
        assert_eq!(backend.unwrap().calls(), 0);
        assert_eq!(store.snapshot(Role::Supervising), Default::default());
    }

    #[tokio::test]
    async fn test_backend_match_is_remembered() {
        let (services, backend, _dir) =
            test_services(Some(ScriptedBackend::replying("perform_dance")));
        let resolver = CommandResolver::new(services.gateway.clone());
        let mut store = ContextStore::new(services.paths.clone());

        let res = resolver
            .resolve(Role::Supervising, &Command::voice("do a happy dance"), &mut store, &idle())
            .await;
        assert_eq!(res.action, Some(Action::PerformDance));
        assert_eq!(res.backend_output.as_deref(), Some("perform_dance"));
        assert_eq!(backend.unwrap().calls(), 1);
        let memory = store.snapshot(Role::Supervising).short_term_memory;
        assert_eq!(
            memory.back().map(String::as_str),
            Some("Command: do a happy dance -> Action: perform_dance")
        );
    }

    #[tokio::test]
    async fn test_out_of_vocabulary_is_unknown_and_cached_verbatim() {
        let (services, _backend, _dir) = test_services(Some(ScriptedBackend::replying("fly")));
        let resolver = CommandResolver::new(services.gateway.clone());
        let mut store = ContextStore::new(services.paths.clone());

        let res = resolver
            .resolve(Role::Supervising, &Command::voice("xyzzy"), &mut store, &idle())
            .await;
        assert_eq!(res.action, None);
        assert_eq!(res.verdict, Verdict::OutOfVocabulary("fly".to_string()));

        let cache = tusker_storage::ResponseCache::new(services.paths.clone());
        let prompt = build_prompt(&[], "xyzzy", &idle());
        assert_eq!(cache.get(Role::Supervising, &prompt).as_deref(), Some("fly"));
    }

    #[tokio::test]
    async fn test_identical_prompt_hits_cache() {
        let (services, backend, _dir) =
            test_services(Some(ScriptedBackend::replying("go_to_sleep")));
        let backend = backend.unwrap();
        let resolver = CommandResolver::new(services.gateway.clone());

        for _ in 0..2 {
            // Fresh memory each time so the prompt text is identical.
            let mut store = ContextStore::new(services.paths.clone());
            let res = resolver
                .resolve(Role::Supervising, &Command::voice("time for bed"), &mut store, &idle())
                .await;
            assert_eq!(res.action, Some(Action::GoToSleep));
        }
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_unknown_and_caches_empty() {
        let (services, _backend, _dir) = test_services(Some(
            ScriptedBackend::replying("perform_dance").with_delay(Duration::from_secs(60)),
        ));
        let resolver = CommandResolver::new(services.gateway.clone());
        let mut store = ContextStore::new(services.paths.clone());

        let res = resolver
            .resolve(Role::Supervising, &Command::voice("boogie"), &mut store, &idle())
            .await;
        assert_eq!(res.action, None);
        assert_eq!(res.verdict, Verdict::Timeout);

        let cache = tusker_storage::ResponseCache::new(services.paths.clone());
        let prompt = build_prompt(&[], "boogie", &idle());
        assert_eq!(cache.get(Role::Supervising, &prompt).as_deref(), Some(""));
        assert_eq!(store.snapshot(Role::Supervising).short_term_memory.len(), 1);
    }

    #[tokio::test]
    async fn test_no_backend_is_unknown_without_memory_write() {
        let (services, _none, _dir) = test_services(None);
        let resolver = CommandResolver::new(services.gateway.clone());
        let mut store = ContextStore::new(services.paths.clone());

        let res = resolver
            .resolve(Role::Supervising, &Command::voice("xyzzy"), &mut store, &idle())
            .await;
        assert_eq!(res.action, None);
        assert_eq!(res.verdict, Verdict::Unavailable);
        assert!(store.snapshot(Role::Supervising).short_term_memory.is_empty());
    }

    #[tokio::test]
    async fn test_confidence_gate() {
        let (services, backend, _dir) = test_services(Some(ScriptedBackend::replying("stop")));
        let resolver =
            CommandResolver::new(services.gateway.clone()).with_min_confidence(Some(0.6));
        let mut store = ContextStore::new(services.paths.clone());

        let faint = Command::new("turn left", 0.3, CommandSource::Voice);
        let res = resolver.resolve(Role::Supervising, &faint, &mut store, &idle()).await;
        assert_eq!(res.verdict, Verdict::BelowConfidence);
        assert_eq!(res.action, None);

        let clear = Command::new("turn left", 0.9, CommandSource::Voice);
        let res = resolver.resolve(Role::Supervising, &clear, &mut store, &idle()).await;
        assert_eq!(res.action, Some(Action::TurnLeft));
        assert_eq!(backend.unwrap().calls(), 0);
    }
}

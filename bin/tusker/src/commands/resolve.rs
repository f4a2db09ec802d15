use std::sync::Arc;

use tusker_agent::{AgentServices, CommandResolver, Situation, Verdict};
use tusker_core::{Command, Config, Paths, Role};
use tusker_providers::create_backend;
use tusker_storage::{ContextGuard, ContextStore};

pub async fn run(text: &str, role: Role) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let min_confidence = config.resolver.min_confidence;

    let backend = create_backend(&config.backend);
    let services = Arc::new(AgentServices::new(config, paths.clone(), backend));
    let resolver =
        CommandResolver::new(Arc::clone(&services.gateway)).with_min_confidence(min_confidence);

    let mut guard = ContextGuard::acquire(ContextStore::new(paths), role);
    let situation = Situation {
        supervising_state: "idle".to_string(),
        mahout_present: false,
    };
    let resolution = resolver
        .resolve(role, &Command::voice(text), &mut guard, &situation)
        .await;
    guard.release()?;

    println!("Command: {}", text);
    println!("Action:  {}", resolution.action_name());
    let how = match &resolution.verdict {
        Verdict::Direct => "direct table".to_string(),
        Verdict::Matched(_) => "language backend".to_string(),
        Verdict::Malformed => "backend answer was empty".to_string(),
        Verdict::OutOfVocabulary(raw) => format!("backend answered `{}`, not an action", raw),
        Verdict::Timeout => "backend timed out".to_string(),
        Verdict::Unavailable => "backend unavailable".to_string(),
        Verdict::Skipped => "empty command".to_string(),
        Verdict::BelowConfidence => "below confidence threshold".to_string(),
    };
    println!("Via:     {}", how);
    if let Some(raw) = &resolution.backend_output {
        println!("Raw:     {}", raw);
    }

    Ok(())
}

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tusker_agent::{AgentRuntime, AgentServices, MessageBus};
use tusker_core::{Command, Config, Payload, Paths, Role, Topic};
use tusker_providers::create_backend;

/// Topics that leave the process for the body controllers.
const OUTBOUND: &[Topic] = &[
    Topic::MovementCmd,
    Topic::GestureCmd,
    Topic::SpeechOut,
    Topic::Status,
];

pub async fn run(roles: Vec<Role>, read_stdin: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    paths.ensure_dirs()?;

    let roles = if roles.is_empty() {
        config.runtime.roles.clone()
    } else {
        roles
    };
    if roles.is_empty() {
        anyhow::bail!("No roles to run. Pass --roles or set runtime.roles in the config.");
    }

    let backend = create_backend(&config.backend);
    if backend.is_none() {
        warn!(provider = %config.backend.provider, "Language backend disabled, running on direct commands only");
    }

    let services = Arc::new(AgentServices::new(config, paths, backend));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut handles = Vec::new();
    for role in &roles {
        let mut runtime = AgentRuntime::new(*role, Arc::clone(&services));
        let shutdown_rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = runtime.run(shutdown_rx).await {
                error!(role = %runtime.role(), error = %e, "Agent runtime failed");
            }
        }));
    }

    let monitor = {
        let mut outbound = services.bus.subscribe_many(OUTBOUND);
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    envelope = outbound.recv() => {
                        let Some(envelope) = envelope else { break };
                        println!("{} {}", envelope.topic, render(&envelope.payload));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    };

    let roles_list: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
    info!(roles = %roles_list.join(","), "tusker running");

    let stdin_blocked = if read_stdin {
        println!("Type a command per line (e.g. \"turn left\"). Ctrl+D or Ctrl+C to stop.");
        let bus = Arc::clone(&services.bus);
        let reader = tokio::task::spawn_blocking(move || {
            forward_lines(std::io::stdin().lock(), &bus)
        });
        tokio::select! {
            forwarded = reader => {
                info!(commands = forwarded.unwrap_or(0), "stdin closed");
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        }
    } else {
        tokio::signal::ctrl_c().await?;
        false
    };

    info!("Shutting down...");
    let _ = shutdown_tx.send(());

    for handle in handles {
        let _ = handle.await;
    }
    let _ = monitor.await;
    services.bus.close();

    if stdin_blocked {
        // The runtime waits for blocking tasks on drop and the stdin read cannot be cancelled.
        info!("tusker stopped");
        std::process::exit(0);
    }
    Ok(())
}

/// Publish each non-empty line as a voice command until EOF. Returns how many were sent.
fn forward_lines<R: BufRead>(reader: R, bus: &MessageBus) -> usize {
    let mut forwarded = 0;
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let payload = match Payload::json(&Command::voice(text)) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to encode command");
                continue;
            }
        };
        match bus.publish(Topic::CommandReceived, payload) {
            Ok(_) => forwarded += 1,
            Err(e) => warn!(error = %e, "Failed to publish command"),
        }
    }
    forwarded
}

fn render(payload: &Payload) -> String {
    match payload {
        Payload::Text(s) => s.clone(),
        Payload::Json(v) => v.to_string(),
        Payload::Int(v) => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_forward_lines_publishes_voice_commands() {
        let bus = MessageBus::new();
        let mut commands = bus.subscribe(Topic::CommandReceived);

        let input = Cursor::new("turn left\n\n   \n  do a happy dance  \n");
        assert_eq!(forward_lines(input, &bus), 2);

        let first: Command = commands.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(first.text, "turn left");
        let second: Command = commands.try_recv().unwrap().payload.decode().unwrap();
        assert_eq!(second.text, "do a happy dance");
        assert!(commands.try_recv().is_none());
    }

    #[test]
    fn test_forward_lines_stops_at_eof() {
        let bus = MessageBus::new();
        assert_eq!(forward_lines(Cursor::new(""), &bus), 0);
    }

    #[test]
    fn test_render_payloads() {
        assert_eq!(render(&Payload::text("turn_left")), "turn_left");
        assert_eq!(render(&Payload::Int(42)), "42");
        assert_eq!(
            render(&Payload::Json(serde_json::json!({"state": "idle"}))),
            r#"{"state":"idle"}"#
        );
    }
}

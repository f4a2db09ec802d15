use tusker_core::{Config, Paths, Role};
use tusker_providers::{create_backend, LanguageBackend, DEFAULT_OLLAMA_BASE};
use tusker_storage::ExperienceRecorder;

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗ (not found)"
    }
}

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("tusker status");
    println!("=============");
    println!();

    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!("Config:     {} {}", config_path.display(), mark(config_exists));
    println!(
        "Cache:      {} {}",
        paths.cache_dir().display(),
        mark(paths.cache_dir().exists())
    );
    println!(
        "Contexts:   {} {}",
        paths.contexts_dir().display(),
        mark(paths.contexts_dir().exists())
    );

    if !config_exists {
        println!();
        println!("Run `tusker onboard` to initialize.");
        return Ok(());
    }

    let config = Config::load(&config_path)?;
    println!();
    println!("Backend:");
    println!("  Provider: {}", config.backend.provider);
    println!("  Model:    {}", config.backend.model);
    println!(
        "  API base: {}",
        config.backend.api_base.as_deref().unwrap_or(DEFAULT_OLLAMA_BASE)
    );
    println!("  Timeout:  {}s", config.backend.timeout().as_secs());

    let health = match create_backend(&config.backend) {
        None => "✗ disabled".to_string(),
        Some(backend) => {
            if backend.probe().await {
                "✓ available".to_string()
            } else {
                format!("✗ unavailable (is `{}` pulled?)", backend.model())
            }
        }
    };
    println!("  Health:   {}", health);

    println!();
    println!("Experience records:");
    let recorder = ExperienceRecorder::new(paths.clone());
    for role in Role::ALL {
        let count = recorder.read_all(role).map(|r| r.len()).unwrap_or(0);
        let enabled = if config.runtime.roles.contains(&role) {
            ""
        } else {
            " (not started by `run`)"
        };
        println!("  {:<12} {}{}", role.as_str(), count, enabled);
    }

    Ok(())
}

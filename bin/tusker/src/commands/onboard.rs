use std::io::{self, Write};

use tusker_core::{Config, Paths};

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();

    if paths.config_file().exists() && !force {
        print!("Config already exists. Overwrite? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    paths.ensure_dirs()?;

    let config = Config::default();
    config.save(&paths.config_file())?;
    println!("✓ Created config: {}", paths.config_file().display());
    println!("✓ Response cache: {}", paths.cache_dir().display());
    println!("✓ Agent memory:   {}", paths.contexts_dir().display());
    println!("✓ Experience log: {}", paths.rl_data_dir().display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Pull the model: ollama pull {}",
        config.backend.model.trim_start_matches("ollama/")
    );
    println!("  2. Run `tusker status` to verify the backend");
    println!("  3. Run `tusker run --stdin` and type commands such as \"turn left\"");

    Ok(())
}

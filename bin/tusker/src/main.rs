mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tusker_core::Role;

#[derive(Parser)]
#[command(name = "tusker")]
#[command(about = "Command interpretation and agent coordination for a robotic elephant", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the data directories
    Onboard {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show configuration, backend health and stored data
    Status,

    /// Run the agent roles until Ctrl+C
    Run {
        /// Roles to start (comma separated); defaults to runtime.roles from config
        #[arg(long, value_delimiter = ',')]
        roles: Vec<Role>,

        /// Publish each stdin line as a voice command
        #[arg(long)]
        stdin: bool,
    },

    /// Resolve one command and print the outcome without dispatching it
    Resolve {
        /// The command text, e.g. "turn left"
        text: String,

        /// Role whose memory and cache are used
        #[arg(long, default_value = "supervising")]
        role: Role,
    },

    /// Show recorded experience for a role
    Experience {
        #[arg(long)]
        role: Role,

        /// Show only the newest N records
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Onboard { force } => {
            commands::onboard::run(force).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
        Commands::Run { roles, stdin } => {
            commands::run_cmd::run(roles, stdin).await?;
        }
        Commands::Resolve { text, role } => {
            commands::resolve::run(&text, role).await?;
        }
        Commands::Experience { role, limit } => {
            commands::experience::run(role, limit).await?;
        }
    }

    Ok(())
}

mod cmd;
mod output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use monthgate_core::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "monthgate",
    about = "Monthly bucket channels with tiered look-back access",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file
    #[arg(long, global = true, env = "MONTHGATE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the month-boundary scheduler and the HTTP trigger
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,

        /// Discord bot token
        #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
        token: String,

        /// Bearer token for /api/* (unset: API locked)
        #[arg(long, env = "MONTHGATE_API_TOKEN", hide_env_values = true)]
        api_token: Option<String>,
    },

    /// Reconcile once, now, and print the report
    Sync {
        /// Discord bot token
        #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Show which buckets each tier may see (no Discord access)
    Plan {
        /// Evaluate at this UTC date instead of today (YYYY-MM-DD)
        #[arg(long)]
        at: Option<NaiveDate>,

        /// Only show this tier
        #[arg(long)]
        tier: Option<String>,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Sync { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve {
            port,
            token,
            api_token,
        } => cmd::serve::run(&cli.config, port, &token, api_token),
        Commands::Sync { token } => cmd::sync::run(&cli.config, &token, cli.json),
        Commands::Plan { at, tier } => cmd::plan::run(&cli.config, at, tier.as_deref(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

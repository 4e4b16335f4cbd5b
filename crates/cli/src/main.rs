//! ragent CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config file
//! - `serve`: Start the HTTP service
//! - `ask`: Run one agent turn from the terminal
//! - `doctor`: Check configuration health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ragent",
    about = "ragent: tool-using, retrieval-augmented agent service",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the configuration file
    Onboard,

    /// Start the HTTP service
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the agent a single question
    Ask {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Session to continue
        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    /// Diagnose configuration
    Doctor,
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Ask { message, session } => commands::ask::run(message, session).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

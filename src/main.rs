use clap::{Parser, Subcommand};
use smart_lawyer::Result;
use smart_lawyer::commands::{ask, resolve_config_dir, serve, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smart-lawyer")]
#[command(about = "Legal question answering over a document corpus, with an HTTP API")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the databases
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the corpus and start the HTTP API
    Serve,
    /// Index the corpus and answer one question on stdout
    Ask {
        /// The question to answer
        query: String,
    },
    /// Inspect configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir)?;

    match cli.command {
        Commands::Serve => {
            serve(&config_dir).await?;
        }
        Commands::Ask { query } => {
            ask(&config_dir, &query).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                eprintln!(
                    "Edit {} to change settings; run with --show to print them",
                    config_dir.join("config.toml").display()
                );
            }
        }
    }

    Ok(())
}

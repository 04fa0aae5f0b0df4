#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;

use command::{CommandStrategy, InfoStrategy, InitStrategy, RunInput, RunStrategy, VersionStrategy};

#[derive(Parser)]
#[command(name = "roundtable")]
#[command(about = "Turn-based discussions between AI agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a discussion on a topic
    Run {
        /// What the agents should discuss
        #[arg(short = 't', long)]
        topic: String,

        /// Stop after this many completed turns
        #[arg(short = 'n', long)]
        turns: Option<u64>,

        /// Pace multiplier; 2.0 halves the delay between turns
        #[arg(short = 'r', long)]
        rate: Option<f64>,

        /// Config file to use instead of ~/roundtable/config.json
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,
    },
    /// Show configuration
    Info {
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,
    },
    /// Initialize configuration
    Init,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            topic,
            turns,
            rate,
            config,
        } => {
            RunStrategy
                .execute(RunInput {
                    topic,
                    turns,
                    rate,
                    config,
                })
                .await
        }
        Commands::Info { config } => InfoStrategy.execute(config).await,
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}

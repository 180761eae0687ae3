mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "starload",
    version,
    about = "Star-schema ETL: three operational stores, one warehouse"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the starload YAML config
    #[arg(long, default_value = "starload.yaml", global = true)]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one source, or `all` for a full sweep
    Run {
        /// Source to run: orders, customers, reviews, or all
        source: String,
        /// Extraction mode: full or incremental
        #[arg(long, default_value = "full")]
        mode: String,
    },
    /// Show recent pipeline runs from the audit table
    History {
        /// Maximum runs to show
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Create the warehouse schema and pre-populate the date dimension
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { source, mode } => commands::run::execute(&cli.config, &source, &mode).await,
        Commands::History { limit } => commands::history::execute(&cli.config, limit),
        Commands::Init => commands::init::execute(&cli.config),
    }
}

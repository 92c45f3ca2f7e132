mod commands;
mod logging;
mod processors;
mod schema;
mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "batchwise",
    version,
    about = "Chunk-oriented batch jobs over local files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch job
    Run {
        /// Path to job YAML file
        job: PathBuf,
        /// Print the job execution as JSON after the summary
        #[arg(long)]
        json: bool,
    },
    /// Validate a job definition and build its steps without running them
    Check {
        /// Path to job YAML file
        job: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { job, json } => commands::run::execute(&job, json).await,
        Commands::Check { job } => {
            commands::check::execute(&job)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

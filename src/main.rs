//! bcart - BC artifact downloader
//!
//! CLI entry point that dispatches to subcommands.

use bc_artifacts::cli::args::LogFormat;
use bc_artifacts::cli::{commands, Cli, Commands};
use bc_artifacts::config::ConfigManager;
use bc_artifacts::error::ArtifactResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ArtifactResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = ConfigManager::locate(cli.config.clone());
    let config = config_manager.load().await?;

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let level = match (cli.verbose, config.general.verbose) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::new(format!("bc_artifacts={level}"));
    let json = cli.log_format == Some(LogFormat::Json)
        || (cli.log_format.is_none() && config.general.log_format == "json");

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    // Dispatch to command
    match cli.command {
        Commands::Download(args) => commands::download(args, &config).await,
        Commands::Latest(args) => commands::latest(args, &config).await,
        Commands::NextMajor(args) => commands::next_major(args, &config).await,
        Commands::NextMinor(args) => commands::next_minor(args, &config).await,
        Commands::List(args) => commands::list(args, &config).await,
        Commands::Countries(args) => commands::countries(args, &config).await,
        Commands::Cleanup(args) => commands::cleanup(args, &config).await,
        Commands::Config(args) => commands::config(args, &config_manager, &config).await,
    }
}

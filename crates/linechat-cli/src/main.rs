//! linechat - line-oriented TCP chat client

use clap::Parser;
use tracing::{error, info};

use linechat_cli::{
    cli::{Cli, Commands},
    commands::CommandDispatcher,
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration and apply command-line overrides
    let mut config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            setup_logging(cli.verbose);
            error!("{}", e);
            std::process::exit(1);
        }
    };
    config.apply_overrides(&cli);

    // Initialize logging
    setup_logging(config.cli.verbose);

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    // Execute the command
    if let Err(e) = CommandDispatcher::execute(cli, config).await {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    info!("linechat exited");
    Ok(())
}

/// Setup logging based on verbosity level
///
/// Logs go to stderr so they never mix with chat output on stdout.
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    // Printing the example must not depend on a readable config file
    if cli.command() == Commands::Config {
        return Ok(AppConfig::default());
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load()?,
    };
    Ok(config)
}

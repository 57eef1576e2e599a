//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Chat server host
    #[arg(long)]
    pub host: Option<String>,

    /// Chat server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Do not connect automatically when chat starts
    #[arg(long)]
    pub no_auto_connect: bool,

    /// Do not launch the configured companion server
    #[arg(long)]
    pub no_companion: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive chat mode (default)
    Chat,
    /// Connect, send a single message and exit
    Send {
        /// Message content
        message: String,
        /// Seconds to wait for the connection and the send to complete
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
    /// Print an example configuration file
    Config,
}

impl Cli {
    /// The command to run, defaulting to interactive chat
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Chat)
    }
}

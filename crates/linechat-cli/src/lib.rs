//! linechat CLI library
//!
//! Terminal front-end for the linechat client: argument parsing, configuration
//! loading, the interactive chat loop and the one-shot send command.

pub mod cli;
pub mod commands;
pub mod companion;
pub mod config;
pub mod error;
pub mod terminal;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::{AppConfig, CliConfig, CompanionConfig, ConfigError};
pub use error::{CliError, Result};
pub use terminal::TerminalInterface;

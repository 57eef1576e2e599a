//! linechat CLI Configuration Management
//!
//! Configuration is read from a TOML file, either the path given with `--config`
//! or `~/.linechat/config.toml` when it exists. Missing sections and fields fall
//! back to defaults, and command-line flags override whatever was loaded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use linechat_core::ClientConfig;

use crate::cli::Cli;

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the linechat CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server endpoint and retry policy
    pub client: ClientConfig,

    /// Terminal behavior
    pub cli: CliConfig,

    /// Local server process to launch before connecting
    pub companion: CompanionConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Enable verbose logging output
    pub verbose: bool,

    /// Connect as soon as interactive chat starts
    pub auto_connect: bool,

    /// Prefix printed messages with their local time
    pub show_timestamps: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            auto_connect: true,
            show_timestamps: true,
        }
    }
}

/// Companion server process, launched best-effort at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Program to run; nothing is launched when unset
    pub command: Option<String>,

    /// Arguments passed to the program
    pub args: Vec<String>,
}

impl AppConfig {
    /// Load from the default location, or defaults when no file exists there
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(path),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.linechat/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".linechat").join("config.toml"))
    }

    /// Apply command-line overrides on top of the loaded values
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.client.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.client.port = port;
        }
        if cli.verbose {
            self.cli.verbose = true;
        }
        if cli.no_auto_connect {
            self.cli.auto_connect = false;
        }
        if cli.no_companion {
            self.companion.command = None;
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if matches!(&self.companion.command, Some(command) if command.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "Companion command must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the default configuration as a commented TOML document
    pub fn example_config() -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(&Self::default())?;
        Ok(format!(
            "# linechat configuration\n\
             # Place this file at ~/.linechat/config.toml or pass it with --config.\n\
             #\n\
             # To launch a local server before connecting, add:\n\
             # [companion]\n\
             # command = \"chat-server\"\n\
             # args = [\"--port\", \"8688\"]\n\n{}",
            body
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use linechat_core::{DEFAULT_HOST, DEFAULT_PORT};

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.client.host, DEFAULT_HOST);
        assert_eq!(config.client.port, DEFAULT_PORT);
        assert!(config.cli.auto_connect);
        assert!(config.companion.command.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [client]
            port = 9000

            [client.reconnect]
            initial_delay_ms = 250

            [cli]
            show_timestamps = false

            [companion]
            command = "chat-server"
            args = ["--quiet"]
            "#,
        )
        .unwrap();

        assert_eq!(config.client.host, DEFAULT_HOST);
        assert_eq!(config.client.port, 9000);
        assert_eq!(config.client.reconnect.initial_delay_ms, 250);
        assert!(!config.cli.show_timestamps);
        assert!(config.cli.auto_connect);
        assert_eq!(config.companion.command.as_deref(), Some("chat-server"));
        assert_eq!(config.companion.args, vec!["--quiet"]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("[client]\nport = 0\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[companion]\ncommand = \" \"\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[client\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        config.companion.command = Some("chat-server".to_string());

        let cli = Cli::parse_from([
            "linechat",
            "--host",
            "chat.example.org",
            "--port",
            "7000",
            "--verbose",
            "--no-auto-connect",
            "--no-companion",
        ]);
        config.apply_overrides(&cli);

        assert_eq!(config.client.host, "chat.example.org");
        assert_eq!(config.client.port, 7000);
        assert!(config.cli.verbose);
        assert!(!config.cli.auto_connect);
        assert!(config.companion.command.is_none());
    }

    #[test]
    fn test_example_config_parses_back() {
        let example = AppConfig::example_config().unwrap();
        assert!(example.starts_with("# linechat configuration"));
        assert_eq!(AppConfig::from_toml_str(&example).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = std::env::temp_dir().join("linechat-missing-config.toml");
        match AppConfig::load_from_file(&path) {
            Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected read error, got {:?}", other),
        }
    }
}

//! Companion server launch
//!
//! Some setups run the chat server locally next to the client. When a companion
//! command is configured it is started once, before the first connection attempt.
//! Launching is best-effort: a failure is reported and the client carries on, and
//! the reconnect loop keeps dialing until a server shows up.

use std::process::Stdio;

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::config::CompanionConfig;

/// Start the configured companion process, if any
///
/// The child is killed when the returned handle is dropped.
pub fn spawn(config: &CompanionConfig) -> anyhow::Result<Option<Child>> {
    let Some(program) = config.command.as_deref() else {
        return Ok(None);
    };

    let child = Command::new(program)
        .args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to launch companion server `{}`", program))?;

    info!(pid = ?child.id(), "Launched companion server `{}`", program);
    Ok(Some(child))
}

/// Like [`spawn`], but only logs a failure
pub fn launch(config: &CompanionConfig) -> Option<Child> {
    match spawn(config) {
        Ok(child) => child,
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_command_launches_nothing() {
        let config = CompanionConfig::default();
        let child = tokio_test::assert_ok!(spawn(&config));
        assert!(child.is_none());
    }

    #[tokio::test]
    async fn test_missing_program_is_not_fatal() {
        let config = CompanionConfig {
            command: Some("linechat-companion-that-does-not-exist".to_string()),
            args: vec![],
        };

        let err = spawn(&config).unwrap_err();
        assert!(err.to_string().contains("linechat-companion-that-does-not-exist"));
        assert!(launch(&config).is_none());
    }
}

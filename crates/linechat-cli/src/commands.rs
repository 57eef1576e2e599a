//! Command handlers for the linechat CLI

use std::time::Duration;

use tracing::{debug, info};

use linechat_core::{ChatEvent, ChatSession, EventReceiver, SessionState};

use crate::cli::{Cli, Commands};
use crate::companion;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::terminal::{format_event, TerminalInterface};

/// How long `send` waits for the final `Disconnected`
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command() {
            Commands::Chat => Self::handle_chat_command(config).await,
            Commands::Send {
                message,
                timeout_secs,
            } => {
                Self::handle_send_command(config, message, Duration::from_secs(timeout_secs)).await
            }
            Commands::Config => Self::handle_config_command(),
        }
    }

    /// Handle the interactive chat command
    async fn handle_chat_command(config: AppConfig) -> Result<()> {
        let _companion = companion::launch(&config.companion);

        let (session, events) = ChatSession::new(config.client)?;
        TerminalInterface::new(session, events, config.cli).run().await
    }

    /// Connect, deliver one message and disconnect
    async fn handle_send_command(config: AppConfig, message: String, timeout: Duration) -> Result<()> {
        let text = message.trim().to_string();
        if text.is_empty() {
            return Err(CliError::InvalidArgument("message must not be blank".to_string()));
        }
        if text.contains('\n') {
            return Err(CliError::InvalidArgument("message must be a single line".to_string()));
        }

        let _companion = companion::launch(&config.companion);
        let show_timestamps = config.cli.show_timestamps;
        let (session, mut events) = ChatSession::new(config.client)?;

        info!("Sending one message to {}", session.config().endpoint());
        session.connect();

        let delivery = async {
            wait_for(&mut events, "connect", |e| *e == ChatEvent::Connected).await?;
            session.send(&text);
            wait_for(&mut events, "send", |e| matches!(e, ChatEvent::MessageSent { .. })).await
        };

        let result = match tokio::time::timeout(timeout, delivery).await {
            Ok(result) => result,
            Err(_) => Err(CliError::Timeout(format!(
                "message not delivered within {}s",
                timeout.as_secs()
            ))),
        };

        if session.state() != SessionState::Idle {
            session.disconnect();
            if tokio::time::timeout(DISCONNECT_GRACE, drain_until_disconnected(&mut events))
                .await
                .is_err()
            {
                debug!("Timed out waiting for disconnect");
            }
        }

        let sent = result?;
        println!("{}", format_event(&sent, show_timestamps));
        Ok(())
    }

    /// Print an example configuration file
    fn handle_config_command() -> Result<()> {
        print!("{}", AppConfig::example_config()?);
        Ok(())
    }
}

/// Wait for the first event matching `wanted`, failing if the session drops first
async fn wait_for<F>(events: &mut EventReceiver, step: &str, wanted: F) -> Result<ChatEvent>
where
    F: Fn(&ChatEvent) -> bool,
{
    while let Some(event) = events.recv().await {
        if wanted(&event) {
            return Ok(event);
        }
        match event {
            ChatEvent::Disconnected => {
                return Err(CliError::SessionEnded(format!("disconnected during {}", step)));
            }
            ChatEvent::MessageReceived { text, .. } => debug!("Ignoring server line: {}", text),
            other => debug!(event = other.kind(), "Ignoring event"),
        }
    }
    Err(CliError::SessionEnded("event stream closed".to_string()))
}

async fn drain_until_disconnected(events: &mut EventReceiver) {
    while let Some(event) = events.recv().await {
        if event == ChatEvent::Disconnected {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linechat_core::{ClientConfig, ReconnectConfig};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn config_for(port: u16) -> AppConfig {
        let mut config = AppConfig::default();
        config.client = ClientConfig::new("127.0.0.1", port)
            .with_reconnect(ReconnectConfig::fixed(Duration::from_millis(100)));
        config
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_send_command_delivers_trimmed_line() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let first = lines.next_line().await.unwrap();
            let after = lines.next_line().await.unwrap();
            (first, after)
        });

        CommandDispatcher::handle_send_command(
            config_for(port),
            "  hello server  ".to_string(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let (first, after) = server.await.unwrap();
        assert_eq!(first.as_deref(), Some("hello server"));
        assert_eq!(after, None);
    }

    #[tokio::test]
    async fn test_send_command_rejects_blank_message() {
        let result =
            CommandDispatcher::handle_send_command(config_for(1), "   ".to_string(), Duration::from_secs(1))
                .await;
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_send_command_times_out_without_server() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = CommandDispatcher::handle_send_command(
            config_for(port),
            "anyone?".to_string(),
            Duration::from_millis(300),
        )
        .await;
        assert!(matches!(result, Err(CliError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_send_command_reports_give_up() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut config = config_for(port);
        config.client.reconnect.max_attempts = Some(2);

        let result = CommandDispatcher::handle_send_command(
            config,
            "anyone?".to_string(),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(CliError::SessionEnded(_))));
    }
}

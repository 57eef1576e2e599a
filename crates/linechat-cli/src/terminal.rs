//! Terminal Interface
//!
//! Line-based interactive front-end: every input line is either a slash command or
//! a message to send, and every session event is printed as it arrives.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use linechat_core::{ChatEvent, ChatSession, EventReceiver, SessionState, Timestamp};

use crate::config::CliConfig;
use crate::error::{CliError, Result};

/// How long to wait for the final `Disconnected` when leaving
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const HELP: &str = "\
* /connect     connect to the server
* /disconnect  close the connection
* /status      show the connection state
* /quit        leave
* //text       send a line starting with '/'";

// ----------------------------------------------------------------------------
// Input Parsing
// ----------------------------------------------------------------------------

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Connect,
    Disconnect,
    Status,
    Help,
    Quit,
    Unknown(String),
    Message(String),
}

pub fn parse_input(line: &str) -> InputCommand {
    let trimmed = line.trim();

    if let Some(escaped) = trimmed.strip_prefix("//") {
        return InputCommand::Message(format!("/{}", escaped));
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return InputCommand::Message(line.to_string());
    };

    match command.split_whitespace().next().unwrap_or("") {
        "connect" => InputCommand::Connect,
        "disconnect" => InputCommand::Disconnect,
        "status" => InputCommand::Status,
        "help" | "?" => InputCommand::Help,
        "quit" | "exit" => InputCommand::Quit,
        other => InputCommand::Unknown(other.to_string()),
    }
}

// ----------------------------------------------------------------------------
// Event Formatting
// ----------------------------------------------------------------------------

/// Local wall-clock time as `HH:MM:SS`
pub fn format_timestamp(timestamp: Timestamp) -> String {
    i64::try_from(timestamp.as_millis())
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

pub fn format_event(event: &ChatEvent, show_timestamps: bool) -> String {
    let message = |who: &str, text: &str, timestamp: Timestamp| {
        if show_timestamps {
            format!("{} [{}]:{}", who, format_timestamp(timestamp), text)
        } else {
            format!("{}:{}", who, text)
        }
    };

    match event {
        ChatEvent::Connected => "* connected".to_string(),
        ChatEvent::Disconnected => "* disconnected".to_string(),
        ChatEvent::MessageReceived { text, timestamp } => message("Server", text, *timestamp),
        ChatEvent::MessageSent { text, timestamp } => message("Client", text, *timestamp),
    }
}

// ----------------------------------------------------------------------------
// Terminal Interface
// ----------------------------------------------------------------------------

pub struct TerminalInterface {
    session: ChatSession,
    events: EventReceiver,
    config: CliConfig,
}

impl TerminalInterface {
    pub fn new(session: ChatSession, events: EventReceiver, config: CliConfig) -> Self {
        Self {
            session,
            events,
            config,
        }
    }

    /// Run on stdin and stdout until `/quit` or end of input
    pub async fn run(self) -> Result<()> {
        let input = BufReader::new(tokio::io::stdin());
        self.run_with(input, tokio::io::stdout()).await
    }

    pub async fn run_with<R, W>(mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Chatting with {}", self.session.config().endpoint());
        if self.config.auto_connect {
            self.session.connect();
        } else {
            write_line(&mut output, "* type /connect to connect, /help for commands").await?;
        }

        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break;
                    };
                    match parse_input(&line) {
                        InputCommand::Quit => break,
                        command => self.handle_input(command, &mut output).await?,
                    }
                }
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    write_line(&mut output, &format_event(&event, self.config.show_timestamps)).await?;
                }
            }
        }

        self.shutdown(&mut output).await
    }

    async fn handle_input<W: AsyncWrite + Unpin>(
        &self,
        command: InputCommand,
        output: &mut W,
    ) -> Result<()> {
        match command {
            InputCommand::Connect => {
                if self.session.state() != SessionState::Idle {
                    write_line(output, &format!("* session is {}", self.session.state())).await?;
                }
                self.session.connect();
            }
            InputCommand::Disconnect => self.session.disconnect(),
            InputCommand::Status => {
                let status = format!(
                    "* status: {} ({})",
                    self.session.state(),
                    self.session.config().endpoint()
                );
                write_line(output, &status).await?;
            }
            InputCommand::Help => write_line(output, HELP).await?,
            InputCommand::Unknown(name) => {
                write_line(output, &format!("* unknown command /{} (try /help)", name)).await?;
            }
            InputCommand::Message(text) => {
                if text.trim().is_empty() {
                    return Ok(());
                }
                if !self.session.is_connected() {
                    write_line(output, "* not connected, message dropped").await?;
                }
                self.session.send(&text);
            }
            // handled by the caller
            InputCommand::Quit => {}
        }
        Ok(())
    }

    /// Disconnect and print the remaining events up to `Disconnected`
    async fn shutdown<W: AsyncWrite + Unpin>(&mut self, output: &mut W) -> Result<()> {
        if self.session.state() == SessionState::Idle {
            return Ok(());
        }

        self.session.disconnect();
        let drain = async {
            while let Some(event) = self.events.recv().await {
                write_line(output, &format_event(&event, self.config.show_timestamps)).await?;
                if event == ChatEvent::Disconnected {
                    break;
                }
            }
            Ok::<(), CliError>(())
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await {
            Ok(result) => result,
            Err(_) => {
                debug!("Timed out waiting for disconnect");
                Ok(())
            }
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use linechat_core::{ClientConfig, ReconnectConfig};
    use tokio::io::{duplex, DuplexStream, Lines};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn next_output(output: &mut Lines<BufReader<DuplexStream>>) -> String {
        timeout(Duration::from_secs(5), output.next_line())
            .await
            .expect("output should arrive within timeout")
            .unwrap()
            .expect("output should stay open")
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("/connect"), InputCommand::Connect);
        assert_eq!(parse_input("  /disconnect  "), InputCommand::Disconnect);
        assert_eq!(parse_input("/status"), InputCommand::Status);
        assert_eq!(parse_input("/quit"), InputCommand::Quit);
        assert_eq!(parse_input("/exit"), InputCommand::Quit);
        assert_eq!(parse_input("/help"), InputCommand::Help);
        assert_eq!(parse_input("/nope"), InputCommand::Unknown("nope".to_string()));
        assert_eq!(parse_input("hello /quit"), InputCommand::Message("hello /quit".to_string()));
        assert_eq!(parse_input("//shrug"), InputCommand::Message("/shrug".to_string()));
    }

    #[test]
    fn test_format_event_without_timestamps() {
        assert_eq!(format_event(&ChatEvent::Connected, false), "* connected");
        assert_eq!(format_event(&ChatEvent::Disconnected, false), "* disconnected");
        assert_eq!(format_event(&ChatEvent::received("hi"), false), "Server:hi");
        assert_eq!(format_event(&ChatEvent::sent("yo"), false), "Client:yo");
    }

    #[test]
    fn test_format_event_with_timestamps() {
        let event = ChatEvent::MessageReceived {
            text: "hi".to_string(),
            timestamp: Timestamp::new(1_700_000_000_000),
        };
        let line = format_event(&event, true);
        let clock = format_timestamp(Timestamp::new(1_700_000_000_000));

        assert_eq!(line, format!("Server [{}]:hi", clock));
        assert_eq!(clock.len(), 8);
        assert_eq!(&clock[2..3], ":");
        assert_eq!(&clock[5..6], ":");
    }

    #[test]
    fn test_format_timestamp_out_of_range() {
        assert_eq!(format_timestamp(Timestamp::new(u64::MAX)), "--:--:--");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interactive_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = ClientConfig::new("127.0.0.1", port)
            .with_reconnect(ReconnectConfig::fixed(Duration::from_millis(100)));
        let (session, events) = ChatSession::new(config).unwrap();

        let (mut input, input_rx) = duplex(1024);
        let (output_tx, output) = duplex(64 * 1024);
        let mut output = BufReader::new(output).lines();

        let cli_config = CliConfig {
            show_timestamps: false,
            ..CliConfig::default()
        };
        let terminal = TerminalInterface::new(session, events, cli_config);
        let task = tokio::spawn(terminal.run_with(BufReader::new(input_rx), output_tx));

        let (server, _) = timeout(Duration::from_secs(5), listener.accept())
            .await
            .unwrap()
            .unwrap();
        let (server_rx, mut server_tx) = server.into_split();
        let mut server_rx = BufReader::new(server_rx).lines();

        assert_eq!(next_output(&mut output).await, "* connected");

        input.write_all(b"hello\n").await.unwrap();
        assert_eq!(server_rx.next_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(next_output(&mut output).await, "Client:hello");

        server_tx.write_all(b"welcome\n").await.unwrap();
        assert_eq!(next_output(&mut output).await, "Server:welcome");

        input.write_all(b"/status\n").await.unwrap();
        assert_eq!(next_output(&mut output).await, format!("* status: Connected (127.0.0.1:{})", port));

        input.write_all(b"/quit\n").await.unwrap();
        assert_eq!(next_output(&mut output).await, "* disconnected");
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
        assert_eq!(server_rx.next_line().await.unwrap(), None);
    }
}

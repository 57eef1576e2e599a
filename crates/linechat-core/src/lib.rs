//! linechat core
//!
//! A resilient, line-oriented TCP chat client. The crate keeps one connection to a
//! chat server alive on demand, retries failed dials, reads inbound lines and writes
//! outbound lines concurrently, and reports connection state and message traffic as
//! an ordered stream of [`ChatEvent`]s.
//!
//! ```rust,no_run
//! use linechat_core::{ChatEvent, ChatSession, ClientConfig};
//!
//! # async fn demo() -> linechat_core::ChatResult<()> {
//! let (session, mut events) = ChatSession::new(ClientConfig::default())?;
//! session.connect();
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ChatEvent::Connected => session.send("hello"),
//!         ChatEvent::MessageReceived { text, .. } => println!("server: {}", text),
//!         ChatEvent::Disconnected => break,
//!         ChatEvent::MessageSent { .. } => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod reader;
pub mod reconnect;
pub mod session;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ClientConfig, Endpoint, ReconnectConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use connection::Connection;
pub use error::{ChatError, ChatResult};
pub use events::{create_event_channel, ChatEvent, EventReceiver, EventSender};
pub use reader::{LineHandler, ReaderExit};
pub use reconnect::{ReconnectManager, ReconnectOutcome};
pub use session::ChatSession;
pub use types::{ConnectionId, SessionState, Timestamp};

//! Client session
//!
//! [`ChatSession`] coordinates the reconnect loop, the reader loop and outbound
//! sends for a single server, and reports everything that happens as [`ChatEvent`]s.
//!
//! State transitions and event emission happen under the same lock, which gives the
//! per-connection ordering `Connected` → messages → `Disconnected`. Every connection
//! attempt gets a new generation number; background tasks carry the generation they
//! were started for and their late results are discarded once the session moved on.
//!
//! All operations return immediately and must be called from within a Tokio runtime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::ChatResult;
use crate::events::{create_event_channel, ChatEvent, EventReceiver, EventSender};
use crate::reader::{self, LineHandler, ReaderExit};
use crate::reconnect::{self, ReconnectOutcome};
use crate::types::SessionState;

// ----------------------------------------------------------------------------
// Session Phase
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum Phase {
    Idle,
    Connecting {
        generation: u64,
        cancel: watch::Sender<bool>,
    },
    Connected {
        generation: u64,
        connection: Arc<Connection>,
        reader: JoinHandle<()>,
    },
    Disconnecting {
        generation: u64,
    },
}

impl Phase {
    fn state(&self) -> SessionState {
        match self {
            Phase::Idle => SessionState::Idle,
            Phase::Connecting { .. } => SessionState::Connecting,
            Phase::Connected { .. } => SessionState::Connected,
            Phase::Disconnecting { .. } => SessionState::Disconnecting,
        }
    }

    /// Whether message events for `generation` may still be emitted
    fn accepts_messages(&self, generation: u64) -> bool {
        match self {
            Phase::Connected { generation: g, .. } | Phase::Disconnecting { generation: g } => {
                *g == generation
            }
            Phase::Idle | Phase::Connecting { .. } => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Internals
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct SessionInner {
    config: ClientConfig,
    events: EventSender,
    phase: Mutex<Phase>,
    next_generation: AtomicU64,
}

impl SessionInner {
    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ChatEvent) {
        debug!(event = event.kind(), "Emitting session event");
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }

    /// Emit a message event only while the connection it belongs to is still current
    fn emit_message(&self, generation: u64, event: ChatEvent) {
        let phase = self.lock_phase();
        if phase.accepts_messages(generation) {
            self.emit(event);
        } else {
            debug!(generation, event = event.kind(), "Dropping event for stale connection");
        }
    }

    async fn finish_connect(self: Arc<Self>, generation: u64, outcome: ReconnectOutcome) {
        match outcome {
            ReconnectOutcome::Connected(connection) => {
                let connection = Arc::new(connection);
                {
                    let mut phase = self.lock_phase();
                    if matches!(*phase, Phase::Connecting { generation: g, .. } if g == generation) {
                        self.emit(ChatEvent::Connected);
                        let reader = self.spawn_reader(generation, &connection);
                        *phase = Phase::Connected {
                            generation,
                            connection,
                            reader,
                        };
                        return;
                    }
                }

                debug!(connection = %connection.id(), "Connect superseded, closing new connection");
                connection.close().await;
            }
            ReconnectOutcome::GaveUp { attempts } => {
                let mut phase = self.lock_phase();
                if matches!(*phase, Phase::Connecting { generation: g, .. } if g == generation) {
                    warn!(attempts, "Reconnect loop gave up");
                    *phase = Phase::Idle;
                    self.emit(ChatEvent::Disconnected);
                }
            }
            // disconnect() already moved the session to Idle and emitted Disconnected
            ReconnectOutcome::Cancelled => {}
        }
    }

    fn spawn_reader(self: &Arc<Self>, generation: u64, connection: &Arc<Connection>) -> JoinHandle<()> {
        let session = Arc::downgrade(self);
        let handler = SessionLineHandler {
            session: session.clone(),
            generation,
        };
        let connection = Arc::downgrade(connection);

        tokio::spawn(async move {
            let exit = reader::run(connection, handler).await;
            if let Some(inner) = session.upgrade() {
                inner.reader_finished(generation, exit).await;
            }
        })
    }

    async fn reader_finished(&self, generation: u64, exit: ReaderExit) {
        let connection = {
            let mut phase = self.lock_phase();
            match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Connected {
                    generation: g,
                    connection,
                    ..
                } if g == generation => {
                    *phase = Phase::Disconnecting { generation };
                    connection
                }
                other => {
                    // Teardown was started elsewhere
                    *phase = other;
                    return;
                }
            }
        };

        match exit {
            ReaderExit::EndOfStream => info!(connection = %connection.id(), "Server closed the connection"),
            ReaderExit::Failed(e) => warn!(connection = %connection.id(), "Connection lost: {}", e),
            ReaderExit::Closed => debug!(connection = %connection.id(), "Connection released"),
        }

        self.finish_teardown(generation, connection, None).await;
    }

    /// Close the connection, wait for its reader, then return to Idle
    async fn finish_teardown(
        &self,
        generation: u64,
        connection: Arc<Connection>,
        reader: Option<JoinHandle<()>>,
    ) {
        connection.close().await;

        if let Some(reader) = reader {
            if let Err(e) = reader.await {
                debug!("Reader task ended abnormally: {}", e);
            }
        }

        let mut phase = self.lock_phase();
        if matches!(*phase, Phase::Disconnecting { generation: g } if g == generation) {
            *phase = Phase::Idle;
            self.emit(ChatEvent::Disconnected);
            info!(connection = %connection.id(), "Disconnected from {}", connection.endpoint());
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let phase = self.phase.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Phase::Connected { connection, .. } = phase {
            // Wakes the reader so it releases the last reference to the socket
            connection.signal_close();
        }
    }
}

/// Forwards reader lines to the session, tagged with the connection generation
struct SessionLineHandler {
    session: Weak<SessionInner>,
    generation: u64,
}

impl LineHandler for SessionLineHandler {
    fn handle_line(&mut self, text: String) {
        if let Some(inner) = self.session.upgrade() {
            inner.emit_message(self.generation, ChatEvent::received(text));
        }
    }
}

// ----------------------------------------------------------------------------
// Chat Session
// ----------------------------------------------------------------------------

/// Handle to a chat session
///
/// Cloning the handle shares the session. When the last handle is dropped any
/// pending connection attempt is cancelled and the open connection is closed.
#[derive(Debug, Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    /// Create an idle session and the receiver for its events
    pub fn new(config: ClientConfig) -> ChatResult<(Self, EventReceiver)> {
        config.validate()?;

        let (events, receiver) = create_event_channel();
        let inner = SessionInner {
            config,
            events,
            phase: Mutex::new(Phase::Idle),
            next_generation: AtomicU64::new(1),
        };

        Ok((
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        ))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock_phase().state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Start connecting in the background
    ///
    /// Only has an effect while `Idle`; the reconnect loop then keeps dialing until
    /// it succeeds, gives up, or [`ChatSession::disconnect`] is called.
    pub fn connect(&self) {
        let generation;
        let cancel_rx;
        {
            let mut phase = self.inner.lock_phase();
            if !matches!(*phase, Phase::Idle) {
                debug!(state = %phase.state(), "Ignoring connect request");
                return;
            }

            generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
            let (cancel, rx) = watch::channel(false);
            cancel_rx = rx;
            *phase = Phase::Connecting { generation, cancel };
        }

        info!("Connecting to {}", self.inner.config.endpoint());

        let session = Arc::downgrade(&self.inner);
        let config = self.inner.config.clone();

        tokio::spawn(async move {
            let outcome = reconnect::establish(&config, cancel_rx).await;
            match session.upgrade() {
                Some(inner) => inner.finish_connect(generation, outcome).await,
                None => {
                    if let ReconnectOutcome::Connected(connection) = outcome {
                        connection.close().await;
                    }
                }
            }
        });
    }

    /// Send one line to the server in the background
    ///
    /// Text is trimmed first; blank text is ignored. Without a live connection the
    /// call does nothing. Write failures are logged and otherwise swallowed. The text
    /// must not contain a newline.
    pub fn send(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring blank outbound message");
            return;
        }

        let (generation, connection) = {
            let phase = self.inner.lock_phase();
            match &*phase {
                Phase::Connected {
                    generation,
                    connection,
                    ..
                } => (*generation, Arc::downgrade(connection)),
                other => {
                    debug!(state = %other.state(), "Not connected, dropping outbound message");
                    return;
                }
            }
        };

        let session = Arc::downgrade(&self.inner);
        let text = text.to_string();

        tokio::spawn(async move {
            let Some(conn) = connection.upgrade() else {
                debug!("Connection gone before send");
                return;
            };

            match conn.send_line(&text).await {
                Ok(()) => {
                    if let Some(inner) = session.upgrade() {
                        inner.emit_message(generation, ChatEvent::sent(text));
                    }
                }
                Err(e) => warn!(connection = %conn.id(), "Failed to send message: {}", e),
            }
        });
    }

    /// Cancel a pending connection attempt or close the live connection
    ///
    /// Emits exactly one `Disconnected` per connection or attempt; calling it while
    /// idle or already disconnecting does nothing.
    pub fn disconnect(&self) {
        let mut phase = self.inner.lock_phase();

        match std::mem::replace(&mut *phase, Phase::Idle) {
            Phase::Idle => {
                debug!("Already disconnected");
            }
            Phase::Disconnecting { generation } => {
                *phase = Phase::Disconnecting { generation };
                debug!("Disconnect already in progress");
            }
            Phase::Connecting { cancel, .. } => {
                cancel.send_replace(true);
                self.inner.emit(ChatEvent::Disconnected);
                info!("Connection attempt cancelled");
            }
            Phase::Connected {
                generation,
                connection,
                reader,
            } => {
                *phase = Phase::Disconnecting { generation };
                drop(phase);

                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    inner.finish_teardown(generation, connection, Some(reader)).await;
                });
            }
        }
    }
}

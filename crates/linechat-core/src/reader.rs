//! Reader loop
//!
//! Streams inbound lines from one connection to a [`LineHandler`] until the peer
//! closes the stream, a read fails, or the connection is closed locally. The loop
//! holds only a weak reference to the connection and never reconnects on its own.

use std::sync::Weak;

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::ChatError;
use crate::events::{ChatEvent, EventSender};

// ----------------------------------------------------------------------------
// Line Handler Trait
// ----------------------------------------------------------------------------

/// Receives each inbound line in arrival order
pub trait LineHandler: Send {
    fn handle_line(&mut self, text: String);
}

impl LineHandler for EventSender {
    fn handle_line(&mut self, text: String) {
        if self.send(ChatEvent::received(text)).is_err() {
            debug!("Event receiver dropped, discarding inbound line");
        }
    }
}

// ----------------------------------------------------------------------------
// Reader Loop
// ----------------------------------------------------------------------------

/// Why the reader loop stopped
#[derive(Debug)]
pub enum ReaderExit {
    /// The peer closed the stream
    EndOfStream,
    /// The connection was closed or released locally
    Closed,
    /// A read failed
    Failed(ChatError),
}

/// Read lines until the connection ends, forwarding each to `handler`
///
/// The weak reference is revalidated before every read; once the owner releases
/// the connection the loop stops with [`ReaderExit::Closed`].
pub async fn run<H: LineHandler>(connection: Weak<Connection>, mut handler: H) -> ReaderExit {
    let mut lines = 0u64;

    let exit = loop {
        let Some(conn) = connection.upgrade() else {
            break ReaderExit::Closed;
        };

        match conn.read_line().await {
            Ok(Some(text)) => {
                lines += 1;
                handler.handle_line(text);
            }
            Ok(None) if conn.is_closed() => break ReaderExit::Closed,
            Ok(None) => break ReaderExit::EndOfStream,
            Err(ChatError::Closed) => break ReaderExit::Closed,
            Err(e) => {
                warn!(connection = %conn.id(), "Read from {} failed: {}", conn.endpoint(), e);
                break ReaderExit::Failed(e);
            }
        }
    };

    debug!(lines, ?exit, "Reader loop stopped");
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use crate::events::create_event_channel;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    struct Collect(Vec<String>);

    impl LineHandler for &mut Collect {
        fn handle_line(&mut self, text: String) {
            self.0.push(text);
        }
    }

    async fn connected_pair() -> (Arc<Connection>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = Endpoint::new("127.0.0.1", listener.local_addr().unwrap().port());
        let (connection, accepted) =
            tokio::join!(Connection::dial(&endpoint, None), listener.accept());
        (Arc::new(connection.unwrap()), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_reader_forwards_lines_in_order() {
        let (connection, mut server) = connected_pair().await;
        server.write_all(b"alpha\nbeta\n\ngamma\n").await.unwrap();
        server.shutdown().await.unwrap();

        let mut collected = Collect(Vec::new());
        let exit = run(Arc::downgrade(&connection), &mut collected).await;

        assert!(matches!(exit, ReaderExit::EndOfStream));
        assert_eq!(collected.0, vec!["alpha", "beta", "", "gamma"]);
    }

    #[tokio::test]
    async fn test_reader_emits_received_events() {
        let (connection, mut server) = connected_pair().await;
        let (sender, mut receiver) = create_event_channel();

        server.write_all(b"hello\n").await.unwrap();
        drop(server);

        let exit = run(Arc::downgrade(&connection), sender).await;
        assert!(matches!(exit, ReaderExit::EndOfStream));

        match receiver.recv().await {
            Some(ChatEvent::MessageReceived { text, .. }) => assert_eq!(text, "hello"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reader_stops_when_connection_closed() {
        let (connection, _server) = connected_pair().await;
        let (sender, _receiver) = create_event_channel();

        let task = tokio::spawn(run(Arc::downgrade(&connection), sender));
        tokio::time::sleep(Duration::from_millis(50)).await;
        connection.close().await;

        let exit = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(matches!(exit, ReaderExit::Closed));
    }

    #[tokio::test]
    async fn test_reader_stops_when_connection_released() {
        let (connection, _server) = connected_pair().await;
        let weak = Arc::downgrade(&connection);
        drop(connection);

        let (sender, _receiver) = create_event_channel();
        assert!(matches!(run(weak, sender).await, ReaderExit::Closed));
    }
}

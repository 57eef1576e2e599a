//! Events delivered from the session to the presentation layer
//!
//! The session never calls into the presentation layer directly. Every observable
//! change is pushed onto a single unbounded channel, so the consumer sees events in
//! exactly the order the session produced them.

use tokio::sync::mpsc;

use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Chat Events
// ----------------------------------------------------------------------------

/// Connection-state and message events emitted by a [`crate::ChatSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A connection to the server was established
    Connected,
    /// The connection was closed or the pending attempt was cancelled
    Disconnected,
    /// A line arrived from the server
    MessageReceived { text: String, timestamp: Timestamp },
    /// A line was written and flushed to the server
    MessageSent { text: String, timestamp: Timestamp },
}

impl ChatEvent {
    pub fn received(text: impl Into<String>) -> Self {
        ChatEvent::MessageReceived {
            text: text.into(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn sent(text: impl Into<String>) -> Self {
        ChatEvent::MessageSent {
            text: text.into(),
            timestamp: Timestamp::now(),
        }
    }

    /// Message text carried by the event, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            ChatEvent::MessageReceived { text, .. } | ChatEvent::MessageSent { text, .. } => {
                Some(text)
            }
            ChatEvent::Connected | ChatEvent::Disconnected => None,
        }
    }

    /// Short event name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Connected => "Connected",
            ChatEvent::Disconnected => "Disconnected",
            ChatEvent::MessageReceived { .. } => "MessageReceived",
            ChatEvent::MessageSent { .. } => "MessageSent",
        }
    }
}

// ----------------------------------------------------------------------------
// Event Channel
// ----------------------------------------------------------------------------

pub type EventSender = mpsc::UnboundedSender<ChatEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ChatEvent>;

/// Create the event channel (Session → presentation layer)
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_text_accessor() {
        assert_eq!(ChatEvent::sent("hi").text(), Some("hi"));
        assert_eq!(ChatEvent::received("yo").text(), Some("yo"));
        assert_eq!(ChatEvent::Connected.text(), None);
        assert_eq!(ChatEvent::Disconnected.kind(), "Disconnected");
    }

    #[test]
    fn test_event_channel_preserves_order() {
        let (sender, mut receiver) = create_event_channel();

        sender.send(ChatEvent::Connected).unwrap();
        sender.send(ChatEvent::received("one")).unwrap();
        sender.send(ChatEvent::Disconnected).unwrap();
        drop(sender);

        let kinds = tokio_test::block_on(async {
            let mut kinds = Vec::new();
            while let Some(event) = receiver.recv().await {
                kinds.push(event.kind());
            }
            kinds
        });
        assert_eq!(kinds, vec!["Connected", "MessageReceived", "Disconnected"]);
    }
}

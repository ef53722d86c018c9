//! Receiving side: decode, classify, deduplicate, route.
//!
//! Every failure here is per message. The caller logs or counts it and moves
//! on to the next message; nothing is fatal to the connection.

use crate::config::ProtocolConfig;
use crate::dedup::{DedupOutcome, EphemeralDeduplicator};
use crate::events::{EventBus, ProtocolEvent};
use crate::ids::{PeerId, SessionId};
use crate::protocol::{self, DocMessage, GossipMessage, MessageError, RepoMessage, Route};
use crate::time::now_millis;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What to do with a received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Hand to per-document sync.
    Doc(DocMessage),
    /// Hand to the gossip handler.
    Gossip(GossipMessage),
    /// Ephemeral re-delivery; already handled once.
    Duplicate {
        sender_id: PeerId,
        session_id: SessionId,
        count: u64,
    },
}

impl Delivery {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Receive pipeline for one local peer.
///
/// Shareable across connection tasks; the dedup table does its own locking.
pub struct Inbox {
    config: ProtocolConfig,
    dedup: EphemeralDeduplicator,
    events: Arc<EventBus>,
}

impl Inbox {
    pub fn new(config: ProtocolConfig) -> Self {
        Self::with_events(config, Arc::new(EventBus::new()))
    }

    pub fn with_events(config: ProtocolConfig, events: Arc<EventBus>) -> Self {
        Self {
            dedup: EphemeralDeduplicator::new(config.dedup.clone()),
            config,
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Dedup state, e.g. to forget a disconnected peer.
    pub fn dedup(&self) -> &EphemeralDeduplicator {
        &self.dedup
    }

    /// Handle raw bytes from the transport.
    pub fn receive(&self, data: &[u8]) -> Result<Delivery, MessageError> {
        if data.len() > self.config.max_message_size {
            return Err(self.dropped(MessageError::TooLarge {
                size: data.len(),
                max: self.config.max_message_size,
            }));
        }

        let message = protocol::classify(data).map_err(|e| self.dropped(e))?;
        Ok(self.deliver(message, data.len()))
    }

    /// Handle a message that arrived already decoded.
    pub fn receive_message(&self, message: RepoMessage) -> Delivery {
        self.deliver(message, 0)
    }

    fn deliver(&self, message: RepoMessage, size: usize) -> Delivery {
        let message_type = message.kind().as_tag();
        let sender_id = message.sender_id().clone();

        let delivery = match message.into_route() {
            Route::Doc(DocMessage::Ephemeral(msg)) => {
                match self
                    .dedup
                    .check_and_record(&msg.sender_id, &msg.session_id, msg.count)
                {
                    DedupOutcome::Duplicate { .. } => {
                        self.events.emit(ProtocolEvent::DuplicateSuppressed {
                            sender_id: msg.sender_id.clone(),
                            session_id: msg.session_id.clone(),
                            count: msg.count,
                            timestamp: now_millis(),
                        });
                        return Delivery::Duplicate {
                            sender_id: msg.sender_id,
                            session_id: msg.session_id,
                            count: msg.count,
                        };
                    }
                    DedupOutcome::NewSession | DedupOutcome::Accepted => {
                        Delivery::Doc(DocMessage::Ephemeral(msg))
                    }
                }
            }
            Route::Doc(msg) => Delivery::Doc(msg),
            Route::Gossip(msg) => Delivery::Gossip(msg),
        };

        trace!(kind = message_type, sender = %sender_id, size, "Received message");
        self.events.emit(ProtocolEvent::MessageReceived {
            message_type: message_type.to_string(),
            sender_id,
            size,
            timestamp: now_millis(),
        });
        delivery
    }

    fn dropped(&self, err: MessageError) -> MessageError {
        match &err {
            // Newer peers may speak message types we don't know yet.
            MessageError::UnrecognizedMessageType(tag) => {
                debug!(tag = %tag, "Dropping message of unrecognized type")
            }
            _ => warn!(error = %err, "Dropping malformed message"),
        }

        self.events.emit(ProtocolEvent::MessageDropped {
            reason: err.reason().to_string(),
            detail: err.to_string(),
            timestamp: now_millis(),
        });
        err
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new(ProtocolConfig::default())
    }
}

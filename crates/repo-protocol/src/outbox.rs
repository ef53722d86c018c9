//! Sending side: stamping drafts and handing them to the transport.
//!
//! [`SenderState`] is the single authority for a process's sender identity,
//! session ID and ephemeral counter. Callers never set these themselves;
//! they pass [`OutboundContent`] drafts to an [`Outbox`].

use crate::events::{EventBus, ProtocolEvent};
use crate::ids::{PeerId, SessionId};
use crate::protocol::{OutboundContent, RepoMessage};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Peer not connected: {0}")]
    PeerNotConnected(PeerId),

    #[error("Transport closed")]
    Closed,

    #[error("Send failed: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SendError>;

/// Delivers finished messages to a peer. Implemented by network adapters.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: RepoMessage) -> Result<()>;
}

/// Identity and ephemeral sequencing for this process.
#[derive(Debug)]
pub struct SenderState {
    peer_id: PeerId,
    session_id: SessionId,
    count: AtomicU64,
}

impl SenderState {
    /// Start a new session for `peer_id`.
    pub fn new(peer_id: PeerId) -> Self {
        Self::with_session(peer_id, SessionId::generate())
    }

    pub fn with_session(peer_id: PeerId, session_id: SessionId) -> Self {
        Self {
            peer_id,
            session_id,
            count: AtomicU64::new(0),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Next ephemeral sequence number. The first is 1.
    pub fn next_count(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Fill in the transport-owned fields of a draft.
    pub fn stamp(&self, content: impl Into<OutboundContent>) -> RepoMessage {
        match content.into() {
            OutboundContent::Message(content) => content.stamp(self.peer_id.clone()),
            OutboundContent::Ephemeral(content) => {
                content.stamp(self.peer_id.clone(), self.session_id.clone(), self.next_count())
            }
        }
    }
}

/// Stamps drafts and sends them through a [`MessageSink`].
pub struct Outbox<S> {
    sender: SenderState,
    sink: S,
    events: Option<Arc<EventBus>>,
}

impl<S: MessageSink> Outbox<S> {
    pub fn new(sender: SenderState, sink: S) -> Self {
        Self {
            sender,
            sink,
            events: None,
        }
    }

    /// Publish a `MessageSent` event for every message.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn sender(&self) -> &SenderState {
        &self.sender
    }

    /// Stamp and send one draft. Returns the message as sent.
    pub async fn send(&self, content: impl Into<OutboundContent>) -> Result<RepoMessage> {
        let message = self.sender.stamp(content);
        self.deliver(message.clone()).await?;
        Ok(message)
    }

    /// Send one draft to several peers.
    ///
    /// The draft is stamped once, so an ephemeral broadcast carries the same
    /// `(sessionId, count)` to every recipient and relays can drop copies.
    /// Stops at the first transport error.
    pub async fn broadcast(
        &self,
        content: impl Into<OutboundContent>,
        targets: &[PeerId],
    ) -> Result<usize> {
        let stamped = self.sender.stamp(content);
        for target in targets {
            let mut message = stamped.clone();
            message.set_target(target.clone());
            self.deliver(message).await?;
        }
        Ok(targets.len())
    }

    /// Pass on a message someone else stamped, unchanged.
    ///
    /// Gossip relays must keep the original sender, session and count so
    /// receivers can recognize copies.
    pub async fn forward(&self, mut message: RepoMessage, target_id: PeerId) -> Result<()> {
        message.set_target(target_id);
        self.deliver(message).await
    }

    async fn deliver(&self, message: RepoMessage) -> Result<()> {
        let message_type = message.kind().as_tag().to_string();
        let target_id = message.target_id().clone();
        trace!(kind = %message_type, target = %target_id, "Sending message");

        self.sink.send(message).await?;

        if let Some(events) = &self.events {
            events.emit(ProtocolEvent::MessageSent {
                message_type,
                target_id,
                timestamp: crate::time::now_millis(),
            });
        }
        Ok(())
    }
}

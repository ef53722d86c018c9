//! Outbound message drafts.
//!
//! Callers build drafts containing only the fields they own. The transport
//! fills in the rest when it sends:
//!
//! - every message: `senderId`
//! - ephemeral messages: also `sessionId` and `count`, taken from the one
//!   counter the sending process owns
//!
//! No field is supplied by both sides, so a draft plus the transport's
//! values reconstructs exactly one message. Drafts carry `targetId` so the
//! same authored payload can be cloned and readdressed per recipient.

use super::classify::MessageKind;
use super::message::{
    DocumentUnavailableMessage, EphemeralMessage, RemoteHeadsChanged, RemoteSubscriptionControl,
    RepoMessage, RequestMessage, SyncMessage,
};
use crate::heads::NewHeads;
use crate::ids::{DocumentId, PeerId, SessionId, StorageId};

/// Draft of any non-ephemeral message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Sync {
        target_id: PeerId,
        document_id: DocumentId,
        data: Vec<u8>,
    },
    Request {
        target_id: PeerId,
        document_id: DocumentId,
        data: Vec<u8>,
    },
    DocumentUnavailable {
        target_id: PeerId,
        document_id: DocumentId,
    },
    RemoteSubscriptionControl {
        target_id: PeerId,
        add: Option<Vec<StorageId>>,
        remove: Option<Vec<StorageId>>,
    },
    RemoteHeadsChanged {
        target_id: PeerId,
        document_id: DocumentId,
        new_heads: NewHeads,
    },
}

/// Draft of an ephemeral message; session and count come from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralContent {
    pub target_id: PeerId,
    pub document_id: DocumentId,
    pub data: Vec<u8>,
}

/// Either kind of draft, as accepted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Message(MessageContent),
    Ephemeral(EphemeralContent),
}

impl MessageContent {
    pub fn sync(target_id: PeerId, document_id: DocumentId, data: Vec<u8>) -> Self {
        Self::Sync {
            target_id,
            document_id,
            data,
        }
    }

    pub fn request(target_id: PeerId, document_id: DocumentId, data: Vec<u8>) -> Self {
        Self::Request {
            target_id,
            document_id,
            data,
        }
    }

    pub fn document_unavailable(target_id: PeerId, document_id: DocumentId) -> Self {
        Self::DocumentUnavailable {
            target_id,
            document_id,
        }
    }

    pub fn subscription_change(
        target_id: PeerId,
        add: Option<Vec<StorageId>>,
        remove: Option<Vec<StorageId>>,
    ) -> Self {
        Self::RemoteSubscriptionControl {
            target_id,
            add,
            remove,
        }
    }

    pub fn heads_changed(target_id: PeerId, document_id: DocumentId, new_heads: NewHeads) -> Self {
        Self::RemoteHeadsChanged {
            target_id,
            document_id,
            new_heads,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Sync { .. } => MessageKind::Sync,
            Self::Request { .. } => MessageKind::Request,
            Self::DocumentUnavailable { .. } => MessageKind::DocumentUnavailable,
            Self::RemoteSubscriptionControl { .. } => MessageKind::RemoteSubscriptionControl,
            Self::RemoteHeadsChanged { .. } => MessageKind::RemoteHeadsChanged,
        }
    }

    pub fn target_id(&self) -> &PeerId {
        match self {
            Self::Sync { target_id, .. }
            | Self::Request { target_id, .. }
            | Self::DocumentUnavailable { target_id, .. }
            | Self::RemoteSubscriptionControl { target_id, .. }
            | Self::RemoteHeadsChanged { target_id, .. } => target_id,
        }
    }

    /// Same payload, different recipient.
    pub fn with_target(mut self, new_target: PeerId) -> Self {
        match &mut self {
            Self::Sync { target_id, .. }
            | Self::Request { target_id, .. }
            | Self::DocumentUnavailable { target_id, .. }
            | Self::RemoteSubscriptionControl { target_id, .. }
            | Self::RemoteHeadsChanged { target_id, .. } => *target_id = new_target,
        }
        self
    }

    /// Complete the message with the sender's identity.
    pub fn stamp(self, sender_id: PeerId) -> RepoMessage {
        match self {
            Self::Sync {
                target_id,
                document_id,
                data,
            } => RepoMessage::Sync(SyncMessage {
                sender_id,
                target_id,
                document_id,
                data,
            }),
            Self::Request {
                target_id,
                document_id,
                data,
            } => RepoMessage::Request(RequestMessage {
                sender_id,
                target_id,
                document_id,
                data,
            }),
            Self::DocumentUnavailable {
                target_id,
                document_id,
            } => RepoMessage::DocumentUnavailable(DocumentUnavailableMessage {
                sender_id,
                target_id,
                document_id,
            }),
            Self::RemoteSubscriptionControl {
                target_id,
                add,
                remove,
            } => RepoMessage::RemoteSubscriptionControl(RemoteSubscriptionControl {
                sender_id,
                target_id,
                add,
                remove,
            }),
            Self::RemoteHeadsChanged {
                target_id,
                document_id,
                new_heads,
            } => RepoMessage::RemoteHeadsChanged(RemoteHeadsChanged {
                sender_id,
                target_id,
                document_id,
                new_heads,
            }),
        }
    }
}

impl EphemeralContent {
    pub fn new(target_id: PeerId, document_id: DocumentId, data: Vec<u8>) -> Self {
        Self {
            target_id,
            document_id,
            data,
        }
    }

    /// Same payload, different recipient.
    pub fn with_target(self, target_id: PeerId) -> Self {
        Self { target_id, ..self }
    }

    /// Complete the message with the sender's identity and session state.
    pub fn stamp(self, sender_id: PeerId, session_id: SessionId, count: u64) -> RepoMessage {
        RepoMessage::Ephemeral(EphemeralMessage {
            sender_id,
            target_id: self.target_id,
            document_id: self.document_id,
            data: self.data,
            count,
            session_id,
        })
    }
}

impl OutboundContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Message(content) => content.kind(),
            Self::Ephemeral(_) => MessageKind::Ephemeral,
        }
    }

    pub fn target_id(&self) -> &PeerId {
        match self {
            Self::Message(content) => content.target_id(),
            Self::Ephemeral(content) => &content.target_id,
        }
    }
}

impl From<MessageContent> for OutboundContent {
    fn from(content: MessageContent) -> Self {
        Self::Message(content)
    }
}

impl From<EphemeralContent> for OutboundContent {
    fn from(content: EphemeralContent) -> Self {
        Self::Ephemeral(content)
    }
}

impl RepoMessage {
    /// Strip the transport-owned fields, leaving the caller's draft.
    pub fn into_content(self) -> OutboundContent {
        match self {
            Self::Sync(m) => MessageContent::sync(m.target_id, m.document_id, m.data).into(),
            Self::Request(m) => MessageContent::request(m.target_id, m.document_id, m.data).into(),
            Self::DocumentUnavailable(m) => {
                MessageContent::document_unavailable(m.target_id, m.document_id).into()
            }
            Self::Ephemeral(m) => EphemeralContent::new(m.target_id, m.document_id, m.data).into(),
            Self::RemoteSubscriptionControl(m) => {
                MessageContent::subscription_change(m.target_id, m.add, m.remove).into()
            }
            Self::RemoteHeadsChanged(m) => {
                MessageContent::heads_changed(m.target_id, m.document_id, m.new_heads).into()
            }
        }
    }
}

impl MessageKind {
    /// Wire fields the caller supplies when drafting this kind.
    ///
    /// `add` and `remove` are listed for subscription changes even though
    /// either may be omitted.
    pub fn caller_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Sync | Self::Request | Self::Ephemeral => {
                &["type", "targetId", "documentId", "data"]
            }
            Self::DocumentUnavailable => &["type", "targetId", "documentId"],
            Self::RemoteSubscriptionControl => &["type", "targetId", "add", "remove"],
            Self::RemoteHeadsChanged => &["type", "targetId", "documentId", "newHeads"],
        }
    }

    /// Wire fields the transport injects at send time.
    pub fn transport_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Ephemeral => &["senderId", "count", "sessionId"],
            _ => &["senderId"],
        }
    }
}

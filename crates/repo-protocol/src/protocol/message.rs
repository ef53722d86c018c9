//! Wire message types exchanged between repo peers.
//!
//! Every message is a JSON object tagged by `type`, carrying `senderId` and
//! `targetId` plus a variant-specific payload. Field names are camelCase to
//! match the other implementations on the network.
//!
//! `data` fields are opaque sync payloads owned by the document engine. They
//! are `Vec<u8>` and serialize as a JSON number array.

use super::classify::{self, MessageError, MessageKind};
use crate::heads::NewHeads;
use crate::ids::{DocumentId, PeerId, SessionId, StorageId};
use serde::{Deserialize, Serialize};

/// An incremental sync payload for a document.
///
/// Wire format: `{"type":"sync","senderId":..,"targetId":..,"documentId":..,"data":[..]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    pub sender_id: PeerId,
    pub target_id: PeerId,
    pub document_id: DocumentId,
    pub data: Vec<u8>,
}

/// The initial probe asking a peer whether it has a document.
///
/// Same shape as [`SyncMessage`]; the payload is the requester's first sync
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    pub sender_id: PeerId,
    pub target_id: PeerId,
    pub document_id: DocumentId,
    pub data: Vec<u8>,
}

/// Terminal negative answer to a request.
///
/// The sender has checked its own storage and its connected peers and found
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUnavailableMessage {
    pub sender_id: PeerId,
    pub target_id: PeerId,
    pub document_id: DocumentId,
}

/// A broadcast payload that is never persisted.
///
/// `count` increases strictly within one `session_id`, which lets receivers
/// drop copies that arrive over more than one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralMessage {
    pub sender_id: PeerId,
    pub target_id: PeerId,
    pub document_id: DocumentId,
    pub data: Vec<u8>,
    pub count: u64,
    pub session_id: SessionId,
}

/// Changes the set of storage locations the sender wants heads gossip for.
///
/// `None` means "no change in this direction" and is omitted on the wire;
/// `Some(vec![])` is kept as an empty array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSubscriptionControl {
    pub sender_id: PeerId,
    pub target_id: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<StorageId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<Vec<StorageId>>,
}

/// Notification that storage locations now show a document at new heads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHeadsChanged {
    pub sender_id: PeerId,
    pub target_id: PeerId,
    pub document_id: DocumentId,
    pub new_heads: NewHeads,
}

/// Every message a repo can send or receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RepoMessage {
    #[serde(rename = "sync")]
    Sync(SyncMessage),
    #[serde(rename = "request")]
    Request(RequestMessage),
    #[serde(rename = "doc-unavailable")]
    DocumentUnavailable(DocumentUnavailableMessage),
    #[serde(rename = "ephemeral")]
    Ephemeral(EphemeralMessage),
    #[serde(rename = "remote-subscription-change")]
    RemoteSubscriptionControl(RemoteSubscriptionControl),
    #[serde(rename = "remote-heads-changed")]
    RemoteHeadsChanged(RemoteHeadsChanged),
}

/// The subset handled by per-document synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DocMessage {
    #[serde(rename = "sync")]
    Sync(SyncMessage),
    #[serde(rename = "request")]
    Request(RequestMessage),
    #[serde(rename = "doc-unavailable")]
    DocumentUnavailable(DocumentUnavailableMessage),
    #[serde(rename = "ephemeral")]
    Ephemeral(EphemeralMessage),
}

/// The subscription/heads pair, routed to the gossip handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GossipMessage {
    #[serde(rename = "remote-subscription-change")]
    RemoteSubscriptionControl(RemoteSubscriptionControl),
    #[serde(rename = "remote-heads-changed")]
    RemoteHeadsChanged(RemoteHeadsChanged),
}

/// Where a received message should be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Doc(DocMessage),
    Gossip(GossipMessage),
}

impl RepoMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Sync(_) => MessageKind::Sync,
            Self::Request(_) => MessageKind::Request,
            Self::DocumentUnavailable(_) => MessageKind::DocumentUnavailable,
            Self::Ephemeral(_) => MessageKind::Ephemeral,
            Self::RemoteSubscriptionControl(_) => MessageKind::RemoteSubscriptionControl,
            Self::RemoteHeadsChanged(_) => MessageKind::RemoteHeadsChanged,
        }
    }

    pub fn sender_id(&self) -> &PeerId {
        match self {
            Self::Sync(m) => &m.sender_id,
            Self::Request(m) => &m.sender_id,
            Self::DocumentUnavailable(m) => &m.sender_id,
            Self::Ephemeral(m) => &m.sender_id,
            Self::RemoteSubscriptionControl(m) => &m.sender_id,
            Self::RemoteHeadsChanged(m) => &m.sender_id,
        }
    }

    pub fn target_id(&self) -> &PeerId {
        match self {
            Self::Sync(m) => &m.target_id,
            Self::Request(m) => &m.target_id,
            Self::DocumentUnavailable(m) => &m.target_id,
            Self::Ephemeral(m) => &m.target_id,
            Self::RemoteSubscriptionControl(m) => &m.target_id,
            Self::RemoteHeadsChanged(m) => &m.target_id,
        }
    }

    /// Readdress an already stamped message.
    ///
    /// Used by the transport when fanning one message out to several peers.
    pub fn set_target(&mut self, target_id: PeerId) {
        let slot = match self {
            Self::Sync(m) => &mut m.target_id,
            Self::Request(m) => &mut m.target_id,
            Self::DocumentUnavailable(m) => &mut m.target_id,
            Self::Ephemeral(m) => &mut m.target_id,
            Self::RemoteSubscriptionControl(m) => &mut m.target_id,
            Self::RemoteHeadsChanged(m) => &mut m.target_id,
        };
        *slot = target_id;
    }

    /// The document this message is about, if any.
    ///
    /// Subscription changes are about storage locations, not documents.
    pub fn document_id(&self) -> Option<&DocumentId> {
        match self {
            Self::Sync(m) => Some(&m.document_id),
            Self::Request(m) => Some(&m.document_id),
            Self::DocumentUnavailable(m) => Some(&m.document_id),
            Self::Ephemeral(m) => Some(&m.document_id),
            Self::RemoteSubscriptionControl(_) => None,
            Self::RemoteHeadsChanged(m) => Some(&m.document_id),
        }
    }

    /// Split into the document-sync or gossip half of the protocol.
    pub fn into_route(self) -> Route {
        match self {
            Self::Sync(m) => Route::Doc(DocMessage::Sync(m)),
            Self::Request(m) => Route::Doc(DocMessage::Request(m)),
            Self::DocumentUnavailable(m) => Route::Doc(DocMessage::DocumentUnavailable(m)),
            Self::Ephemeral(m) => Route::Doc(DocMessage::Ephemeral(m)),
            Self::RemoteSubscriptionControl(m) => {
                Route::Gossip(GossipMessage::RemoteSubscriptionControl(m))
            }
            Self::RemoteHeadsChanged(m) => Route::Gossip(GossipMessage::RemoteHeadsChanged(m)),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("RepoMessage serialization should not fail")
    }

    /// Parse and classify JSON bytes.
    ///
    /// Unknown `type` values and recognized types with bad payloads are
    /// reported separately; see [`MessageError`].
    pub fn from_json(data: &[u8]) -> Result<Self, MessageError> {
        classify::classify(data)
    }
}

impl DocMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Sync(_) => MessageKind::Sync,
            Self::Request(_) => MessageKind::Request,
            Self::DocumentUnavailable(_) => MessageKind::DocumentUnavailable,
            Self::Ephemeral(_) => MessageKind::Ephemeral,
        }
    }

    pub fn sender_id(&self) -> &PeerId {
        match self {
            Self::Sync(m) => &m.sender_id,
            Self::Request(m) => &m.sender_id,
            Self::DocumentUnavailable(m) => &m.sender_id,
            Self::Ephemeral(m) => &m.sender_id,
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        match self {
            Self::Sync(m) => &m.document_id,
            Self::Request(m) => &m.document_id,
            Self::DocumentUnavailable(m) => &m.document_id,
            Self::Ephemeral(m) => &m.document_id,
        }
    }
}

impl GossipMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::RemoteSubscriptionControl(_) => MessageKind::RemoteSubscriptionControl,
            Self::RemoteHeadsChanged(_) => MessageKind::RemoteHeadsChanged,
        }
    }
}

impl From<DocMessage> for RepoMessage {
    fn from(msg: DocMessage) -> Self {
        match msg {
            DocMessage::Sync(m) => Self::Sync(m),
            DocMessage::Request(m) => Self::Request(m),
            DocMessage::DocumentUnavailable(m) => Self::DocumentUnavailable(m),
            DocMessage::Ephemeral(m) => Self::Ephemeral(m),
        }
    }
}

impl From<GossipMessage> for RepoMessage {
    fn from(msg: GossipMessage) -> Self {
        match msg {
            GossipMessage::RemoteSubscriptionControl(m) => Self::RemoteSubscriptionControl(m),
            GossipMessage::RemoteHeadsChanged(m) => Self::RemoteHeadsChanged(m),
        }
    }
}

impl TryFrom<RepoMessage> for DocMessage {
    /// Gossip messages are handed back unchanged.
    type Error = GossipMessage;

    fn try_from(msg: RepoMessage) -> Result<Self, Self::Error> {
        match msg.into_route() {
            Route::Doc(doc) => Ok(doc),
            Route::Gossip(gossip) => Err(gossip),
        }
    }
}

//! Classifying raw messages.
//!
//! A received message is first read as an [`Envelope`]: the `type` tag plus
//! whatever other fields arrived. The predicates here look only at the tag.
//! Only once the tag is recognized is the payload decoded into its typed
//! variant, so no variant-specific field is touched before classification
//! succeeds.
//!
//! Unknown tags are expected (a peer may speak a newer protocol) and are
//! reported as [`MessageError::UnrecognizedMessageType`]. A known tag with a
//! missing or ill-typed field is a serialization bug on the other side and is
//! reported as [`MessageError::MalformedVariant`].

use super::message::RepoMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Not a JSON message object: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Unrecognized message type: {0}")]
    UnrecognizedMessageType(String),

    #[error("Malformed {kind} message: {reason}")]
    MalformedVariant { kind: MessageKind, reason: String },
}

impl MessageError {
    /// Short label for logs and events.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::TooLarge { .. } => "too-large",
            Self::UnrecognizedMessageType(_) => "unrecognized-type",
            Self::MalformedVariant { .. } => "malformed",
        }
    }
}

/// The six message discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Sync,
    Request,
    DocumentUnavailable,
    Ephemeral,
    RemoteSubscriptionControl,
    RemoteHeadsChanged,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        Self::Sync,
        Self::Request,
        Self::DocumentUnavailable,
        Self::Ephemeral,
        Self::RemoteSubscriptionControl,
        Self::RemoteHeadsChanged,
    ];

    /// The literal used for the `type` field on the wire.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Request => "request",
            Self::DocumentUnavailable => "doc-unavailable",
            Self::Ephemeral => "ephemeral",
            Self::RemoteSubscriptionControl => "remote-subscription-change",
            Self::RemoteHeadsChanged => "remote-heads-changed",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_tag() == tag)
    }

    /// Whether per-document sync handles this kind (as opposed to gossip).
    pub fn is_doc_message(&self) -> bool {
        !matches!(
            self,
            Self::RemoteSubscriptionControl | Self::RemoteHeadsChanged
        )
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A message read only as far as its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Parse JSON bytes far enough to read the tag.
    pub fn from_json(data: &[u8]) -> Result<Self, MessageError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_tag(&self.msg_type)
    }

    pub fn is_repo_message(&self) -> bool {
        self.kind().is_some()
    }

    pub fn is_sync_message(&self) -> bool {
        self.kind() == Some(MessageKind::Sync)
    }

    pub fn is_request_message(&self) -> bool {
        self.kind() == Some(MessageKind::Request)
    }

    pub fn is_document_unavailable_message(&self) -> bool {
        self.kind() == Some(MessageKind::DocumentUnavailable)
    }

    pub fn is_ephemeral_message(&self) -> bool {
        self.kind() == Some(MessageKind::Ephemeral)
    }

    pub fn is_remote_subscription_control_message(&self) -> bool {
        self.kind() == Some(MessageKind::RemoteSubscriptionControl)
    }

    pub fn is_remote_heads_changed(&self) -> bool {
        self.kind() == Some(MessageKind::RemoteHeadsChanged)
    }

    /// Decode the payload into its typed variant.
    pub fn classify(self) -> Result<RepoMessage, MessageError> {
        let kind = self
            .kind()
            .ok_or_else(|| MessageError::UnrecognizedMessageType(self.msg_type.clone()))?;

        let mut object = self.fields;
        object.insert("type".to_string(), Value::String(self.msg_type));

        serde_json::from_value(Value::Object(object)).map_err(|e| MessageError::MalformedVariant {
            kind,
            reason: e.to_string(),
        })
    }
}

/// Parse and classify a message from JSON bytes.
pub fn classify(data: &[u8]) -> Result<RepoMessage, MessageError> {
    Envelope::from_json(data)?.classify()
}

//! repo-protocol: Wire protocol for peers syncing CRDT-backed documents.
//!
//! This crate provides:
//! - Opaque identifiers for peers, documents, sessions and storage locations
//! - The message model and its JSON codec
//! - Classification of raw messages into typed variants
//! - Caller-side drafts and the transport-side stamping step
//! - Duplicate suppression for ephemeral broadcasts
//! - Subscription, heads and request/sync bookkeeping for the collaborators
//!   that drive the protocol
//!
//! The CRDT engine, network transport and storage are out of scope: sync
//! payloads are opaque bytes and delivery goes through [`MessageSink`].

pub mod config;
pub mod dedup;
pub mod doc_sync;
pub mod events;
pub mod heads;
pub mod ids;
pub mod inbox;
pub mod outbox;
pub mod protocol;
pub mod subscription;
pub mod time;

pub use config::{ConfigError, DedupConfig, ProtocolConfig};
pub use dedup::{DedupOutcome, EphemeralDeduplicator};
pub use doc_sync::{respond_to_request, DocSyncState, DocSyncTracker};
pub use events::{EventBus, ProtocolEvent, Subscription};
pub use heads::{HeadsInfo, NewHeads, RemoteHeadsTracker};
pub use ids::{DocumentId, IdError, PeerId, SessionId, StorageId};
pub use inbox::{Delivery, Inbox};
pub use outbox::{MessageSink, Outbox, SendError, SenderState};
pub use protocol::{
    classify, DocMessage, EphemeralContent, GossipMessage, MessageContent, MessageError,
    MessageKind, OutboundContent, RepoMessage, Route,
};
pub use subscription::{apply_subscription_delta, RemoteSubscriptions};

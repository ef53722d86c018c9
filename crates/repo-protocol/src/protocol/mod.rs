//! Wire protocol for repo peers.
//!
//! - Message model and JSON codec (`message`)
//! - Classification of raw envelopes into typed messages (`classify`)
//! - Caller-side drafts that the transport stamps before sending (`content`)

pub mod classify;
pub mod content;
pub mod message;

pub use classify::{classify, Envelope, MessageError, MessageKind};
pub use content::{EphemeralContent, MessageContent, OutboundContent};
pub use message::{
    DocMessage, DocumentUnavailableMessage, EphemeralMessage, GossipMessage,
    RemoteHeadsChanged, RemoteSubscriptionControl, RepoMessage, RequestMessage, Route,
    SyncMessage,
};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::heads::{HeadsInfo, NewHeads};
    use crate::ids::{DocumentId, PeerId, SessionId, StorageId};

    fn peer(s: &str) -> PeerId {
        s.parse::<PeerId>().unwrap()
    }

    fn doc() -> DocumentId {
        "d1".parse::<DocumentId>().unwrap()
    }

    /// One message of each variant, in declaration order.
    pub(crate) fn sample_messages() -> Vec<RepoMessage> {
        let mut new_heads = NewHeads::new();
        new_heads.insert(
            "storageX".parse::<StorageId>().unwrap(),
            HeadsInfo::new(vec!["h1".into(), "h2".into()], 1000),
        );

        vec![
            RepoMessage::Sync(SyncMessage {
                sender_id: peer("a"),
                target_id: peer("b"),
                document_id: doc(),
                data: vec![1, 2, 3],
            }),
            RepoMessage::Request(RequestMessage {
                sender_id: peer("a"),
                target_id: peer("b"),
                document_id: doc(),
                data: vec![4],
            }),
            RepoMessage::DocumentUnavailable(DocumentUnavailableMessage {
                sender_id: peer("b"),
                target_id: peer("a"),
                document_id: doc(),
            }),
            RepoMessage::Ephemeral(EphemeralMessage {
                sender_id: peer("a"),
                target_id: peer("b"),
                document_id: doc(),
                data: vec![9, 9],
                count: 7,
                session_id: "s1".parse::<SessionId>().unwrap(),
            }),
            RepoMessage::RemoteSubscriptionControl(RemoteSubscriptionControl {
                sender_id: peer("a"),
                target_id: peer("b"),
                add: Some(vec!["s4".parse::<StorageId>().unwrap()]),
                remove: Some(vec!["s2".parse::<StorageId>().unwrap()]),
            }),
            RepoMessage::RemoteHeadsChanged(RemoteHeadsChanged {
                sender_id: peer("a"),
                target_id: peer("b"),
                document_id: doc(),
                new_heads,
            }),
        ]
    }
}

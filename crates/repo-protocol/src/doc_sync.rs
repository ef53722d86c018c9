//! Request / sync / unavailable bookkeeping per peer and document.
//!
//! 1. We send `request` for a document to a peer: state is `Requested`
//! 2. The peer answers with one or more `sync` messages: `Synced`. Sync
//!    traffic continues for as long as both sides edit.
//! 3. Or the peer answers `doc-unavailable`: `Unavailable`. The peer has
//!    checked its storage and its own neighbours, so there is no point
//!    asking it again until something changes and we send a new request.
//!
//! How many sync rounds are needed is up to the document engine; this only
//! tracks which of the three states each pair is in.

use crate::ids::{DocumentId, PeerId};
use crate::protocol::{DocMessage, MessageContent, RequestMessage};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocSyncState {
    /// Request sent, no answer yet.
    Requested,
    /// At least one sync message received.
    Synced,
    /// The peer reported it cannot find the document.
    Unavailable,
}

/// Sync state for each `(peer, document)` pair.
#[derive(Debug, Default)]
pub struct DocSyncTracker {
    states: HashMap<(PeerId, DocumentId), DocSyncState>,
}

impl DocSyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that we asked `peer` for `document_id`.
    ///
    /// Re-requesting clears an earlier `Unavailable`. A pair that is already
    /// `Synced` stays synced.
    pub fn request_sent(&mut self, peer: &PeerId, document_id: &DocumentId) -> DocSyncState {
        let state = self
            .states
            .entry((peer.clone(), document_id.clone()))
            .and_modify(|state| {
                if *state == DocSyncState::Unavailable {
                    *state = DocSyncState::Requested;
                }
            })
            .or_insert(DocSyncState::Requested);
        *state
    }

    /// Update state from a message the peer sent us.
    ///
    /// Returns the new state when it changed.
    pub fn observe(&mut self, msg: &DocMessage) -> Option<DocSyncState> {
        let key = (msg.sender_id().clone(), msg.document_id().clone());
        let current = self.states.get(&key).copied();

        let next = match (msg, current) {
            (DocMessage::Sync(_), Some(DocSyncState::Synced)) => return None,
            (DocMessage::Sync(_), _) => DocSyncState::Synced,
            (DocMessage::DocumentUnavailable(_), Some(DocSyncState::Requested)) => {
                DocSyncState::Unavailable
            }
            (DocMessage::DocumentUnavailable(m), current) => {
                debug!(
                    peer = %m.sender_id,
                    document = %m.document_id,
                    state = ?current,
                    "Ignoring doc-unavailable outside of a pending request"
                );
                return None;
            }
            // Requests and ephemeral traffic don't change our view of the peer.
            (DocMessage::Request(_) | DocMessage::Ephemeral(_), _) => return None,
        };

        self.states.insert(key, next);
        Some(next)
    }

    pub fn state(&self, peer: &PeerId, document_id: &DocumentId) -> Option<DocSyncState> {
        self.states
            .get(&(peer.clone(), document_id.clone()))
            .copied()
    }

    /// True when every listed peer has reported the document unavailable.
    ///
    /// An empty peer list is never "all unavailable": nobody was asked.
    pub fn unavailable_everywhere(&self, document_id: &DocumentId, peers: &[PeerId]) -> bool {
        !peers.is_empty()
            && peers
                .iter()
                .all(|peer| self.state(peer, document_id) == Some(DocSyncState::Unavailable))
    }

    /// Drop all state for a disconnected peer.
    pub fn forget_peer(&mut self, peer: &PeerId) {
        self.states.retain(|(p, _), _| p != peer);
    }
}

/// Build the answer to a request.
///
/// `sync_data` is the document engine's first sync message when we have the
/// document, or `None` when neither we nor our peers do.
pub fn respond_to_request(request: &RequestMessage, sync_data: Option<Vec<u8>>) -> MessageContent {
    let target_id = request.sender_id.clone();
    let document_id = request.document_id.clone();

    match sync_data {
        Some(data) => MessageContent::sync(target_id, document_id, data),
        None => MessageContent::document_unavailable(target_id, document_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DocumentUnavailableMessage, EphemeralMessage, SyncMessage};

    fn sync_from(peer: &str, doc: &str) -> DocMessage {
        DocMessage::Sync(SyncMessage {
            sender_id: peer.parse().unwrap(),
            target_id: "me".parse().unwrap(),
            document_id: doc.parse().unwrap(),
            data: vec![1],
        })
    }

    fn unavailable_from(peer: &str, doc: &str) -> DocMessage {
        DocMessage::DocumentUnavailable(DocumentUnavailableMessage {
            sender_id: peer.parse().unwrap(),
            target_id: "me".parse().unwrap(),
            document_id: doc.parse().unwrap(),
        })
    }

    fn request_from(peer: &str, doc: &str) -> RequestMessage {
        RequestMessage {
            sender_id: peer.parse().unwrap(),
            target_id: "me".parse().unwrap(),
            document_id: doc.parse().unwrap(),
            data: vec![0],
        }
    }

    // ==================== Transitions ====================

    #[test]
    fn test_request_then_sync() {
        let mut tracker = DocSyncTracker::new();
        let (b, d1) = ("b".parse::<PeerId>().unwrap(), "d1".parse::<DocumentId>().unwrap());

        assert_eq!(tracker.request_sent(&b, &d1), DocSyncState::Requested);
        assert_eq!(tracker.observe(&sync_from("b", "d1")), Some(DocSyncState::Synced));
        // Further sync rounds don't change anything
        assert_eq!(tracker.observe(&sync_from("b", "d1")), None);
        assert_eq!(tracker.state(&b, &d1), Some(DocSyncState::Synced));
    }

    #[test]
    fn test_request_then_unavailable() {
        let mut tracker = DocSyncTracker::new();
        let (b, d1) = ("b".parse::<PeerId>().unwrap(), "d1".parse::<DocumentId>().unwrap());

        tracker.request_sent(&b, &d1);
        assert_eq!(
            tracker.observe(&unavailable_from("b", "d1")),
            Some(DocSyncState::Unavailable)
        );
        assert_eq!(tracker.state(&b, &d1), Some(DocSyncState::Unavailable));
    }

    #[test]
    fn test_rerequest_clears_unavailable() {
        let mut tracker = DocSyncTracker::new();
        let (b, d1) = ("b".parse::<PeerId>().unwrap(), "d1".parse::<DocumentId>().unwrap());

        tracker.request_sent(&b, &d1);
        tracker.observe(&unavailable_from("b", "d1"));
        assert_eq!(tracker.request_sent(&b, &d1), DocSyncState::Requested);
    }

    #[test]
    fn test_synced_survives_rerequest_and_stray_unavailable() {
        let mut tracker = DocSyncTracker::new();
        let (b, d1) = ("b".parse::<PeerId>().unwrap(), "d1".parse::<DocumentId>().unwrap());

        tracker.observe(&sync_from("b", "d1"));
        assert_eq!(tracker.request_sent(&b, &d1), DocSyncState::Synced);
        assert_eq!(tracker.observe(&unavailable_from("b", "d1")), None);
        assert_eq!(tracker.state(&b, &d1), Some(DocSyncState::Synced));
    }

    #[test]
    fn test_unsolicited_unavailable_ignored() {
        let mut tracker = DocSyncTracker::new();
        assert_eq!(tracker.observe(&unavailable_from("b", "d1")), None);
        assert_eq!(tracker.state(&"b".parse().unwrap(), &"d1".parse().unwrap()), None);
    }

    #[test]
    fn test_sync_after_unavailable() {
        // The peer found the document later and started syncing anyway.
        let mut tracker = DocSyncTracker::new();
        tracker.request_sent(&"b".parse().unwrap(), &"d1".parse().unwrap());
        tracker.observe(&unavailable_from("b", "d1"));
        assert_eq!(tracker.observe(&sync_from("b", "d1")), Some(DocSyncState::Synced));
    }

    #[test]
    fn test_requests_and_ephemeral_ignored() {
        let mut tracker = DocSyncTracker::new();
        assert_eq!(tracker.observe(&DocMessage::Request(request_from("b", "d1"))), None);

        let ephemeral = DocMessage::Ephemeral(EphemeralMessage {
            sender_id: "b".parse().unwrap(),
            target_id: "me".parse().unwrap(),
            document_id: "d1".parse().unwrap(),
            data: vec![],
            count: 1,
            session_id: "s".parse().unwrap(),
        });
        assert_eq!(tracker.observe(&ephemeral), None);
    }

    #[test]
    fn test_unavailable_everywhere() {
        let mut tracker = DocSyncTracker::new();
        let d1 = "d1".parse::<DocumentId>().unwrap();
        let peers = vec!["b".parse::<PeerId>().unwrap(), "c".parse::<PeerId>().unwrap()];

        assert!(!tracker.unavailable_everywhere(&d1, &[]));

        for peer in &peers {
            tracker.request_sent(peer, &d1);
        }
        tracker.observe(&unavailable_from("b", "d1"));
        assert!(!tracker.unavailable_everywhere(&d1, &peers));

        tracker.observe(&unavailable_from("c", "d1"));
        assert!(tracker.unavailable_everywhere(&d1, &peers));
    }

    #[test]
    fn test_forget_peer() {
        let mut tracker = DocSyncTracker::new();
        tracker.request_sent(&"b".parse().unwrap(), &"d1".parse().unwrap());
        tracker.request_sent(&"c".parse().unwrap(), &"d1".parse().unwrap());
        tracker.forget_peer(&"b".parse().unwrap());

        assert_eq!(tracker.state(&"b".parse().unwrap(), &"d1".parse().unwrap()), None);
        assert_eq!(tracker.state(&"c".parse().unwrap(), &"d1".parse().unwrap()), Some(DocSyncState::Requested));
    }

    // ==================== respond_to_request ====================

    #[test]
    fn test_respond_with_sync() {
        let content = respond_to_request(&request_from("a", "d1"), Some(vec![7, 7]));
        assert_eq!(content, MessageContent::sync("a".parse().unwrap(), "d1".parse().unwrap(), vec![7, 7]));
    }

    #[test]
    fn test_respond_unavailable() {
        let content = respond_to_request(&request_from("a", "d1"), None);
        assert_eq!(content, MessageContent::document_unavailable("a".parse().unwrap(), "d1".parse().unwrap()));
    }
}

//! Remote heads gossip.
//!
//! A `remote-heads-changed` message says "storage location S shows document D
//! at these heads, as of this timestamp". Heads are opaque version markers and
//! are passed through untouched; only the timestamp is interpreted, to drop
//! stale gossip that arrives after something newer.

use crate::ids::{DocumentId, StorageId};
use crate::protocol::RemoteHeadsChanged;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// One storage location's view of a document's current version.
///
/// Wire format: `{"heads":["h1","h2"],"timestamp":1000}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadsInfo {
    /// Ordered frontier of change hashes.
    pub heads: Vec<String>,
    /// Milliseconds since the Unix epoch when the heads were observed.
    pub timestamp: u64,
}

/// Heads per storage location, as carried by `newHeads`.
pub type NewHeads = HashMap<StorageId, HeadsInfo>;

impl HeadsInfo {
    pub fn new(heads: Vec<String>, timestamp: u64) -> Self {
        Self { heads, timestamp }
    }

    /// Heads observed right now.
    pub fn now(heads: Vec<String>) -> Self {
        Self::new(heads, crate::time::now_millis())
    }
}

/// Last known heads for each `(document, storage)` pair.
///
/// Consumers compare these against local heads to decide whether a
/// `request` is worth sending, without transferring document content.
#[derive(Debug, Default)]
pub struct RemoteHeadsTracker {
    known: HashMap<DocumentId, NewHeads>,
}

impl RemoteHeadsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a heads-changed notification.
    ///
    /// Entries whose timestamp is not strictly newer than what we already
    /// hold for that storage are ignored. Returns the entries that were
    /// accepted, which are the only ones worth forwarding to subscribers.
    pub fn apply(&mut self, msg: &RemoteHeadsChanged) -> NewHeads {
        let known = self.known.entry(msg.document_id.clone()).or_default();
        let mut accepted = NewHeads::new();

        for (storage_id, info) in &msg.new_heads {
            let newer = known
                .get(storage_id)
                .is_none_or(|current| info.timestamp > current.timestamp);

            if newer {
                known.insert(storage_id.clone(), info.clone());
                accepted.insert(storage_id.clone(), info.clone());
            } else {
                trace!(
                    document = %msg.document_id,
                    storage = %storage_id,
                    timestamp = info.timestamp,
                    "Ignoring stale remote heads"
                );
            }
        }

        accepted
    }

    /// Known heads for a document, per storage location.
    pub fn heads_for(&self, document_id: &DocumentId) -> Option<&NewHeads> {
        self.known.get(document_id)
    }

    /// Known heads for one storage location's copy of a document.
    pub fn heads_at(&self, document_id: &DocumentId, storage_id: &StorageId) -> Option<&HeadsInfo> {
        self.known.get(document_id)?.get(storage_id)
    }

    /// Drop everything known about a document.
    pub fn forget_document(&mut self, document_id: &DocumentId) -> bool {
        self.known.remove(document_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PeerId;

    fn heads_changed(entries: &[(&str, &[&str], u64)]) -> RemoteHeadsChanged {
        let new_heads = entries
            .iter()
            .map(|(storage, heads, ts)| {
                let heads = heads.iter().map(|h| h.to_string()).collect();
                (storage.parse::<StorageId>().unwrap(), HeadsInfo::new(heads, *ts))
            })
            .collect();

        RemoteHeadsChanged {
            sender_id: "peer-a".parse::<PeerId>().unwrap(),
            target_id: "peer-b".parse::<PeerId>().unwrap(),
            document_id: "d1".parse::<DocumentId>().unwrap(),
            new_heads,
        }
    }

    // ==================== HeadsInfo ====================

    #[test]
    fn test_heads_info_wire_format() {
        let info = HeadsInfo::new(vec!["h1".into(), "h2".into()], 1000);
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"heads":["h1","h2"],"timestamp":1000}"#);
    }

    #[test]
    fn test_heads_info_now_is_recent() {
        let info = HeadsInfo::now(vec![]);
        assert!(info.timestamp > 1_600_000_000_000);
    }

    // ==================== RemoteHeadsTracker ====================

    #[test]
    fn test_first_heads_accepted() {
        let mut tracker = RemoteHeadsTracker::new();
        let accepted = tracker.apply(&heads_changed(&[("storageX", &["h1", "h2"], 1000)]));

        assert_eq!(accepted.len(), 1);
        let info = tracker
            .heads_at(&"d1".parse::<DocumentId>().unwrap(), &"storageX".parse::<StorageId>().unwrap())
            .unwrap();
        assert_eq!(info.heads, vec!["h1", "h2"]);
        assert_eq!(info.timestamp, 1000);
    }

    #[test]
    fn test_newer_heads_replace_older() {
        let mut tracker = RemoteHeadsTracker::new();
        tracker.apply(&heads_changed(&[("storageX", &["h1"], 1000)]));
        let accepted = tracker.apply(&heads_changed(&[("storageX", &["h3"], 2000)]));

        assert_eq!(accepted.len(), 1);
        let info = tracker
            .heads_at(&"d1".parse::<DocumentId>().unwrap(), &"storageX".parse::<StorageId>().unwrap())
            .unwrap();
        assert_eq!(info.heads, vec!["h3"]);
    }

    #[test]
    fn test_stale_and_equal_timestamps_ignored() {
        let mut tracker = RemoteHeadsTracker::new();
        tracker.apply(&heads_changed(&[("storageX", &["h3"], 2000)]));

        let stale = tracker.apply(&heads_changed(&[("storageX", &["h1"], 1000)]));
        assert!(stale.is_empty());

        let equal = tracker.apply(&heads_changed(&[("storageX", &["h9"], 2000)]));
        assert!(equal.is_empty());

        let info = tracker
            .heads_at(&"d1".parse::<DocumentId>().unwrap(), &"storageX".parse::<StorageId>().unwrap())
            .unwrap();
        assert_eq!(info.heads, vec!["h3"]);
    }

    #[test]
    fn test_mixed_entries_partially_accepted() {
        let mut tracker = RemoteHeadsTracker::new();
        tracker.apply(&heads_changed(&[("storageX", &["h1"], 1000)]));

        let accepted = tracker.apply(&heads_changed(&[
            ("storageX", &["h0"], 500),
            ("storageY", &["h2"], 600),
        ]));

        assert_eq!(accepted.len(), 1);
        assert!(accepted.contains_key(&"storageY".parse::<StorageId>().unwrap()));
        assert_eq!(tracker.heads_for(&"d1".parse::<DocumentId>().unwrap()).unwrap().len(), 2);
    }

    #[test]
    fn test_forget_document() {
        let mut tracker = RemoteHeadsTracker::new();
        tracker.apply(&heads_changed(&[("storageX", &["h1"], 1000)]));

        assert!(tracker.forget_document(&"d1".parse::<DocumentId>().unwrap()));
        assert!(!tracker.forget_document(&"d1".parse::<DocumentId>().unwrap()));
        assert!(tracker.heads_for(&"d1".parse::<DocumentId>().unwrap()).is_none());
    }
}

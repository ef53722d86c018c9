//! Remote subscription bookkeeping.
//!
//! Peers tell each other which storage locations they want heads gossip
//! for. A `remote-subscription-change` message is a delta: `remove` is
//! applied first, then `add`, so an identifier present in both ends up
//! subscribed.

use crate::ids::{PeerId, StorageId};
use crate::protocol::RemoteSubscriptionControl;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Compute `(current \ remove) ∪ add`.
///
/// `None` leaves that direction unchanged.
pub fn apply_subscription_delta(
    current: &HashSet<StorageId>,
    add: Option<&[StorageId]>,
    remove: Option<&[StorageId]>,
) -> HashSet<StorageId> {
    let mut next = current.clone();
    for storage_id in remove.unwrap_or_default() {
        next.remove(storage_id);
    }
    next.extend(add.unwrap_or_default().iter().cloned());
    next
}

/// Which storage locations each remote peer is subscribed to.
#[derive(Debug, Default)]
pub struct RemoteSubscriptions {
    by_peer: HashMap<PeerId, HashSet<StorageId>>,
}

impl RemoteSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a subscription change from its sender. Returns the new set.
    pub fn apply(&mut self, msg: &RemoteSubscriptionControl) -> &HashSet<StorageId> {
        if msg.add.is_none() && msg.remove.is_none() {
            debug!(peer = %msg.sender_id, "Empty subscription change");
        }

        let current = self.by_peer.entry(msg.sender_id.clone()).or_default();
        *current = apply_subscription_delta(current, msg.add.as_deref(), msg.remove.as_deref());
        current
    }

    pub fn subscriptions_of(&self, peer: &PeerId) -> Option<&HashSet<StorageId>> {
        self.by_peer.get(peer)
    }

    /// Peers that should hear about heads changes at this storage location.
    ///
    /// Sorted for stable fan-out order.
    pub fn subscribers_of(&self, storage_id: &StorageId) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .by_peer
            .iter()
            .filter(|(_, subs)| subs.contains(storage_id))
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort();
        peers
    }

    pub fn forget_peer(&mut self, peer: &PeerId) -> bool {
        self.by_peer.remove(peer).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<StorageId> {
        names.iter().map(|n| n.parse::<StorageId>().unwrap()).collect()
    }

    fn set(names: &[&str]) -> HashSet<StorageId> {
        ids(names).into_iter().collect()
    }

    fn control(
        sender: &str,
        add: Option<&[&str]>,
        remove: Option<&[&str]>,
    ) -> RemoteSubscriptionControl {
        RemoteSubscriptionControl {
            sender_id: sender.parse().unwrap(),
            target_id: "me".parse().unwrap(),
            add: add.map(ids),
            remove: remove.map(ids),
        }
    }

    // ==================== apply_subscription_delta ====================

    #[test]
    fn test_add_and_remove() {
        let result = apply_subscription_delta(
            &set(&["s1", "s2", "s3"]),
            Some(ids(&["s4"]).as_slice()),
            Some(ids(&["s2", "s3"]).as_slice()),
        );
        assert_eq!(result, set(&["s1", "s4"]));
    }

    #[test]
    fn test_add_wins_over_remove() {
        let result = apply_subscription_delta(
            &set(&["s1"]),
            Some(ids(&["s2"]).as_slice()),
            Some(ids(&["s2"]).as_slice()),
        );
        assert_eq!(result, set(&["s1", "s2"]));
    }

    #[test]
    fn test_absent_directions_are_no_ops() {
        let current = set(&["s1"]);
        assert_eq!(apply_subscription_delta(&current, None, None), current);
        assert_eq!(
            apply_subscription_delta(&current, Some(&[][..]), Some(&[][..])),
            current
        );
    }

    #[test]
    fn test_remove_unknown_is_harmless() {
        let nope = ids(&["nope"]);
        let result = apply_subscription_delta(&set(&["s1"]), None, Some(nope.as_slice()));
        assert_eq!(result, set(&["s1"]));
    }

    // ==================== RemoteSubscriptions ====================

    #[test]
    fn test_per_peer_sets() {
        let mut subs = RemoteSubscriptions::new();
        subs.apply(&control("a", Some(&["s1", "s2"][..]), None));
        subs.apply(&control("b", Some(&["s2"][..]), None));
        let a = subs.apply(&control("a", None, Some(&["s1"][..])));

        assert_eq!(a, &set(&["s2"]));
        assert_eq!(
            subs.subscribers_of(&"s2".parse::<StorageId>().unwrap()),
            vec!["a".parse::<PeerId>().unwrap(), "b".parse::<PeerId>().unwrap()]
        );
        assert!(subs.subscribers_of(&"s1".parse::<StorageId>().unwrap()).is_empty());
    }

    #[test]
    fn test_forget_peer() {
        let mut subs = RemoteSubscriptions::new();
        subs.apply(&control("a", Some(&["s1"][..]), None));

        assert!(subs.forget_peer(&"a".parse::<PeerId>().unwrap()));
        assert!(subs.subscriptions_of(&"a".parse::<PeerId>().unwrap()).is_none());
        assert!(subs.subscribers_of(&"s1".parse::<StorageId>().unwrap()).is_empty());
    }
}

//! Duplicate suppression for ephemeral broadcasts.
//!
//! Ephemeral messages are gossiped and may reach us over several paths. For
//! each `(sender, session)` stream we keep the highest `count` accepted so
//! far:
//!
//! - unknown stream: accept and record (a new session means the sender
//!   restarted, which is not a protocol violation)
//! - `count` above the high-water mark: accept and raise the mark
//! - anything else: duplicate, drop quietly
//!
//! This assumes in-order delivery within a session. A message overtaken by a
//! later one from the same session is treated as a duplicate.
//!
//! Memory is bounded: when `max_tracked_sessions` streams are known, the one
//! with the oldest acceptance is evicted. Streams are indexed by acceptance
//! time, so eviction costs `O(log n)` regardless of table size.
//!
//! Eviction is driven by remote input. A peer that keeps minting new session
//! IDs pushes everyone else's streams out of the table, after which a late
//! copy from an evicted stream is accepted once more. Peer lifecycle code
//! should call [`EphemeralDeduplicator::forget_peer`] on disconnect and
//! disconnect peers that churn sessions.

use crate::config::DedupConfig;
use crate::ids::{PeerId, SessionId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::{debug, trace, warn};

/// Result of checking one ephemeral message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// First message seen for this `(sender, session)`.
    NewSession,
    /// Count advanced past the previous high-water mark.
    Accepted,
    /// Already seen (or older); drop it.
    Duplicate { high_water_mark: u64 },
}

impl DedupOutcome {
    pub fn is_accepted(&self) -> bool {
        !self.is_duplicate()
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

type StreamKey = (PeerId, SessionId);

#[derive(Debug, Clone, Copy)]
struct StreamState {
    high_water_mark: u64,
    /// Logical time of the last acceptance. Also the stream's key in `by_age`.
    last_accepted: u64,
}

#[derive(Debug, Default)]
struct DedupTable {
    streams: HashMap<StreamKey, StreamState>,
    /// Oldest acceptance first.
    by_age: BTreeMap<u64, StreamKey>,
    clock: u64,
}

impl DedupTable {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn check_and_record(&mut self, key: StreamKey, count: u64, capacity: usize) -> DedupOutcome {
        let now = self.tick();

        if let Some(state) = self.streams.get_mut(&key) {
            if count <= state.high_water_mark {
                return DedupOutcome::Duplicate {
                    high_water_mark: state.high_water_mark,
                };
            }
            self.by_age.remove(&state.last_accepted);
            state.high_water_mark = count;
            state.last_accepted = now;
            self.by_age.insert(now, key);
            return DedupOutcome::Accepted;
        }

        while self.streams.len() >= capacity {
            let Some((_, oldest)) = self.by_age.pop_first() else {
                break;
            };
            debug!(sender = %oldest.0, session = %oldest.1, "Evicting ephemeral session");
            self.streams.remove(&oldest);
        }

        self.streams.insert(
            key.clone(),
            StreamState {
                high_water_mark: count,
                last_accepted: now,
            },
        );
        self.by_age.insert(now, key);
        DedupOutcome::NewSession
    }

    fn remove(&mut self, key: &StreamKey) -> bool {
        match self.streams.remove(key) {
            Some(state) => {
                self.by_age.remove(&state.last_accepted);
                true
            }
            None => false,
        }
    }
}

/// Per-stream high-water marks for ephemeral messages.
///
/// Safe to share across connection tasks: the check and the update happen
/// under one lock, so two concurrent copies of a message cannot both be
/// accepted.
#[derive(Debug)]
pub struct EphemeralDeduplicator {
    capacity: usize,
    table: Mutex<DedupTable>,
}

impl Default for EphemeralDeduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

impl EphemeralDeduplicator {
    /// A capacity of zero is raised to one: the stream being checked always
    /// has to fit.
    pub fn new(config: DedupConfig) -> Self {
        if config.max_tracked_sessions == 0 {
            warn!("max_tracked_sessions is 0, tracking one session");
        }
        Self {
            capacity: config.max_tracked_sessions.max(1),
            table: Mutex::new(DedupTable::default()),
        }
    }

    /// Number of streams remembered before eviction starts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Decide whether to accept a message and record it if so.
    pub fn check_and_record(&self, sender: &PeerId, session: &SessionId, count: u64) -> DedupOutcome {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let outcome = table.check_and_record((sender.clone(), session.clone()), count, self.capacity);

        match outcome {
            DedupOutcome::Duplicate { high_water_mark } => trace!(
                sender = %sender,
                session = %session,
                count,
                high_water_mark,
                "Duplicate ephemeral message"
            ),
            DedupOutcome::NewSession => {
                debug!(sender = %sender, session = %session, count, "New ephemeral session")
            }
            DedupOutcome::Accepted => {}
        }
        outcome
    }

    /// Whether a message would be dropped, without recording anything.
    pub fn is_duplicate(&self, sender: &PeerId, session: &SessionId, count: u64) -> bool {
        self.high_water_mark(sender, session)
            .is_some_and(|mark| count <= mark)
    }

    /// Raise the high-water mark for a stream without checking.
    ///
    /// Never lowers an existing mark.
    pub fn record(&self, sender: &PeerId, session: &SessionId, count: u64) {
        self.check_and_record(sender, session, count);
    }

    pub fn high_water_mark(&self, sender: &PeerId, session: &SessionId) -> Option<u64> {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table
            .streams
            .get(&(sender.clone(), session.clone()))
            .map(|state| state.high_water_mark)
    }

    /// Forget every session of a peer. Returns how many were removed.
    pub fn forget_peer(&self, sender: &PeerId) -> usize {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let keys: Vec<StreamKey> = table
            .streams
            .keys()
            .filter(|(peer, _)| peer == sender)
            .cloned()
            .collect();
        for key in &keys {
            table.remove(key);
        }
        keys.len()
    }

    /// Forget one session. Returns whether it was known.
    pub fn forget_session(&self, sender: &PeerId, session: &SessionId) -> bool {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.remove(&(sender.clone(), session.clone()))
    }

    /// Number of tracked `(sender, session)` streams.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .streams
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

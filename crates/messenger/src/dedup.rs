//! Dedup holding area for the broker-backed messenger.
//!
//! A redelivered record (after a consumer-group rebalance, or a retry before
//! an ack lands) must not reenter processing twice. Newly polled documents
//! are held here, keyed by their partition offset, and only released to the
//! caller once `hold_for` has elapsed — giving any in-flight redelivery time
//! to settle before we commit to processing the record.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::envelope::PartitionOffset;

pub struct DedupWindow {
    hold_for: Duration,
    seen: HashMap<PartitionOffset, Instant>,
}

impl DedupWindow {
    pub fn new(hold_for: Duration) -> Self {
        Self {
            hold_for,
            seen: HashMap::new(),
        }
    }

    /// Record a newly polled offset's arrival time if this is the first time
    /// we've seen it. Returns `true` if the caller should hold the record
    /// (i.e. it is either new-and-not-yet-settled, or a too-recent repeat).
    pub fn should_hold(&mut self, offset: PartitionOffset) -> bool {
        let now = Instant::now();
        let first_seen = *self.seen.entry(offset).or_insert(now);
        now.duration_since(first_seen) < self.hold_for
    }

    /// Drop bookkeeping for an offset once its document has reached a
    /// terminal state and its offset has been committed.
    pub fn forget(&mut self, offset: PartitionOffset) {
        self.seen.remove(&offset);
    }
}

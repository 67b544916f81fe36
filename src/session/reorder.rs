//! Sequence reordering with a bounded wait

use crate::error::ChunkRejection;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Releases items strictly in sequence order.
///
/// Out-of-order items wait in the buffer. Once the lowest buffered item has
/// waited longer than the reorder window, the missing sequence numbers in
/// front of it are skipped and reported as a gap; anything that later
/// arrives for a skipped slot is rejected as late.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    first: u64,
    pending: BTreeMap<u64, (Instant, T)>,
    /// Skipped ranges, start -> end (inclusive)
    skipped: BTreeMap<u64, u64>,
    max_pending: usize,
    window: Duration,
}

impl<T> ReorderBuffer<T> {
    pub fn new(first_sequence: u64, max_pending: usize, window: Duration) -> Self {
        Self {
            next: first_sequence,
            first: first_sequence,
            pending: BTreeMap::new(),
            skipped: BTreeMap::new(),
            max_pending,
            window,
        }
    }

    /// Buffer an item that arrived at `now`.
    ///
    /// The next expected item is always admitted, even into a full buffer,
    /// since it is released straight away and unblocks everything behind it.
    pub fn offer(&mut self, sequence_number: u64, item: T, now: Instant) -> Result<(), ChunkRejection> {
        // u64::MAX is never buffered, so `next` cannot overflow on release
        if sequence_number == u64::MAX {
            return Err(ChunkRejection::OutOfRange);
        }
        if sequence_number < self.first || self.was_skipped(sequence_number) {
            return Err(ChunkRejection::Late);
        }
        if sequence_number < self.next || self.pending.contains_key(&sequence_number) {
            return Err(ChunkRejection::Duplicate);
        }
        if sequence_number != self.next && self.pending.len() >= self.max_pending {
            return Err(ChunkRejection::BufferFull);
        }

        self.pending.insert(sequence_number, (now, item));
        Ok(())
    }

    /// Next item in sequence, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<(u64, T)> {
        let sequence_number = self.next;
        let following = sequence_number.checked_add(1)?;
        let (_, item) = self.pending.remove(&sequence_number)?;
        self.next = following;
        Some((sequence_number, item))
    }

    /// When the current gap should be skipped; `None` while nothing is
    /// blocked behind a missing sequence number.
    pub fn gap_deadline(&self) -> Option<Instant> {
        if self.pending.contains_key(&self.next) {
            return None;
        }
        self.pending
            .values()
            .next()
            .map(|(arrived, _)| *arrived + self.window)
    }

    /// Skip the missing numbers in front of the lowest buffered item.
    ///
    /// Returns the skipped range (inclusive) if there was a gap.
    pub fn skip_gap(&mut self) -> Option<(u64, u64)> {
        let lowest = *self.pending.keys().next()?;
        if lowest == self.next {
            return None;
        }

        let range = (self.next, lowest - 1);
        self.skipped.insert(range.0, range.1);
        self.next = lowest;
        Some(range)
    }

    /// Drop everything still buffered, returning how many items were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn next_expected(&self) -> u64 {
        self.next
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn was_skipped(&self, sequence_number: u64) -> bool {
        self.skipped
            .range(..=sequence_number)
            .next_back()
            .is_some_and(|(_, &end)| sequence_number <= end)
    }
}

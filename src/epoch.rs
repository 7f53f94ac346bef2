//! Epoch information reported by the validator's epoch tracker.

use serde::{Deserialize, Serialize};

/// Snapshot of the active epoch.
///
/// Consumed by [`Tracer::update_epoch_info`](crate::Tracer::update_epoch_info)
/// and not retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EpochInfo {
    /// Epoch identifier.
    pub epoch_id: u64,
    /// Number of blocks in the epoch.
    pub epoch_length: u64,
    /// First block of the epoch.
    pub starting_block: u64,
}

impl EpochInfo {
    /// Creates a new epoch snapshot.
    pub fn new(epoch_id: u64, epoch_length: u64, starting_block: u64) -> Self {
        Self {
            epoch_id,
            epoch_length,
            starting_block,
        }
    }

    /// One past the last block of the epoch.
    pub fn ending_block(&self) -> u64 {
        self.starting_block.saturating_add(self.epoch_length)
    }

    /// Returns true if `block` falls within the epoch.
    pub fn contains(&self, block: u64) -> bool {
        block >= self.starting_block && block < self.ending_block()
    }
}

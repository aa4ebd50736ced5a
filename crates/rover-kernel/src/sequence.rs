//! Staleness gate for incoming commands.

use rover_types::{RoverError, Sequence};
use tracing::debug;

/// Admits a command only if its [`Sequence`] is strictly newer than the last
/// one admitted.  The marker never moves backwards.
#[derive(Debug, Clone, Default)]
pub struct SequenceGate {
    last: Sequence,
    discarded: u64,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known marker, e.g. after a restart.
    pub fn starting_at(last: Sequence) -> Self {
        Self { last, discarded: 0 }
    }

    pub fn last(&self) -> Sequence {
        self.last
    }

    /// Number of commands rejected as stale so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Advance the marker to `sequence` if it is newer.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::StaleCommand`] and leaves the marker unchanged
    /// when `sequence` is equal to, older than, or incomparable with the last
    /// admitted one.
    pub fn admit(&mut self, sequence: Sequence) -> Result<(), RoverError> {
        if !sequence.is_newer_than(self.last) {
            self.discarded += 1;
            // Repeats are the normal idle case; only sample them.
            if self.discarded.is_power_of_two() {
                debug!(%sequence, last = %self.last, discarded = self.discarded, "stale command");
            }
            return Err(RoverError::StaleCommand {
                sequence,
                last: self.last,
            });
        }
        self.last = sequence;
        Ok(())
    }
}

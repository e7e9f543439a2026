//! Connection-wide sequence tracking.

/// Classification of an inbound sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// First sequence seen on this connection.
    First,
    /// Exactly the expected next sequence.
    InOrder,
    /// Not newer than the last seen; the frame should be dropped.
    Duplicate,
    /// One or more sequences were skipped.
    Gap {
        /// Sequence that was expected.
        expected: u64,
        /// Sequence that arrived.
        received: u64,
    },
}

impl SequenceCheck {
    /// Returns true if the frame should be processed.
    #[must_use]
    pub const fn should_process(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// Tracks the exchange's per-connection `sequence_num`.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: Option<u64>,
    gaps: u64,
    duplicates: u64,
}

impl SequenceTracker {
    /// Creates a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `seq` and advances the tracker.
    pub fn check(&mut self, seq: u64) -> SequenceCheck {
        let Some(last) = self.last else {
            self.last = Some(seq);
            return SequenceCheck::First;
        };

        if seq <= last {
            self.duplicates += 1;
            return SequenceCheck::Duplicate;
        }

        self.last = Some(seq);
        let expected = last + 1;
        if seq == expected {
            SequenceCheck::InOrder
        } else {
            self.gaps += 1;
            SequenceCheck::Gap {
                expected,
                received: seq,
            }
        }
    }

    /// Last sequence accepted.
    #[must_use]
    pub fn last(&self) -> Option<u64> {
        self.last
    }

    /// Number of gaps seen since creation.
    #[must_use]
    pub fn gap_count(&self) -> u64 {
        self.gaps
    }

    /// Number of duplicate frames seen since creation.
    #[must_use]
    pub fn duplicate_count(&self) -> u64 {
        self.duplicates
    }

    /// Forgets the last sequence. Called on every new connection.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

//! Inbound sequence tracking

/// Something odd about an incoming sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SequenceAnomaly {
    Gap { expected: u64, received: u64 },
    Regression { last: u64, received: u64 },
}

/// Highest sequence seen on the current session
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SequenceTracker {
    last: Option<u64>,
}

impl SequenceTracker {
    pub(crate) fn last(self) -> Option<u64> {
        self.last
    }

    /// Forget the sequence; a fresh IDENTIFY restarts numbering
    pub(crate) fn reset(&mut self) {
        self.last = None;
    }

    /// Record `received`, keeping the stored value non-decreasing
    pub(crate) fn observe(&mut self, received: u64) -> Option<SequenceAnomaly> {
        let Some(last) = self.last else {
            self.last = Some(received);
            return None;
        };

        if received < last {
            return Some(SequenceAnomaly::Regression { last, received });
        }

        self.last = Some(received);
        let expected = last.saturating_add(1);
        (received > expected).then_some(SequenceAnomaly::Gap { expected, received })
    }
}

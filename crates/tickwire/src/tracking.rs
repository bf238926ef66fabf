use crate::types::sequence_greater_than;

/// Sequences before the newest one that an ack bitfield can describe.
pub const ACK_WINDOW: u32 = 32;

/// Whether `(ack, ack_bits)` from the peer covers `sequence`. Bit `n` of
/// `ack_bits` stands for `ack - n - 1`.
pub fn ack_covers(ack: u32, ack_bits: u32, sequence: u32) -> bool {
    if sequence == ack {
        return true;
    }
    if !sequence_greater_than(ack, sequence) {
        return false;
    }
    let behind = ack.wrapping_sub(sequence);
    behind <= ACK_WINDOW && ack_bits & (1 << (behind - 1)) != 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrival {
    Fresh,
    Seen,
    /// Older than the window; it can no longer be told apart from a
    /// duplicate.
    TooOld,
}

/// Incoming sequences as the newest one plus a bitfield of the
/// [`ACK_WINDOW`] before it. The same pair is echoed to the peer as acks.
#[derive(Debug, Default)]
pub struct ReceiveTracker {
    newest: Option<u32>,
    history: u32,
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn arrival(&self, sequence: u32) -> Arrival {
        let Some(newest) = self.newest else {
            return Arrival::Fresh;
        };
        if sequence_greater_than(sequence, newest) {
            return Arrival::Fresh;
        }
        if sequence == newest {
            return Arrival::Seen;
        }
        match newest.wrapping_sub(sequence) {
            behind if behind > ACK_WINDOW => Arrival::TooOld,
            behind if self.history & (1 << (behind - 1)) != 0 => Arrival::Seen,
            _ => Arrival::Fresh,
        }
    }

    /// True for sequences already received and for those too old to check.
    pub fn is_duplicate(&self, sequence: u32) -> bool {
        self.arrival(sequence) != Arrival::Fresh
    }

    /// Returns false if the sequence was rejected as a duplicate.
    pub fn record_received(&mut self, sequence: u32) -> bool {
        if self.is_duplicate(sequence) {
            return false;
        }

        match self.newest {
            Some(newest) if sequence_greater_than(sequence, newest) => {
                let ahead = sequence.wrapping_sub(newest);
                self.history = match ahead {
                    1..ACK_WINDOW => (self.history << ahead) | (1 << (ahead - 1)),
                    ACK_WINDOW => 1 << (ACK_WINDOW - 1),
                    _ => 0,
                };
                self.newest = Some(sequence);
            }
            Some(newest) => self.history |= 1 << (newest.wrapping_sub(sequence) - 1),
            None => self.newest = Some(sequence),
        }
        true
    }

    /// `(ack, ack_bits)` for the next outgoing header; `(0, 0)` before
    /// anything arrived.
    pub fn ack_data(&self) -> (u32, u32) {
        (self.newest.unwrap_or(0), self.history)
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(sequences: &[u32]) -> ReceiveTracker {
        let mut tracker = ReceiveTracker::new();
        for &sequence in sequences {
            tracker.record_received(sequence);
        }
        tracker
    }

    #[test]
    fn window_marks_each_earlier_arrival() {
        let tracker = received(&[10, 12, 13]);
        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 13);
        assert_eq!(bits, 0b101);

        assert!(ack_covers(ack, bits, 13));
        assert!(ack_covers(ack, bits, 12));
        assert!(!ack_covers(ack, bits, 11));
        assert!(ack_covers(ack, bits, 10));
        assert!(!ack_covers(ack, bits, 14));
    }

    #[test]
    fn late_arrival_fills_its_gap() {
        let tracker = received(&[20, 17, 18]);
        assert_eq!(tracker.ack_data(), (20, 0b110));
        assert!(!tracker.is_duplicate(19));
        assert!(tracker.is_duplicate(17));
    }

    #[test]
    fn repeats_and_ancient_sequences_are_rejected() {
        let mut tracker = received(&[5, 100]);
        assert!(!tracker.record_received(100));
        assert!(tracker.is_duplicate(5));
        assert!(!tracker.record_received(100 - ACK_WINDOW - 1));
        assert!(tracker.record_received(100 - ACK_WINDOW));
        assert_eq!(tracker.ack_data().1, 1 << (ACK_WINDOW - 1));
    }

    #[test]
    fn jump_of_exactly_one_window_keeps_the_previous_newest() {
        let tracker = received(&[1, 1 + ACK_WINDOW]);
        let (ack, bits) = tracker.ack_data();
        assert!(ack_covers(ack, bits, 1));
    }

    #[test]
    fn window_survives_sequence_wrap() {
        let tracker = received(&[u32::MAX - 1, u32::MAX, 1]);
        let (ack, bits) = tracker.ack_data();
        assert_eq!(ack, 1);
        assert!(ack_covers(ack, bits, u32::MAX));
        assert!(ack_covers(ack, bits, u32::MAX - 1));
        assert!(!ack_covers(ack, bits, 0));
    }

    #[test]
    fn nothing_received_acks_nothing() {
        let tracker = ReceiveTracker::new();
        let (ack, bits) = tracker.ack_data();
        assert!(!ack_covers(ack, bits, 1));
        assert!(!tracker.is_duplicate(1));
    }
}

use std::collections::VecDeque;

use super::envelope::CodecId;
use crate::tracking::ack_covers;
use crate::types::sequence_greater_than;

const DEFAULT_MAX_IN_FLIGHT: usize = 256;

#[derive(Debug, Clone, Copy)]
struct SentPacket {
    sequence: u32,
    codec: CodecId,
    acked: bool,
}

/// Outgoing packets awaiting acknowledgment: which codec each used, and how
/// many sends in a row have gone unacknowledged.
#[derive(Debug)]
pub struct SendTracker {
    in_flight: VecDeque<SentPacket>,
    max_in_flight: usize,
    newest_acked: Option<u32>,
}

impl Default for SendTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT)
    }
}

impl SendTracker {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            in_flight: VecDeque::with_capacity(max_in_flight),
            max_in_flight: max_in_flight.max(1),
            newest_acked: None,
        }
    }

    pub fn track(&mut self, sequence: u32, codec: CodecId) {
        while self.in_flight.len() >= self.max_in_flight {
            self.in_flight.pop_front();
        }
        self.in_flight.push_back(SentPacket {
            sequence,
            codec,
            acked: false,
        });
    }

    /// Returns the codec the packet was sent with, or `None` for unknown and
    /// already-acknowledged sequences.
    pub fn ack(&mut self, sequence: u32) -> Option<CodecId> {
        let index = self
            .in_flight
            .iter()
            .position(|p| p.sequence == sequence && !p.acked)?;
        let codec = self.mark_acked(index);
        self.drain_acked();
        Some(codec)
    }

    /// Applies a peer's `(ack, ack_bits)` header and returns the newly
    /// acknowledged sequences with their codecs, in send order.
    pub fn process_ack(&mut self, ack: u32, ack_bits: u32) -> Vec<(u32, CodecId)> {
        let covered: Vec<usize> = self
            .in_flight
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.acked && ack_covers(ack, ack_bits, p.sequence))
            .map(|(index, _)| index)
            .collect();

        let acked = covered
            .into_iter()
            .map(|index| (self.in_flight[index].sequence, self.mark_acked(index)))
            .collect();
        self.drain_acked();
        acked
    }

    fn mark_acked(&mut self, index: usize) -> CodecId {
        let packet = &mut self.in_flight[index];
        packet.acked = true;
        let (sequence, codec) = (packet.sequence, packet.codec);

        if self
            .newest_acked
            .is_none_or(|newest| sequence_greater_than(sequence, newest))
        {
            self.newest_acked = Some(sequence);
        }
        codec
    }

    fn drain_acked(&mut self) {
        while self.in_flight.front().is_some_and(|p| p.acked) {
            self.in_flight.pop_front();
        }
    }

    /// Sends since the newest acknowledged one.
    pub fn consecutive_misses(&self) -> u32 {
        let count = match self.newest_acked {
            Some(newest) => self
                .in_flight
                .iter()
                .filter(|p| sequence_greater_than(p.sequence, newest))
                .count(),
            None => self.in_flight.len(),
        };
        count as u32
    }

    pub fn unacked_count(&self) -> usize {
        self.in_flight.iter().filter(|p| !p.acked).count()
    }

    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.newest_acked = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_reports_codec_once() {
        let mut tracker = SendTracker::new(16);
        tracker.track(1, CodecId::A);
        tracker.track(2, CodecId::B);

        assert_eq!(tracker.ack(2), Some(CodecId::B));
        assert_eq!(tracker.ack(2), None);
        assert_eq!(tracker.ack(9), None);
        assert_eq!(tracker.unacked_count(), 1);
    }

    #[test]
    fn misses_count_sends_after_newest_ack() {
        let mut tracker = SendTracker::new(16);
        for sequence in 1..=5 {
            tracker.track(sequence, CodecId::A);
        }
        assert_eq!(tracker.consecutive_misses(), 5);

        tracker.ack(3);
        assert_eq!(tracker.consecutive_misses(), 2);

        tracker.ack(1);
        assert_eq!(tracker.consecutive_misses(), 2);

        tracker.ack(5);
        assert_eq!(tracker.consecutive_misses(), 0);
    }

    #[test]
    fn header_acks_report_codecs_in_send_order() {
        let mut tracker = SendTracker::new(16);
        tracker.track(7, CodecId::A);
        tracker.track(8, CodecId::A);
        tracker.track(9, CodecId::B);
        tracker.track(10, CodecId::B);

        // 10 is the newest, 8 and 7 sit at bits 1 and 2; 9 was lost.
        let acked = tracker.process_ack(10, 0b110);
        assert_eq!(acked, vec![(7, CodecId::A), (8, CodecId::A), (10, CodecId::B)]);
        assert_eq!(tracker.unacked_count(), 1);
        assert_eq!(tracker.consecutive_misses(), 0);

        assert!(tracker.process_ack(10, 0b110).is_empty());
        assert_eq!(tracker.process_ack(11, 0b11), vec![(9, CodecId::B)]);
        assert_eq!(tracker.unacked_count(), 0);
    }

    #[test]
    fn old_entries_are_evicted() {
        let mut tracker = SendTracker::new(2);
        tracker.track(1, CodecId::A);
        tracker.track(2, CodecId::A);
        tracker.track(3, CodecId::A);
        assert_eq!(tracker.ack(1), None);
        assert_eq!(tracker.ack(3), Some(CodecId::A));
    }
}

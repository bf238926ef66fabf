use log::{debug, trace};

use super::ack::SendTracker;
use super::codec::{Codec, CodecPhase};
use super::envelope::{CodecId, ENVELOPE_HEADER_LEN, Envelope, MAX_PAYLOAD_LEN};
use crate::config::CompressionConfig;
use crate::error::NetError;

#[derive(Debug)]
struct LearningRound {
    sequence: u32,
    scratch: Codec,
    sends_since: u32,
}

/// Result of compressing one outgoing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressed {
    /// Header plus payload bytes written to the destination.
    pub written: usize,
    pub compressed_len: u16,
    pub codec: CodecId,
    pub learn: bool,
}

impl Compressed {
    pub fn is_stored(&self) -> bool {
        self.compressed_len == 0
    }
}

/// Outgoing half of the adaptive compressor.
///
/// Compresses with the active slot while a scratch codec learns from the
/// plaintext of one tagged packet. Once the peer acknowledges that packet the
/// scratch replaces the standby slot and becomes active.
#[derive(Debug)]
pub struct HuffmanSender {
    config: CompressionConfig,
    slots: [Codec; 2],
    active: CodecId,
    round: Option<LearningRound>,
    cooldown: u32,
    tracker: SendTracker,
    swaps: u64,
}

impl HuffmanSender {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            config,
            slots: [Codec::new(), Codec::new()],
            active: CodecId::A,
            round: None,
            cooldown: 0,
            tracker: SendTracker::default(),
            swaps: 0,
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn active_codec(&self) -> CodecId {
        self.active
    }

    pub fn phase(&self, id: CodecId) -> CodecPhase {
        match self.slots[id.index()].phase() {
            CodecPhase::Ready if id == self.active => CodecPhase::Active,
            phase => phase,
        }
    }

    pub fn is_learning(&self) -> bool {
        self.round.is_some()
    }

    /// Too many sends in a row went unacknowledged to risk a codec swap.
    pub fn is_lossy(&self) -> bool {
        self.tracker.consecutive_misses() > self.config.miss_threshold
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Writes the envelope and payload for `src` into `dst`.
    ///
    /// `dst` must hold `src.len()` plus the envelope header, since the
    /// payload may have to be stored verbatim.
    pub fn compress(
        &mut self,
        sequence: u32,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<Compressed, NetError> {
        if src.len() > MAX_PAYLOAD_LEN {
            return Err(NetError::BufferTooSmall {
                needed: src.len(),
                capacity: MAX_PAYLOAD_LEN,
            });
        }
        let needed = src.len() + ENVELOPE_HEADER_LEN;
        if dst.len() < needed {
            return Err(NetError::BufferTooSmall {
                needed,
                capacity: dst.len(),
            });
        }

        let learn = self.advance_round(sequence, src);

        let (header, body) = dst.split_at_mut(ENVELOPE_HEADER_LEN);
        let compressed_len = match self.slots[self.active.index()].compress(src, body) {
            Some(len) => len as u16,
            None => {
                body[..src.len()].copy_from_slice(src);
                0
            }
        };

        let envelope = Envelope {
            codec: self.active,
            learn,
            compressed_len,
            expanded_len: src.len() as u16,
        };
        envelope.write(header);
        self.tracker.track(sequence, self.active);

        let payload_len = if envelope.is_stored() {
            src.len()
        } else {
            compressed_len as usize
        };
        trace!(
            "packet {sequence}: {} -> {payload_len} bytes on codec {:?}",
            src.len(),
            self.active
        );

        Ok(Compressed {
            written: ENVELOPE_HEADER_LEN + payload_len,
            compressed_len,
            codec: self.active,
            learn,
        })
    }

    /// Returns true when this packet carries a new learning round.
    fn advance_round(&mut self, sequence: u32, src: &[u8]) -> bool {
        if let Some(round) = &mut self.round {
            round.sends_since += 1;
            if round.sends_since > self.config.miss_threshold {
                debug!(
                    "abandoning learning round {} after {} unacknowledged sends",
                    round.sequence, round.sends_since
                );
                self.round = None;
            }
            return false;
        }

        if self.cooldown > 0 || self.is_lossy() || src.len() < self.config.min_learn_bytes {
            return false;
        }

        let standby = &self.slots[self.active.other().index()];
        let mut scratch = Codec::from_histogram(standby.histogram().clone());
        scratch.extend(src, self.config.rescale_limit);
        scratch.rebuild();
        self.round = Some(LearningRound {
            sequence,
            scratch,
            sends_since: 0,
        });
        true
    }

    /// Applies the `(ack, ack_bits)` pair from an incoming header and returns
    /// the sequences it newly acknowledged.
    pub fn process_ack(&mut self, ack: u32, ack_bits: u32) -> Vec<u32> {
        let acked = self.tracker.process_ack(ack, ack_bits);
        for &(sequence, codec) in &acked {
            self.on_acked(sequence, codec);
        }
        acked.into_iter().map(|(sequence, _)| sequence).collect()
    }

    /// Feeds a single acknowledgment from the peer.
    pub fn packet_acked(&mut self, sequence: u32) {
        if let Some(codec) = self.tracker.ack(sequence) {
            self.on_acked(sequence, codec);
        }
    }

    pub fn unacked_count(&self) -> usize {
        self.tracker.unacked_count()
    }

    fn on_acked(&mut self, sequence: u32, codec: CodecId) {
        if self.round.as_ref().is_some_and(|r| r.sequence == sequence) {
            if let Some(round) = self.round.take() {
                let standby = self.active.other();
                self.slots[standby.index()] = round.scratch;
                self.active = standby;
                self.cooldown = self.config.renegotiate_delay;
                self.swaps += 1;
                debug!("codec {standby:?} active after learning round {sequence}");
            }
            return;
        }

        if codec == self.active {
            self.cooldown = self.cooldown.saturating_sub(1);
        }
    }

    /// Adds bytes to the standby histogram. The peer must feed the same bytes
    /// at the same point; any pending round is cancelled.
    pub fn extend_histogram(&mut self, data: &[u8]) {
        self.round = None;
        self.slots[self.active.other().index()].extend(data, self.config.rescale_limit);
    }

    pub fn rebuild_standby(&mut self) {
        self.slots[self.active.other().index()].rebuild();
    }

    pub fn reset(&mut self) {
        self.slots = [Codec::new(), Codec::new()];
        self.active = CodecId::A;
        self.round = None;
        self.cooldown = 0;
        self.tracker.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"aaaaaaaaaaaabbbbbbccccdd aaaaaaaaaaaabbbbbbccccdd";

    fn sender() -> HuffmanSender {
        HuffmanSender::new(CompressionConfig {
            renegotiate_delay: 2,
            miss_threshold: 4,
            ..Default::default()
        })
    }

    #[test]
    fn first_packet_is_stored_and_starts_learning() {
        let mut sender = sender();
        let mut out = [0u8; 128];
        let result = sender.compress(1, SAMPLE, &mut out).unwrap();

        assert!(result.is_stored());
        assert!(result.learn);
        assert_eq!(result.codec, CodecId::A);
        assert_eq!(result.written, SAMPLE.len() + ENVELOPE_HEADER_LEN);
        assert_eq!(&out[ENVELOPE_HEADER_LEN..result.written], SAMPLE);
        assert!(sender.is_learning());
    }

    #[test]
    fn ack_of_learn_packet_swaps_codec() {
        let mut sender = sender();
        let mut out = [0u8; 128];
        sender.compress(1, SAMPLE, &mut out).unwrap();
        sender.packet_acked(1);

        assert_eq!(sender.active_codec(), CodecId::B);
        assert_eq!(sender.phase(CodecId::B), CodecPhase::Active);
        assert_eq!(sender.phase(CodecId::A), CodecPhase::Idle);
        assert_eq!(sender.swaps(), 1);

        let result = sender.compress(2, SAMPLE, &mut out).unwrap();
        assert!(!result.is_stored());
        assert!(!result.learn);
        assert!(result.written < SAMPLE.len());
    }

    #[test]
    fn cooldown_counts_acks_on_active_codec() {
        let mut sender = sender();
        let mut out = [0u8; 128];
        sender.compress(1, SAMPLE, &mut out).unwrap();
        sender.compress(2, SAMPLE, &mut out).unwrap();
        sender.packet_acked(1);

        // Packet 2 went out on the old codec and does not count.
        sender.packet_acked(2);
        assert!(!sender.compress(3, SAMPLE, &mut out).unwrap().learn);
        sender.packet_acked(3);
        assert!(!sender.compress(4, SAMPLE, &mut out).unwrap().learn);
        sender.packet_acked(4);

        assert!(sender.compress(5, SAMPLE, &mut out).unwrap().learn);
    }

    #[test]
    fn unacknowledged_round_is_abandoned() {
        let mut sender = sender();
        let mut out = [0u8; 128];
        sender.compress(1, SAMPLE, &mut out).unwrap();
        for sequence in 2..=5 {
            assert!(!sender.compress(sequence, SAMPLE, &mut out).unwrap().learn);
        }
        assert!(sender.is_learning());

        sender.compress(6, SAMPLE, &mut out).unwrap();
        assert!(!sender.is_learning());

        // Late ack of the abandoned round changes nothing.
        sender.packet_acked(1);
        assert_eq!(sender.active_codec(), CodecId::A);
    }

    #[test]
    fn header_ack_completes_the_round() {
        let mut sender = sender();
        let mut out = [0u8; 128];
        sender.compress(1, SAMPLE, &mut out).unwrap();
        sender.compress(2, SAMPLE, &mut out).unwrap();
        sender.compress(3, SAMPLE, &mut out).unwrap();

        assert_eq!(sender.process_ack(3, 0b10), vec![1, 3]);
        assert_eq!(sender.active_codec(), CodecId::B);
        assert_eq!(sender.unacked_count(), 1);
        assert!(sender.process_ack(3, 0b10).is_empty());
    }

    #[test]
    fn lossy_link_suppresses_learning() {
        let mut sender = sender();
        let mut out = [0u8; 128];
        for sequence in 1..=5 {
            sender.compress(sequence, b"short", &mut out).unwrap();
        }
        assert!(sender.is_lossy());
        assert!(!sender.compress(6, SAMPLE, &mut out).unwrap().learn);

        sender.packet_acked(6);
        assert!(!sender.is_lossy());
        assert!(sender.compress(7, SAMPLE, &mut out).unwrap().learn);
    }

    #[test]
    fn short_payloads_never_learn() {
        let mut sender = sender();
        let mut out = [0u8; 16];
        let result = sender.compress(1, b"tiny", &mut out).unwrap();
        assert!(!result.learn);
        assert!(result.is_stored());
    }

    #[test]
    fn destination_must_fit_stored_payload() {
        let mut sender = sender();
        let mut out = [0u8; 8];
        assert_eq!(
            sender.compress(1, b"abcdef", &mut out),
            Err(NetError::BufferTooSmall {
                needed: 11,
                capacity: 8
            })
        );
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut sender = sender();
        let mut out = [0u8; 128];
        sender.compress(1, SAMPLE, &mut out).unwrap();
        sender.packet_acked(1);
        sender.reset();

        assert_eq!(sender.active_codec(), CodecId::A);
        assert_eq!(sender.phase(CodecId::A), CodecPhase::Idle);
        assert_eq!(sender.phase(CodecId::B), CodecPhase::Idle);
        assert!(!sender.is_learning());
    }
}

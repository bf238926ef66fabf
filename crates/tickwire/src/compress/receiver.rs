use log::debug;

use super::codec::{Codec, CodecPhase};
use super::envelope::{CodecId, Envelope};
use crate::config::CompressionConfig;
use crate::error::{CodecFault, NetError};
use crate::types::sequence_greater_than;

#[derive(Debug)]
struct PendingCommit {
    sequence: u32,
    slot: CodecId,
    scratch: Codec,
}

/// Result of decompressing one incoming packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decompressed {
    pub len: usize,
    pub codec: CodecId,
    /// The packet started a learning round on this side.
    pub learned: bool,
}

/// Incoming half of the adaptive compressor.
///
/// Mirrors the sender's learning rounds: a LEARN packet builds a scratch
/// codec, and the first newer packet tagged with the scratch's slot commits
/// it. Packets older than a slot's commit point can no longer be decoded.
#[derive(Debug)]
pub struct HuffmanReceiver {
    config: CompressionConfig,
    slots: [Codec; 2],
    valid_after: [Option<u32>; 2],
    active: CodecId,
    pending: Option<PendingCommit>,
    learned_through: Option<u32>,
}

impl HuffmanReceiver {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            config,
            slots: [Codec::new(), Codec::new()],
            valid_after: [None; 2],
            active: CodecId::A,
            pending: None,
            learned_through: None,
        }
    }

    /// Slot of the most recent commit.
    pub fn active_codec(&self) -> CodecId {
        self.active
    }

    pub fn phase(&self, id: CodecId) -> CodecPhase {
        match self.slots[id.index()].phase() {
            CodecPhase::Ready if id == self.active => CodecPhase::Active,
            phase => phase,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Expands `packet` into the front of `dst`.
    pub fn decompress(
        &mut self,
        sequence: u32,
        packet: &[u8],
        dst: &mut [u8],
    ) -> Result<Decompressed, NetError> {
        let (envelope, payload) = Envelope::parse(packet)?;
        let len = envelope.expanded_len as usize;
        if dst.len() < len {
            return Err(NetError::BufferTooSmall {
                needed: len,
                capacity: dst.len(),
            });
        }

        self.commit_if_due(sequence, envelope.codec);

        let slot = envelope.codec.index();
        let out = &mut dst[..len];
        if envelope.is_stored() {
            out.copy_from_slice(payload);
        } else {
            if self.valid_after[slot].is_some_and(|after| !sequence_greater_than(sequence, after)) {
                return Err(CodecFault::Stale(envelope.codec.bit()).into());
            }
            if !self.slots[slot].has_tree() {
                return Err(CodecFault::NotReady(envelope.codec.bit()).into());
            }
            self.slots[slot].decompress(payload, out)?;
        }

        let learned = envelope.learn && self.begin_round(sequence, envelope.codec, out);

        Ok(Decompressed {
            len,
            codec: envelope.codec,
            learned,
        })
    }

    fn commit_if_due(&mut self, sequence: u32, codec: CodecId) {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|p| p.slot == codec && sequence_greater_than(sequence, p.sequence));
        if !due {
            return;
        }
        if let Some(pending) = self.pending.take() {
            let slot = pending.slot.index();
            self.slots[slot] = pending.scratch;
            self.valid_after[slot] = Some(pending.sequence);
            self.active = pending.slot;
            debug!(
                "committed codec {:?} from learning round {}",
                pending.slot, pending.sequence
            );
        }
    }

    fn begin_round(&mut self, sequence: u32, codec: CodecId, plaintext: &[u8]) -> bool {
        if self
            .learned_through
            .is_some_and(|seen| !sequence_greater_than(sequence, seen))
        {
            return false;
        }

        let slot = codec.other();
        let mut scratch = Codec::from_histogram(self.slots[slot.index()].histogram().clone());
        scratch.extend(plaintext, self.config.rescale_limit);
        scratch.rebuild();
        self.pending = Some(PendingCommit {
            sequence,
            slot,
            scratch,
        });
        self.learned_through = Some(sequence);
        true
    }

    /// Adds bytes to the standby histogram, matching
    /// [`HuffmanSender::extend_histogram`](super::HuffmanSender::extend_histogram)
    /// on the peer. Any pending round is cancelled.
    pub fn extend_histogram(&mut self, data: &[u8]) {
        self.pending = None;
        self.slots[self.active.other().index()].extend(data, self.config.rescale_limit);
    }

    pub fn rebuild_standby(&mut self) {
        self.slots[self.active.other().index()].rebuild();
    }

    pub fn reset(&mut self) {
        self.slots = [Codec::new(), Codec::new()];
        self.valid_after = [None; 2];
        self.active = CodecId::A;
        self.pending = None;
        self.learned_through = None;
    }
}

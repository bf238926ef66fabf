use super::bitio::{BitReader, BitWriter};
use super::histogram::Histogram;
use super::tree::CodeTree;
use crate::error::{NetError, RecordError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecPhase {
    /// Nothing observed, no tree.
    Idle,
    /// Histogram has data but no tree matches it.
    Learning,
    /// Tree built from the current histogram.
    Ready,
    /// Ready and selected for outgoing traffic.
    Active,
}

#[derive(Debug)]
enum CodecState {
    Learning,
    Ready(CodeTree),
    /// Histogram has moved on, but packets already encoded with the old tree
    /// must still decode until the next rebuild.
    Outdated(CodeTree),
}

/// One histogram plus the tree built from it.
///
/// A codec cannot be cloned. To derive one codec from another, clone its
/// [`Histogram`] and build a fresh codec, which starts without a tree.
#[derive(Debug)]
pub struct Codec {
    histogram: Histogram,
    state: CodecState,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    pub fn new() -> Self {
        Self::from_histogram(Histogram::new())
    }

    pub fn from_histogram(histogram: Histogram) -> Self {
        Self {
            histogram,
            state: CodecState::Learning,
        }
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn phase(&self) -> CodecPhase {
        match self.state {
            CodecState::Ready(_) => CodecPhase::Ready,
            CodecState::Learning if self.histogram.is_empty() => CodecPhase::Idle,
            CodecState::Learning | CodecState::Outdated(_) => CodecPhase::Learning,
        }
    }

    /// Whether packets tagged with this codec can be decoded.
    pub fn has_tree(&self) -> bool {
        self.tree().is_some()
    }

    /// Adds observed plaintext. An existing tree no longer matches the
    /// histogram but keeps decoding until [`rebuild`](Self::rebuild).
    pub fn extend(&mut self, data: &[u8], rescale_limit: u64) {
        if data.is_empty() {
            return;
        }
        self.histogram.extend(data, rescale_limit);
        self.state = match std::mem::replace(&mut self.state, CodecState::Learning) {
            CodecState::Ready(tree) | CodecState::Outdated(tree) => CodecState::Outdated(tree),
            CodecState::Learning => CodecState::Learning,
        };
    }

    pub fn rebuild(&mut self) {
        self.state = CodecState::Ready(CodeTree::build(&self.histogram));
    }

    fn tree(&self) -> Option<&CodeTree> {
        match &self.state {
            CodecState::Ready(tree) | CodecState::Outdated(tree) => Some(tree),
            CodecState::Learning => None,
        }
    }

    /// Huffman-codes `src` into `dst`. Returns the byte count only when the
    /// result is strictly shorter than `src`; `None` means store verbatim.
    /// Only a codec whose tree matches its histogram compresses.
    pub fn compress(&self, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let CodecState::Ready(tree) = &self.state else {
            return None;
        };
        let limit = dst.len().min(src.len().saturating_sub(1));
        let mut writer = BitWriter::new(&mut dst[..limit]);
        for &symbol in src {
            let (bits, len) = tree.code(symbol);
            if !writer.write_bits(bits, len) {
                return None;
            }
        }
        Some(writer.finish())
    }

    /// Fills all of `dst` from the bitstream in `src`, which must be used up
    /// apart from the padding of its last byte.
    pub fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<(), NetError> {
        let expected = dst.len();
        let Some(tree) = self.tree() else {
            return Err(NetError::DecompressionFailure {
                expected,
                actual: 0,
            });
        };

        let mut reader = BitReader::new(src);
        for (actual, slot) in dst.iter_mut().enumerate() {
            *slot = tree
                .decode_symbol(&mut reader)
                .ok_or(NetError::DecompressionFailure { expected, actual })?;
        }

        let unread = src.len() - reader.bytes_consumed();
        if unread > 0 {
            return Err(RecordError::TrailingBytes(unread).into());
        }
        Ok(())
    }
}

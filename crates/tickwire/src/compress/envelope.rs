use bitflags::bitflags;

use crate::error::{CodecFault, NetError, RecordError};

/// `[tag: u8][compressed_len: u16][expanded_len: u16]`, little-endian.
pub const ENVELOPE_HEADER_LEN: usize = 5;
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnvelopeTag: u8 {
        /// Codec id bit: clear for A, set for B.
        const CODEC = 1 << 0;
        /// Receiver should learn from this packet's plaintext.
        const LEARN = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    A,
    B,
}

impl CodecId {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn bit(self) -> u8 {
        self.index() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub codec: CodecId,
    pub learn: bool,
    /// Zero means the payload is stored verbatim.
    pub compressed_len: u16,
    pub expanded_len: u16,
}

impl Envelope {
    pub fn is_stored(&self) -> bool {
        self.compressed_len == 0
    }

    pub fn write(&self, out: &mut [u8]) {
        let mut tag = EnvelopeTag::empty();
        tag.set(EnvelopeTag::CODEC, self.codec == CodecId::B);
        tag.set(EnvelopeTag::LEARN, self.learn);

        out[0] = tag.bits();
        out[1..3].copy_from_slice(&self.compressed_len.to_le_bytes());
        out[3..5].copy_from_slice(&self.expanded_len.to_le_bytes());
    }

    /// Splits a packet into header and payload, checking the declared
    /// lengths against what actually arrived.
    pub fn parse(packet: &[u8]) -> Result<(Self, &[u8]), NetError> {
        let Some((header, payload)) = packet.split_first_chunk::<ENVELOPE_HEADER_LEN>() else {
            return Err(RecordError::Truncated {
                needed: ENVELOPE_HEADER_LEN,
                remaining: packet.len(),
            }
            .into());
        };

        let tag = EnvelopeTag::from_bits(header[0])
            .ok_or(NetError::CodecMismatch(CodecFault::GarbledTag(header[0])))?;
        let envelope = Self {
            codec: if tag.contains(EnvelopeTag::CODEC) {
                CodecId::B
            } else {
                CodecId::A
            },
            learn: tag.contains(EnvelopeTag::LEARN),
            compressed_len: u16::from_le_bytes([header[1], header[2]]),
            expanded_len: u16::from_le_bytes([header[3], header[4]]),
        };

        if envelope.is_stored() {
            if payload.len() != envelope.expanded_len as usize {
                return Err(NetError::DecompressionFailure {
                    expected: envelope.expanded_len as usize,
                    actual: payload.len(),
                });
            }
        } else {
            let declared = envelope.compressed_len as usize;
            if payload.len() < declared {
                return Err(RecordError::Truncated {
                    needed: declared,
                    remaining: payload.len(),
                }
                .into());
            }
            if payload.len() > declared {
                return Err(RecordError::TrailingBytes(payload.len() - declared).into());
            }
        }

        Ok((envelope, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let envelope = Envelope {
            codec: CodecId::B,
            learn: true,
            compressed_len: 3,
            expanded_len: 9,
        };
        let mut packet = [0u8; ENVELOPE_HEADER_LEN + 3];
        envelope.write(&mut packet);
        assert_eq!(packet[0], 0b11);

        let (parsed, payload) = Envelope::parse(&packet).unwrap();
        assert_eq!(parsed, envelope);
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn reserved_tag_bits_are_a_codec_mismatch() {
        let packet = [0x80, 0, 0, 0, 0];
        assert_eq!(
            Envelope::parse(&packet),
            Err(NetError::CodecMismatch(CodecFault::GarbledTag(0x80)))
        );
    }

    #[test]
    fn stored_length_must_match_payload() {
        let packet = [0, 0, 0, 4, 0, 1, 2];
        assert_eq!(
            Envelope::parse(&packet),
            Err(NetError::DecompressionFailure {
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn short_header_is_malformed() {
        assert!(matches!(
            Envelope::parse(&[1, 2]),
            Err(NetError::MalformedRecord(RecordError::Truncated { .. }))
        ));
    }

    #[test]
    fn codec_ids_alternate() {
        assert_eq!(CodecId::A.other(), CodecId::B);
        assert_eq!(CodecId::B.other().index(), 0);
        assert_eq!(CodecId::B.bit(), 1);
    }
}

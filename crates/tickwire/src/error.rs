use thiserror::Error;

use crate::types::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("invalid record count {0}")]
    InvalidCount(u8),
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecFault {
    #[error("reserved tag bits set ({0:#04x})")]
    GarbledTag(u8),
    #[error("codec {0} has no tree")]
    NotReady(u8),
    #[error("packet predates the rebuild of codec {0}")]
    Stale(u8),
}

/// Per-packet failures. None of these are fatal to a connection; callers
/// drop the packet and count the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("malformed record: {0}")]
    MalformedRecord(#[from] RecordError),
    #[error("codec mismatch: {0}")]
    CodecMismatch(#[from] CodecFault),
    #[error("decompression failed: declared {expected} bytes, produced {actual}")]
    DecompressionFailure { expected: usize, actual: usize },
    #[error("destination buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickupError {
    #[error("object {0:?} can no longer be picked up")]
    Unavailable(ObjectId),
    #[error("pickup rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_errors_convert_into_malformed() {
        let err: NetError = RecordError::Truncated {
            needed: 4,
            remaining: 1,
        }
        .into();
        assert!(matches!(err, NetError::MalformedRecord(_)));
        assert_eq!(
            err.to_string(),
            "malformed record: record truncated: needed 4 bytes, 1 remaining"
        );
    }
}

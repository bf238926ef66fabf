use crate::error::NetError;

/// Counters the session layer reads to decide on escalation policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub malformed_records: u64,
    pub codec_mismatches: u64,
    pub decompression_failures: u64,
    pub stale_commands: u64,
    pub plain_bytes_sent: u64,
    pub wire_bytes_sent: u64,
    pub stored_packets: u64,
    pub codec_swaps: u64,
}

impl NetStats {
    pub fn record_error(&mut self, error: &NetError) {
        self.packets_dropped += 1;
        match error {
            NetError::MalformedRecord(_) => self.malformed_records += 1,
            NetError::CodecMismatch(_) => self.codec_mismatches += 1,
            NetError::DecompressionFailure { .. } => self.decompression_failures += 1,
            NetError::BufferTooSmall { .. } => {}
        }
    }

    pub fn record_send(&mut self, plain_len: usize, wire_len: usize, stored: bool) {
        self.packets_sent += 1;
        self.plain_bytes_sent += plain_len as u64;
        self.wire_bytes_sent += wire_len as u64;
        if stored {
            self.stored_packets += 1;
        }
    }

    /// Wire bytes per plaintext byte; 1.0 before anything is sent.
    pub fn compression_ratio(&self) -> f32 {
        if self.plain_bytes_sent == 0 {
            return 1.0;
        }
        self.wire_bytes_sent as f32 / self.plain_bytes_sent as f32
    }

    pub fn error_count(&self) -> u64 {
        self.malformed_records + self.codec_mismatches + self.decompression_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecFault, RecordError};

    #[test]
    fn errors_are_counted_by_kind() {
        let mut stats = NetStats::default();
        stats.record_error(&NetError::CodecMismatch(CodecFault::GarbledTag(0x80)));
        stats.record_error(&RecordError::InvalidCount(0).into());
        stats.record_error(&NetError::DecompressionFailure {
            expected: 10,
            actual: 3,
        });

        assert_eq!(stats.packets_dropped, 3);
        assert_eq!(stats.codec_mismatches, 1);
        assert_eq!(stats.malformed_records, 1);
        assert_eq!(stats.decompression_failures, 1);
        assert_eq!(stats.error_count(), 3);
    }

    #[test]
    fn ratio_tracks_wire_over_plain() {
        let mut stats = NetStats::default();
        assert_eq!(stats.compression_ratio(), 1.0);
        stats.record_send(100, 60, false);
        stats.record_send(100, 40, false);
        assert!((stats.compression_ratio() - 0.5).abs() < f32::EPSILON);
    }
}

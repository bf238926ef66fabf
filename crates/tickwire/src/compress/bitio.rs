/// MSB-first bit sink over a caller-provided buffer.
pub struct BitWriter<'a> {
    out: &'a mut [u8],
    byte: usize,
    bit: u8,
}

impl<'a> BitWriter<'a> {
    pub fn new(out: &'a mut [u8]) -> Self {
        Self { out, byte: 0, bit: 0 }
    }

    /// Writes the low `len` bits of `code`, highest first. Returns false
    /// once the buffer is full; the writer is then unusable.
    pub fn write_bits(&mut self, code: u32, len: u8) -> bool {
        for shift in (0..len).rev() {
            let Some(slot) = self.out.get_mut(self.byte) else {
                return false;
            };
            if self.bit == 0 {
                *slot = 0;
            }
            *slot |= (((code >> shift) & 1) as u8) << (7 - self.bit);
            self.bit += 1;
            if self.bit == 8 {
                self.bit = 0;
                self.byte += 1;
            }
        }
        true
    }

    /// Bytes touched so far, including a partially filled last byte.
    pub fn finish(self) -> usize {
        self.byte + usize::from(self.bit > 0)
    }
}

pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    pub fn read_bit(&mut self) -> Option<bool> {
        let byte = self.data.get(self.bit_pos / 8)?;
        let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
        self.bit_pos += 1;
        Some(bit == 1)
    }

    /// Bytes touched so far, counting a partially read last byte.
    pub fn bytes_consumed(&self) -> usize {
        self.bit_pos.div_ceil(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_pack_msb_first() {
        let mut buf = [0xffu8; 2];
        let mut writer = BitWriter::new(&mut buf);
        assert!(writer.write_bits(0b101, 3));
        assert!(writer.write_bits(0b11, 2));
        assert_eq!(writer.finish(), 1);
        assert_eq!(buf[0], 0b1011_1000);
        assert_eq!(buf[1], 0xff);

        let mut reader = BitReader::new(&buf[..1]);
        let bits: Vec<bool> = (0..5).filter_map(|_| reader.read_bit()).collect();
        assert_eq!(bits, vec![true, false, true, true, true]);
    }

    #[test]
    fn writer_stops_at_buffer_end() {
        let mut buf = [0u8; 1];
        let mut writer = BitWriter::new(&mut buf);
        assert!(writer.write_bits(0xff, 8));
        assert!(!writer.write_bits(1, 1));
    }

    #[test]
    fn consumed_bytes_round_up() {
        let mut reader = BitReader::new(&[0xff, 0xff]);
        assert_eq!(reader.bytes_consumed(), 0);
        reader.read_bit();
        assert_eq!(reader.bytes_consumed(), 1);
        for _ in 0..8 {
            reader.read_bit();
        }
        assert_eq!(reader.bytes_consumed(), 2);
    }

    #[test]
    fn reader_runs_dry() {
        let mut reader = BitReader::new(&[0x80]);
        for _ in 0..8 {
            assert!(reader.read_bit().is_some());
        }
        assert_eq!(reader.read_bit(), None);
    }
}

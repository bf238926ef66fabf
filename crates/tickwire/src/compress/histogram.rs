/// Byte frequencies observed by one codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: [u64; 256],
    total: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            counts: [0; 256],
            total: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_counts(counts: [u64; 256]) -> Self {
        Self {
            total: counts.iter().sum(),
            counts,
        }
    }

    /// Counts `data`, halving every count once the total passes
    /// `rescale_limit` so recent traffic keeps its weight.
    pub fn extend(&mut self, data: &[u8], rescale_limit: u64) {
        for &byte in data {
            self.counts[byte as usize] += 1;
        }
        self.total += data.len() as u64;

        while self.total > rescale_limit.max(1) {
            self.halve();
        }
    }

    fn halve(&mut self) {
        let mut total = 0;
        for count in &mut self.counts {
            *count >>= 1;
            total += *count;
        }
        self.total = total;
    }

    pub fn count(&self, symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }

    pub fn counts(&self) -> &[u64; 256] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_counts_symbols() {
        let mut histogram = Histogram::new();
        histogram.extend(b"aab", u64::MAX);
        assert_eq!(histogram.count(b'a'), 2);
        assert_eq!(histogram.count(b'b'), 1);
        assert_eq!(histogram.total(), 3);
    }

    #[test]
    fn exceeding_limit_halves_counts() {
        let mut histogram = Histogram::new();
        histogram.extend(&[7; 10], 16);
        histogram.extend(&[7; 10], 16);
        assert_eq!(histogram.count(7), 10);
        assert_eq!(histogram.total(), 10);
    }
}

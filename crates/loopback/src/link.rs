use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tickwire::Tick;

/// One direction of an unreliable link: drops a share of datagrams and
/// delays the rest by up to `max_latency` ticks, which also reorders them.
#[derive(Debug)]
pub struct LossyLink {
    loss: f64,
    max_latency: u32,
    rng: StdRng,
    in_flight: Vec<(Tick, Vec<u8>)>,
    pub sent: u64,
    pub dropped: u64,
}

impl LossyLink {
    pub fn new(loss_percent: f32, max_latency: u32, seed: u64) -> Self {
        Self {
            loss: (loss_percent as f64 / 100.0).clamp(0.0, 1.0),
            max_latency,
            rng: StdRng::seed_from_u64(seed),
            in_flight: Vec::new(),
            sent: 0,
            dropped: 0,
        }
    }

    pub fn send(&mut self, now: Tick, datagram: Vec<u8>) {
        self.sent += 1;
        if self.rng.gen_bool(self.loss) {
            self.dropped += 1;
            return;
        }
        let delay = self.rng.gen_range(0..=self.max_latency);
        self.in_flight.push((now + delay, datagram));
    }

    /// Datagrams due by `now`, in the order they were sent.
    pub fn deliver(&mut self, now: Tick) -> Vec<Vec<u8>> {
        let (due, later): (Vec<_>, Vec<_>) = self
            .in_flight
            .drain(..)
            .partition(|(deliver_at, _)| *deliver_at <= now);
        self.in_flight = later;
        due.into_iter().map(|(_, datagram)| datagram).collect()
    }

    pub fn flush(&mut self) {
        self.in_flight.clear();
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossless_link_delivers_everything_after_latency() {
        let mut link = LossyLink::new(0.0, 2, 7);
        for tick in 0..10 {
            link.send(tick, vec![tick as u8]);
        }
        let delivered: usize = (0..=11).map(|tick| link.deliver(tick).len()).sum();
        assert_eq!(delivered, 10);
        assert_eq!(link.dropped, 0);
        assert_eq!(link.in_flight(), 0);
    }

    #[test]
    fn total_loss_drops_everything() {
        let mut link = LossyLink::new(100.0, 0, 7);
        link.send(0, vec![1]);
        assert!(link.deliver(0).is_empty());
        assert_eq!(link.dropped, 1);
    }
}

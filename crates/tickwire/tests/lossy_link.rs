use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tickwire::record::{MessageWriter, encode_baseline_delta};
use tickwire::{
    Buttons, CodecId, Connection, EntityBaseline, NetConfig, Tick, UserCmd, ViewAngles,
};

struct Link {
    rng: StdRng,
    loss: f64,
    duplicate: f64,
    max_delay: u32,
    in_flight: Vec<(Tick, Vec<u8>)>,
}

impl Link {
    fn new(seed: u64, loss: f64, max_delay: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            loss,
            duplicate: 0.05,
            max_delay,
            in_flight: Vec::new(),
        }
    }

    fn send(&mut self, now: Tick, datagram: Vec<u8>) {
        if self.rng.gen_bool(self.loss) {
            return;
        }
        if self.rng.gen_bool(self.duplicate) {
            let delay = self.rng.gen_range(0..=self.max_delay);
            self.in_flight.push((now + delay, datagram.clone()));
        }
        let delay = self.rng.gen_range(0..=self.max_delay);
        self.in_flight.push((now + delay, datagram));
    }

    fn deliver(&mut self, now: Tick) -> Vec<Vec<u8>> {
        let (due, later) = self
            .in_flight
            .drain(..)
            .partition(|(at, _)| *at <= now);
        self.in_flight = later;
        due.into_iter().map(|(_, datagram)| datagram).collect::<Vec<_>>()
    }
}

fn world_payload(tick: Tick, rng: &mut StdRng) -> Vec<u8> {
    let mut out = MessageWriter::new();
    out.write_u32(tick);
    for id in 0..6u16 {
        let mut state = EntityBaseline::new(id);
        state.origin = [(id as i32) << 20, rng.gen_range(-8..8) << 16, 0];
        state.frame = (tick / 4) as u16 % 3;
        state.flags = 1;
        encode_baseline_delta(&EntityBaseline::new(id), &state, &mut out);
    }
    out.into_inner()
}

#[test]
fn world_payloads_survive_loss_reordering_and_duplication() {
    let config = NetConfig::default();
    let mut client = Connection::new(&config);
    let mut server = Connection::new(&config);
    let mut to_client = Link::new(1, 0.2, 4);
    let mut to_server = Link::new(2, 0.2, 4);
    let mut rng = StdRng::seed_from_u64(3);

    let mut sent = HashMap::new();
    let mut delivered = 0;

    for now in 1..=1500 {
        let payload = world_payload(now, &mut rng);
        to_client.send(now, server.send_payload(&payload).unwrap());
        sent.insert(now, payload);

        to_server.send(now, client.send_payload(&[]).unwrap());

        for datagram in to_client.deliver(now) {
            if let Some(payload) = client.receive_payload(&datagram).unwrap() {
                let tick = u32::from_le_bytes(payload[..4].try_into().unwrap());
                assert_eq!(sent.get(&tick), Some(&payload));
                delivered += 1;
            }
        }
        for datagram in to_server.deliver(now) {
            server.receive_payload(&datagram).unwrap();
        }
    }

    let world = server.stats();
    assert!(delivered > 1100);
    assert!(world.codec_swaps >= 10);
    assert!(world.compression_ratio() < 1.0);
    assert_eq!(client.stats().error_count(), 0);
    assert_ne!(server.sender().phase(CodecId::A), tickwire::CodecPhase::Idle);
}

#[test]
fn commands_apply_once_and_in_order() {
    let config = NetConfig::default();
    let mut client = Connection::new(&config);
    let mut server = Connection::new(&config);
    let mut to_server = Link::new(4, 0.25, 3);
    let mut to_client = Link::new(5, 0.25, 3);
    let mut rng = StdRng::seed_from_u64(6);

    let mut client_view = ViewAngles::default();
    let mut applied = Vec::new();

    for now in 1..=600 {
        let mut cmd = UserCmd::new(now);
        cmd.forward = rng.gen_range(-2..=2) * 100;
        if rng.gen_bool(0.3) {
            cmd.buttons = Buttons::JUMP;
        }
        let mut target = client_view;
        target.yaw = target.yaw.wrapping_add(rng.gen_range(-4..=4) * 64);
        cmd.set_view(client_view, target);
        client_view.apply(&cmd);

        to_server.send(now, client.send_moves(now, cmd).unwrap());
        to_client.send(now, server.send_payload(b"ack").unwrap());

        for datagram in to_server.deliver(now) {
            for (tick, cmd) in server.receive_moves(&datagram).unwrap() {
                assert_eq!(tick, cmd.world_index);
                applied.push(tick);
            }
        }
        for datagram in to_client.deliver(now) {
            client.receive_payload(&datagram).unwrap();
        }
    }

    assert!(applied.windows(2).all(|pair| pair[0] < pair[1]));
    // With two backups a command is only lost when three packets in a row miss.
    assert!(applied.len() > 560);
    assert!(server.stats().stale_commands > 0);
    assert_eq!(server.stats().error_count(), 0);
}

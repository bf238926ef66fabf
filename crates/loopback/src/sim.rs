use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tickwire::record::{ANGLE_DELTA_UNIT, BaselineUpdate};
use tickwire::{
    Buttons, CodecId, Connection, Correction, EntityHistory, EntitySnapshot, NetConfig, ObjectId,
    ObjectTable, Pitch, Reconciler, ReplayQueue, SharedSnapshotRing, Tick, UserCmd, ViewAngles,
};

use crate::link::LossyLink;
use crate::world::{
    ClientWorld, PLAYER_ID, ServerWorld, WorldUpdate, apply_move, level_primer, origin_of,
    snapshot_of,
};

const RENDER_DELAY_TICKS: f64 = 1.5;
const ITEM_SPAWN_INTERVAL: Tick = 10;
const CORRECTION_THRESHOLD: f32 = 0.01;
const SNAP_THRESHOLD: f32 = 64.0;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub net: NetConfig,
    pub loss_percent: f32,
    pub max_latency: Tick,
    pub seed: u64,
    /// Ticks per level; zero never changes level.
    pub level_ticks: Tick,
    pub max_spawn_lag: Tick,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub commands_applied: u64,
    pub rewinds: u64,
    pub direct_pickups: u64,
    pub replayed: usize,
    pub expired: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub smooth_corrections: u64,
    pub snaps: u64,
    pub stale_updates: u64,
    pub levels: u32,
}

struct Client {
    conn: Connection,
    link: LossyLink,
    view: ViewAngles,
    origin: [i32; 3],
    reconciler: Reconciler,
    replay: ReplayQueue,
    world: ClientWorld,
    remote: SharedSnapshotRing<EntitySnapshot>,
    items: EntityHistory<EntitySnapshot>,
    newest_update: Tick,
}

struct Server {
    conn: Connection,
    link: LossyLink,
    world: ServerWorld,
    history: EntityHistory<EntitySnapshot>,
    last_applied: Tick,
}

/// One client and one server stepping in lockstep over two lossy links.
pub struct Simulation {
    config: SimulationConfig,
    tick: Tick,
    rng: StdRng,
    client: Client,
    server: Server,
    summary: Summary,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let net = &config.net;
        let depth = net.snapshot.depth;
        let seed = config.seed;

        let client = Client {
            conn: Connection::new(net),
            link: LossyLink::new(config.loss_percent, config.max_latency, seed ^ 0xC11E),
            view: ViewAngles::default(),
            origin: [0; 3],
            reconciler: Reconciler::new(depth)
                .with_thresholds(CORRECTION_THRESHOLD, SNAP_THRESHOLD),
            replay: ReplayQueue::new(net.replay.clone()),
            world: ClientWorld::default(),
            remote: SharedSnapshotRing::new(depth),
            items: EntityHistory::new(depth),
            newest_update: 0,
        };
        let server = Server {
            conn: Connection::new(net),
            link: LossyLink::new(config.loss_percent, config.max_latency, seed ^ 0x5E4E),
            world: ServerWorld::new(ITEM_SPAWN_INTERVAL, config.max_spawn_lag),
            history: EntityHistory::new(depth),
            last_applied: 0,
        };

        let mut simulation = Self {
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            client,
            server,
            summary: Summary::default(),
            config,
        };
        simulation.load_level();
        simulation
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn step(&mut self) {
        self.tick += 1;
        let now = self.tick;

        if self.config.level_ticks > 0 && now % self.config.level_ticks == 0 {
            self.change_level();
        }

        self.client_send(now);
        self.server_receive(now);
        self.server_send(now);
        self.client_receive(now);
        self.client_replay(now);
    }

    fn client_send(&mut self, now: Tick) {
        let mut cmd = UserCmd::new(now);
        cmd.forward = self.rng.gen_range(-4..=8) * 50;
        if self.rng.gen_bool(0.2) {
            cmd.side = self.rng.gen_range(-200..=200);
        }
        if self.rng.gen_bool(0.1) {
            cmd.buttons |= Buttons::ATTACK;
        }
        if self.rng.gen_bool(0.02) {
            cmd.impulse = self.rng.gen_range(1..=9);
        }

        let turn = if self.rng.gen_bool(0.9) {
            self.rng.gen_range(-8..=8) * ANGLE_DELTA_UNIT
        } else {
            self.rng.gen_range(i16::MIN..=i16::MAX)
        };
        let mut target = self.client.view;
        target.yaw = target.yaw.wrapping_add(turn);
        cmd.set_view(self.client.view, target);
        if self.rng.gen_bool(0.01) {
            cmd.pitch = Some(Pitch::CenterView);
        }

        self.client.view.apply(&cmd);
        apply_move(&mut self.client.origin, &cmd);
        self.client
            .reconciler
            .record_prediction(now, snapshot_of(&self.client.origin, self.client.view));

        match self.client.conn.send_moves(now, cmd) {
            Ok(datagram) => self.client.link.send(now, datagram),
            Err(err) => warn!("client could not send tick {now}: {err}"),
        }
    }

    fn server_receive(&mut self, now: Tick) {
        for datagram in self.client.link.deliver(now) {
            let cmds = match self.server.conn.receive_moves(&datagram) {
                Ok(cmds) => cmds,
                Err(err) => {
                    debug!("server dropped move datagram: {err}");
                    continue;
                }
            };

            for (tick, cmd) in cmds {
                self.server.world.apply_command(&cmd);
                self.server.last_applied = tick;
                self.summary.commands_applied += 1;

                if cmd.buttons.contains(Buttons::ATTACK) {
                    let targets = self.server.history.rewind(tick);
                    trace!("attack at tick {tick} checked against {} objects", targets.len());
                    self.summary.rewinds += 1;
                }
            }
        }
    }

    fn server_send(&mut self, now: Tick) {
        let pickups = self.server.world.step(now, &mut self.rng);
        let entities = self.server.world.entities(now);

        for entity in &entities {
            match entity {
                BaselineUpdate::Changed(state) => {
                    let view = if state.id == PLAYER_ID {
                        self.server.world.view
                    } else {
                        ViewAngles::default()
                    };
                    self.server.history.record(
                        now,
                        ObjectId(state.id as u32),
                        snapshot_of(&state.origin, view),
                    );
                }
                BaselineUpdate::Removed(id) => {
                    self.server.history.forget(ObjectId(*id as u32));
                }
            }
        }

        let update = WorldUpdate {
            tick: self.server.last_applied,
            entities,
            pickups,
        };
        match self.server.conn.send_payload(&update.encode()) {
            Ok(datagram) => self.server.link.send(now, datagram),
            Err(err) => warn!("server could not send tick {now}: {err}"),
        }
    }

    fn client_receive(&mut self, now: Tick) {
        for datagram in self.server.link.deliver(now) {
            let payload = match self.client.conn.receive_payload(&datagram) {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(err) => {
                    debug!("client dropped world datagram: {err}");
                    continue;
                }
            };
            match WorldUpdate::decode(&payload) {
                Ok(update) => self.apply_update(now, update),
                Err(err) => debug!("client dropped world update: {err}"),
            }
        }
    }

    fn apply_update(&mut self, now: Tick, update: WorldUpdate) {
        if update.tick < self.client.newest_update {
            self.summary.stale_updates += 1;
        } else {
            self.client.newest_update = update.tick;
            for entity in update.entities {
                self.apply_entity(now, update.tick, entity);
            }
        }

        for event in update.pickups {
            let Some(handle) = self.client.world.spawn_lookup(event.object) else {
                self.client.replay.record(event.tick, event.object, event.pickup);
                continue;
            };
            match self.client.world.apply_item_pickup(handle, &event.pickup) {
                Ok(()) => self.summary.direct_pickups += 1,
                Err(err) => debug!("pickup on {:?} refused: {err}", event.object),
            }
        }
    }

    fn apply_entity(&mut self, now: Tick, acked_tick: Tick, entity: BaselineUpdate) {
        match entity {
            BaselineUpdate::Changed(state) if state.id == PLAYER_ID => {
                let view = ViewAngles::new(state.angle as i16, 0);
                let authoritative = snapshot_of(&state.origin, view);
                self.client.remote.push(acked_tick, authoritative);

                let offset = match self.client.reconciler.reconcile(acked_tick, &authoritative) {
                    Correction::None => return,
                    Correction::Smooth(offset) => {
                        self.summary.smooth_corrections += 1;
                        offset
                    }
                    Correction::Snap(offset) => {
                        self.summary.snaps += 1;
                        offset
                    }
                };
                let shift = origin_of(offset);
                for (axis, delta) in self.client.origin.iter_mut().zip(shift) {
                    *axis = axis.wrapping_add(delta);
                }
            }
            BaselineUpdate::Changed(state) => {
                if self.client.world.update(state) {
                    trace!("object {} appeared at tick {now}", state.id);
                }
                self.client.items.record(
                    now,
                    ObjectId(state.id as u32),
                    snapshot_of(&state.origin, ViewAngles::default()),
                );
            }
            BaselineUpdate::Removed(id) => {
                let object = ObjectId(id as u32);
                self.client.world.remove(id);
                self.client.items.forget(object);
                self.summary.cancelled += self.client.replay.remove_object(object);
            }
        }
    }

    fn client_replay(&mut self, now: Tick) {
        let report = self.client.replay.replay(&now, &mut self.client.world);
        self.summary.replayed += report.replayed;
        self.summary.expired += report.expired;
        self.summary.failed += report.failed;
        if self.client.replay.was_replayed() {
            debug!("{} delayed pickups applied at tick {now}", report.replayed);
        }

        if let Some(view) = self
            .client
            .remote
            .interpolate(now as f64 - RENDER_DELAY_TICKS)
        {
            trace!("render player at {:?} yaw {:.1}", view.position, view.yaw);
        }
    }

    /// Both peers prime their standby codecs with the same level data.
    fn load_level(&mut self) {
        let primer = level_primer();
        for conn in [&mut self.client.conn, &mut self.server.conn] {
            conn.extend_histograms(&primer);
            conn.rebuild_standby();
        }
    }

    fn change_level(&mut self) {
        debug!("level change at tick {}", self.tick);
        self.summary.levels += 1;

        self.client.link.flush();
        self.server.link.flush();
        self.client.conn.reset();
        self.server.conn.reset();
        self.load_level();

        self.client.view = ViewAngles::default();
        self.client.origin = [0; 3];
        self.client.reconciler.reset();
        self.client.replay.clear();
        self.client.world = ClientWorld::default();
        self.client.remote.clear();
        self.client.items.clear();
        self.client.newest_update = 0;

        self.server.world = ServerWorld::new(ITEM_SPAWN_INTERVAL, self.config.max_spawn_lag);
        self.server.history.clear();
        self.server.last_applied = 0;
    }

    pub fn log_summary(&self) {
        let client = self.client.conn.stats();
        let server = self.server.conn.stats();
        let summary = self.summary();

        info!("{} ticks, {} level changes", self.tick, summary.levels);
        info!(
            "moves: {} sent, {} lost in transit, {} received, {} commands applied, {} backups skipped, {} errors",
            client.packets_sent,
            self.client.link.dropped,
            server.packets_received,
            summary.commands_applied,
            server.stale_commands,
            server.error_count()
        );
        info!(
            "world: {} sent, {} lost in transit, {} received, {} out of date, {} errors",
            server.packets_sent,
            self.server.link.dropped,
            client.packets_received,
            summary.stale_updates,
            client.error_count()
        );
        info!(
            "compression: moves {:.2} ({} swaps), world {:.2} ({} swaps, {} stored)",
            client.compression_ratio(),
            client.codec_swaps,
            server.compression_ratio(),
            server.codec_swaps,
            server.stored_packets
        );
        info!(
            "pickups: {} direct, {} replayed, {} timed out, {} refused, {} cancelled, {} still pending",
            summary.direct_pickups,
            summary.replayed,
            summary.expired,
            summary.failed,
            summary.cancelled,
            self.client.replay.len()
        );
        info!(
            "prediction: {} smoothed, {} snapped; {} lag-compensated attacks",
            summary.smooth_corrections, summary.snaps, summary.rewinds
        );
        debug!(
            "server world codecs: A {:?}, B {:?}; {} datagrams still in flight",
            self.server.conn.sender().phase(CodecId::A),
            self.server.conn.sender().phase(CodecId::B),
            self.client.link.in_flight() + self.server.link.in_flight()
        );
    }
}

use std::collections::HashMap;

use glam::Vec3;
use log::trace;
use rand::Rng;

use tickwire::record::{
    BaselineUpdate, MessageReader, MessageWriter, decode_baseline_delta, encode_baseline_delta,
    encode_removal,
};
use tickwire::{
    EntityBaseline, EntitySnapshot, ItemPickup, MovePacket, NetError, ObjectId, ObjectTable,
    PickupError, Tick, UserCmd, ViewAngles,
};

pub const PLAYER_ID: u16 = 0;
const FIRST_ITEM_ID: u16 = 100;
const VISIBLE: u32 = 1;
const ITEM_LIFETIME: Tick = 40;
const REMOVAL_REPEATS: Tick = 4;

/// 16.16 fixed point.
const UNIT: f32 = 65536.0;

/// Moves an origin by one command. Both peers run the same integer math.
pub fn apply_move(origin: &mut [i32; 3], cmd: &UserCmd) {
    origin[0] = origin[0].wrapping_add(cmd.forward as i32 * 256);
    origin[1] = origin[1].wrapping_add(cmd.side as i32 * 256);
    origin[2] = origin[2].wrapping_add(cmd.up as i32 * 256);
}

pub fn snapshot_of(origin: &[i32; 3], view: ViewAngles) -> EntitySnapshot {
    let position = Vec3::new(
        origin[0] as f32 / UNIT,
        origin[1] as f32 / UNIT,
        origin[2] as f32 / UNIT,
    );
    EntitySnapshot::new(position, view.yaw_degrees(), view.pitch_degrees())
}

pub fn origin_of(position: Vec3) -> [i32; 3] {
    [
        (position.x * UNIT).round() as i32,
        (position.y * UNIT).round() as i32,
        (position.z * UNIT).round() as i32,
    ]
}

/// Bytes both peers feed into their standby codecs on level load.
pub fn level_primer() -> Vec<u8> {
    let mut primer = MovePacket::new(1, UserCmd::new(1)).encode();
    let world = ServerWorld::new(1, 0);
    let update = WorldUpdate {
        tick: 0,
        entities: world.entities(0),
        pickups: Vec::new(),
    };
    primer.extend(update.encode());
    primer
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickupEvent {
    pub tick: Tick,
    pub object: ObjectId,
    pub pickup: ItemPickup,
}

/// Server to client payload: full-state deltas against the empty baseline
/// plus pickup notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldUpdate {
    /// Tick of the newest applied command.
    pub tick: Tick,
    pub entities: Vec<BaselineUpdate>,
    pub pickups: Vec<PickupEvent>,
}

impl WorldUpdate {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = MessageWriter::new();
        let mut written = 0u8;
        for update in self.entities.iter().take(u8::MAX as usize) {
            match update {
                BaselineUpdate::Changed(state) => {
                    if encode_baseline_delta(&EntityBaseline::new(state.id), state, &mut body) {
                        written += 1;
                    }
                }
                BaselineUpdate::Removed(id) => {
                    encode_removal(*id, &mut body);
                    written += 1;
                }
            }
        }

        let mut out = MessageWriter::with_capacity(body.len() + 16);
        out.write_u32(self.tick);
        out.write_u8(written);
        for &byte in body.as_slice() {
            out.write_u8(byte);
        }

        let pickups = &self.pickups[..self.pickups.len().min(u8::MAX as usize)];
        out.write_u8(pickups.len() as u8);
        for event in pickups {
            out.write_u32(event.tick);
            out.write_u32(event.object.id());
            out.write_u32(event.pickup.picker.id());
            out.write_u8(event.pickup.kind);
            out.write_u16(event.pickup.amount);
        }
        out.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetError> {
        let mut input = MessageReader::new(bytes);
        let tick = input.read_u32()?;

        let count = input.read_u8()?;
        let mut entities = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entities.push(decode_baseline_delta(&mut input, EntityBaseline::new)?);
        }

        let count = input.read_u8()?;
        let mut pickups = Vec::with_capacity(count as usize);
        for _ in 0..count {
            pickups.push(PickupEvent {
                tick: input.read_u32()?,
                object: ObjectId(input.read_u32()?),
                pickup: ItemPickup {
                    picker: ObjectId(input.read_u32()?),
                    kind: input.read_u8()?,
                    amount: input.read_u16()?,
                },
            });
        }
        input.finish()?;

        Ok(Self {
            tick,
            entities,
            pickups,
        })
    }
}

#[derive(Debug)]
struct ServerItem {
    baseline: EntityBaseline,
    visible_at: Tick,
    expires_at: Tick,
}

/// Authoritative side: the player plus items that get picked up before the
/// client is told they exist.
#[derive(Debug)]
pub struct ServerWorld {
    pub player: EntityBaseline,
    pub view: ViewAngles,
    items: Vec<ServerItem>,
    removals: Vec<(u16, Tick)>,
    next_item: u16,
    spawn_interval: Tick,
    max_spawn_lag: Tick,
}

impl ServerWorld {
    pub fn new(spawn_interval: Tick, max_spawn_lag: Tick) -> Self {
        let mut player = EntityBaseline::new(PLAYER_ID);
        player.flags = VISIBLE;
        Self {
            player,
            view: ViewAngles::default(),
            items: Vec::new(),
            removals: Vec::new(),
            next_item: FIRST_ITEM_ID,
            spawn_interval: spawn_interval.max(1),
            max_spawn_lag,
        }
    }

    pub fn apply_command(&mut self, cmd: &UserCmd) {
        self.view.apply(cmd);
        apply_move(&mut self.player.origin, cmd);
        self.player.angle = self.view.yaw as u16;
    }

    /// Advances items and returns the pickups that happened this tick.
    pub fn step(&mut self, now: Tick, rng: &mut impl Rng) -> Vec<PickupEvent> {
        let mut pickups = Vec::new();
        if now % self.spawn_interval == 0 {
            let id = self.next_item;
            self.next_item = self.next_item.wrapping_add(1).max(FIRST_ITEM_ID);

            let mut baseline = EntityBaseline::new(id);
            baseline.origin = [rng.gen_range(-4096..4096) << 16, rng.gen_range(-4096..4096) << 16, 0];
            baseline.frame = rng.gen_range(0..4);
            baseline.flags = VISIBLE;
            let lag = rng.gen_range(0..=self.max_spawn_lag);
            self.items.push(ServerItem {
                baseline,
                visible_at: now + lag,
                expires_at: now + lag + ITEM_LIFETIME,
            });

            pickups.push(PickupEvent {
                tick: now,
                object: ObjectId(id as u32),
                pickup: ItemPickup {
                    picker: ObjectId(PLAYER_ID as u32),
                    kind: baseline.frame as u8,
                    amount: 25,
                },
            });
            trace!("item {id} picked up at tick {now}, visible from tick {}", now + lag);
        }

        let (expired, live): (Vec<_>, Vec<_>) =
            self.items.drain(..).partition(|item| item.expires_at <= now);
        self.items = live;
        self.removals
            .extend(expired.iter().map(|item| (item.baseline.id, now + REMOVAL_REPEATS)));
        self.removals.retain(|&(_, until)| until > now);

        pickups
    }

    pub fn entities(&self, now: Tick) -> Vec<BaselineUpdate> {
        let mut entities = vec![BaselineUpdate::Changed(self.player)];
        entities.extend(
            self.items
                .iter()
                .filter(|item| item.visible_at <= now)
                .map(|item| BaselineUpdate::Changed(item.baseline)),
        );
        entities.extend(self.removals.iter().map(|&(id, _)| BaselineUpdate::Removed(id)));
        entities
    }
}

/// What the client knows about the world. Objects exist from their first
/// baseline until a removal arrives.
#[derive(Debug, Default)]
pub struct ClientWorld {
    objects: HashMap<u16, EntityBaseline>,
    collected: HashMap<u8, u32>,
}

impl ClientWorld {
    pub fn update(&mut self, baseline: EntityBaseline) -> bool {
        self.objects.insert(baseline.id, baseline).is_none()
    }

    pub fn remove(&mut self, id: u16) -> bool {
        self.objects.remove(&id).is_some()
    }

    pub fn collected(&self) -> u32 {
        self.collected.values().sum()
    }
}

impl ObjectTable for ClientWorld {
    type Handle = u16;

    fn spawn_lookup(&self, id: ObjectId) -> Option<u16> {
        let key = u16::try_from(id.id()).ok()?;
        self.objects.contains_key(&key).then_some(key)
    }

    fn apply_item_pickup(&mut self, handle: u16, pickup: &ItemPickup) -> Result<(), PickupError> {
        let object = self
            .objects
            .get_mut(&handle)
            .ok_or(PickupError::Unavailable(ObjectId(handle as u32)))?;
        if object.flags & VISIBLE == 0 {
            return Err(PickupError::Unavailable(ObjectId(handle as u32)));
        }
        object.flags &= !VISIBLE;
        *self.collected.entry(pickup.kind).or_default() += pickup.amount as u32;
        Ok(())
    }
}

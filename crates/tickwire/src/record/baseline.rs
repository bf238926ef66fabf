use bitflags::bitflags;

use super::buffer::{MessageReader, MessageWriter};
use crate::error::NetError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BaselineFields: u8 {
        const ORIGIN_X = 1 << 0;
        const ORIGIN_Y = 1 << 1;
        const ORIGIN_Z = 1 << 2;
        const ANGLE = 1 << 3;
        const FRAME = 1 << 4;
        const FLAGS = 1 << 5;
        const REMOVE = 1 << 7;
    }
}

/// Last state of an object both peers agree on. Origins are 16.16 fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityBaseline {
    pub id: u16,
    pub origin: [i32; 3],
    pub angle: u16,
    pub frame: u16,
    pub flags: u32,
}

impl EntityBaseline {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn changed_fields(&self, to: &EntityBaseline) -> BaselineFields {
        let mut fields = BaselineFields::empty();
        fields.set(BaselineFields::ORIGIN_X, self.origin[0] != to.origin[0]);
        fields.set(BaselineFields::ORIGIN_Y, self.origin[1] != to.origin[1]);
        fields.set(BaselineFields::ORIGIN_Z, self.origin[2] != to.origin[2]);
        fields.set(BaselineFields::ANGLE, self.angle != to.angle);
        fields.set(BaselineFields::FRAME, self.frame != to.frame);
        fields.set(BaselineFields::FLAGS, self.flags != to.flags);
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineUpdate {
    Changed(EntityBaseline),
    Removed(u16),
}

impl BaselineUpdate {
    pub fn id(&self) -> u16 {
        match self {
            Self::Changed(baseline) => baseline.id,
            Self::Removed(id) => *id,
        }
    }
}

/// Writes only the fields of `to` that differ from `from`. Returns false and
/// writes nothing when the object is unchanged.
pub fn encode_baseline_delta(
    from: &EntityBaseline,
    to: &EntityBaseline,
    out: &mut MessageWriter,
) -> bool {
    let fields = from.changed_fields(to);
    if fields.is_empty() {
        return false;
    }

    out.write_u16(to.id);
    out.write_u8(fields.bits());
    if fields.contains(BaselineFields::ORIGIN_X) {
        out.write_i32(to.origin[0]);
    }
    if fields.contains(BaselineFields::ORIGIN_Y) {
        out.write_i32(to.origin[1]);
    }
    if fields.contains(BaselineFields::ORIGIN_Z) {
        out.write_i32(to.origin[2]);
    }
    if fields.contains(BaselineFields::ANGLE) {
        out.write_u16(to.angle);
    }
    if fields.contains(BaselineFields::FRAME) {
        out.write_u16(to.frame);
    }
    if fields.contains(BaselineFields::FLAGS) {
        out.write_u32(to.flags);
    }
    true
}

pub fn encode_removal(id: u16, out: &mut MessageWriter) {
    out.write_u16(id);
    out.write_u8(BaselineFields::REMOVE.bits());
}

/// Reads one update. `baseline_for` supplies the state the delta was made
/// against; unknown objects should get [`EntityBaseline::new`].
pub fn decode_baseline_delta(
    input: &mut MessageReader<'_>,
    baseline_for: impl FnOnce(u16) -> EntityBaseline,
) -> Result<BaselineUpdate, NetError> {
    let id = input.read_u16()?;
    let fields = BaselineFields::from_bits_retain(input.read_u8()?);
    if fields.contains(BaselineFields::REMOVE) {
        return Ok(BaselineUpdate::Removed(id));
    }

    let mut state = baseline_for(id);
    state.id = id;
    if fields.contains(BaselineFields::ORIGIN_X) {
        state.origin[0] = input.read_i32()?;
    }
    if fields.contains(BaselineFields::ORIGIN_Y) {
        state.origin[1] = input.read_i32()?;
    }
    if fields.contains(BaselineFields::ORIGIN_Z) {
        state.origin[2] = input.read_i32()?;
    }
    if fields.contains(BaselineFields::ANGLE) {
        state.angle = input.read_u16()?;
    }
    if fields.contains(BaselineFields::FRAME) {
        state.frame = input.read_u16()?;
    }
    if fields.contains(BaselineFields::FLAGS) {
        state.flags = input.read_u32()?;
    }
    Ok(BaselineUpdate::Changed(state))
}

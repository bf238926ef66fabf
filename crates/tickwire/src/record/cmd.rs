use bitflags::bitflags;

use super::buffer::{MessageReader, MessageWriter};
use crate::error::NetError;

/// Wire value standing in for [`Pitch::CenterView`]. Never a real angle.
pub const CENTER_VIEW_SENTINEL: i16 = i16::MIN;

/// 16-bit angle units covered by one step of an [`AngleDelta`].
pub const ANGLE_DELTA_UNIT: i16 = 64;

bitflags! {
    /// Presence bits, in wire order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CmdFields: u8 {
        const BUTTONS = 1 << 0;
        const ANGLE = 1 << 1;
        const PITCH = 1 << 2;
        const FORWARD = 1 << 3;
        const SIDE = 1 << 4;
        const UP = 1 << 5;
        const IMPULSE = 1 << 6;
        const DELTA_ANGLES = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u8 {
        const ATTACK = 1 << 0;
        const USE = 1 << 1;
        const JUMP = 1 << 2;
        const DUCK = 1 << 3;
        const RELOAD = 1 << 4;
        const ALT_ATTACK = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pitch {
    Absolute(i16),
    CenterView,
}

impl Pitch {
    fn to_wire(self) -> i16 {
        match self {
            // i16::MIN is taken by the sentinel; the nearest angle is sent instead.
            Self::Absolute(CENTER_VIEW_SENTINEL) => CENTER_VIEW_SENTINEL + 1,
            Self::Absolute(value) => value,
            Self::CenterView => CENTER_VIEW_SENTINEL,
        }
    }

    fn from_wire(value: i16) -> Self {
        if value == CENTER_VIEW_SENTINEL {
            Self::CenterView
        } else {
            Self::Absolute(value)
        }
    }
}

/// Per-tick view change in units of [`ANGLE_DELTA_UNIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AngleDelta {
    pub yaw: i8,
    pub pitch: i8,
}

impl AngleDelta {
    /// Expresses a yaw/pitch change as a delta if it is small and aligned
    /// to the delta unit.
    pub fn from_change(yaw: i16, pitch: i16) -> Option<Self> {
        Some(Self {
            yaw: units(yaw)?,
            pitch: units(pitch)?,
        })
    }

    pub fn yaw_units(self) -> i16 {
        self.yaw as i16 * ANGLE_DELTA_UNIT
    }

    pub fn pitch_units(self) -> i16 {
        self.pitch as i16 * ANGLE_DELTA_UNIT
    }
}

fn units(change: i16) -> Option<i8> {
    if change % ANGLE_DELTA_UNIT != 0 {
        return None;
    }
    i8::try_from(change / ANGLE_DELTA_UNIT).ok()
}

/// One tick of player input. Every optional field is absent in the
/// default command and only present fields reach the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserCmd {
    pub world_index: u32,
    pub buttons: Buttons,
    pub angle: Option<i16>,
    pub pitch: Option<Pitch>,
    pub forward: i16,
    pub side: i16,
    pub up: i16,
    pub impulse: u8,
    pub delta: Option<AngleDelta>,
}

impl UserCmd {
    pub fn new(world_index: u32) -> Self {
        Self {
            world_index,
            ..Default::default()
        }
    }

    pub fn fields(&self) -> CmdFields {
        let mut fields = CmdFields::empty();
        fields.set(CmdFields::BUTTONS, !self.buttons.is_empty());
        fields.set(CmdFields::ANGLE, self.angle.is_some());
        fields.set(CmdFields::PITCH, self.pitch.is_some());
        fields.set(CmdFields::FORWARD, self.forward != 0);
        fields.set(CmdFields::SIDE, self.side != 0);
        fields.set(CmdFields::UP, self.up != 0);
        fields.set(CmdFields::IMPULSE, self.impulse != 0);
        fields.set(CmdFields::DELTA_ANGLES, self.delta.is_some());
        fields
    }

    /// Fills the view fields for a turn from `from` to `to`, preferring the
    /// compact delta form when the change allows it.
    pub fn set_view(&mut self, from: super::ViewAngles, to: super::ViewAngles) {
        let yaw_change = to.yaw.wrapping_sub(from.yaw);
        let pitch_change = to.pitch.wrapping_sub(from.pitch);

        if yaw_change == 0 && pitch_change == 0 {
            self.angle = None;
            self.pitch = None;
            self.delta = None;
        } else if let Some(delta) = AngleDelta::from_change(yaw_change, pitch_change) {
            self.angle = None;
            self.pitch = None;
            self.delta = Some(delta);
        } else {
            self.angle = Some(to.yaw);
            self.pitch = Some(Pitch::Absolute(to.pitch));
            self.delta = None;
        }
    }

    pub fn encode_into(&self, out: &mut MessageWriter) {
        let fields = self.fields();
        out.write_u8(fields.bits());
        out.write_u32(self.world_index);

        if fields.contains(CmdFields::BUTTONS) {
            out.write_u8(self.buttons.bits());
        }
        if let Some(angle) = self.angle {
            out.write_i16(angle);
        }
        if let Some(pitch) = self.pitch {
            out.write_i16(pitch.to_wire());
        }
        if fields.contains(CmdFields::FORWARD) {
            out.write_i16(self.forward);
        }
        if fields.contains(CmdFields::SIDE) {
            out.write_i16(self.side);
        }
        if fields.contains(CmdFields::UP) {
            out.write_i16(self.up);
        }
        if fields.contains(CmdFields::IMPULSE) {
            out.write_u8(self.impulse);
        }
        if let Some(delta) = self.delta {
            out.write_i8(delta.yaw);
            out.write_i8(delta.pitch);
        }
    }

    pub fn decode_from(input: &mut MessageReader<'_>) -> Result<Self, NetError> {
        let fields = CmdFields::from_bits_retain(input.read_u8()?);
        let mut cmd = Self::new(input.read_u32()?);

        if fields.contains(CmdFields::BUTTONS) {
            cmd.buttons = Buttons::from_bits_retain(input.read_u8()?);
        }
        if fields.contains(CmdFields::ANGLE) {
            cmd.angle = Some(input.read_i16()?);
        }
        if fields.contains(CmdFields::PITCH) {
            cmd.pitch = Some(Pitch::from_wire(input.read_i16()?));
        }
        if fields.contains(CmdFields::FORWARD) {
            cmd.forward = input.read_i16()?;
        }
        if fields.contains(CmdFields::SIDE) {
            cmd.side = input.read_i16()?;
        }
        if fields.contains(CmdFields::UP) {
            cmd.up = input.read_i16()?;
        }
        if fields.contains(CmdFields::IMPULSE) {
            cmd.impulse = input.read_u8()?;
        }
        if fields.contains(CmdFields::DELTA_ANGLES) {
            cmd.delta = Some(AngleDelta {
                yaw: input.read_i8()?,
                pitch: input.read_i8()?,
            });
        }

        Ok(cmd)
    }
}

pub fn encode_record(cmd: &UserCmd) -> Vec<u8> {
    let mut out = MessageWriter::with_capacity(20);
    cmd.encode_into(&mut out);
    out.into_inner()
}

/// Decodes exactly one record; trailing bytes are malformed.
pub fn decode_record(bytes: &[u8]) -> Result<UserCmd, NetError> {
    let mut input = MessageReader::new(bytes);
    let cmd = UserCmd::decode_from(&mut input)?;
    input.finish()?;
    Ok(cmd)
}

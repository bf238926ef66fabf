//! Field-optional binary layout for player commands and object baselines.
//!
//! Every record starts with a presence bitmask; a field is written only
//! when its bit is set, and its bit is set only when the field differs from
//! the default. Decoders never read past the bytes a bitmask asks for.

mod angles;
mod baseline;
mod buffer;
mod cmd;
mod movement;

pub use angles::ViewAngles;
pub use baseline::{
    BaselineFields, BaselineUpdate, EntityBaseline, decode_baseline_delta,
    encode_baseline_delta, encode_removal,
};
pub use buffer::{MessageReader, MessageWriter};
pub use cmd::{
    ANGLE_DELTA_UNIT, AngleDelta, Buttons, CENTER_VIEW_SENTINEL, CmdFields, Pitch, UserCmd,
    decode_record, encode_record,
};
pub use movement::{CommandHistory, MAX_COMMANDS_PER_PACKET, MovePacket, WorldIndexGate};

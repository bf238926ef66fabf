//! Client/server state synchronization for a fixed-tick multiplayer
//! simulation: command records, adaptive packet compression, deferred
//! replay of events for unspawned objects, and per-tick snapshot history.

pub mod compress;
pub mod config;
pub mod connection;
pub mod error;
pub mod record;
pub mod replay;
pub mod snapshot;
pub mod stats;
pub mod tracking;
pub mod types;

pub use compress::{CodecId, CodecPhase, Compressed, Decompressed, HuffmanReceiver, HuffmanSender};
pub use config::{
    CompressionConfig, MAX_REPLAY_TIC_LENGTH, NetConfig, ReplayConfig, SnapshotConfig,
};
pub use connection::{Connection, PACKET_HEADER_LEN, PacketHeader};
pub use error::{CodecFault, NetError, PickupError, RecordError};
pub use record::{
    AngleDelta, Buttons, CmdFields, EntityBaseline, MovePacket, Pitch, UserCmd, ViewAngles,
    decode_record, encode_record,
};
pub use replay::{ItemPickup, ObjectTable, ReplayItem, ReplayQueue, ReplayReport};
pub use snapshot::{
    Correction, EntityHistory, EntitySnapshot, Interpolate, Reconciler, SharedSnapshotRing,
    Snapshot, SnapshotRing,
};
pub use stats::NetStats;
pub use types::{ObjectId, Tick, TickSource, sequence_greater_than};

use serde::{Deserialize, Serialize};

pub const MAX_REPLAY_TIC_LENGTH: u32 = 35;
pub const HUFFMAN_RENEGOTIATE_DELAY: u32 = 8;
pub const HUFFMAN_MISS_THRESHOLD: u32 = 16;
pub const DEFAULT_SNAPSHOT_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub depth: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_SNAPSHOT_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub max_replay_tics: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_replay_tics: MAX_REPLAY_TIC_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Packets that must be acknowledged on the current codec before a new
    /// learning round may start.
    pub renegotiate_delay: u32,
    /// Consecutive unacknowledged sends after which the link counts as lossy.
    pub miss_threshold: u32,
    /// Histogram total at which all counts are halved.
    pub rescale_limit: u64,
    /// Payloads shorter than this never start a learning round.
    pub min_learn_bytes: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            renegotiate_delay: HUFFMAN_RENEGOTIATE_DELAY,
            miss_threshold: HUFFMAN_MISS_THRESHOLD,
            rescale_limit: 1 << 20,
            min_learn_bytes: 16,
        }
    }
}

pub const DEFAULT_BACKUP_COMMANDS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    pub snapshot: SnapshotConfig,
    pub replay: ReplayConfig,
    pub compression: CompressionConfig,
    /// Previous commands re-sent alongside each new one.
    pub backup_commands: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            snapshot: SnapshotConfig::default(),
            replay: ReplayConfig::default(),
            compression: CompressionConfig::default(),
            backup_commands: DEFAULT_BACKUP_COMMANDS,
        }
    }
}

impl NetConfig {
    pub fn with_backup_commands(mut self, count: usize) -> Self {
        self.backup_commands = count;
        self
    }
}

use std::collections::VecDeque;

use super::buffer::{MessageReader, MessageWriter};
use super::cmd::UserCmd;
use crate::error::{NetError, RecordError};
use crate::types::{Tick, sequence_greater_than};

pub const MAX_COMMANDS_PER_PACKET: usize = 8;

/// The command for `tick` plus the commands of the ticks right before it,
/// oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePacket {
    pub tick: Tick,
    pub cmds: Vec<UserCmd>,
}

impl MovePacket {
    pub fn new(tick: Tick, cmd: UserCmd) -> Self {
        Self {
            tick,
            cmds: vec![cmd],
        }
    }

    pub fn tick_of(&self, index: usize) -> Tick {
        let behind = self.cmds.len().saturating_sub(index + 1);
        self.tick.wrapping_sub(behind as u32)
    }

    pub fn ticked(&self) -> impl Iterator<Item = (Tick, &UserCmd)> {
        self.cmds
            .iter()
            .enumerate()
            .map(|(index, cmd)| (self.tick_of(index), cmd))
    }

    pub fn latest(&self) -> Option<&UserCmd> {
        self.cmds.last()
    }

    /// Only the newest [`MAX_COMMANDS_PER_PACKET`] commands are written.
    pub fn encode(&self) -> Vec<u8> {
        let skip = self.cmds.len().saturating_sub(MAX_COMMANDS_PER_PACKET);
        let cmds = &self.cmds[skip..];

        let mut out = MessageWriter::with_capacity(5 + cmds.len() * 20);
        out.write_u32(self.tick);
        out.write_u8(cmds.len() as u8);
        for cmd in cmds {
            cmd.encode_into(&mut out);
        }
        out.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetError> {
        let mut input = MessageReader::new(bytes);
        let tick = input.read_u32()?;
        let count = input.read_u8()?;
        if count == 0 || count as usize > MAX_COMMANDS_PER_PACKET {
            return Err(RecordError::InvalidCount(count).into());
        }

        let mut cmds = Vec::with_capacity(count as usize);
        for _ in 0..count {
            cmds.push(UserCmd::decode_from(&mut input)?);
        }
        input.finish()?;

        Ok(Self { tick, cmds })
    }
}

/// Client-side record of recently sent commands, used to attach backups.
#[derive(Debug)]
pub struct CommandHistory {
    recent: VecDeque<(Tick, UserCmd)>,
    backups: usize,
}

impl CommandHistory {
    pub fn new(backups: usize) -> Self {
        let backups = backups.min(MAX_COMMANDS_PER_PACKET - 1);
        Self {
            recent: VecDeque::with_capacity(backups + 1),
            backups,
        }
    }

    /// Stores the command for `tick` and returns the packet to send for it.
    /// Backups are only taken from the unbroken run of ticks ending at `tick`.
    pub fn push(&mut self, tick: Tick, cmd: UserCmd) -> MovePacket {
        if self
            .recent
            .back()
            .is_some_and(|&(last, _)| last.wrapping_add(1) != tick)
        {
            self.recent.clear();
        }

        self.recent.push_back((tick, cmd));
        while self.recent.len() > self.backups + 1 {
            self.recent.pop_front();
        }

        MovePacket {
            tick,
            cmds: self.recent.iter().map(|&(_, cmd)| cmd).collect(),
        }
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }
}

/// Admits each world index once, in increasing order.
#[derive(Debug, Default)]
pub struct WorldIndexGate {
    last_applied: Option<u32>,
}

impl WorldIndexGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, world_index: u32) -> bool {
        match self.last_applied {
            Some(last) if !sequence_greater_than(world_index, last) => false,
            _ => {
                self.last_applied = Some(world_index);
                true
            }
        }
    }

    pub fn last_applied(&self) -> Option<u32> {
        self.last_applied
    }

    pub fn reset(&mut self) {
        self.last_applied = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(world_index: u32, forward: i16) -> UserCmd {
        UserCmd {
            forward,
            ..UserCmd::new(world_index)
        }
    }

    #[test]
    fn packet_roundtrip_with_backups() {
        let packet = MovePacket {
            tick: 40,
            cmds: vec![cmd(8, 1), cmd(9, 0), cmd(10, -5)],
        };
        let decoded = MovePacket::decode(&packet.encode()).unwrap();
        assert_eq!(decoded, packet);

        let ticks: Vec<Tick> = decoded.ticked().map(|(tick, _)| tick).collect();
        assert_eq!(ticks, vec![38, 39, 40]);
    }

    #[test]
    fn zero_count_is_rejected() {
        let bytes = [1, 0, 0, 0, 0];
        assert_eq!(
            MovePacket::decode(&bytes),
            Err(NetError::MalformedRecord(RecordError::InvalidCount(0)))
        );
    }

    #[test]
    fn oversized_count_is_rejected() {
        let bytes = [1, 0, 0, 0, MAX_COMMANDS_PER_PACKET as u8 + 1];
        assert!(matches!(
            MovePacket::decode(&bytes),
            Err(NetError::MalformedRecord(RecordError::InvalidCount(_)))
        ));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let mut bytes = MovePacket::new(3, cmd(1, 0)).encode();
        bytes.push(0xaa);
        assert_eq!(
            MovePacket::decode(&bytes),
            Err(NetError::MalformedRecord(RecordError::TrailingBytes(1)))
        );
    }

    #[test]
    fn history_attaches_contiguous_backups() {
        let mut history = CommandHistory::new(2);

        assert_eq!(history.push(10, cmd(1, 0)).cmds.len(), 1);
        assert_eq!(history.push(11, cmd(2, 0)).cmds.len(), 2);
        let packet = history.push(12, cmd(3, 0));
        assert_eq!(packet.cmds.len(), 3);
        let packet = history.push(13, cmd(4, 0));
        assert_eq!(
            packet.cmds.iter().map(|c| c.world_index).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );

        let after_gap = history.push(20, cmd(5, 0));
        assert_eq!(after_gap.cmds.len(), 1);
    }

    #[test]
    fn gate_discards_stale_and_duplicate_indices() {
        let mut gate = WorldIndexGate::new();
        assert!(gate.accept(5));
        assert!(!gate.accept(5));
        assert!(!gate.accept(4));
        assert!(gate.accept(7));
        assert_eq!(gate.last_applied(), Some(7));

        gate.reset();
        assert!(gate.accept(1));
    }
}

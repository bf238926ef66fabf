use log::debug;

use crate::compress::{ENVELOPE_HEADER_LEN, HuffmanReceiver, HuffmanSender};
use crate::config::NetConfig;
use crate::error::NetError;
use crate::record::{CommandHistory, MessageReader, MessageWriter, MovePacket, UserCmd, WorldIndexGate};
use crate::stats::NetStats;
use crate::tracking::ReceiveTracker;
use crate::types::Tick;

/// `[sequence: u32][ack: u32][ack_bits: u32]` ahead of the envelope.
pub const PACKET_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub sequence: u32,
    pub ack: u32,
    pub ack_bits: u32,
}

impl PacketHeader {
    fn write(&self, out: &mut MessageWriter) {
        out.write_u32(self.sequence);
        out.write_u32(self.ack);
        out.write_u32(self.ack_bits);
    }

    fn read(input: &mut MessageReader<'_>) -> Result<Self, NetError> {
        Ok(Self {
            sequence: input.read_u32()?,
            ack: input.read_u32()?,
            ack_bits: input.read_u32()?,
        })
    }
}

/// One peer's end of a connection: sequencing and acks, compression in both
/// directions, and the command path with backups and replay protection.
///
/// Every per-packet failure is counted in [`NetStats`] and returned to the
/// caller, which drops the datagram and carries on.
#[derive(Debug)]
pub struct Connection {
    sender: HuffmanSender,
    receiver: HuffmanReceiver,
    received: ReceiveTracker,
    history: CommandHistory,
    gate: WorldIndexGate,
    next_sequence: u32,
    stats: NetStats,
}

impl Connection {
    pub fn new(config: &NetConfig) -> Self {
        Self {
            sender: HuffmanSender::new(config.compression.clone()),
            receiver: HuffmanReceiver::new(config.compression.clone()),
            received: ReceiveTracker::new(),
            history: CommandHistory::new(config.backup_commands),
            gate: WorldIndexGate::new(),
            next_sequence: 1,
            stats: NetStats::default(),
        }
    }

    pub fn stats(&self) -> &NetStats {
        &self.stats
    }

    pub fn sender(&self) -> &HuffmanSender {
        &self.sender
    }

    pub fn receiver(&self) -> &HuffmanReceiver {
        &self.receiver
    }

    /// Builds a datagram carrying `payload`.
    pub fn send_payload(&mut self, payload: &[u8]) -> Result<Vec<u8>, NetError> {
        let sequence = self.next_sequence;
        let (ack, ack_bits) = self.received.ack_data();

        let mut out = MessageWriter::with_capacity(PACKET_HEADER_LEN);
        PacketHeader {
            sequence,
            ack,
            ack_bits,
        }
        .write(&mut out);

        let mut datagram = out.into_inner();
        datagram.resize(PACKET_HEADER_LEN + ENVELOPE_HEADER_LEN + payload.len(), 0);
        let compressed = self
            .sender
            .compress(sequence, payload, &mut datagram[PACKET_HEADER_LEN..])?;
        datagram.truncate(PACKET_HEADER_LEN + compressed.written);

        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.stats
            .record_send(payload.len(), datagram.len(), compressed.is_stored());
        Ok(datagram)
    }

    /// Unpacks a datagram. `Ok(None)` means it was a duplicate.
    pub fn receive_payload(&mut self, datagram: &[u8]) -> Result<Option<Vec<u8>>, NetError> {
        let result = self.unpack(datagram);
        if let Err(err) = &result {
            debug!("dropping datagram: {err}");
            self.stats.record_error(err);
        }
        result
    }

    fn unpack(&mut self, datagram: &[u8]) -> Result<Option<Vec<u8>>, NetError> {
        let header = PacketHeader::read(&mut MessageReader::new(datagram))?;
        let packet = &datagram[PACKET_HEADER_LEN..];

        self.sender.process_ack(header.ack, header.ack_bits);
        self.stats.codec_swaps = self.sender.swaps();

        if self.received.is_duplicate(header.sequence) {
            return Ok(None);
        }

        let mut payload = vec![0u8; u16::MAX as usize];
        let decompressed = self
            .receiver
            .decompress(header.sequence, packet, &mut payload)?;
        payload.truncate(decompressed.len);

        self.received.record_received(header.sequence);
        self.stats.packets_received += 1;
        Ok(Some(payload))
    }

    /// Queues `cmd` for `tick` and returns the datagram carrying it along
    /// with the configured backups.
    pub fn send_moves(&mut self, tick: Tick, cmd: UserCmd) -> Result<Vec<u8>, NetError> {
        let packet = self.history.push(tick, cmd);
        self.send_payload(&packet.encode())
    }

    /// Decodes a move datagram and returns only the commands that have not
    /// been applied yet, oldest first.
    pub fn receive_moves(&mut self, datagram: &[u8]) -> Result<Vec<(Tick, UserCmd)>, NetError> {
        let Some(payload) = self.receive_payload(datagram)? else {
            return Ok(Vec::new());
        };
        let packet = match MovePacket::decode(&payload) {
            Ok(packet) => packet,
            Err(err) => {
                debug!("dropping move packet: {err}");
                self.stats.record_error(&err);
                return Err(err);
            }
        };

        let mut fresh = Vec::with_capacity(packet.cmds.len());
        for (tick, cmd) in packet.ticked() {
            if self.gate.accept(cmd.world_index) {
                fresh.push((tick, *cmd));
            } else {
                self.stats.stale_commands += 1;
            }
        }
        Ok(fresh)
    }

    /// Feeds the same bytes into both directions' standby codecs. The peer
    /// must do the same at the same point in the stream.
    pub fn extend_histograms(&mut self, data: &[u8]) {
        self.sender.extend_histogram(data);
        self.receiver.extend_histogram(data);
    }

    pub fn rebuild_standby(&mut self) {
        self.sender.rebuild_standby();
        self.receiver.rebuild_standby();
    }

    /// Level change: codecs back to Idle and command state forgotten.
    /// Sequencing and statistics carry on.
    pub fn reset(&mut self) {
        self.sender.reset();
        self.receiver.reset();
        self.history.clear();
        self.gate.reset();
    }
}

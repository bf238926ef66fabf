//! Adaptive dual-codec Huffman compression for packet payloads.
//!
//! Each direction of a connection has a [`HuffmanSender`] on one peer and a
//! [`HuffmanReceiver`] on the other. Both keep two codec slots, A and B.
//! Outgoing packets are tagged with the slot that encoded them, and new
//! trees are only swapped in after the peer has provably seen the plaintext
//! they were trained on, so packets in flight stay decodable.

mod ack;
mod bitio;
mod codec;
mod envelope;
mod histogram;
mod receiver;
mod sender;
mod tree;

pub use ack::SendTracker;
pub use codec::{Codec, CodecPhase};
pub use envelope::{CodecId, ENVELOPE_HEADER_LEN, Envelope, EnvelopeTag, MAX_PAYLOAD_LEN};
pub use histogram::Histogram;
pub use receiver::{Decompressed, HuffmanReceiver};
pub use sender::{Compressed, HuffmanSender};
pub use tree::{CodeTree, MAX_CODE_LEN};

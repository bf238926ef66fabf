use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::bitio::BitReader;
use super::histogram::Histogram;

pub const MAX_CODE_LEN: u8 = 24;
const SYMBOLS: usize = 256;

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf(u8),
    Branch { zero: u16, one: u16 },
}

#[derive(Debug, Clone, Copy, Default)]
struct Code {
    bits: u32,
    len: u8,
}

/// Huffman tree over all 256 byte values. Nodes live in one arena and refer
/// to each other by index. Not `Clone`; trees are only built from a
/// histogram.
#[derive(Debug)]
pub struct CodeTree {
    nodes: Vec<Node>,
    root: u16,
    codes: [Code; SYMBOLS],
}

impl CodeTree {
    /// Every symbol gets a code, seen or not. Ties break on node index so
    /// both peers build identical trees from identical histograms.
    pub fn build(histogram: &Histogram) -> Self {
        let mut weights: [u64; SYMBOLS] =
            std::array::from_fn(|symbol| histogram.counts()[symbol].saturating_add(1));

        loop {
            let tree = Self::from_weights(&weights);
            if tree.max_code_len() <= MAX_CODE_LEN {
                return tree;
            }
            for weight in &mut weights {
                *weight = (*weight >> 1).max(1);
            }
        }
    }

    fn from_weights(weights: &[u64; SYMBOLS]) -> Self {
        let mut nodes = Vec::with_capacity(2 * SYMBOLS - 1);
        let mut heap = BinaryHeap::with_capacity(SYMBOLS);

        for (symbol, &weight) in weights.iter().enumerate() {
            nodes.push(Node::Leaf(symbol as u8));
            heap.push(Reverse((weight, symbol as u16)));
        }

        while heap.len() > 1 {
            let (Some(Reverse((w0, zero))), Some(Reverse((w1, one)))) = (heap.pop(), heap.pop())
            else {
                break;
            };
            let index = nodes.len() as u16;
            nodes.push(Node::Branch { zero, one });
            heap.push(Reverse((w0.saturating_add(w1), index)));
        }

        let root = (nodes.len() - 1) as u16;
        let mut codes = [Code::default(); SYMBOLS];
        let mut stack = vec![(root, 0u32, 0u8)];
        while let Some((index, bits, len)) = stack.pop() {
            match nodes[index as usize] {
                Node::Leaf(symbol) => codes[symbol as usize] = Code { bits, len },
                Node::Branch { zero, one } => {
                    stack.push((zero, bits << 1, len + 1));
                    stack.push((one, (bits << 1) | 1, len + 1));
                }
            }
        }

        Self { nodes, root, codes }
    }

    pub fn code(&self, symbol: u8) -> (u32, u8) {
        let code = self.codes[symbol as usize];
        (code.bits, code.len)
    }

    pub fn code_len(&self, symbol: u8) -> u8 {
        self.codes[symbol as usize].len
    }

    pub fn max_code_len(&self) -> u8 {
        self.codes.iter().map(|code| code.len).max().unwrap_or(0)
    }

    /// Walks from the root until a leaf; `None` if the bits run out first.
    pub fn decode_symbol(&self, reader: &mut BitReader<'_>) -> Option<u8> {
        let mut index = self.root;
        loop {
            match self.nodes[index as usize] {
                Node::Leaf(symbol) => return Some(symbol),
                Node::Branch { zero, one } => {
                    index = if reader.read_bit()? { one } else { zero };
                }
            }
        }
    }
}

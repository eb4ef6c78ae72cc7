use std::fs;
use std::path::Path;

use wire::{Block, BlockHeader, Hash256, Transaction, TxInput, TxOutput};

use crate::SegmentName;

/// The record at `height`: a coinbase plus one spend, both tagged with the
/// height so every block and transaction hash is distinct.
pub fn block_at(height: u64) -> Block {
    let tag = height.to_le_bytes().to_vec();
    let coinbase = Transaction::new(
        1,
        vec![TxInput::new(Hash256::ZERO, u32::MAX, tag.clone(), u32::MAX)],
        vec![TxOutput::new(50_0000_0000, vec![0x51])],
        0,
    );
    let spend = Transaction::new(
        1,
        vec![TxInput::new(coinbase.hash(), 0, vec![0xAB; 8], u32::MAX)],
        vec![TxOutput::new(height, tag)],
        height as u32,
    );
    let header = BlockHeader {
        version: 1,
        prev_hash: Hash256::from_wire([(height % 251) as u8; 32]),
        merkle_root: coinbase.hash(),
        timestamp: 1_231_006_505 + height as u32,
        bits: 0x1d00_ffff,
        nonce: height as u32,
    };
    Block::new(header, vec![coinbase, spend])
}

/// Writes heights `floor..=last` into `dir` under `name`.
pub fn write_segment(dir: &Path, name: SegmentName, floor: u64, last: u64) {
    let mut bytes = Vec::new();
    for h in floor..=last {
        bytes.extend_from_slice(&block_at(h).to_bytes());
    }
    fs::write(dir.join(name.file_name()), bytes).unwrap();
}

/// Lays out `total` records in segments of `size`, the last one marked
/// latest, the way the chunker would.
pub fn write_dataset(dir: &Path, total: u64, size: u64) {
    let mut floor = 1;
    while floor <= total {
        let ceiling = floor + size - 1;
        let last = ceiling.min(total);
        let name = if last == total {
            SegmentName::latest(floor, ceiling, last)
        } else {
            SegmentName::sealed(floor, ceiling)
        };
        write_segment(dir, name, floor, last);
        floor = ceiling + 1;
    }
}

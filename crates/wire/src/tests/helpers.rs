use hex_literal::hex;

use crate::*;

/// The 285-byte genesis block frame (magic + length + payload).
pub const GENESIS_FRAME: [u8; 293] = hex!(
    "f9beb4d9" "1d010000"
    "01000000"
    "0000000000000000000000000000000000000000000000000000000000000000"
    "3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a"
    "29ab5f49" "ffff001d" "1dac2b7c"
    "01"
    "01000000" "01"
    "0000000000000000000000000000000000000000000000000000000000000000" "ffffffff"
    "4d"
    "04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72"
    "206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73"
    "ffffffff"
    "01" "00f2052a01000000"
    "43"
    "4104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef"
    "38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac"
    "00000000"
);

pub const GENESIS_HASH: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
pub const GENESIS_TX_HASH: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

/// A small synthetic block whose content depends on `seed`.
pub fn sample_block(seed: u32) -> Block {
    let coinbase = Transaction::new(
        1,
        vec![TxInput::new(Hash256::ZERO, u32::MAX, seed.to_le_bytes().to_vec(), u32::MAX)],
        vec![TxOutput::new(50 * 100_000_000, vec![0x51; 25])],
        0,
    );
    let spend = Transaction::new(
        2,
        vec![
            TxInput::new(coinbase.hash(), 0, vec![0xAB; 72], 0xFFFF_FFFE),
            TxInput::new(Hash256::from_wire([seed as u8; 32]), 3, Vec::new(), 0),
        ],
        vec![
            TxOutput::new(1_000, vec![0x76, 0xA9, 0x14]),
            TxOutput::new(seed as u64, Vec::new()),
        ],
        seed,
    );
    let header = BlockHeader {
        version: 2,
        prev_hash: Hash256::from_wire([seed.wrapping_sub(1) as u8; 32]),
        merkle_root: coinbase.hash(),
        timestamp: 1_300_000_000 + seed,
        bits: 0x1d00_ffff,
        nonce: seed.wrapping_mul(7919),
    };
    Block::new(header, vec![coinbase, spend])
}

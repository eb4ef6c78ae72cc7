use super::*;
use std::io::Cursor;
use wire::{decode_block, Block, BlockHeader, Hash256, Transaction, TxInput, TxOutput};

// -------------------- Helpers --------------------

fn block(seed: u8) -> Vec<u8> {
    let tx = Transaction::new(
        1,
        vec![TxInput::new(Hash256::ZERO, u32::MAX, vec![seed; 4], u32::MAX)],
        vec![TxOutput::new(seed as u64 * 10, vec![0x51])],
        0,
    );
    let header = BlockHeader {
        version: 1,
        prev_hash: Hash256::from_wire([seed; 32]),
        merkle_root: tx.hash(),
        timestamp: 1_231_006_505 + seed as u32,
        bits: 0x1d00_ffff,
        nonce: seed as u32,
    };
    Block::new(header, vec![tx]).to_bytes()
}

fn scanner(data: Vec<u8>) -> RecordScanner<Cursor<Vec<u8>>> {
    RecordScanner::new(Cursor::new(data))
}

// -------------------- Tolerant scan --------------------

#[test]
fn finds_magic_at_start() {
    let mut s = scanner(block(1));
    assert_eq!(s.next_record_start().unwrap(), 0);
    assert_eq!(s.offset(), 4);
}

#[test]
fn resync_lands_on_the_record_after_garbage() {
    let record = block(2);
    for n in [1usize, 3, 4, 5, 17, 1000] {
        let mut data: Vec<u8> = (0..n).map(|i| (i * 31 % 251) as u8).collect();
        data.extend_from_slice(&record);

        let mut s = scanner(data);
        let frame = s.next_frame().unwrap();
        assert_eq!(frame.skipped, n as u64, "garbage of {} bytes", n);
        assert_eq!(frame.offset, n as u64);
        assert_eq!(frame.bytes, record);
    }
}

#[test]
fn partial_magic_in_garbage_does_not_confuse_the_window() {
    // F9 BE F9 BE B4 D9: the real magic overlaps a false start.
    let mut data = vec![0xF9, 0xBE];
    data.extend_from_slice(&block(3));
    let mut s = scanner(data);
    assert_eq!(s.next_record_start().unwrap(), 2);
}

#[test]
fn garbage_only_ends_the_scan() {
    let mut s = scanner(vec![0xF9, 0xBE, 0xB4, 0x00, 0x12, 0x34]);
    assert!(matches!(s.next_record_start(), Err(ScanError::EndOfInput)));
    assert_eq!(s.offset(), 6);
}

#[test]
fn empty_input_is_end_of_input() {
    let mut s = scanner(Vec::new());
    assert!(matches!(s.next_frame(), Err(ScanError::EndOfInput)));
}

#[test]
fn frames_decode_after_scanning() {
    let mut data = block(4);
    data.extend_from_slice(&[0xDE, 0xAD]);
    data.extend_from_slice(&block(5));

    let mut s = scanner(data);
    let first = s.next_frame().unwrap();
    let second = s.next_frame().unwrap();
    assert_eq!(second.skipped, 2);
    assert!(matches!(s.next_frame(), Err(ScanError::EndOfInput)));

    let (b1, _) = decode_block(&first.bytes).unwrap();
    let (b2, _) = decode_block(&second.bytes).unwrap();
    assert_eq!(b1.header.nonce, 4);
    assert_eq!(b2.header.nonce, 5);
    assert_eq!(first.payload_len() as usize, first.payload().len());
}

#[test]
fn truncated_tail_record_is_reported() {
    let mut data = block(6);
    let full = data.len();
    data.extend_from_slice(&block(7)[..20]);

    let mut s = scanner(data);
    s.next_frame().unwrap();
    match s.next_frame() {
        Err(ScanError::TruncatedInput { offset, .. }) => assert_eq!(offset, full as u64),
        other => panic!("expected TruncatedInput, got {:?}", other),
    }
}

#[test]
fn torn_length_prefix_still_advances_the_offset() {
    let mut data = MAGIC.to_vec();
    data.extend_from_slice(&[0x10, 0x00]);
    let mut s = scanner(data);
    s.next_record_start().unwrap();
    assert!(matches!(
        s.read_payload_len(),
        Err(ScanError::TruncatedInput { offset: 0, needed: 2 })
    ));
    assert_eq!(s.offset(), 6);
}

#[test]
fn oversized_length_prefix_is_rejected() {
    let mut data = MAGIC.to_vec();
    data.extend_from_slice(&u32::MAX.to_le_bytes());
    let mut s = scanner(data).with_max_record_bytes(1024);
    assert!(matches!(
        s.next_frame(),
        Err(ScanError::RecordTooLarge { len: u32::MAX, max: 1024, .. })
    ));
}

#[test]
fn custom_magic() {
    let magic = *b"BLK0";
    let mut data = vec![0u8; 3];
    data.extend_from_slice(&magic);
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&[7, 8]);

    let mut s = scanner(data).with_magic(magic);
    let frame = s.next_frame().unwrap();
    assert_eq!(frame.skipped, 3);
    assert_eq!(frame.payload(), &[7, 8]);
}

// -------------------- Strict scan --------------------

#[test]
fn strict_scan_rejects_misaligned_bytes() {
    let mut data = vec![0x00];
    data.extend_from_slice(&block(8));
    let mut s = scanner(data);
    match s.next_frame_strict() {
        Err(ScanError::CorruptSegment { offset, found }) => {
            assert_eq!(offset, 0);
            assert_eq!(found, vec![0x00, 0xF9, 0xBE, 0xB4]);
        }
        other => panic!("expected CorruptSegment, got {:?}", other),
    }
}

#[test]
fn strict_scan_ends_cleanly_on_a_boundary() {
    let mut s = scanner(block(9));
    s.next_frame_strict().unwrap();
    assert!(matches!(s.next_frame_strict(), Err(ScanError::EndOfInput)));
}

#[test]
fn strict_scan_reports_torn_magic() {
    let mut data = block(10);
    data.extend_from_slice(&MAGIC[..2]);
    let mut s = scanner(data);
    s.next_frame_strict().unwrap();
    assert!(matches!(
        s.next_frame_strict(),
        Err(ScanError::TruncatedInput { needed: 2, .. })
    ));
}

#[test]
fn skip_counts_frames_without_decoding() {
    let mut data = Vec::new();
    let mut offsets = Vec::new();
    for seed in 0..5 {
        offsets.push(data.len() as u64);
        data.extend_from_slice(&block(seed));
    }
    let total = data.len() as u64;

    let mut s = scanner(data);
    let mut seen = Vec::new();
    loop {
        match s.skip_frame_strict() {
            Ok(off) => seen.push(off),
            Err(ScanError::EndOfInput) => break,
            Err(e) => panic!("{}", e),
        }
    }
    assert_eq!(seen, offsets);
    assert_eq!(s.offset(), total);
}

#[test]
fn skipping_a_torn_payload_is_truncation() {
    let data = block(11);
    let cut = data.len() - 5;
    let mut s = scanner(data[..cut].to_vec());
    assert!(matches!(
        s.skip_frame_strict(),
        Err(ScanError::TruncatedInput { needed: 5, .. })
    ));
}

#[test]
fn rewind_restarts_from_zero() {
    let mut data = block(12);
    data.extend_from_slice(&block(13));
    let mut s = scanner(data);
    let first = s.next_frame_strict().unwrap();
    s.next_frame_strict().unwrap();
    s.rewind().unwrap();
    assert_eq!(s.offset(), 0);
    assert_eq!(s.next_frame_strict().unwrap(), first);
}

#[test]
fn open_reads_from_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dump.dat");
    std::fs::write(&path, block(14))?;
    let mut s = RecordScanner::open(&path)?;
    let frame = s.next_frame()?;
    assert_eq!(frame.bytes, block(14));
    Ok(())
}

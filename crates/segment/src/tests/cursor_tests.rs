use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::Result;
use tempfile::tempdir;

use super::helpers::{block_at, write_dataset, write_segment};
use crate::*;

// -------------------- Navigation --------------------

#[test]
fn next_and_previous_walk_adjacent_segments() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(dir.path(), 300, 100);
    let index = SegmentIndex::open(dir.path())?;

    let first = SegmentCursor::first(&index)?;
    assert_eq!((first.floor(), first.ceiling()), (1, 100));

    let second = first.next()?;
    assert_eq!(second.floor(), 101);
    assert_eq!(second.position(), 101);

    let third = second.next()?;
    assert_eq!((third.floor(), third.ceiling()), (201, 300));
    assert!(matches!(third.next(), Err(SegmentError::NotFound(_))));

    let back = third.previous()?;
    assert_eq!((back.floor(), back.ceiling()), (101, 200));
    assert!(matches!(
        first.previous(),
        Err(SegmentError::NoPrevious { floor: 1 })
    ));
    Ok(())
}

#[test]
fn read_next_walks_one_segment_in_order() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(dir.path(), 25, 10);
    let index = SegmentIndex::open(dir.path())?;

    let mut cursor = SegmentCursor::at_height(&index, 12)?;
    let mut heights = Vec::new();
    while let Some((h, block)) = cursor.read_next()? {
        assert_eq!(block, block_at(h));
        heights.push(h);
    }
    assert_eq!(heights, (11..=20).collect::<Vec<_>>());
    assert!(cursor.read_next()?.is_none());

    cursor.rewind()?;
    assert_eq!(cursor.position(), 11);
    assert_eq!(cursor.offset(), 0);
    assert_eq!(cursor.read_next()?.map(|(h, _)| h), Some(11));
    Ok(())
}

// -------------------- Seek by height --------------------

#[test]
fn seek_matches_linear_scan_for_every_height() -> Result<()> {
    let dir = tempdir()?;
    let total = 47;
    write_dataset(dir.path(), total, 10);
    let index = SegmentIndex::open(dir.path())?;

    let mut linear = Vec::new();
    let mut cursor = SegmentCursor::first(&index)?;
    loop {
        while let Some((_, block)) = cursor.read_next()? {
            linear.push(block);
        }
        match cursor.next() {
            Ok(next) => cursor = next,
            Err(SegmentError::NotFound(_)) => break,
            Err(e) => return Err(e.into()),
        }
    }
    assert_eq!(linear.len() as u64, total);

    let mut seeker = SegmentCursor::first(&index)?;
    for h in 1..=total {
        assert_eq!(seeker.seek_by_height(h)?, linear[(h - 1) as usize], "height {}", h);
    }
    // Backwards, forcing rewinds and segment switches.
    for h in (1..=total).rev() {
        assert_eq!(seeker.seek_by_height(h)?, linear[(h - 1) as usize], "height {}", h);
    }

    assert!(matches!(
        seeker.seek_by_height(total + 1),
        Err(SegmentError::OutOfRange { height: 48, tip: 47 })
    ));
    assert!(matches!(
        seeker.seek_by_height(0),
        Err(SegmentError::OutOfRange { height: 0, .. })
    ));
    Ok(())
}

#[test]
fn seek_leaves_cursor_after_the_record() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(dir.path(), 30, 10);
    let index = SegmentIndex::open(dir.path())?;

    let mut cursor = SegmentCursor::first(&index)?;
    cursor.seek_by_height(25)?;
    assert_eq!(cursor.floor(), 21);
    assert_eq!(cursor.position(), 26);
    assert_eq!(cursor.read_next()?.map(|(h, _)| h), Some(26));
    Ok(())
}

#[test]
fn seek_into_a_short_segment_reports_out_of_range() -> Result<()> {
    let dir = tempdir()?;
    // Name claims 11..=20 but only 11..=13 were written.
    write_segment(dir.path(), SegmentName::sealed(1, 10), 1, 10);
    write_segment(dir.path(), SegmentName::latest(11, 20, 20), 11, 13);
    let index = SegmentIndex::open(dir.path())?;

    let mut cursor = SegmentCursor::first(&index)?;
    assert!(matches!(
        cursor.seek_by_height(17),
        Err(SegmentError::OutOfRange { height: 17, .. })
    ));
    Ok(())
}

// -------------------- Seek by hash --------------------

#[test]
fn seek_by_hash_finds_transaction() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(dir.path(), 20, 10);
    let index = SegmentIndex::open(dir.path())?;

    let wanted = block_at(7);
    let target = wanted.transactions[1].hash();

    let mut cursor = SegmentCursor::first(&index)?;
    let found = cursor.seek_by_hash(&target)?;
    assert_eq!(found.height, 7);
    assert_eq!(found.index, 1);
    assert_eq!(found.block_hash, wanted.hash());
    assert_eq!(found.transaction, wanted.transactions[1]);
    assert_eq!(cursor.position(), 8);
    Ok(())
}

#[test]
fn seek_by_hash_does_not_cross_segments() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(dir.path(), 20, 10);
    let index = SegmentIndex::open(dir.path())?;

    let target = block_at(15).transactions[0].hash();
    let mut cursor = SegmentCursor::first(&index)?;
    assert!(matches!(
        cursor.seek_by_hash(&target),
        Err(SegmentError::NotFound(Lookup::Transaction(h))) if h == target
    ));

    let mut next = cursor.next()?;
    assert_eq!(next.seek_by_hash(&target)?.height, 15);
    Ok(())
}

#[test]
fn seek_by_hash_starts_at_current_position() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(dir.path(), 10, 10);
    let index = SegmentIndex::open(dir.path())?;

    let target = block_at(3).transactions[0].hash();
    let mut cursor = SegmentCursor::first(&index)?;
    cursor.seek_by_height(5)?;
    assert!(cursor.seek_by_hash(&target).is_err());

    cursor.rewind()?;
    assert_eq!(cursor.seek_by_hash(&target)?.height, 3);
    Ok(())
}

#[test]
fn seek_by_block_hash() -> Result<()> {
    let dir = tempdir()?;
    write_dataset(dir.path(), 10, 10);
    let index = SegmentIndex::open(dir.path())?;

    let target = block_at(9).hash();
    let mut cursor = SegmentCursor::first(&index)?;
    let (height, block) = cursor.seek_by_block_hash(&target)?;
    assert_eq!(height, 9);
    assert_eq!(block.hash(), target);

    assert!(matches!(
        cursor.seek_by_block_hash(&target),
        Err(SegmentError::NotFound(Lookup::Block(_)))
    ));
    Ok(())
}

// -------------------- Corruption --------------------

#[test]
fn misaligned_segment_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let name = SegmentName::latest(1, 5, 5);
    write_segment(dir.path(), name, 1, 5);

    // Prepend one stray byte: the first boundary no longer carries the magic.
    let path = dir.path().join(name.file_name());
    let mut bytes = vec![0x00];
    bytes.extend(fs::read(&path)?);
    fs::write(&path, bytes)?;

    let index = SegmentIndex::open(dir.path())?;
    let mut cursor = SegmentCursor::first(&index)?;
    assert!(matches!(
        cursor.read_next(),
        Err(SegmentError::CorruptSegment { offset: 0, .. })
    ));
    let mut cursor = SegmentCursor::first(&index)?;
    assert!(matches!(
        cursor.seek_by_height(3),
        Err(SegmentError::CorruptSegment { .. })
    ));
    Ok(())
}

#[test]
fn extra_record_past_ceiling_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let name = SegmentName::sealed(1, 3);
    write_segment(dir.path(), name, 1, 3);
    let mut f = OpenOptions::new()
        .append(true)
        .open(dir.path().join(name.file_name()))?;
    f.write_all(&block_at(4).to_bytes())?;
    drop(f);

    let index = SegmentIndex::open(dir.path())?;
    let mut cursor = SegmentCursor::first(&index)?;
    for _ in 0..3 {
        assert!(cursor.read_next()?.is_some());
    }
    assert!(matches!(
        cursor.read_next(),
        Err(SegmentError::CorruptSegment { .. })
    ));
    Ok(())
}

#[test]
fn missing_records_are_corrupt() -> Result<()> {
    let dir = tempdir()?;
    write_segment(dir.path(), SegmentName::sealed(1, 5), 1, 2);
    let index = SegmentIndex::open(dir.path())?;

    let mut cursor = SegmentCursor::first(&index)?;
    cursor.read_next()?;
    cursor.read_next()?;
    assert!(matches!(
        cursor.read_next(),
        Err(SegmentError::CorruptSegment { .. })
    ));
    Ok(())
}

#[test]
fn malformed_payload_reports_decode_error_with_height() -> Result<()> {
    let dir = tempdir()?;
    let name = SegmentName::latest(1, 2, 2);
    let mut bytes = block_at(1).to_bytes();
    // Frame of 4 payload bytes: well framed, far too short for a header.
    bytes.extend_from_slice(&wire::MAGIC);
    bytes.extend_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(&[1, 2, 3, 4]);
    fs::write(dir.path().join(name.file_name()), bytes)?;

    let index = SegmentIndex::open(dir.path())?;
    let mut cursor = SegmentCursor::first(&index)?;
    cursor.read_next()?;
    match cursor.read_next() {
        Err(SegmentError::Decode { height, source, .. }) => {
            assert_eq!(height, 2);
            assert!(matches!(source, wire::DecodeError::TruncatedInput { .. }));
        }
        other => panic!("expected Decode error, got {:?}", other.map(|o| o.map(|(h, _)| h))),
    }
    Ok(())
}

#[test]
fn decode_error_keeps_heights_aligned() -> Result<()> {
    let dir = tempdir()?;
    let name = SegmentName::latest(1, 6, 6);
    let mut bytes = Vec::new();
    for h in 1..=6 {
        if h == 3 {
            bytes.extend_from_slice(&wire::MAGIC);
            bytes.extend_from_slice(&4u32.to_le_bytes());
            bytes.extend_from_slice(&[9, 9, 9, 9]);
        } else {
            bytes.extend(block_at(h).to_bytes());
        }
    }
    fs::write(dir.path().join(name.file_name()), bytes)?;

    let index = SegmentIndex::open(dir.path())?;
    let mut cursor = SegmentCursor::first(&index)?;
    assert!(matches!(
        cursor.seek_by_height(3),
        Err(SegmentError::Decode { height: 3, .. })
    ));
    assert_eq!(cursor.position(), 4);
    assert_eq!(cursor.seek_by_height(4)?, block_at(4));

    cursor.rewind()?;
    cursor.read_next()?;
    cursor.read_next()?;
    assert!(matches!(
        cursor.read_next(),
        Err(SegmentError::Decode { height: 3, .. })
    ));
    let (height, block) = cursor.read_next()?.expect("record 4");
    assert_eq!((height, block), (4, block_at(4)));

    let target = block_at(6).transactions[1].hash();
    assert_eq!(cursor.seek_by_hash(&target)?.height, 6);
    Ok(())
}

#[test]
fn custom_magic_is_honored() -> Result<()> {
    let dir = tempdir()?;
    let magic = *b"TEST";
    let name = SegmentName::latest(1, 2, 2);
    let mut bytes = Vec::new();
    for h in 1..=2 {
        let b = block_at(h);
        bytes.extend(wire::Block::with_magic(magic, b.header, b.transactions).to_bytes());
    }
    fs::write(dir.path().join(name.file_name()), bytes)?;

    let index = SegmentIndex::open(dir.path())?.with_magic(magic);
    let mut cursor = SegmentCursor::first(&index)?;
    let block = cursor.seek_by_height(2)?;
    assert_eq!(block.magic, magic);
    assert_eq!(block.hash(), block_at(2).hash());
    Ok(())
}

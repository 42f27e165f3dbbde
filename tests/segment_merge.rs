//! Segment write / read / merge through directory-backed file pairs

use std::sync::Arc;

use tempfile::TempDir;

use fpindex::segment::{StoreSegmentCursor, VecSource};
use fpindex::{
    BlockIndexWriter, Directory, FpIndexError, FsDirectory, Posting, RamDirectory,
    SegmentConfig, SegmentCursor, SegmentDataReader, SegmentDataWriter, SegmentId, SegmentIndex,
    SegmentMerger, SegmentStore,
};

const SEGMENT_A: &[(u32, u32)] = &[(200, 300), (201, 301), (201, 302), (202, 303)];
const SEGMENT_B: &[(u32, u32)] = &[(199, 500), (201, 300), (201, 304), (202, 303), (500, 501)];
const MERGED: &[(u32, u32)] = &[
    (199, 500),
    (200, 300),
    (201, 300),
    (201, 301),
    (201, 302),
    (201, 304),
    (202, 303),
    (500, 501),
];

fn write_segment(dir: &dyn Directory, id: SegmentId, block_size: u32, postings: &[(u32, u32)]) {
    let index_output = dir.create_file(&id.index_file_name()).unwrap();
    let data_output = dir.create_file(&id.data_file_name()).unwrap();
    let mut writer =
        SegmentDataWriter::new(data_output, BlockIndexWriter::new(index_output), block_size)
            .unwrap();
    for &(key, value) in postings {
        writer.add_item(key, value).unwrap();
    }
    writer.close().unwrap();
}

fn open_segment(dir: &dyn Directory, id: SegmentId) -> StoreSegmentCursor {
    let index_input = dir.open_file(&id.index_file_name()).unwrap();
    let index = Arc::new(SegmentIndex::load(index_input).unwrap());
    let data_input = dir.open_file(&id.data_file_name()).unwrap();
    let reader = SegmentDataReader::new(data_input, index.block_size());
    SegmentCursor::new(index, reader).unwrap()
}

fn read_segment(dir: &dyn Directory, id: SegmentId) -> Vec<(u32, u32)> {
    let mut cursor = open_segment(dir, id);
    let mut out = Vec::new();
    while cursor.next().unwrap() {
        out.push((cursor.key(), cursor.value()));
    }
    out
}

fn merge_segments(dir: &dyn Directory, sources: &[SegmentId], into: SegmentId, block_size: u32) {
    let index_output = dir.create_file(&into.index_file_name()).unwrap();
    let data_output = dir.create_file(&into.data_file_name()).unwrap();
    let mut writer =
        SegmentDataWriter::new(data_output, BlockIndexWriter::new(index_output), block_size)
            .unwrap();
    {
        let mut merger = SegmentMerger::new(&mut writer);
        for &id in sources {
            merger.add_source(open_segment(dir, id));
        }
        merger.merge().unwrap();
    }
    writer.close().unwrap();
}

#[test]
fn merge_worked_example() {
    let dir = RamDirectory::new();
    write_segment(&dir, SegmentId::new(0), 8, SEGMENT_A);
    write_segment(&dir, SegmentId::new(1), 8, SEGMENT_B);

    merge_segments(&dir, &[SegmentId::new(0), SegmentId::new(1)], SegmentId::new(2), 8);
    assert_eq!(read_segment(&dir, SegmentId::new(2)), MERGED);

    // Source order does not matter
    merge_segments(&dir, &[SegmentId::new(1), SegmentId::new(0)], SegmentId::new(3), 8);
    assert_eq!(read_segment(&dir, SegmentId::new(3)), MERGED);
}

#[test]
fn merge_worked_example_on_disk_with_mixed_block_sizes() {
    let tmp = TempDir::new().unwrap();
    let dir = FsDirectory::new(tmp.path()).unwrap();
    write_segment(&dir, SegmentId::new(0), 1, SEGMENT_A);
    write_segment(&dir, SegmentId::new(1), 3, SEGMENT_B);

    for (into, block_size) in [(2, 1), (3, 2), (4, 4), (5, 100)] {
        merge_segments(
            &dir,
            &[SegmentId::new(0), SegmentId::new(1)],
            SegmentId::new(into),
            block_size,
        );
        assert_eq!(read_segment(&dir, SegmentId::new(into)), MERGED);
    }
}

#[test]
fn merge_with_itself_is_identity() {
    let dir = RamDirectory::new();
    write_segment(&dir, SegmentId::new(0), 2, SEGMENT_B);

    merge_segments(&dir, &[SegmentId::new(0), SegmentId::new(0)], SegmentId::new(1), 2);
    assert_eq!(read_segment(&dir, SegmentId::new(1)), SEGMENT_B);
    assert_eq!(
        dir.read_file("segment_0.fid").unwrap(),
        dir.read_file("segment_1.fid").unwrap()
    );
    assert_eq!(
        dir.read_file("segment_0.fii").unwrap(),
        dir.read_file("segment_1.fii").unwrap()
    );
}

#[test]
fn merge_zero_sources_yields_empty_segment() {
    let dir = RamDirectory::new();
    merge_segments(&dir, &[], SegmentId::new(0), 4);

    let mut cursor = open_segment(&dir, SegmentId::new(0));
    assert!(cursor.index().is_empty());
    assert!(!cursor.next().unwrap());
}

#[test]
fn merge_segment_with_in_memory_batch() {
    let dir = RamDirectory::new();
    write_segment(&dir, SegmentId::new(0), 4, SEGMENT_A);

    let index_output = dir.create_file("segment_1.fii").unwrap();
    let data_output = dir.create_file("segment_1.fid").unwrap();
    let mut writer =
        SegmentDataWriter::new(data_output, BlockIndexWriter::new(index_output), 4).unwrap();
    let stats = {
        let mut merger = SegmentMerger::new(&mut writer);
        merger.add_source(open_segment(&dir, SegmentId::new(0)));
        merger.add_source(VecSource::new(
            SEGMENT_B.iter().copied().map(Posting::from).collect(),
        ));
        merger.merge().unwrap()
    };
    writer.close().unwrap();

    assert_eq!(stats.postings_written, MERGED.len() as u64);
    assert_eq!(read_segment(&dir, SegmentId::new(1)), MERGED);
}

#[test]
fn unclosed_writer_is_finalized_on_drop() {
    let dir = RamDirectory::new();
    {
        let index_output = dir.create_file("segment_0.fii").unwrap();
        let data_output = dir.create_file("segment_0.fid").unwrap();
        let mut writer =
            SegmentDataWriter::new(data_output, BlockIndexWriter::new(index_output), 8).unwrap();
        for &(key, value) in SEGMENT_B {
            writer.add_item(key, value).unwrap();
        }
    }
    assert_eq!(read_segment(&dir, SegmentId::new(0)), SEGMENT_B);
}

#[test]
fn store_compaction_round_trip() {
    let tmp = TempDir::new().unwrap();
    let dir = Arc::new(FsDirectory::new(tmp.path()).unwrap());
    let store = SegmentStore::new(dir, SegmentConfig::default().with_block_size(2)).unwrap();

    let to_postings = |pairs: &[(u32, u32)]| -> Vec<Posting> {
        pairs.iter().copied().map(Posting::from).collect()
    };
    store
        .write_segment(SegmentId::new(0), to_postings(SEGMENT_A))
        .unwrap();
    store
        .write_segment(SegmentId::new(1), to_postings(SEGMENT_B))
        .unwrap();

    let stats = store
        .compact(&[SegmentId::new(0), SegmentId::new(1)], SegmentId::new(2))
        .unwrap();
    assert_eq!(stats.sources, 2);
    assert_eq!(stats.duplicates_dropped, 1);

    let merged: Vec<Posting> = store
        .open_segment(SegmentId::new(2))
        .unwrap()
        .postings()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(merged, to_postings(MERGED));

    let info = store.segment_info(SegmentId::new(2)).unwrap();
    assert_eq!(info.blocks, 4);
}

#[test]
fn seek_lands_on_first_posting_of_each_key() {
    let dir = RamDirectory::new();
    let postings: Vec<(u32, u32)> = (0..500u32).map(|i| (i / 5 * 7, i)).collect();
    write_segment(&dir, SegmentId::new(0), 4, &postings);

    let mut cursor = open_segment(&dir, SegmentId::new(0));
    for &(key, value) in postings.iter().step_by(5) {
        assert!(cursor.seek(key).unwrap());
        assert!(cursor.next().unwrap());
        assert_eq!((cursor.key(), cursor.value()), (key, value));

        // Absent key: next present key is the target
        if key > 0 {
            assert!(cursor.seek(key - 1).unwrap());
            assert!(cursor.next().unwrap());
            assert_eq!((cursor.key(), cursor.value()), (key, value));
        }
    }
}

#[test]
fn decreasing_key_fails_with_invalid_sequence() {
    let dir = RamDirectory::new();
    let index_output = dir.create_file("segment_0.fii").unwrap();
    let data_output = dir.create_file("segment_0.fid").unwrap();
    let mut writer =
        SegmentDataWriter::new(data_output, BlockIndexWriter::new(index_output), 4).unwrap();
    writer.add_item(10, 1).unwrap();
    assert!(matches!(
        writer.add_item(9, 1),
        Err(FpIndexError::InvalidSequence(_))
    ));
    writer.discard();
}

#[test]
fn corrupted_files_fail_with_corruption() {
    let dir = RamDirectory::new();
    write_segment(&dir, SegmentId::new(0), 2, SEGMENT_B);

    // Truncated index
    let index = dir.read_file("segment_0.fii").unwrap();
    dir.write_file("segment_1.fii", index[..index.len() - 1].to_vec());
    let err = SegmentIndex::load(dir.open_file("segment_1.fii").unwrap()).unwrap_err();
    assert!(err.is_corruption());

    // Truncated data: drop the final block
    let data = dir.read_file("segment_0.fid").unwrap();
    let full = SegmentIndex::decode(&index).unwrap();
    let last_block = full.entries().last().unwrap().block_offset as usize;
    dir.write_file("segment_2.fii", index.clone());
    dir.write_file("segment_2.fid", data[..last_block].to_vec());

    let mut cursor = open_segment(&dir, SegmentId::new(2));
    let result = loop {
        match cursor.next() {
            Ok(true) => continue,
            other => break other,
        }
    };
    assert!(result.unwrap_err().is_corruption());
}

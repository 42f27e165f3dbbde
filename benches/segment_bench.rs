use std::io::Cursor;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fpindex::{
    BlockIndexWriter, Posting, SegmentCursor, SegmentDataReader, SegmentDataWriter, SegmentIndex,
    SegmentMerger,
};

struct BenchSegment {
    data: Vec<u8>,
    index: Arc<SegmentIndex>,
}

impl BenchSegment {
    fn cursor(&self) -> SegmentCursor<Cursor<&[u8]>> {
        let reader =
            SegmentDataReader::new(Cursor::new(self.data.as_slice()), self.index.block_size());
        SegmentCursor::new(self.index.clone(), reader).unwrap()
    }
}

/// Postings shaped like fingerprint sub-hashes: a few track ids per hash
fn make_postings(count: usize, seed: u32) -> Vec<Posting> {
    let mut postings: Vec<Posting> = (0..count as u32)
        .map(|i| {
            let hash = i.wrapping_mul(2_654_435_761).wrapping_add(seed) >> 8;
            Posting::new(hash, i % 5_000 + seed)
        })
        .collect();
    postings.sort();
    postings
}

fn write(postings: &[Posting], block_size: u32) -> BenchSegment {
    let mut data = Vec::new();
    let mut index = Vec::new();
    {
        let mut writer =
            SegmentDataWriter::new(&mut data, BlockIndexWriter::new(&mut index), block_size)
                .unwrap();
        for p in postings {
            writer.add_item(p.key, p.value).unwrap();
        }
        writer.close().unwrap();
    }
    BenchSegment {
        data,
        index: Arc::new(SegmentIndex::decode(&index).unwrap()),
    }
}

fn bench_write(c: &mut Criterion) {
    let postings = make_postings(100_000, 0);

    let mut group = c.benchmark_group("segment_write");
    for block_size in [32u32, 128, 512] {
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &block_size| {
                b.iter(|| black_box(write(&postings, block_size)));
            },
        );
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let postings = make_postings(100_000, 0);

    let mut group = c.benchmark_group("segment_scan");
    for block_size in [32u32, 128, 512] {
        let segment = write(&postings, block_size);
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &segment,
            |b, segment| {
                b.iter(|| {
                    let mut cursor = segment.cursor();
                    let mut sum = 0u64;
                    while cursor.next().unwrap() {
                        sum += cursor.value() as u64;
                    }
                    black_box(sum)
                });
            },
        );
    }
    group.finish();
}

fn bench_seek(c: &mut Criterion) {
    let postings = make_postings(100_000, 0);
    let targets: Vec<u32> = postings.iter().step_by(997).map(|p| p.key).collect();

    let mut group = c.benchmark_group("segment_seek");
    for block_size in [32u32, 128, 512] {
        let segment = write(&postings, block_size);
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &segment,
            |b, segment| {
                b.iter(|| {
                    let mut cursor = segment.cursor();
                    for &key in &targets {
                        black_box(cursor.seek(key).unwrap());
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_merge");
    for sources in [2u32, 4, 8] {
        let segments: Vec<BenchSegment> = (0..sources)
            .map(|seed| write(&make_postings(25_000, seed), 128))
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(sources),
            &segments,
            |b, segments| {
                b.iter(|| {
                    let mut data = Vec::new();
                    let mut index = Vec::new();
                    let mut writer =
                        SegmentDataWriter::new(&mut data, BlockIndexWriter::new(&mut index), 128)
                            .unwrap();
                    let mut merger = SegmentMerger::new(&mut writer);
                    for segment in segments {
                        merger.add_source(segment.cursor());
                    }
                    let stats = merger.merge().unwrap();
                    writer.close().unwrap();
                    black_box(stats)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_scan, bench_seek, bench_merge);
criterion_main!(benches);

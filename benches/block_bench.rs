// Block engine benchmarks: writing, seeking and scanning one block

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use reftable::{Block, BlockReader, BlockType, BlockWriter, Record, RecordIterator, RefRecord};
use std::hint::black_box;
use std::sync::Arc;

const BLOCK_SIZE: usize = 64 * 1024;

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("refs/heads/feature/{:06}", i)).collect()
}

fn build_block(names: &[String], interval: usize) -> Arc<BlockReader> {
    let mut bw = BlockWriter::new(BlockType::Ref, BLOCK_SIZE, 0, 20).unwrap();
    bw.set_restart_interval(interval).unwrap();
    for name in names {
        let rec: Record = RefRecord::new(name.as_str(), 1, vec![0xab; 20]).into();
        bw.add(&rec).unwrap();
    }
    bw.finish().unwrap();
    Arc::new(BlockReader::new(Block::from_owned(bw.data().to_vec()), 0, 0, 20).unwrap())
}

fn benchmark_block_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_write");
    let names = names(1000);
    let records: Vec<Record> = names
        .iter()
        .map(|n| RefRecord::new(n.as_str(), 1, vec![0xab; 20]).into())
        .collect();

    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("ref_block_1000", |b| {
        let mut bw = BlockWriter::new(BlockType::Ref, BLOCK_SIZE, 0, 20).unwrap();
        b.iter(|| {
            bw.reset();
            for rec in &records {
                bw.add(rec).unwrap();
            }
            black_box(bw.finish().unwrap());
        });
    });

    group.finish();
}

fn benchmark_block_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_seek");
    let names = names(1000);

    for interval in [1usize, 4, 16, 64].iter() {
        let reader = build_block(&names, *interval);
        group.bench_with_input(BenchmarkId::from_parameter(interval), interval, |b, _| {
            let mut rng = rand::rng();
            b.iter(|| {
                let want = &names[rng.random_range(0..names.len())];
                let mut it = reader.seek(want.as_bytes()).unwrap();
                black_box(it.next_record().unwrap());
            });
        });
    }

    group.finish();
}

fn benchmark_block_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_scan");
    let names = names(1000);
    let reader = build_block(&names, 16);

    group.throughput(Throughput::Elements(names.len() as u64));
    group.bench_function("ref_block_1000", |b| {
        b.iter(|| {
            let mut it = reader.start();
            let mut count = 0;
            while let Some(rec) = it.next_record().unwrap() {
                black_box(rec);
                count += 1;
            }
            count
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_block_write,
    benchmark_block_seek,
    benchmark_block_scan
);
criterion_main!(benches);

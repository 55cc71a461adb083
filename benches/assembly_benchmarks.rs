// Assembly Performance Benchmarks
// Criterion benchmarks for k-mer counting, overlap alignment and the repeat pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use te_forge::assembly::{OverlapAligner, SequenceComparator};
use te_forge::utils::KmerCountTable;
use te_forge::{AssemblerConfig, RepeatAssembler};

fn random_sequence(rng: &mut rand::rngs::StdRng, length: usize) -> Vec<u8> {
    use rand::Rng;
    (0..length).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

/// Reads sampled from a few repeated elements plus unique background
fn generate_repeat_reads(count: usize, length: usize, seed: u64) -> Vec<Vec<u8>> {
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    let mut rng = StdRng::seed_from_u64(seed);
    let elements: Vec<Vec<u8>> = (0..3).map(|_| random_sequence(&mut rng, 2000)).collect();

    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                let element = &elements[rng.gen_range(0..elements.len())];
                let start = rng.gen_range(0..element.len() - length);
                element[start..start + length].to_vec()
            } else {
                random_sequence(&mut rng, length)
            }
        })
        .collect()
}

/// Benchmark k-mer counting with different read counts
fn bench_kmer_counting(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmer_counting");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    for read_count in [1000, 5000, 10000].iter() {
        group.throughput(Throughput::Elements(*read_count as u64));
        let reads = generate_repeat_reads(*read_count, 150, 42);

        group.bench_with_input(BenchmarkId::from_parameter(read_count), read_count, |b, _| {
            b.iter(|| {
                let table = KmerCountTable::from_reads(31, black_box(&reads), 4)
                    .expect("Counting failed");
                black_box(table.total())
            });
        });
    }
    group.finish();
}

/// Benchmark the overlap alignment used by the merger
fn bench_overlap_alignment(c: &mut Criterion) {
    use rand::SeedableRng;

    let mut group = c.benchmark_group("overlap_alignment");
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let aligner = OverlapAligner::from_config(&AssemblerConfig::default());

    for window in [100usize, 250, 500].iter() {
        let first = random_sequence(&mut rng, *window);
        let mut second = first[window / 2..].to_vec();
        second.extend(random_sequence(&mut rng, window / 2));

        group.bench_with_input(BenchmarkId::from_parameter(window), window, |b, _| {
            b.iter(|| black_box(aligner.compare(black_box(&first), black_box(&second))));
        });
    }
    group.finish();
}

/// Benchmark the whole pipeline on synthetic repeat-rich reads
fn bench_full_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_assembly");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    let reads = generate_repeat_reads(6000, 150, 1234);
    let config = AssemblerConfig {
        kmer: 31,
        threshold: Some(20),
        min_nb_nodes: 50,
        threads: 4,
        ..AssemblerConfig::default()
    };
    let assembler = RepeatAssembler::new(config);

    group.bench_function("repeat_rich_6000_reads", |b| {
        b.iter(|| {
            let report = assembler
                .assemble_reads(black_box(&reads))
                .expect("Assembly failed");
            black_box(report.repeats.len())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_kmer_counting,
    bench_overlap_alignment,
    bench_full_assembly
);
criterion_main!(benches);

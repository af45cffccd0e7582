//! Page specification and archive benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docrelay_engine::pages::{rotation_selection, split_groups};
use docrelay_protocol::archive;
use tempfile::TempDir;

fn bench_split_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_groups");

    for segments in [1, 10, 100] {
        let spec = (0..segments)
            .map(|i| format!("{}-{}", i * 10 + 1, i * 10 + 10))
            .collect::<Vec<_>>()
            .join(",");

        group.throughput(Throughput::Elements(segments as u64));
        group.bench_with_input(BenchmarkId::from_parameter(segments), &spec, |b, spec| {
            b.iter(|| black_box(split_groups(spec, 1000)));
        });
    }

    group.finish();
}

fn bench_rotation_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotation_selection");

    for pages in [10u32, 1000, 10000] {
        group.bench_with_input(BenchmarkId::new("all", pages), &pages, |b, &pages| {
            b.iter(|| black_box(rotation_selection("all", pages).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("ranges", pages), &pages, |b, &pages| {
            b.iter(|| black_box(rotation_selection("1,3-5,7-", pages).unwrap()));
        });
    }

    group.finish();
}

fn bench_archive_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive");
    group.sample_size(20);

    for files in [2usize, 10, 50] {
        let dir = TempDir::new().unwrap();
        let inputs: Vec<_> = (0..files)
            .map(|i| {
                let path = dir.path().join(format!("doc_{:03}.pdf", i));
                std::fs::write(&path, vec![b'%'; 32 * 1024]).unwrap();
                path
            })
            .collect();

        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(BenchmarkId::new("pack", files), &inputs, |b, inputs| {
            let dest = dir.path().join("bundle.zip");
            b.iter(|| black_box(archive::pack(inputs, &dest).unwrap()));
        });

        let bundle = dir.path().join("fixed.zip");
        archive::pack(&inputs, &bundle).unwrap();
        group.bench_with_input(BenchmarkId::new("extract", files), &bundle, |b, bundle| {
            b.iter(|| {
                let out = TempDir::new().unwrap();
                black_box(archive::extract_pdfs_sorted(bundle, out.path()).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_split_groups,
    bench_rotation_selection,
    bench_archive_round_trip,
);
criterion_main!(benches);

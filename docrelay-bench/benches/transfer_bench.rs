//! Bulk transfer benchmarks over in-memory pipes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docrelay_protocol::transfer::{receive_exact, send_exact};
use docrelay_protocol::{Step, Timeouts, Wire};
use std::time::Duration;
use tokio::runtime::Runtime;

const TIMEOUT: Duration = Duration::from_secs(30);

fn payload(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}

fn bench_transfer_chunk_sizes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("transfer_chunk_size");
    let data = payload(8 * 1024 * 1024);
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(20);

    for chunk in [4 * 1024, 64 * 1024, 1024 * 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.to_async(&rt).iter(|| {
                let data = &data;
                async move {
                    let (mut tx, mut rx) = tokio::io::duplex(chunk * 2);
                    let size = data.len() as u64;
                    let send = async {
                        let mut source = &data[..];
                        send_exact(&mut source, &mut tx, size, chunk, TIMEOUT, Step::Payload)
                            .await
                            .unwrap()
                    };
                    let recv = async {
                        let mut sink = Vec::with_capacity(data.len());
                        receive_exact(&mut rx, &mut sink, size, chunk, TIMEOUT, Step::Payload)
                            .await
                            .unwrap();
                        sink
                    };
                    let (_, sink) = tokio::join!(send, recv);
                    black_box(sink)
                }
            });
        });
    }

    group.finish();
}

fn bench_wire_payload(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("wire_payload");
    group.sample_size(20);

    for size in [64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        let data = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.to_async(&rt).iter(|| async move {
                let (a, z) = tokio::io::duplex(256 * 1024);
                let mut sender = Wire::new(a, Timeouts::default());
                let mut receiver = Wire::new(z, Timeouts::default());
                let size = data.len() as u64;

                let send = async {
                    sender.send_size(Step::Size, size).await.unwrap();
                    let mut source = &data[..];
                    sender.send_payload(Step::Payload, &mut source, size).await.unwrap();
                };
                let recv = async {
                    let declared = receiver.recv_size(Step::Size).await.unwrap();
                    let mut sink = Vec::with_capacity(declared as usize);
                    receiver
                        .recv_payload(Step::Payload, &mut sink, declared)
                        .await
                        .unwrap();
                    sink
                };
                let (_, sink) = tokio::join!(send, recv);
                black_box(sink)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transfer_chunk_sizes, bench_wire_payload);
criterion_main!(benches);

//! End-to-end client-server benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docrelay_client::{Client, ConnectionConfig, Request, SaveAs};
use docrelay_engine::{ProcessOutput, ProcessRequest, ProcessingEngine, ProcessingError};
use docrelay_protocol::Action;
use docrelay_server::{Server, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Copies the input to the output so timings measure the protocol alone.
struct Passthrough;

impl ProcessingEngine for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn supports(&self, _action: Action) -> bool {
        true
    }

    fn process(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessingError> {
        std::fs::copy(request.primary_input()?, &request.output)?;
        Ok(ProcessOutput::File(request.output.clone()))
    }
}

struct TestSetup {
    dir: TempDir,
    server: Arc<Server>,
    client: Client,
}

fn setup_server_and_client(rt: &Runtime) -> TestSetup {
    let dir = TempDir::new().unwrap();
    let temp_root = dir.path().join("server");
    std::fs::create_dir(&temp_root).unwrap();

    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_temp_root(temp_root);
    let server = Arc::new(Server::new(config, Arc::new(Passthrough)));

    let (tx, rx) = tokio::sync::oneshot::channel();
    let runner = server.clone();
    rt.spawn(async move {
        let _ = runner.run_with_ready(Some(tx)).await;
    });
    let addr = rt.block_on(rx).unwrap();

    let client = Client::new(ConnectionConfig::new(addr.to_string()));
    TestSetup {
        dir,
        server,
        client,
    }
}

fn input_file(dir: &TempDir, size: usize) -> PathBuf {
    let path = dir.path().join(format!("input_{}.pdf", size));
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

fn bench_compress_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_compress");
    group.sample_size(20);

    for size in [1024, 1024 * 1024, 16 * 1024 * 1024] {
        let input = input_file(&setup.dir, size);
        let request = Request::new(Action::Compress, input);
        let dest = setup.dir.path().join(format!("result_{}.pdf", size));

        group.throughput(Throughput::Bytes(size as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.to_async(&rt).iter(|| {
                let client = &setup.client;
                let dest = dest.clone();
                async move {
                    let mut sink = SaveAs(dest);
                    black_box(client.submit(request, &mut sink).await.unwrap())
                }
            });
        });
    }

    group.finish();
    setup.server.shutdown();
}

criterion_group!(benches, bench_compress_round_trip);
criterion_main!(benches);

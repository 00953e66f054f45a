//! Benchmarks for the single-pass indexer.
//!
//! Run with: cargo bench -p index --bench indexer_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use index::VectorFileIndexer;
use simvex_core::NoopMonitor;
use std::hint::black_box;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Writes a synthetic vector file with `vectors` interleaved vectors and
/// `samples_per_vector` samples each, switching vectors every 50 samples so
/// the indexer produces a realistic multi-block layout.
fn create_test_file(dir: &TempDir, vectors: usize, samples_per_vector: usize) -> PathBuf {
  let path = dir.path().join("bench.vec");
  let mut out = std::io::BufWriter::new(std::fs::File::create(&path).unwrap());
  writeln!(out, "version 2").unwrap();
  writeln!(out, "run bench-0").unwrap();
  writeln!(out, "attr configname Bench").unwrap();
  for v in 0..vectors {
    writeln!(out, "vector {v} net.node[{v}].app latency TV").unwrap();
  }
  let mut written = vec![0usize; vectors];
  let mut t = 0.0f64;
  while written.iter().any(|&n| n < samples_per_vector) {
    for v in 0..vectors {
      for _ in 0..50 {
        if written[v] >= samples_per_vector {
          break;
        }
        writeln!(out, "{v} {t:.4} {}", (written[v] % 97) as f64 * 0.5).unwrap();
        written[v] += 1;
        t += 0.0001;
      }
    }
  }
  out.flush().unwrap();
  path
}

fn bench_index_file(c: &mut Criterion) {
  let mut group = c.benchmark_group("index_file");
  for &samples in &[1_000usize, 10_000] {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, 8, samples);
    let bytes = std::fs::metadata(&path).unwrap().len();
    group.throughput(Throughput::Bytes(bytes));
    group.bench_with_input(BenchmarkId::from_parameter(samples), &path, |b, path| {
      let indexer = VectorFileIndexer::default();
      b.iter(|| {
        let outcome = indexer.index_file(black_box(path), &mut NoopMonitor).unwrap();
        black_box(outcome.completed().unwrap().num_vectors())
      });
    });
  }
  group.finish();
}

criterion_group!(benches, bench_index_file);
criterion_main!(benches);

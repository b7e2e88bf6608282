//! Criterion microbenches for the codec bridge.
//!
//! - encode: session codec (writer created once) vs. a fresh `WkbWriter` per
//!   call.
//! - decode: session reader on the same payloads.
//!
//! Inputs are random line strings from a seeded `StdRng`, so runs compare.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use georelay::prelude::*;
use georelay::MemoryEngine;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_lines(session: &Session, count: usize, points: usize, seed: u64) -> Vec<Geometry> {
    let mut rng = StdRng::seed_from_u64(seed);
    let reader = WktReader::new(session).expect("reader");
    (0..count)
        .map(|_| {
            let coords: Vec<String> = (0..points)
                .map(|_| format!("{} {}", rng.gen_range(-180.0..180.0), rng.gen_range(-90.0..90.0)))
                .collect();
            reader
                .read(&format!("LINESTRING ({})", coords.join(", ")))
                .expect("generated WKT parses")
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let session = Session::open(MemoryEngine::new()).expect("session");
    let mut group = c.benchmark_group("encode");
    for points in [4usize, 64, 512] {
        let lines = random_lines(&session, 32, points, 42);
        group.bench_function(BenchmarkId::new("session_codec", points), |b| {
            b.iter(|| {
                for g in &lines {
                    black_box(session.encode(g).expect("encode"));
                }
            })
        });
        group.bench_function(BenchmarkId::new("writer_per_call", points), |b| {
            b.iter(|| {
                for g in &lines {
                    let mut w = WkbWriter::new(&session).expect("writer");
                    w.set_output_dimension(3).expect("dimension");
                    w.set_include_srid(true).expect("srid");
                    black_box(w.write(g).expect("write"));
                }
            })
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let session = Session::open(MemoryEngine::new()).expect("session");
    let mut group = c.benchmark_group("decode");
    for points in [4usize, 64, 512] {
        let payloads: Vec<Vec<u8>> = random_lines(&session, 32, points, 7)
            .iter()
            .map(|g| session.encode(g).expect("encode"))
            .collect();
        group.bench_function(BenchmarkId::new("session_codec", points), |b| {
            b.iter(|| {
                for bytes in &payloads {
                    black_box(session.decode(bytes).expect("decode"));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);

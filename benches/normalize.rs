//! Benchmarks for HTTP batch normalization
//!
//! Covers the per-request CPU work: form decoding, decompression and
//! line splitting.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use flate2::write::{GzEncoder, ZlibEncoder};
use log_gateway::core::Compression;
use log_gateway::ingest::form::LogForm;
use log_gateway::ingest::http::split_lines;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use std::io::Write;

const LINE: &str = r#"2024-05-01T12:00:00.000Z INFO order-service request_id=8f14e45f status=200 latency_ms=12 path="/api/v1/orders""#;
const LIMIT: usize = 64 * 1024 * 1024;

fn sample_text(lines: usize) -> Vec<u8> {
    let mut text = Vec::with_capacity(lines * (LINE.len() + 1));
    for _ in 0..lines {
        text.extend_from_slice(LINE.as_bytes());
        text.push(b'\n');
    }
    text
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn bench_split_lines(c: &mut Criterion) {
    let payload = bytes::Bytes::from(sample_text(1000));
    let mut group = c.benchmark_group("split");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("1000_lines", |b| {
        b.iter(|| black_box(split_lines(black_box(&payload))))
    });

    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let text = sample_text(1000);
    let zipped = zlib(&text);
    let gzipped = gzip(&text);
    let mut group = c.benchmark_group("decompress");
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("zlib", |b| {
        b.iter(|| black_box(Compression::Zlib.decode(black_box(&zipped), LIMIT)))
    });
    group.bench_function("gzip", |b| {
        b.iter(|| black_box(Compression::Gzip.decode(black_box(&gzipped), LIMIT)))
    });

    group.finish();
}

fn bench_form_parse(c: &mut Criterion) {
    let compressed = gzip(&sample_text(200));
    let body = format!(
        "bizType=app1&zipType=gzip&logText={}",
        percent_encode(&compressed, NON_ALPHANUMERIC)
    );
    let mut group = c.benchmark_group("form");
    group.throughput(Throughput::Bytes(body.len() as u64));

    group.bench_function("gzip_body", |b| {
        b.iter(|| black_box(LogForm::parse(black_box(body.as_bytes()))))
    });

    group.finish();
}

criterion_group!(benches, bench_split_lines, bench_decompress, bench_form_parse);
criterion_main!(benches);

//! Benchmarks for request formatting and cache-key computation
//!
//! This benchmark measures:
//! - Building a request from prompt, image and overrides
//! - Canonical serialization plus SHA-256 digest of the request

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;

use vision_lm::cache::CacheKey;
use vision_lm::multimodal::{DataUrlResolver, ImageInput};
use vision_lm::request::{Options, RequestFormatter, SamplingOptions};
use vision_lm::ModelType;

fn formatter() -> RequestFormatter {
    let mut defaults = SamplingOptions::default().to_options();
    defaults.insert("model".into(), json!("gpt-4-vision-preview"));
    RequestFormatter::new(
        ModelType::Vision,
        Some("You are a careful image describer.".to_string()),
        defaults,
        Arc::new(DataUrlResolver),
    )
}

/// Fake PNG payload: valid signature followed by `size` filler bytes.
fn png_bytes(size: usize) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.resize(8 + size, 0x42);
    bytes
}

fn bench_build(c: &mut Criterion) {
    let f = formatter();
    let mut overrides = Options::new();
    overrides.insert("temperature".into(), json!(0.2));
    overrides.insert("n".into(), json!(3));

    let mut group = c.benchmark_group("request_build");
    group.bench_function("text_only", |b| {
        b.iter(|| f.build(black_box("Describe the scene."), None, &overrides).unwrap())
    });

    let image = ImageInput::Bytes(png_bytes(64 * 1024));
    group.bench_function("with_64k_image", |b| {
        b.iter(|| {
            f.build(black_box("Describe the scene."), Some(&image), &overrides)
                .unwrap()
        })
    });
    group.finish();
}

fn bench_cache_key(c: &mut Criterion) {
    let f = formatter();
    let mut group = c.benchmark_group("cache_key");

    for kib in [0usize, 16, 256] {
        let image = (kib > 0).then(|| ImageInput::Bytes(png_bytes(kib * 1024)));
        let request = f
            .build("Describe the scene.", image.as_ref(), &Options::new())
            .unwrap()
            .request;
        let len = request.canonical_string().len();

        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::new("for_request", kib), &request, |b, req| {
            b.iter(|| CacheKey::for_request(black_box(req)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_cache_key);
criterion_main!(benches);

//! Benchmarks for the generation hot path
//!
//! This benchmark measures:
//! - Request fingerprinting (normalization + sha256)
//! - Memory cache lookups at different fill levels
//! - Backend output parsing and text analysis

use content_forge::cache::{CacheConfig, CacheManager, FingerprintGenerator, MemoryCache};
use content_forge::generation::{parse, ContentAnalyzer};
use content_forge::types::{ContentKind, GenerationRequest};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const SAMPLE_POST: &str = r#"{"title": "Layer 2 Rollups Explained", "excerpt": "How rollups scale Ethereum.", "content": "# Layer 2 Rollups Explained\n\nRollups execute transactions off-chain and post data on-chain. Optimistic rollups assume validity and allow fraud proofs. Zero-knowledge rollups prove validity up front.\n\n## Trade-offs\n\nWithdrawal delays, proving costs and data availability all matter. Pick the design that fits your application."}"#;

fn sample_request(i: usize) -> GenerationRequest {
    GenerationRequest::new(ContentKind::LongForm, format!("Layer 2 Rollups part {}", i))
        .with_keywords(["rollups", "scaling", "ethereum"])
        .with_audience("developers")
        .with_length(1200)
}

fn bench_fingerprint(c: &mut Criterion) {
    let generator = FingerprintGenerator::new();
    let request = sample_request(0);

    let mut group = c.benchmark_group("fingerprint");
    group.throughput(Throughput::Elements(1));
    group.bench_function("for_request", |b| {
        b.iter(|| black_box(generator.for_request(black_box(&request))))
    });
    group.finish();
}

fn bench_cache_lookup(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let generator = FingerprintGenerator::new();

    let mut group = c.benchmark_group("cache_lookup");
    for fill in [10usize, 1000] {
        let cache = CacheManager::new(CacheConfig::new(), Box::new(MemoryCache::new(fill)));
        let keys: Vec<_> = (0..fill).map(|i| generator.for_request(&sample_request(i))).collect();
        runtime.block_on(async {
            for key in &keys {
                cache.set(key, &"cached body").await;
            }
        });
        let hit_key = keys[fill / 2].clone();
        group.bench_with_input(BenchmarkId::new("hit", fill), &hit_key, |b, key| {
            b.to_async(&runtime)
                .iter(|| async { black_box(cache.get::<String>(key).await) })
        });
    }
    group.finish();
}

fn bench_parse_and_analyze(c: &mut Criterion) {
    let analyzer = ContentAnalyzer::new();
    let request = sample_request(0);

    let mut group = c.benchmark_group("post_processing");
    group.throughput(Throughput::Bytes(SAMPLE_POST.len() as u64));
    group.bench_function("parse_long_form", |b| {
        b.iter(|| black_box(parse(ContentKind::LongForm, black_box(SAMPLE_POST))))
    });
    let parsed = parse(ContentKind::LongForm, SAMPLE_POST);
    group.bench_function("analyze", |b| {
        b.iter(|| black_box(analyzer.analyze(black_box(&parsed.text), &request)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_cache_lookup,
    bench_parse_and_analyze
);
criterion_main!(benches);

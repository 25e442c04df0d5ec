//! 예측 캐시 벤치마크
//!
//! pop 처리량과 발행자 팬아웃 성능을 측정합니다.

use std::sync::Arc;
use std::time::SystemTime;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tokio::sync::mpsc;

use flowsentry_alert_stream::cache::PredictionCache;
use flowsentry_alert_stream::publisher::AlertPublisher;
use flowsentry_classifier::{AdapterRegistry, HoldoutSet, RotatingFeatureSource};
use flowsentry_core::config::CacheConfig;
use flowsentry_core::types::{Alert, AttackType, FlowMetadata, Protocol, Severity};

fn build_cache(capacity: usize) -> PredictionCache {
    let registry = Arc::new(AdapterRegistry::with_builtin_models());
    let holdout = HoldoutSet::synthetic(1000, 200, 99);
    let source = RotatingFeatureSource::new(&holdout);
    let (tx, _rx) = mpsc::channel(1024);
    let config = CacheConfig {
        capacity,
        refill_threshold: capacity / 4,
        ..CacheConfig::default()
    };
    let cache = PredictionCache::new(&config, registry, source, tx);
    cache.prefill();
    cache
}

fn make_alert() -> Alert {
    Alert {
        id: "bench-alert".to_owned(),
        created_at: SystemTime::now(),
        flow: FlowMetadata {
            src_ip: "10.0.0.1".parse().unwrap(),
            src_port: 40000,
            dst_ip: "192.168.0.1".parse().unwrap(),
            dst_port: 443,
            protocol: Protocol::Tcp,
        },
        attack_type: AttackType::SynFlood,
        severity: Severity::High,
        score: 0.9,
        label_human: "SYN Flood (DoS)".to_owned(),
        chain_stage: None,
        top_features: vec![],
    }
}

fn bench_cache_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_pop");

    for capacity in [100, 300, 1000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                let cache = build_cache(capacity);
                b.iter(|| {
                    // 프리필 + 동기 폴백으로 pop은 항상 성공
                    black_box(cache.pop("syn-flood").unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_publish_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fanout");
    let alert = make_alert();

    for subscribers in [1, 8, 64] {
        group.throughput(Throughput::Elements(subscribers));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, &subscribers| {
                let publisher = AlertPublisher::new(256);
                let subscriptions: Vec<_> =
                    (0..subscribers).map(|_| publisher.subscribe()).collect();
                b.iter(|| {
                    publisher.publish(black_box(&alert));
                });
                drop(subscriptions);
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_cache_pop, bench_publish_fanout);
criterion_main!(benches);

use cachet_core::{CacheFormat, CacheStats, CallCountCache, FileCache, PathTemplate};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::num::NonZeroUsize;

static BENCH_STATS: CacheStats = CacheStats::new();

#[derive(Serialize, Deserialize, Clone)]
struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Serialize)]
struct Connector {
    root: String,
    exchange_name: String,
    market_type: String,
}

fn candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let base = i as f64;
            Candle {
                open: base,
                high: base + 2.0,
                low: base - 1.0,
                close: base + 1.0,
                volume: 1_000.0 + base,
            }
        })
        .collect()
}

fn bench_hit_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_cache_hit");
    let dir = tempfile::tempdir().unwrap();

    for size in [10, 100, 1000].iter() {
        for format in [CacheFormat::Json, CacheFormat::Binary] {
            let path = dir.path().join(format.file_name_for(&format!("candles_{}", size)));
            let cache = FileCache::<Vec<Candle>>::new(&path, format).with_stats(&BENCH_STATS);
            cache.insert(&candles(*size)).unwrap();

            let label = format!("{:?}", format);
            group.bench_with_input(BenchmarkId::new(label, size), size, |b, _| {
                b.iter(|| black_box(cache.lookup()));
            });
        }
    }

    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_cache_store");
    let dir = tempfile::tempdir().unwrap();
    let data = candles(100);

    for format in [CacheFormat::Json, CacheFormat::Binary] {
        let cache = FileCache::<Vec<Candle>>::new(dir.path().join(format.file_name_for("store")), format);
        group.bench_function(format!("{:?}", format), |b| {
            b.iter(|| cache.store(black_box(&data)));
        });
    }

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let connector = Connector {
        root: dir.path().display().to_string(),
        exchange_name: "binance".to_string(),
        market_type: "spot".to_string(),
    };

    c.bench_function("template_render", |b| {
        let template = PathTemplate::parse("{root}/{exchange_name}/{market_type}/").unwrap();
        b.iter(|| black_box(template.render(&connector).unwrap()));
    });

    c.bench_function("resolve_dynamic_cache", |b| {
        b.iter(|| {
            black_box(FileCache::<Vec<Candle>>::resolve(
                "{root}/{exchange_name}/{market_type}/",
                &connector,
                "candles.json",
                CacheFormat::Json,
                &BENCH_STATS,
            ))
        });
    });
}

fn bench_call_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("call_count");
    for every in [1usize, 10, 1000].iter() {
        let cache = CallCountCache::new(NonZeroUsize::new(*every).unwrap());
        group.bench_with_input(BenchmarkId::from_parameter(every), every, |b, _| {
            b.iter(|| black_box(cache.get_or_refresh(|| candles(10))));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_hit_path,
    bench_store,
    bench_resolve,
    bench_call_count
);
criterion_main!(benches);

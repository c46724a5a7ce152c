//! Criterion benchmarks for targeting resolution over a synthetic rule set.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::seq::SliceRandom;
use rand::Rng;

use reach_core::types::{Campaign, Page, TargetingRule};
use reach_engine::{TargetingEngine, TargetingPlan};
use reach_store::MemoryRuleStore;

const COUNTRIES: &[&str] = &["US", "CA", "DE", "JP", "IN", "BR"];
const OSES: &[&str] = &["android", "ios", "web"];

fn synthetic_store(campaigns: usize) -> MemoryRuleStore {
    let mut rng = rand::thread_rng();
    let store = MemoryRuleStore::new();

    for i in 0..campaigns {
        let id = format!("camp_{:06}", i);
        store
            .upsert_campaign(Campaign::new(&id, &id, "https://cdn/creative.png", "Install"))
            .expect("valid campaign");

        if rng.gen_bool(0.5) {
            for country in COUNTRIES.choose_multiple(&mut rng, 2) {
                store
                    .upsert_rule(TargetingRule::include(&id, "country", *country))
                    .expect("valid rule");
            }
        }
        if rng.gen_bool(0.3) {
            let os = OSES.choose(&mut rng).copied().unwrap_or("web");
            store
                .upsert_rule(TargetingRule::exclude(&id, "os", os))
                .expect("valid rule");
        }
    }
    store
}

fn bench_resolve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut g = c.benchmark_group("resolve");

    for size in [1_000usize, 10_000] {
        let engine = TargetingEngine::new(Arc::new(synthetic_store(size)));
        let plan = TargetingPlan::new(
            [("app_id", "com.example"), ("country", "US"), ("os", "android")],
            Page::default(),
        );

        g.throughput(Throughput::Elements(1));
        g.bench_with_input(BenchmarkId::new("first_page", size), &plan, |b, plan| {
            b.iter(|| black_box(rt.block_on(engine.resolve(plan)).expect("resolve")));
        });

        let deep = TargetingPlan::new([("country", "US")], Page::new(20, 50).expect("valid page"));
        g.bench_with_input(BenchmarkId::new("deep_page", size), &deep, |b, plan| {
            b.iter(|| black_box(rt.block_on(engine.resolve(plan)).expect("resolve")));
        });
    }
    g.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use pricetrack_core::{Price, SerialNumber};
use pricetrack_infra::store::{InMemoryPriceStore, ItemStore, PriceLedger};
use pricetrack_infra::{AnalyticsEngine, PriceUpdateCoordinator, StorePolicy, SystemClock};
use pricetrack_inventory::{Item, NewItem, PriceTrend, PriceUpdateInput};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// A store with `items` items, each repriced `changes_per_item` times.
fn populated(rt: &Runtime, items: usize, changes_per_item: usize) -> Arc<InMemoryPriceStore> {
    let store = Arc::new(InMemoryPriceStore::new());
    let coordinator =
        PriceUpdateCoordinator::new(store.clone(), Arc::new(SystemClock), StorePolicy::default());

    rt.block_on(async {
        for i in 0..items {
            let serial = format!("SN{i:05}");
            store
                .create(Item::create(
                    NewItem {
                        serial_number: SerialNumber::parse(&serial).unwrap(),
                        item_name: Some(format!("Item {i}")),
                        category: Some(format!("Category {}", i % 8)),
                        description: None,
                        current_price: Price::from_cents(10_000).unwrap(),
                        image_url: None,
                    },
                    Utc::now(),
                ))
                .await
                .unwrap();
            for step in 0..changes_per_item {
                let cents = 10_000 + ((step * 37 + i * 11) % 2_000) as i64 - 1_000;
                coordinator
                    .update_price(
                        &serial,
                        PriceUpdateInput {
                            new_price: Some(Decimal::new(cents, 2)),
                            notes: None,
                        },
                    )
                    .await
                    .unwrap();
            }
        }
    });
    store
}

fn bench_trend_calculation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("trend_calculation");

    for changes in [10usize, 100, 1_000].iter() {
        let store = populated(&rt, 1, *changes);
        let history = rt
            .block_on(store.list_by_serial(&SerialNumber::parse("SN00000").unwrap()))
            .unwrap();

        group.throughput(Throughput::Elements(*changes as u64));
        group.bench_with_input(BenchmarkId::new("from_history", changes), &history, |b, h| {
            b.iter(|| black_box(PriceTrend::from_history(h)));
        });

        let analytics = AnalyticsEngine::new(store, Arc::new(SystemClock), StorePolicy::default());
        group.bench_with_input(BenchmarkId::new("engine", changes), changes, |b, _| {
            b.iter(|| black_box(rt.block_on(analytics.price_trend("SN00000", 30)).unwrap()));
        });
    }

    group.finish();
}

fn bench_dashboard_queries(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = populated(&rt, 200, 20);
    let analytics = AnalyticsEngine::new(store, Arc::new(SystemClock), StorePolicy::default());
    let mut group = c.benchmark_group("dashboard_queries");

    group.bench_function("price_stats", |b| {
        b.iter(|| black_box(rt.block_on(analytics.price_stats()).unwrap()));
    });
    group.bench_function("most_volatile_items", |b| {
        b.iter(|| black_box(rt.block_on(analytics.most_volatile_items(Some(50))).unwrap()));
    });
    group.bench_function("overall_trend", |b| {
        b.iter(|| black_box(rt.block_on(analytics.overall_trend()).unwrap()));
    });
    group.bench_function("todays_activity", |b| {
        b.iter(|| black_box(rt.block_on(analytics.todays_activity()).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_trend_calculation, bench_dashboard_queries);
criterion_main!(benches);

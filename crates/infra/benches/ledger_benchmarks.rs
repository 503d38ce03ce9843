use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use std::sync::Arc;

use stockledger_core::{ProductId, UserId, WarehouseId};
use stockledger_inventory::{AvailabilityCheck, MovementKind, MovementRequest, StockQuery, StockScope};
use stockledger_infra::ledger::{InMemoryLedgerStore, LedgerStore};
use stockledger_infra::stock_calculator::StockCalculator;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime")
}

fn seeded_ledger(rt: &tokio::runtime::Runtime, product: ProductId, movements: usize) -> Arc<InMemoryLedgerStore> {
    let ledger = Arc::new(InMemoryLedgerStore::new());
    let warehouse = WarehouseId::new();
    rt.block_on(async {
        for i in 0..movements {
            let kind = if i % 4 == 3 { MovementKind::Out } else { MovementKind::In };
            let m = MovementRequest::new(product, warehouse, 2)
                .validate(kind, UserId::new())
                .unwrap();
            ledger.append(m, AvailabilityCheck::None).await.unwrap();
        }
    });
    ledger
}

fn bench_append(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("ledger_append");
    group.throughput(Throughput::Elements(1));

    group.bench_function("stock_in_unchecked", |b| {
        let ledger = InMemoryLedgerStore::new();
        let (p, w) = (ProductId::new(), WarehouseId::new());
        b.iter(|| {
            let m = MovementRequest::new(p, w, black_box(3))
                .validate(MovementKind::In, UserId::new())
                .unwrap();
            rt.block_on(ledger.append(m, AvailabilityCheck::None)).unwrap();
        });
    });

    group.bench_function("stock_out_checked_global", |b| {
        let p = ProductId::new();
        let ledger = seeded_ledger(&rt, p, 0);
        let w = WarehouseId::new();
        let seed = MovementRequest::new(p, w, i64::MAX / 2)
            .validate(MovementKind::In, UserId::new())
            .unwrap();
        rt.block_on(ledger.append(seed, AvailabilityCheck::None)).unwrap();
        b.iter(|| {
            let m = MovementRequest::new(p, w, black_box(1))
                .validate(MovementKind::Out, UserId::new())
                .unwrap();
            rt.block_on(ledger.append(m, AvailabilityCheck::Require(StockScope::Global)))
                .unwrap();
        });
    });

    group.finish();
}

/// Running counters vs a full as-of scan for the same product.
fn bench_current_stock(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("current_stock");

    for size in [1_000usize, 10_000] {
        let product = ProductId::new();
        let ledger = seeded_ledger(&rt, product, size);
        let calc = StockCalculator::new(ledger);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("counter", size), &product, |b, p| {
            b.iter(|| rt.block_on(calc.current_stock(*p)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("as_of_scan", size), &product, |b, p| {
            let query = StockQuery::product(*p).as_of(Utc::now());
            b.iter(|| rt.block_on(calc.stock(black_box(query))).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_append, bench_current_stock);
criterion_main!(benches);

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use stockledger_core::{CurrencyCode, ItemId, LocationId, Money, OperationContext, UserId};
use stockledger_events::{EventEnvelope, InMemoryEventBus};
use stockledger_infra::{EngineConfig, InMemoryLedgerStore, InMemoryRateTable, InventoryEngine};
use stockledger_inventory::{
    ConsumptionOrder, DocumentRef, Item, Location, MovementKind, MovementRequest, NewLot, StockLot,
    allocate,
};

type Engine = InventoryEngine<Arc<InMemoryLedgerStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

fn make_lots(count: usize, item: ItemId, location: LocationId) -> Vec<StockLot> {
    let start = Utc::now();
    (0..count)
        .map(|i| {
            StockLot::receive(NewLot {
                item_id: item,
                location_id: location,
                quantity: Decimal::from(10),
                unit_cost: Decimal::from(5 + (i % 7) as u32),
                received_at: start + Duration::seconds(i as i64),
                sequence: i as u64,
                source_movement: None,
            })
            .unwrap()
        })
        .collect()
}

fn setup_engine() -> (Engine, ItemId, LocationId, OperationContext) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let item = Item::new(ItemId::new(), "BENCH", "Bench item", Decimal::from(5)).unwrap();
    let location = Location::new(LocationId::new(), "WH", "Warehouse").unwrap();
    let (item_id, location_id) = (item.id, location.id);
    store.upsert_item(item).unwrap();
    store.upsert_location(location).unwrap();

    let engine = InventoryEngine::new(
        store,
        Arc::new(InMemoryEventBus::new()),
        EngineConfig::default(),
        Arc::new(InMemoryRateTable::new()),
    );
    (engine, item_id, location_id, OperationContext::now(UserId::new()))
}

fn movement(item: ItemId, location: LocationId, kind: MovementKind) -> MovementRequest {
    MovementRequest {
        item_id: item,
        location_id: location,
        kind,
        document: DocumentRef::new("bench", "1"),
    }
}

fn bench_fifo_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_allocation");
    let (item, location) = (ItemId::new(), LocationId::new());

    for lot_count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*lot_count as u64));
        group.bench_with_input(BenchmarkId::new("drain_all_lots", lot_count), lot_count, |b, &count| {
            let lots = make_lots(count, item, location);
            let needed = Decimal::from(10 * count as u64);
            b.iter_batched(
                || lots.clone(),
                |mut lots| {
                    black_box(allocate(&mut lots, needed, Decimal::from(5), ConsumptionOrder::Fifo).unwrap())
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_movement_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_throughput");
    group.throughput(Throughput::Elements(2));

    group.bench_function("receipt_then_issue", |b| {
        let (engine, item, location, ctx) = setup_engine();
        b.iter(|| {
            let receipt = MovementKind::Receipt {
                quantity: Decimal::from(3),
                unit_cost: Money::new(Decimal::from(12), CurrencyCode::USD),
            };
            black_box(engine.create_stock_movement(&ctx, movement(item, location, receipt)).unwrap());
            let issue = MovementKind::Issue {
                quantity: Decimal::from(3),
            };
            black_box(engine.create_stock_movement(&ctx, movement(item, location, issue)).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fifo_allocation, bench_movement_throughput);
criterion_main!(benches);

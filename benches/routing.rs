use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qrp::hash::hash;
use qrp::{Query, RouteTable, RoutingState};

fn sample_table(size: usize, words: usize) -> RouteTable {
    let mut table = RouteTable::new(size, 7);
    for i in 0..words {
        table.add_keyword(&format!("keyword{}", i));
    }
    table
}

fn bench_hash(c: &mut Criterion) {
    c.bench_function("hash keyword to 16 bits", |b| {
        b.iter(|| black_box(hash(black_box("interpolating"), 16)));
    });
}

fn bench_resample(c: &mut Criterion) {
    let table = sample_table(65536, 20_000);
    c.bench_function("resample 65536 to 8192", |b| {
        b.iter(|| black_box(table.resampled(8192)));
    });
}

fn bench_full_update_cycle(c: &mut Criterion) {
    let table = sample_table(65536, 20_000);
    c.bench_function("encode and apply 65536-slot table", |b| {
        b.iter(|| {
            let mut link = RoutingState::new();
            for msg in &table.encode_updates(None, true) {
                link.handle_message(msg).unwrap();
            }
            black_box(link.inbound_table().is_some())
        });
    });
}

fn bench_contains(c: &mut Criterion) {
    let table = sample_table(65536, 20_000);
    let query = Query::new("keyword100 keyword2000 keyword19999");
    c.bench_function("match three-keyword query", |b| {
        b.iter(|| black_box(table.contains(black_box(&query))));
    });
}

criterion_group!(
    benches,
    bench_hash,
    bench_resample,
    bench_full_update_cycle,
    bench_contains
);
criterion_main!(benches);

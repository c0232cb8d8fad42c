//! Подбор мест в большом зале: пустом, наполовину и почти полностью занятом.
//!
//! Запуск: `cargo bench`

use cinema_booking::allocation::{allocate, row_letter, SeatPosition, TheaterGeometry};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn occupied_every(geometry: &TheaterGeometry, step: usize) -> Vec<SeatPosition> {
    let seats_per_row = geometry.seats_per_row() as usize;
    (0..geometry.capacity())
        .filter(|i| i % step != 0)
        .filter_map(|i| {
            let row = row_letter(i / seats_per_row)?;
            Some(SeatPosition::new(row, (i % seats_per_row) as u32 + 1))
        })
        .collect()
}

fn bench_allocate(c: &mut Criterion) {
    let geometry = TheaterGeometry::new(26, 50).unwrap();
    let scenarios = [
        ("empty", Vec::new()),
        ("half", occupied_every(&geometry, 2)),
        ("nearly_full", occupied_every(&geometry, 20)),
    ];

    let mut group = c.benchmark_group("allocate");
    for (name, occupied) in &scenarios {
        group.bench_with_input(BenchmarkId::new("default", name), occupied, |b, occupied| {
            b.iter(|| allocate(black_box(&geometry), black_box(occupied), black_box(8), None))
        });
        group.bench_with_input(BenchmarkId::new("anchored", name), occupied, |b, occupied| {
            let anchor = Some(SeatPosition::new('M', 10));
            b.iter(|| allocate(black_box(&geometry), black_box(occupied), black_box(8), anchor))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_allocate);
criterion_main!(benches);

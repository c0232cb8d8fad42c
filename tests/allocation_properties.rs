//! Свойства аллокатора мест на случайных залах и случайной занятости.

use cinema_booking::allocation::{
    allocate, row_letter, AllocationError, OccupancyGrid, SeatPosition, TheaterGeometry,
};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashSet;

/// Случайный зал и случайно занятые места (около трети).
fn theater() -> impl Strategy<Value = (TheaterGeometry, Vec<SeatPosition>)> {
    (1u32..=26, 1u32..=50).prop_flat_map(|(rows, seats_per_row)| {
        proptest::collection::vec(proptest::bool::weighted(0.35), (rows * seats_per_row) as usize)
            .prop_map(move |taken| {
                let geometry = TheaterGeometry::new(rows, seats_per_row).unwrap();
                let occupied = taken
                    .iter()
                    .enumerate()
                    .filter(|(_, taken)| **taken)
                    .filter_map(|(i, _)| {
                        let row = row_letter(i / seats_per_row as usize)?;
                        Some(SeatPosition::new(row, (i % seats_per_row as usize) as u32 + 1))
                    })
                    .collect();
                (geometry, occupied)
            })
    })
}

fn free_count(geometry: &TheaterGeometry, occupied: &[SeatPosition]) -> usize {
    OccupancyGrid::from_occupied(*geometry, occupied).free_count()
}

/// Все непрерывные свободные блоки длины `len` в ряду: (первое кресло, удвоенное
/// расстояние середины блока до центрального кресла).
fn contiguous_runs(grid: &OccupancyGrid, row: usize, len: u32) -> Vec<(u32, i64)> {
    let geometry = grid.geometry();
    let letter = row_letter(row).unwrap();
    let middle = geometry.middle_seat() as i64;
    (1..=geometry.seats_per_row().saturating_sub(len) + 1)
        .filter(|start| (*start..start + len).all(|n| grid.is_free(&SeatPosition::new(letter, n))))
        .map(|start| (start, (start as i64 + (start + len - 1) as i64 - 2 * middle).abs()))
        .collect()
}

fn longest_run(grid: &OccupancyGrid, row: usize) -> u32 {
    (1..=grid.geometry().seats_per_row())
        .rev()
        .find(|len| !contiguous_runs(grid, row, *len).is_empty())
        .unwrap_or(0)
}

proptest! {
    #[test]
    fn returns_exactly_the_requested_free_seats((geometry, occupied) in theater(), pick in any::<Index>()) {
        let free = free_count(&geometry, &occupied);
        prop_assume!(free > 0);
        let num_tickets = pick.index(free) as u32 + 1;

        let seats = allocate(&geometry, &occupied, num_tickets, None).unwrap();

        prop_assert_eq!(seats.len(), num_tickets as usize);
        let distinct: HashSet<_> = seats.iter().collect();
        prop_assert_eq!(distinct.len(), seats.len());
        let taken: HashSet<_> = occupied.iter().collect();
        for seat in &seats {
            prop_assert!(geometry.contains(seat), "{} is outside", seat);
            prop_assert!(!taken.contains(seat), "{} is taken", seat);
        }
    }

    #[test]
    fn identical_inputs_give_identical_results((geometry, occupied) in theater(), pick in any::<Index>()) {
        let free = free_count(&geometry, &occupied);
        prop_assume!(free > 0);
        let num_tickets = pick.index(free) as u32 + 1;

        let first = allocate(&geometry, &occupied, num_tickets, None);
        let second = allocate(&geometry, &occupied, num_tickets, None);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn one_more_than_free_fails((geometry, occupied) in theater()) {
        let free = free_count(&geometry, &occupied);
        let result = allocate(&geometry, &occupied, free as u32 + 1, None);
        let is_insufficient = matches!(result, Err(AllocationError::InsufficientCapacity { .. }));
        prop_assert!(is_insufficient);
    }

    #[test]
    fn rows_behind_the_nearest_used_row_are_exhausted((geometry, occupied) in theater(), pick in any::<Index>()) {
        let free = free_count(&geometry, &occupied);
        prop_assume!(free > 0);
        let num_tickets = pick.index(free) as u32 + 1;

        let seats = allocate(&geometry, &occupied, num_tickets, None).unwrap();
        let nearest = seats.iter().filter_map(SeatPosition::row_index).min().unwrap();

        let mut after = OccupancyGrid::from_occupied(geometry, &occupied);
        for seat in &seats {
            after.mark(seat);
        }
        for row in nearest + 1..geometry.total_rows() as usize {
            prop_assert!(after.free_seats(row).is_empty(), "row {} still has free seats", row);
        }
    }

    #[test]
    fn anchored_request_stays_in_the_anchor_row(
        (geometry, occupied) in theater(),
        row_pick in any::<Index>(),
        seat_pick in any::<Index>(),
        count_pick in any::<Index>(),
    ) {
        let row = row_pick.index(geometry.total_rows() as usize);
        let seat = seat_pick.index(geometry.seats_per_row() as usize) as u32 + 1;
        let grid = OccupancyGrid::from_occupied(geometry, &occupied);
        let eligible: Vec<u32> = grid.free_seats(row).into_iter().filter(|n| *n >= seat).collect();
        prop_assume!(!eligible.is_empty());
        let num_tickets = count_pick.index(eligible.len()) + 1;

        let letter = row_letter(row).unwrap();
        let anchor = SeatPosition::new(letter, seat);
        let seats = allocate(&geometry, &occupied, num_tickets as u32, Some(anchor)).unwrap();

        let expected: Vec<SeatPosition> = eligible
            .iter()
            .take(num_tickets)
            .map(|n| SeatPosition::new(letter, *n))
            .collect();
        prop_assert_eq!(seats, expected);
    }

    #[test]
    fn furthest_row_gets_the_most_central_run((geometry, occupied) in theater(), pick in any::<Index>()) {
        let grid = OccupancyGrid::from_occupied(geometry, &occupied);
        let row = (0..geometry.total_rows() as usize)
            .rev()
            .find(|row| !grid.free_seats(*row).is_empty());
        prop_assume!(row.is_some());
        let row = row.unwrap();
        let num_tickets = pick.index(longest_run(&grid, row) as usize) as u32 + 1;

        let runs = contiguous_runs(&grid, row, num_tickets);
        let (start, _) = runs
            .iter()
            .copied()
            .min_by_key(|(start, distance)| (*distance, *start))
            .unwrap();
        let letter = row_letter(row).unwrap();
        let expected: Vec<SeatPosition> = (start..start + num_tickets)
            .map(|n| SeatPosition::new(letter, n))
            .collect();

        let seats = allocate(&geometry, &occupied, num_tickets, None).unwrap();
        prop_assert_eq!(seats, expected);
    }
}

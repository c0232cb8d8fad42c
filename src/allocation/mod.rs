//! allocation
//!
//! Автоматический подбор мест в зале.
//!
//! Правила по умолчанию:
//! 1.  Начинаем с самого дальнего ряда (Z -> A).
//! 2.  В ряду ищем непрерывный блок, середина которого ближе всего к центру ряда.
//!     При равенстве выигрывает блок с меньшим номером первого кресла.
//! 3.  Если ряд не вмещает весь заказ, забираем что есть и переходим к более близкому ряду.
//!
//! Если задана стартовая позиция, в ее ряду берем кресла начиная с нее вправо,
//! а остаток добираем по правилам по умолчанию из рядов ближе к экрану.
//!
//! Модуль чистый: ни БД, ни сети. Снимок занятых мест он получает от вызывающего
//! и доверяет ему. Сериализация чтение -> подбор -> запись лежит на вызывающем
//! (см. `services::seat_selection`).

pub mod geometry;
pub mod grid;

use std::borrow::Borrow;
use thiserror::Error;

pub use geometry::{row_letter, SeatPosition, TheaterGeometry, MAX_ROWS};
pub use grid::OccupancyGrid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("invalid theater geometry: {total_rows} rows x {seats_per_row} seats")]
    InvalidGeometry { total_rows: u32, seats_per_row: u32 },

    #[error("invalid allocation request: {0}")]
    InvalidRequest(String),

    #[error("insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: u32, available: usize },

    #[error("failed to allocate seats: requested {requested}, allocated {allocated}")]
    AllocationExhausted { requested: u32, allocated: usize },
}

/// Стратегия подбора. Выбирается по наличию стартовой позиции.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPolicy {
    Default,
    Anchored(SeatPosition),
}

impl AllocationPolicy {
    pub fn from_anchor(anchor: Option<SeatPosition>) -> Self {
        match anchor {
            Some(position) => AllocationPolicy::Anchored(position),
            None => AllocationPolicy::Default,
        }
    }
}

/// Подбирает `num_tickets` свободных мест.
///
/// Возвращает ровно `num_tickets` мест либо ошибку, частичных результатов нет.
pub fn allocate<I>(
    geometry: &TheaterGeometry,
    occupied: I,
    num_tickets: u32,
    anchor: Option<SeatPosition>,
) -> Result<Vec<SeatPosition>, AllocationError>
where
    I: IntoIterator,
    I::Item: Borrow<SeatPosition>,
{
    let grid = OccupancyGrid::from_occupied(*geometry, occupied);
    allocate_in(&grid, num_tickets, anchor)
}

/// То же, что `allocate`, но по уже построенной сетке.
pub fn allocate_in(
    grid: &OccupancyGrid,
    num_tickets: u32,
    anchor: Option<SeatPosition>,
) -> Result<Vec<SeatPosition>, AllocationError> {
    if num_tickets < 1 {
        return Err(AllocationError::InvalidRequest(
            "number of tickets must be at least 1".to_string(),
        ));
    }

    let requested = num_tickets as usize;
    let capacity = grid.geometry().capacity();
    if requested > capacity {
        return Err(AllocationError::InsufficientCapacity {
            requested: num_tickets,
            available: capacity,
        });
    }
    let free = grid.free_count();
    if requested > free {
        return Err(AllocationError::InsufficientCapacity {
            requested: num_tickets,
            available: free,
        });
    }

    let selected = match AllocationPolicy::from_anchor(anchor) {
        AllocationPolicy::Default => select_default(grid, furthest_first(grid), requested),
        AllocationPolicy::Anchored(anchor) => select_anchored(grid, anchor, requested)?,
    };

    if selected.len() < requested {
        return Err(AllocationError::AllocationExhausted {
            requested: num_tickets,
            allocated: selected.len(),
        });
    }
    Ok(selected)
}

fn furthest_first(grid: &OccupancyGrid) -> impl Iterator<Item = usize> {
    (0..grid.geometry().total_rows() as usize).rev()
}

/// Правила по умолчанию по заданному порядку рядов.
fn select_default<R>(grid: &OccupancyGrid, rows: R, num_tickets: usize) -> Vec<SeatPosition>
where
    R: IntoIterator<Item = usize>,
{
    let middle = grid.geometry().middle_seat();
    let mut selected = Vec::with_capacity(num_tickets);

    for row in rows {
        let needed = num_tickets - selected.len();
        if needed == 0 {
            break;
        }
        let Some(letter) = row_letter(row) else {
            continue;
        };
        let free = grid.free_seats(row);
        if free.is_empty() {
            continue;
        }

        let run = best_run(&free, needed.min(free.len()), middle);
        selected.extend(run.iter().map(|&seat| SeatPosition::new(letter, seat)));
    }

    selected
}

/// Лучший непрерывный блок длины `len` среди отсортированных свободных кресел.
/// Если непрерывного блока нет, берем первые `len` свободных.
fn best_run(free: &[u32], len: usize, middle: u32) -> &[u32] {
    if len >= free.len() {
        return free;
    }

    let mut best: Option<(i64, &[u32])> = None;
    for window in free.windows(len) {
        let contiguous = window.windows(2).all(|pair| pair[1] == pair[0] + 1);
        if !contiguous {
            continue;
        }
        // Сравниваем удвоенные расстояния, чтобы не уходить в дроби.
        let distance = (window[0] as i64 + window[len - 1] as i64 - 2 * middle as i64).abs();
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, window)),
        }
    }

    best.map(|(_, run)| run).unwrap_or(&free[..len])
}

fn select_anchored(
    grid: &OccupancyGrid,
    anchor: SeatPosition,
    num_tickets: usize,
) -> Result<Vec<SeatPosition>, AllocationError> {
    let geometry = grid.geometry();
    let anchor_row = match anchor.row_index() {
        Some(row) if row < geometry.total_rows() as usize => row,
        // Ряда нет в зале: работаем как без стартовой позиции.
        _ => return Ok(select_default(grid, furthest_first(grid), num_tickets)),
    };
    if anchor.seat_number < 1 || anchor.seat_number > geometry.seats_per_row() {
        return Err(AllocationError::InvalidRequest(format!(
            "starting seat {} is outside of row {} (1..={})",
            anchor.seat_number,
            anchor.row_letter,
            geometry.seats_per_row()
        )));
    }

    let mut selected: Vec<SeatPosition> = grid
        .free_seats(anchor_row)
        .into_iter()
        .filter(|&seat| seat >= anchor.seat_number)
        .take(num_tickets)
        .map(|seat| SeatPosition::new(anchor.row_letter, seat))
        .collect();

    if selected.len() < num_tickets {
        // Остаток из рядов ближе к экрану, ряд стартовой позиции уже обработан.
        let shortfall = num_tickets - selected.len();
        selected.extend(select_default(grid, (0..anchor_row).rev(), shortfall));
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(row: char, numbers: &[u32]) -> Vec<SeatPosition> {
        numbers.iter().map(|&n| SeatPosition::new(row, n)).collect()
    }

    fn full_row(row: char, width: u32) -> Vec<SeatPosition> {
        (1..=width).map(|n| SeatPosition::new(row, n)).collect()
    }

    fn geometry(rows: u32, width: u32) -> TheaterGeometry {
        TheaterGeometry::new(rows, width).unwrap()
    }

    #[test]
    fn picks_centered_block_in_furthest_row() {
        let result = allocate(&geometry(3, 5), Vec::<SeatPosition>::new(), 3, None).unwrap();
        assert_eq!(result, seats('C', &[2, 3, 4]));
    }

    #[test]
    fn moves_to_nearer_row_when_furthest_is_full() {
        let result = allocate(&geometry(3, 5), full_row('C', 5), 2, None).unwrap();
        // середина 3: блоки 2-3 и 3-4 равноудалены, берем левый
        assert_eq!(result, seats('B', &[2, 3]));
    }

    #[test]
    fn ties_go_to_lower_starting_seat() {
        let result = allocate(&geometry(1, 6), Vec::<SeatPosition>::new(), 2, None).unwrap();
        assert_eq!(result, seats('A', &[2, 3]));
        let result = allocate(&geometry(1, 6), Vec::<SeatPosition>::new(), 4, None).unwrap();
        assert_eq!(result, seats('A', &[1, 2, 3, 4]));
    }

    #[test]
    fn skips_fragmented_runs_that_are_not_physically_adjacent() {
        // свободны 1,2,4,5,6,7: блок 2-4 был бы "подряд" в списке, но не в зале
        let occupied = seats('A', &[3]);
        let result = allocate(&geometry(1, 7), occupied, 3, None).unwrap();
        assert_eq!(result, seats('A', &[4, 5, 6]));
    }

    #[test]
    fn falls_back_to_first_free_seats_without_contiguous_run() {
        let occupied = seats('A', &[2, 4]);
        let result = allocate(&geometry(1, 5), occupied, 3, None).unwrap();
        assert_eq!(result, seats('A', &[1, 3, 5]));
    }

    #[test]
    fn overflow_exhausts_furthest_row_first() {
        let occupied = seats('C', &[1, 2, 3]);
        let result = allocate(&geometry(3, 5), occupied, 4, None).unwrap();
        assert_eq!(&result[..2], &seats('C', &[4, 5])[..]);
        assert_eq!(&result[2..], &seats('B', &[2, 3])[..]);
    }

    #[test]
    fn anchored_takes_seats_rightwards_in_anchor_row() {
        let result = allocate(
            &geometry(3, 5),
            Vec::<SeatPosition>::new(),
            5,
            Some(SeatPosition::new('B', 1)),
        )
        .unwrap();
        assert_eq!(result, full_row('B', 5));
    }

    #[test]
    fn anchored_skips_taken_seats_after_anchor() {
        let occupied = seats('B', &[3]);
        let result = allocate(&geometry(3, 5), occupied, 2, Some(SeatPosition::new('B', 2))).unwrap();
        assert_eq!(result, seats('B', &[2, 4]));
    }

    #[test]
    fn anchored_overflows_towards_the_front() {
        let result = allocate(
            &geometry(3, 5),
            Vec::<SeatPosition>::new(),
            4,
            Some(SeatPosition::new('B', 4)),
        )
        .unwrap();
        assert_eq!(&result[..2], &seats('B', &[4, 5])[..]);
        assert_eq!(&result[2..], &seats('A', &[2, 3])[..]);
    }

    #[test]
    fn anchored_never_uses_rows_behind_the_anchor() {
        let mut occupied = full_row('A', 3);
        occupied.extend(seats('B', &[1, 2]));
        let err = allocate(&geometry(3, 3), occupied, 2, Some(SeatPosition::new('B', 1))).unwrap_err();
        assert_eq!(
            err,
            AllocationError::AllocationExhausted {
                requested: 2,
                allocated: 1
            }
        );
    }

    #[test]
    fn anchor_outside_theater_falls_back_to_default() {
        let occupied = seats('C', &[3]);
        let anchored = allocate(&geometry(3, 5), &occupied, 3, Some(SeatPosition::new('Q', 2))).unwrap();
        let default = allocate(&geometry(3, 5), &occupied, 3, None).unwrap();
        assert_eq!(anchored, default);

        let lowercase = allocate(&geometry(3, 5), &occupied, 3, Some(SeatPosition::new('b', 2))).unwrap();
        assert_eq!(lowercase, default);
    }

    #[test]
    fn anchor_seat_outside_row_is_rejected() {
        let err = allocate(
            &geometry(3, 5),
            Vec::<SeatPosition>::new(),
            1,
            Some(SeatPosition::new('A', 6)),
        )
        .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }

    #[test]
    fn zero_tickets_is_invalid() {
        let err = allocate(&geometry(3, 5), Vec::<SeatPosition>::new(), 0, None).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }

    #[test]
    fn capacity_boundary() {
        let occupied = full_row('A', 5);
        let all = allocate(&geometry(2, 5), &occupied, 5, None).unwrap();
        assert_eq!(all, full_row('B', 5));

        let err = allocate(&geometry(2, 5), &occupied, 6, None).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientCapacity {
                requested: 6,
                available: 5
            }
        );

        let err = allocate(&geometry(2, 5), Vec::<SeatPosition>::new(), 11, None).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InsufficientCapacity {
                requested: 11,
                available: 10
            }
        );
    }

    #[test]
    fn policy_follows_anchor_presence() {
        assert_eq!(AllocationPolicy::from_anchor(None), AllocationPolicy::Default);
        let anchor = SeatPosition::new('A', 1);
        assert_eq!(
            AllocationPolicy::from_anchor(Some(anchor)),
            AllocationPolicy::Anchored(anchor)
        );
    }
}

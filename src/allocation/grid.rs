use std::borrow::Borrow;

use super::geometry::{row_letter, SeatPosition, TheaterGeometry};

/// Плоская матрица занятости: индекс = row * seats_per_row + (seat_number - 1).
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    geometry: TheaterGeometry,
    taken: Vec<bool>,
}

impl OccupancyGrid {
    pub fn new(geometry: TheaterGeometry) -> Self {
        Self {
            geometry,
            taken: vec![false; geometry.capacity()],
        }
    }

    /// Строит сетку по снимку занятых мест. Места вне зала молча пропускаются.
    pub fn from_occupied<I>(geometry: TheaterGeometry, occupied: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<SeatPosition>,
    {
        let mut grid = Self::new(geometry);
        for position in occupied {
            grid.mark(position.borrow());
        }
        grid
    }

    pub fn geometry(&self) -> &TheaterGeometry {
        &self.geometry
    }

    fn offset(&self, position: &SeatPosition) -> Option<usize> {
        if !self.geometry.contains(position) {
            return None;
        }
        let row = position.row_index()?;
        Some(row * self.geometry.seats_per_row() as usize + (position.seat_number - 1) as usize)
    }

    /// Помечает место занятым. false, если место вне зала.
    pub fn mark(&mut self, position: &SeatPosition) -> bool {
        match self.offset(position) {
            Some(idx) => {
                self.taken[idx] = true;
                true
            }
            None => false,
        }
    }

    pub fn is_taken(&self, position: &SeatPosition) -> bool {
        self.offset(position).map(|idx| self.taken[idx]).unwrap_or(false)
    }

    pub fn is_free(&self, position: &SeatPosition) -> bool {
        self.offset(position).map(|idx| !self.taken[idx]).unwrap_or(false)
    }

    /// Свободные номера кресел ряда по возрастанию.
    pub fn free_seats(&self, row: usize) -> Vec<u32> {
        if row >= self.geometry.total_rows() as usize {
            return Vec::new();
        }
        let width = self.geometry.seats_per_row() as usize;
        let start = row * width;
        self.taken[start..start + width]
            .iter()
            .enumerate()
            .filter(|(_, taken)| !**taken)
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }

    pub fn free_count(&self) -> usize {
        self.taken.iter().filter(|taken| !**taken).count()
    }

    pub fn taken_count(&self) -> usize {
        self.taken.len() - self.free_count()
    }

    /// Все свободные места, ряды A..Z, кресла по возрастанию.
    pub fn available(&self) -> Vec<SeatPosition> {
        (0..self.geometry.total_rows() as usize)
            .filter_map(|row| row_letter(row).map(|letter| (row, letter)))
            .flat_map(|(row, letter)| {
                self.free_seats(row)
                    .into_iter()
                    .map(move |seat| SeatPosition::new(letter, seat))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> TheaterGeometry {
        TheaterGeometry::new(3, 5).unwrap()
    }

    #[test]
    fn out_of_range_entries_are_ignored() {
        let occupied = vec![
            SeatPosition::new('A', 2),
            SeatPosition::new('Z', 1),
            SeatPosition::new('B', 9),
            SeatPosition::new('b', 1),
        ];
        let grid = OccupancyGrid::from_occupied(geometry(), &occupied);
        assert_eq!(grid.taken_count(), 1);
        assert!(grid.is_taken(&SeatPosition::new('A', 2)));
        assert!(!grid.is_free(&SeatPosition::new('Z', 1)));
    }

    #[test]
    fn duplicates_count_once() {
        let occupied = [SeatPosition::new('C', 3), SeatPosition::new('C', 3)];
        let grid = OccupancyGrid::from_occupied(geometry(), occupied);
        assert_eq!(grid.free_count(), 14);
    }

    #[test]
    fn free_seats_are_sorted_per_row() {
        let occupied = [SeatPosition::new('B', 1), SeatPosition::new('B', 4)];
        let grid = OccupancyGrid::from_occupied(geometry(), occupied);
        assert_eq!(grid.free_seats(1), vec![2, 3, 5]);
        assert_eq!(grid.free_seats(0), vec![1, 2, 3, 4, 5]);
        assert!(grid.free_seats(3).is_empty());
    }

    #[test]
    fn available_lists_rows_front_to_back() {
        let occupied = (1..=5).map(|n| SeatPosition::new('A', n));
        let grid = OccupancyGrid::from_occupied(TheaterGeometry::new(2, 5).unwrap(), occupied);
        let available = grid.available();
        assert_eq!(available.len(), 5);
        assert!(available.iter().all(|p| p.row_letter == 'B'));
        assert_eq!(available[0], SeatPosition::new('B', 1));
    }
}

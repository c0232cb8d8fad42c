use serde::{Deserialize, Serialize};
use std::fmt;

use super::AllocationError;

/// Ряды именуются одной буквой, поэтому больше 26 рядов не бывает.
pub const MAX_ROWS: u32 = 26;

/// Место в зале: буква ряда и номер кресла (с единицы).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatPosition {
    pub row_letter: char,
    pub seat_number: u32,
}

impl SeatPosition {
    pub fn new(row_letter: char, seat_number: u32) -> Self {
        Self { row_letter, seat_number }
    }

    /// Индекс ряда от нуля ('A' -> 0). Для чего-то кроме A..Z вернет None.
    pub fn row_index(&self) -> Option<usize> {
        if self.row_letter.is_ascii_uppercase() {
            Some((self.row_letter as u8 - b'A') as usize)
        } else {
            None
        }
    }
}

impl fmt::Display for SeatPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter, self.seat_number)
    }
}

/// Буква ряда по индексу.
pub fn row_letter(index: usize) -> Option<char> {
    if index < MAX_ROWS as usize {
        Some((b'A' + index as u8) as char)
    } else {
        None
    }
}

/// Геометрия зала: rows x seats_per_row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TheaterGeometry {
    total_rows: u32,
    seats_per_row: u32,
}

impl TheaterGeometry {
    pub fn new(total_rows: u32, seats_per_row: u32) -> Result<Self, AllocationError> {
        if total_rows == 0 || total_rows > MAX_ROWS || seats_per_row == 0 {
            return Err(AllocationError::InvalidGeometry {
                total_rows,
                seats_per_row,
            });
        }
        Ok(Self {
            total_rows,
            seats_per_row,
        })
    }

    /// Геометрия из колонок БД (там INT).
    pub fn from_columns(total_rows: i32, seats_per_row: i32) -> Result<Self, AllocationError> {
        let rows = u32::try_from(total_rows).unwrap_or(0);
        let seats = u32::try_from(seats_per_row).unwrap_or(0);
        Self::new(rows, seats)
    }

    pub fn total_rows(&self) -> u32 {
        self.total_rows
    }

    pub fn seats_per_row(&self) -> u32 {
        self.seats_per_row
    }

    pub fn capacity(&self) -> usize {
        self.total_rows as usize * self.seats_per_row as usize
    }

    /// Середина ряда: ceil(seats_per_row / 2).
    pub fn middle_seat(&self) -> u32 {
        self.seats_per_row.div_ceil(2)
    }

    pub fn contains(&self, position: &SeatPosition) -> bool {
        match position.row_index() {
            Some(row) => {
                row < self.total_rows as usize
                    && position.seat_number >= 1
                    && position.seat_number <= self.seats_per_row
            }
            None => false,
        }
    }

    /// Буквы рядов от A до последнего.
    pub fn row_letters(&self) -> impl DoubleEndedIterator<Item = char> {
        (0..self.total_rows as usize).filter_map(row_letter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_rejects_out_of_range_dimensions() {
        assert!(TheaterGeometry::new(0, 10).is_err());
        assert!(TheaterGeometry::new(27, 10).is_err());
        assert!(TheaterGeometry::new(5, 0).is_err());
        assert!(TheaterGeometry::from_columns(-1, 10).is_err());
        assert!(TheaterGeometry::new(26, 1).is_ok());
    }

    #[test]
    fn middle_seat_rounds_up() {
        assert_eq!(TheaterGeometry::new(1, 5).unwrap().middle_seat(), 3);
        assert_eq!(TheaterGeometry::new(1, 6).unwrap().middle_seat(), 3);
        assert_eq!(TheaterGeometry::new(1, 1).unwrap().middle_seat(), 1);
    }

    #[test]
    fn contains_checks_row_and_seat_bounds() {
        let geometry = TheaterGeometry::new(3, 5).unwrap();
        assert!(geometry.contains(&SeatPosition::new('A', 1)));
        assert!(geometry.contains(&SeatPosition::new('C', 5)));
        assert!(!geometry.contains(&SeatPosition::new('D', 1)));
        assert!(!geometry.contains(&SeatPosition::new('A', 0)));
        assert!(!geometry.contains(&SeatPosition::new('A', 6)));
        assert!(!geometry.contains(&SeatPosition::new('a', 1)));
    }

    #[test]
    fn row_letters_cover_geometry() {
        let geometry = TheaterGeometry::new(4, 2).unwrap();
        let letters: String = geometry.row_letters().collect();
        assert_eq!(letters, "ABCD");
        let reversed: String = geometry.row_letters().rev().collect();
        assert_eq!(reversed, "DCBA");
        assert_eq!(row_letter(25), Some('Z'));
        assert_eq!(row_letter(26), None);
    }
}

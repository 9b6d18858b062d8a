use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub room_id: i64,
    pub row: String,
    pub col: i32,
    pub seat_type_id: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SeatType {
    pub id: i64,
    pub name: String,
    pub cost: i64,
}

/// Место конкретного сеанса - то, за что конкурируют брони.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowSeat {
    pub id: i64,
    pub show_id: i64,
    pub seat_id: i64,
    pub is_booked: bool,
    pub booking_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatPosition {
    pub row: String,
    pub col: i32,
}

impl fmt::Display for SeatPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.col)
    }
}

/// Место сеанса, заблокированное внутри транзакции резервирования, с текущей ценой.
#[derive(Debug, Clone, FromRow)]
pub struct LockedSeat {
    pub show_seat_id: i64,
    pub row: String,
    pub col: i32,
    pub cost: i64,
    pub is_booked: bool,
}

impl LockedSeat {
    pub fn position(&self) -> SeatPosition {
        SeatPosition { row: self.row.clone(), col: self.col }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatMapEntry {
    pub show_seat_id: i64,
    pub row: String,
    pub col: i32,
    pub seat_type: String,
    pub cost: i64,
    pub is_booked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_position_renders_like_a_ticket() {
        let pos = SeatPosition { row: "C".into(), col: 12 };
        assert_eq!(pos.to_string(), "C12");
    }

    #[test]
    fn seat_positions_sort_row_then_column() {
        let mut seats = vec![
            SeatPosition { row: "B".into(), col: 1 },
            SeatPosition { row: "A".into(), col: 2 },
            SeatPosition { row: "A".into(), col: 1 },
        ];
        seats.sort();
        let labels: Vec<String> = seats.iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["A1", "A2", "B1"]);
    }
}

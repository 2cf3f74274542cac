use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tourdesk_core::{CoreError, CoreResult};

/// Capacities above this get a coach-style 2+2 cabin.
const COACH_THRESHOLD: u32 = 20;
const COACH_SEATS_PER_ROW: u32 = 4;
const DEFAULT_SEATS_PER_ROW: u32 = 3;

/// Where the aisle gap sits in a row, counted in seat columns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AisleIndex {
    None,
    /// Gap rendered after this zero-based seat column.
    After(u32),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutCell {
    Seat(u32),
    Aisle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverSlot {
    FrontLeft,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatPosition {
    pub row: u32,
    pub column: u32,
}

/// Seat map for one vehicle capacity, front row first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Layout {
    pub capacity: u32,
    pub seats_per_row: u32,
    pub aisle: AisleIndex,
    pub driver: DriverSlot,
    pub rows: Vec<Vec<LayoutCell>>,
}

impl Layout {
    pub fn seat_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.iter().flatten().filter_map(|cell| match cell {
            LayoutCell::Seat(n) => Some(*n),
            LayoutCell::Aisle => None,
        })
    }

    pub fn position_of(&self, seat: u32) -> Option<SeatPosition> {
        if seat < 1 || seat > self.capacity {
            return None;
        }
        let index = seat - 1;
        Some(SeatPosition {
            row: index / self.seats_per_row,
            column: index % self.seats_per_row,
        })
    }

    /// Printable seat chart: `[07]` free, `[XX]` occupied.
    pub fn render_chart(&self, occupied: &BTreeSet<u32>) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(match self.driver {
            DriverSlot::FrontLeft => "[DRV]".to_string(),
        });

        for row in &self.rows {
            let line: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    LayoutCell::Seat(n) if occupied.contains(n) => "[XX]".to_string(),
                    LayoutCell::Seat(n) => format!("[{:02}]", n),
                    LayoutCell::Aisle => "    ".to_string(),
                })
                .collect();
            lines.push(line.join(" ").trim_end().to_string());
        }

        lines.join("\n")
    }
}

/// Turns a capacity into a seat map. Pure and deterministic: the same
/// capacity always yields the same seat → position mapping.
#[derive(Debug, Clone, Default)]
pub struct SeatLayoutGenerator;

impl SeatLayoutGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn layout(&self, capacity: u32) -> CoreResult<Layout> {
        if capacity < 1 {
            return Err(CoreError::validation("capacity must be at least 1"));
        }

        // Capacities up to 20 keep three seats a row without an aisle marker,
        // minibuses included. This mirrors how the seat charts have always
        // been printed.
        let (seats_per_row, aisle) = if capacity > COACH_THRESHOLD {
            (COACH_SEATS_PER_ROW, AisleIndex::After(1))
        } else {
            (DEFAULT_SEATS_PER_ROW, AisleIndex::None)
        };

        let row_count = capacity.div_ceil(seats_per_row);
        let mut rows = Vec::with_capacity(row_count as usize);
        let mut next_seat = 1;

        for _ in 0..row_count {
            let in_row = seats_per_row.min(capacity - next_seat + 1);
            let mut row = Vec::with_capacity(in_row as usize + 1);

            for column in 0..in_row {
                row.push(LayoutCell::Seat(next_seat));
                next_seat += 1;

                if let AisleIndex::After(gap) = aisle {
                    if column == gap && column + 1 < in_row {
                        row.push(LayoutCell::Aisle);
                    }
                }
            }
            rows.push(row);
        }

        tracing::debug!(capacity, seats_per_row, rows = rows.len(), "Generated seat layout");

        Ok(Layout {
            capacity,
            seats_per_row,
            aisle,
            driver: DriverSlot::FrontLeft,
            rows,
        })
    }
}

//! Slots of the school's daily period grid.

use std::fmt;

use chrono::NaiveTime;

/// One slot of the period grid, e.g. "3rd period, 09:45 - 10:35".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    /// 1-based slot number.
    pub nr: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Period {
    pub fn new(nr: u32, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            nr,
            start_time,
            end_time,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nr)
    }
}

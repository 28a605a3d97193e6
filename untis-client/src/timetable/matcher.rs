//! Matching lesson start times to the period grid.

use crate::domain::{Period, decode_hhmm};

/// Find the grid slot that starts exactly at the packed `HHMM` time `start`.
///
/// There is no snapping to the nearest slot: a lesson starting one minute
/// after a slot begins belongs to no slot. Values that are not a time of day
/// match nothing.
pub fn match_start(grid: &[Period], start: i64) -> Option<&Period> {
    let start = decode_hhmm(start).ok()?;
    grid.iter().find(|period| period.start_time == start)
}

//! Weekly timetables.
//!
//! Turns the service's per-period records into [`Lesson`](crate::domain::Lesson)s,
//! resolving resource ids against the cached reference collections and start
//! times against the period grid.

mod matcher;
mod normalize;

pub use matcher::match_start;
pub use normalize::{Catalog, Referenced, normalize_week, referenced_kinds, week_records};

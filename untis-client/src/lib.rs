//! WebUntis timetable client.
//!
//! Logs in to a school's WebUntis server, caches the school's reference data
//! (classes, teachers, subjects, rooms and the period grid) per session and
//! turns weekly timetables into lessons with their substitutions resolved.

pub mod cache;
pub mod domain;
pub mod session;
pub mod timetable;
pub mod untis;

pub use session::UntisClient;
pub use untis::{HttpSource, UntisConfig, UntisError, UntisSource};

//! Domain types for the WebUntis client.
//!
//! These are the normalized, strongly typed counterparts of the service's
//! loosely typed JSON: reference entities, the period grid, lessons with
//! their current/original resource assignments, and the logged-in user.

mod lesson;
mod period;
mod query;
mod resource;
mod time;
mod user;

pub use lesson::{Lesson, LessonResource, LessonState};
pub use period::Period;
pub use query::{TimetableFor, TimetableQuery};
pub use resource::{
    Resource, ResourceType, Room, SchoolClass, Student, Subject, Teacher, UntisResource,
    find_by_id,
};
pub use time::{
    TimeError, decode_datetime, decode_end_datetime, decode_hhmm, decode_yyyymmdd, query_date,
};
pub use user::User;

//! WebUntis access.
//!
//! This module provides the [`UntisSource`] seam between the client core and
//! the service, its HTTP implementation and an in-memory mock.
//!
//! Key characteristics of WebUntis:
//! - Login and logout go through a JSON-RPC endpoint; everything else
//!   through the web UI's JSON API, authorized by the session cookie
//! - Dates are packed `YYYYMMDD` integers, times packed `HHMM` integers
//! - Resource ids are only meaningful within the session that produced them

mod client;
mod convert;
mod error;
pub mod mock;
mod source;
mod types;

pub use client::{HttpSource, UntisConfig};
pub use convert::{
    convert_classes, convert_period_grid, convert_rooms, convert_students, convert_subjects,
    convert_teachers, resolve_class_teachers,
};
pub use error::{BAD_CREDENTIALS_CODE, UntisError};
pub use source::UntisSource;
pub use types::{RawElement, RawPeriod, RawPeriodFlags};

//! The seam between the client core and the service.

use std::future::Future;

use chrono::NaiveDate;
use serde_json::Value;

use crate::domain::{ResourceType, TimetableFor, User};

use super::error::UntisError;

/// Raw access to a WebUntis server.
///
/// Implementations return the payloads as the service sends them, with the
/// outer response envelope already removed. Field mapping and normalization
/// happen in the core, so test doubles only need to hand back JSON.
pub trait UntisSource: Send + Sync {
    /// Log in. Wrong credentials must surface as a [`UntisError::Remote`]
    /// for which [`UntisError::is_bad_credentials`] holds.
    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<User, UntisError>> + Send;

    /// End the remote session.
    fn logout(&self) -> impl Future<Output = Result<(), UntisError>> + Send;

    /// All records of one reference collection, in service order.
    fn fetch_resource_list(
        &self,
        kind: ResourceType,
    ) -> impl Future<Output = Result<Vec<Value>, UntisError>> + Send;

    /// Rows of the period grid.
    fn fetch_period_grid(&self) -> impl Future<Output = Result<Vec<Value>, UntisError>> + Send;

    /// The weekly timetable payload for the week containing `date`.
    fn fetch_weekly_timetable(
        &self,
        target: TimetableFor,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Value, UntisError>> + Send;

    /// Students of one class, or all students the account may see.
    fn fetch_students(
        &self,
        class_id: Option<i64>,
    ) -> impl Future<Output = Result<Vec<Value>, UntisError>> + Send;
}

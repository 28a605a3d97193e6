//! The authenticated user of a session.

use super::ResourceType;

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    /// Session id returned by the service (also sent back as a cookie).
    pub session_id: String,
    /// Whether the account belongs to a student or a teacher.
    pub person_type: Option<ResourceType>,
    pub person_id: i64,
    /// Internal id of the class, for students.
    pub class_id: Option<i64>,
}

//! Timetable query parameters.

use std::fmt;

use chrono::NaiveDate;

use super::ResourceType;

/// Whose timetable to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimetableFor {
    /// A school class, by internal id.
    Class(i64),
    /// A teacher, by internal id.
    Teacher(i64),
}

impl TimetableFor {
    pub fn element_type(self) -> ResourceType {
        match self {
            Self::Class(_) => ResourceType::SchoolClass,
            Self::Teacher(_) => ResourceType::Teacher,
        }
    }

    pub fn element_id(self) -> i64 {
        match self {
            Self::Class(id) | Self::Teacher(id) => id,
        }
    }
}

impl fmt::Display for TimetableFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.element_type(), self.element_id())
    }
}

/// A weekly timetable request: the element and a date inside the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimetableQuery {
    pub target: TimetableFor,
    pub date: NaiveDate,
}

impl fmt::Display for TimetableQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (week of {})", self.target, self.date)
    }
}

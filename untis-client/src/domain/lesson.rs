//! Lessons: single dated timetable entries.
//!
//! A lesson is not a weekly recurring slot but one concrete occurrence on a
//! date. Each resource kind attached to it is a list of [`LessonResource`]
//! pairs, because a lesson can have several classes (merged groups), several
//! teachers (co-teaching) or several rooms (split labs), and any of them may
//! have been substituted.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};

use super::{Period, Resource, Room, SchoolClass, Subject, Teacher};

/// Status of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LessonState {
    #[default]
    Other = 0,
    Standard = 1,
    Cancelled = 2,
    Substitution = 3,
    /// Excursions and other school events.
    Event = 4,
    /// Moved from another slot.
    Shift = 5,
}

impl fmt::Display for LessonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Other => "other",
            Self::Standard => "standard",
            Self::Cancelled => "cancelled",
            Self::Substitution => "substitution",
            Self::Event => "event",
            Self::Shift => "shift",
        };
        f.write_str(name)
    }
}

/// The resource in effect for a lesson and the one originally scheduled.
///
/// `None` on either side means the service referenced an id that is not in
/// the cached collection (or referenced none at all).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonResource<T> {
    pub current: Option<T>,
    pub original: Option<T>,
}

impl<T: Clone> LessonResource<T> {
    /// Pair a current resource with its original.
    ///
    /// Without a resolved original the lesson was not substituted for this
    /// resource, so the original is the current one.
    pub fn new(current: Option<T>, original: Option<T>) -> Self {
        let original = original.or_else(|| current.clone());
        Self { current, original }
    }

    /// A pair where nothing changed.
    pub fn unchanged(resource: T) -> Self {
        Self {
            current: Some(resource.clone()),
            original: Some(resource),
        }
    }
}

impl<T: Resource> LessonResource<T> {
    /// Whether current and original are different resources.
    pub fn is_changed(&self) -> bool {
        match (&self.current, &self.original) {
            (Some(current), Some(original)) => current.internal_id() != original.internal_id(),
            (None, None) => false,
            _ => true,
        }
    }
}

/// One dated timetable entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    /// Grid slot this lesson starts in, if its start matches one exactly.
    pub period: Option<Period>,
    /// e.g. `AMx_1AHIF`
    pub student_group: String,
    /// Remarks such as excursion notes.
    pub lesson_text: String,
    pub period_text: String,
    pub state: LessonState,
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
    pub classes: Vec<LessonResource<SchoolClass>>,
    pub teachers: Vec<LessonResource<Teacher>>,
    pub subjects: Vec<LessonResource<Subject>>,
    pub rooms: Vec<LessonResource<Room>>,
}

impl Lesson {
    pub fn date(&self) -> NaiveDate {
        self.begin.date()
    }

    pub fn weekday(&self) -> Weekday {
        self.begin.weekday()
    }

    /// Current class of the first class entry.
    pub fn class(&self) -> Option<&SchoolClass> {
        first_current(&self.classes)
    }

    pub fn teacher(&self) -> Option<&Teacher> {
        first_current(&self.teachers)
    }

    pub fn subject(&self) -> Option<&Subject> {
        first_current(&self.subjects)
    }

    pub fn room(&self) -> Option<&Room> {
        first_current(&self.rooms)
    }

    /// Current class codes, comma separated.
    pub fn class_names(&self) -> String {
        join_current_names(&self.classes)
    }

    pub fn teacher_names(&self) -> String {
        join_current_names(&self.teachers)
    }

    pub fn subject_names(&self) -> String {
        join_current_names(&self.subjects)
    }

    pub fn room_names(&self) -> String {
        join_current_names(&self.rooms)
    }
}

fn first_current<T>(resources: &[LessonResource<T>]) -> Option<&T> {
    resources.first().and_then(|r| r.current.as_ref())
}

fn join_current_names<T: Resource>(resources: &[LessonResource<T>]) -> String {
    resources
        .iter()
        .map(|r| r.current.as_ref().map(|c| c.unique_name()).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(",")
}

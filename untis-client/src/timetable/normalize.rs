//! Normalization of weekly timetable payloads into lessons.
//!
//! The service sends one week as `result.data.elementPeriods`, an object
//! mapping the queried element's id to its per-period records. Each record
//! carries packed date/time values, status flags and a list of resource
//! references (`type`, `id`, optional `orgId`). Records are resolved against
//! the cached reference collections; a record that cannot be read is skipped
//! with a warning instead of failing the week.

use serde::Deserialize;
use serde_json::Value;
use tracing::{trace, warn};

use crate::domain::{
    Lesson, LessonResource, LessonState, Period, Resource, ResourceType, Room, SchoolClass,
    Subject, Teacher, TimeError, TimetableQuery, decode_datetime, decode_end_datetime,
    find_by_id,
};
use crate::untis::{RawElement, RawPeriod, RawPeriodFlags, UntisError};

use super::matcher::match_start;

/// Why a single timetable record was skipped.
#[derive(Debug, thiserror::Error)]
enum RecordError {
    #[error("malformed record: {0}")]
    Shape(#[from] serde_json::Error),

    #[error(transparent)]
    Time(#[from] TimeError),
}

/// Reference collections a week is resolved against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog<'a> {
    pub classes: &'a [SchoolClass],
    pub teachers: &'a [Teacher],
    pub subjects: &'a [Subject],
    pub rooms: &'a [Room],
    pub periods: &'a [Period],
}

/// Which reference collections a batch of records needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Referenced {
    pub classes: bool,
    pub teachers: bool,
    pub subjects: bool,
    pub rooms: bool,
    pub periods: bool,
}

/// Extract the per-period records of the queried element from a weekly
/// payload.
///
/// The entry keyed by the queried element's id is used; if there is none, the
/// first entry is. An empty `elementPeriods` object is an empty week.
pub fn week_records<'a>(
    payload: &'a Value,
    query: &TimetableQuery,
) -> Result<&'a [Value], UntisError> {
    let invalid = |reason: &str| UntisError::InvalidTimetable {
        query: *query,
        reason: reason.to_string(),
    };

    let periods = payload
        .pointer("/result/data/elementPeriods")
        .ok_or_else(|| invalid("missing `result.data.elementPeriods`"))?
        .as_object()
        .ok_or_else(|| invalid("`elementPeriods` is not an object"))?;

    let key = query.target.element_id().to_string();
    let entry = match periods.get(&key) {
        Some(entry) => entry,
        None => match periods.values().next() {
            Some(entry) => entry,
            // No element has any periods this week.
            None => return Ok(&[]),
        },
    };

    entry
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| invalid("element entry is not an array"))
}

/// Work out which collections `records` reference.
///
/// Reads the element kinds leniently: records too broken to read are skipped
/// later anyway, so they need nothing.
pub fn referenced_kinds(records: &[Value]) -> Referenced {
    let mut referenced = Referenced {
        periods: !records.is_empty(),
        ..Referenced::default()
    };

    let kinds = records
        .iter()
        .filter_map(|record| record.get("elements")?.as_array())
        .flatten()
        .filter_map(|element| element.get("type")?.as_i64())
        .filter_map(ResourceType::from_code);

    for kind in kinds {
        match kind {
            ResourceType::SchoolClass => referenced.classes = true,
            ResourceType::Teacher => referenced.teachers = true,
            ResourceType::Subject => referenced.subjects = true,
            ResourceType::Room => referenced.rooms = true,
            ResourceType::Student | ResourceType::Timetable => {}
        }
    }

    referenced
}

/// Turn a week's records into lessons, in input order.
pub fn normalize_week(records: &[Value], catalog: &Catalog<'_>) -> Vec<Lesson> {
    records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| match normalize_record(record, catalog) {
            Ok(lesson) => Some(lesson),
            Err(e) => {
                warn!(record = idx, error = %e, "skipping timetable record");
                None
            }
        })
        .collect()
}

fn normalize_record(record: &Value, catalog: &Catalog<'_>) -> Result<Lesson, RecordError> {
    let raw = RawPeriod::deserialize(record)?;

    let begin = decode_datetime(raw.date, raw.start_time)?;
    let end = decode_end_datetime(raw.date, raw.end_time)?;

    let mut lesson = Lesson {
        period: match_start(catalog.periods, raw.start_time).copied(),
        student_group: raw.student_group.unwrap_or_default(),
        lesson_text: raw.lesson_text.unwrap_or_default(),
        period_text: raw.period_text.unwrap_or_default(),
        state: lesson_state(&raw.is),
        begin,
        end,
        classes: Vec::new(),
        teachers: Vec::new(),
        subjects: Vec::new(),
        rooms: Vec::new(),
    };

    for element in &raw.elements {
        match ResourceType::from_code(element.kind) {
            Some(ResourceType::SchoolClass) => {
                lesson.classes.push(resolve_pair(catalog.classes, element));
            }
            Some(ResourceType::Teacher) => {
                lesson.teachers.push(resolve_pair(catalog.teachers, element));
            }
            Some(ResourceType::Subject) => {
                lesson.subjects.push(resolve_pair(catalog.subjects, element));
            }
            Some(ResourceType::Room) => {
                lesson.rooms.push(resolve_pair(catalog.rooms, element));
            }
            _ => trace!(kind = element.kind, "ignoring element"),
        }
    }

    trace!(begin = %lesson.begin, state = %lesson.state, "lesson");
    Ok(lesson)
}

/// Status of a record. The first set flag in this order wins.
fn lesson_state(flags: &RawPeriodFlags) -> LessonState {
    let ordered = [
        (flags.event, LessonState::Event),
        (flags.substitution, LessonState::Substitution),
        (flags.shift, LessonState::Shift),
        (flags.standard, LessonState::Standard),
        (flags.cancelled, LessonState::Cancelled),
    ];

    ordered
        .into_iter()
        .find_map(|(flag, state)| (flag == Some(true)).then_some(state))
        .unwrap_or_default()
}

fn resolve_pair<T: Resource + Clone>(items: &[T], element: &RawElement) -> LessonResource<T> {
    let lookup = |id: Option<i64>| id.and_then(|id| find_by_id(items, id)).cloned();
    LessonResource::new(lookup(element.id), lookup(element.org_id))
}

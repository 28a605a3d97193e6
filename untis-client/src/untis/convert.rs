//! Conversion from WebUntis DTOs to domain types.
//!
//! Reference collections are converted all-or-nothing: a single record that
//! does not deserialize fails the whole collection, because a cached list
//! with silent holes would make later id lookups lie.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{
    Period, ResourceType, Room, SchoolClass, Student, Subject, Teacher, UntisResource,
    decode_hhmm,
};

use super::error::UntisError;
use super::types::{RawClassTeacher, RawPeriodRow, RawResource};

/// Deserialize every record of a listing.
fn parse_records<T: DeserializeOwned>(method: &str, rows: Vec<Value>) -> Result<Vec<T>, UntisError> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            serde_json::from_value(row)
                .map_err(|e| UntisError::protocol(method, format!("record {idx}: {e}")))
        })
        .collect()
}

fn base(raw: &RawResource, kind: ResourceType) -> UntisResource {
    UntisResource {
        kind,
        internal_id: raw.id,
        unique_name: raw.name.clone().unwrap_or_default(),
        display_name: raw.display_name.clone().unwrap_or_default(),
        long_name: raw.long_name.clone().unwrap_or_default(),
        alternate_name: raw.alternate_name.clone().filter(|s| !s.is_empty()),
    }
}

/// Partial teacher built from the reference embedded in a class record.
fn class_teacher_placeholder(raw: RawClassTeacher) -> Teacher {
    let resource = UntisResource::new(
        ResourceType::Teacher,
        raw.id.unwrap_or_default(),
        raw.name.unwrap_or_default(),
    )
    .with_long_name(raw.long_name.unwrap_or_default());
    Teacher { resource }
}

pub fn convert_classes(rows: Vec<Value>) -> Result<Vec<SchoolClass>, UntisError> {
    let raws: Vec<RawResource> = parse_records("classes", rows)?;
    Ok(raws
        .into_iter()
        .map(|raw| SchoolClass {
            resource: base(&raw, ResourceType::SchoolClass),
            description: raw.description.unwrap_or_default(),
            class_teacher: raw.class_teacher.map(class_teacher_placeholder),
        })
        .collect())
}

pub fn convert_teachers(rows: Vec<Value>) -> Result<Vec<Teacher>, UntisError> {
    let raws: Vec<RawResource> = parse_records("teachers", rows)?;
    Ok(raws
        .iter()
        .map(|raw| Teacher {
            resource: base(raw, ResourceType::Teacher),
        })
        .collect())
}

pub fn convert_subjects(rows: Vec<Value>) -> Result<Vec<Subject>, UntisError> {
    let raws: Vec<RawResource> = parse_records("subjects", rows)?;
    Ok(raws
        .iter()
        .map(|raw| Subject {
            resource: base(raw, ResourceType::Subject),
        })
        .collect())
}

pub fn convert_rooms(rows: Vec<Value>) -> Result<Vec<Room>, UntisError> {
    let raws: Vec<RawResource> = parse_records("rooms", rows)?;
    Ok(raws
        .into_iter()
        .map(|raw| Room {
            resource: base(&raw, ResourceType::Room),
            description: raw.description.unwrap_or_default(),
            capacity: raw.capacity,
        })
        .collect())
}

pub fn convert_students(rows: Vec<Value>) -> Result<Vec<Student>, UntisError> {
    let raws: Vec<RawResource> = parse_records("students", rows)?;
    Ok(raws
        .into_iter()
        .map(|raw| Student {
            resource: base(&raw, ResourceType::Student),
            fore_name: raw.fore_name.unwrap_or_default(),
            extern_key: raw.extern_key.unwrap_or_default(),
            school_class_id: raw.klasse_id,
        })
        .collect())
}

/// Convert the `timegrid` rows into periods.
pub fn convert_period_grid(rows: Vec<Value>) -> Result<Vec<Period>, UntisError> {
    let raws: Vec<RawPeriodRow> = parse_records("timegrid", rows)?;
    raws.into_iter()
        .map(|row| {
            let start = decode_hhmm(row.start_time)
                .map_err(|e| UntisError::protocol("timegrid", format!("period {}: {e}", row.period)))?;
            let end = decode_hhmm(row.end_time)
                .map_err(|e| UntisError::protocol("timegrid", format!("period {}: {e}", row.period)))?;
            Ok(Period::new(row.period, start, end))
        })
        .collect()
}

/// Replace each class's partial head-teacher record with the matching
/// teacher, matched by short code. Classes without a match keep the partial
/// record.
pub fn resolve_class_teachers(classes: Vec<SchoolClass>, teachers: &[Teacher]) -> Vec<SchoolClass> {
    classes
        .into_iter()
        .map(|mut class| {
            if let Some(placeholder) = &class.class_teacher
                && let Some(teacher) = teachers
                    .iter()
                    .find(|t| t.resource.unique_name == placeholder.resource.unique_name)
            {
                class.class_teacher = Some(teacher.clone());
            }
            class
        })
        .collect()
}

//! WebUntis response DTOs.
//!
//! These types map the service's JSON onto Rust. The service is inconsistent
//! about casing (`longName` next to `displayname`) and omits or nulls fields
//! freely, so nearly everything is optional.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Element of a `pageconfig` listing (class, teacher, subject, room, student).
#[derive(Debug, Clone, Deserialize)]
pub struct RawResource {
    /// Internal id.
    pub id: i64,

    /// Short code.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "longName", alias = "longname", default)]
    pub long_name: Option<String>,

    #[serde(rename = "displayname", alias = "displayName", default)]
    pub display_name: Option<String>,

    #[serde(rename = "alternatename", alias = "alternateName", default)]
    pub alternate_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Head teacher of a class, as a partial teacher record.
    #[serde(rename = "classteacher", alias = "classTeacher", default)]
    pub class_teacher: Option<RawClassTeacher>,

    /// Seats in a room.
    #[serde(default)]
    pub capacity: Option<u32>,

    /// First name of a student.
    #[serde(rename = "forename", alias = "foreName", default)]
    pub fore_name: Option<String>,

    #[serde(rename = "externKey", default)]
    pub extern_key: Option<String>,

    /// Class of a student.
    #[serde(rename = "klasseId", default)]
    pub klasse_id: Option<i64>,
}

/// Head teacher reference embedded in a class record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClassTeacher {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "longName", alias = "longname", default)]
    pub long_name: Option<String>,
}

/// Row of the `timegrid` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPeriodRow {
    pub period: u32,
    /// Packed `HHMM`.
    pub start_time: i64,
    /// Packed `HHMM`.
    pub end_time: i64,
}

/// One per-period record of a weekly timetable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPeriod {
    /// Packed `YYYYMMDD`.
    pub date: i64,
    /// Packed `HHMM`.
    pub start_time: i64,
    /// Packed `HHMM`.
    pub end_time: i64,
    #[serde(default)]
    pub student_group: Option<String>,
    #[serde(default)]
    pub lesson_text: Option<String>,
    #[serde(default)]
    pub period_text: Option<String>,
    pub is: RawPeriodFlags,
    pub elements: Vec<RawElement>,
}

/// Status flags of a timetable record. Absent flags count as false.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPeriodFlags {
    #[serde(default)]
    pub standard: Option<bool>,
    #[serde(default)]
    pub cancelled: Option<bool>,
    #[serde(default)]
    pub substitution: Option<bool>,
    #[serde(default)]
    pub shift: Option<bool>,
    #[serde(default)]
    pub event: Option<bool>,
}

/// Resource reference inside a timetable record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    /// Resource kind code.
    #[serde(rename = "type")]
    pub kind: i64,
    /// Resource currently in effect.
    #[serde(default)]
    pub id: Option<i64>,
    /// Originally scheduled resource, when substituted.
    #[serde(default)]
    pub org_id: Option<i64>,
}

/// JSON-RPC request body.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

/// JSON-RPC response body.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    /// `None` when the member is absent. An explicit `null` is `Some(Null)`.
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Parameters of the `authenticate` call.
#[derive(Debug, Serialize)]
pub struct AuthParams<'a> {
    pub user: &'a str,
    pub password: &'a str,
    pub client: &'a str,
}

/// Result of the `authenticate` call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    pub session_id: String,
    #[serde(default)]
    pub person_type: Option<i64>,
    #[serde(default)]
    pub person_id: Option<i64>,
    #[serde(default)]
    pub klasse_id: Option<i64>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timetable as listed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    pub id: i64,
    pub name: String,
    pub semester: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single scheduled slot within a timetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: i64,
    #[serde(rename = "courseName")]
    pub course_name: String,
    pub room: Option<String>,
    /// 0 = Monday through 6 = Sunday.
    #[serde(rename = "dayOfWeek")]
    pub day_of_week: i32,
    #[serde(rename = "startsAt")]
    pub starts_at: String,
    #[serde(rename = "endsAt")]
    pub ends_at: String,
}

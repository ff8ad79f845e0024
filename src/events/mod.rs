//! Attendance event domain types.

mod normalizer;

use serde::{Deserialize, Serialize};

pub use normalizer::normalize_payload;

/// Kind of attendance event pushed by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceEventType {
    #[serde(rename = "CheckIn")]
    CheckIn,
    #[serde(rename = "CheckOut")]
    CheckOut,
}

impl std::fmt::Display for AttendanceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceEventType::CheckIn => write!(f, "CheckIn"),
            AttendanceEventType::CheckOut => write!(f, "CheckOut"),
        }
    }
}

/// Staff member that recorded an attendance entry, when the server knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedBy {
    pub user_id: Option<i64>,
    pub user_name: String,
    pub email: String,
    pub role: String,
}

/// One attendance record as delivered by the hub.
///
/// `date` and the check-in/check-out times are kept as opaque strings; this
/// client does not interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub member_id: i64,
    pub member_identifier: String,
    pub member_name: String,
    pub date: String,
    pub check_in_time: String,
    pub check_out_time: Option<String>,
    pub duration_minutes: f64,
    pub status: String,
    pub mode: String,
    pub photo_path: Option<String>,
    pub recorded_by: Option<RecordedBy>,
}

/// A strictly-typed attendance event derived from a loosely-typed hub push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    pub event_type: AttendanceEventType,
    pub timestamp: String,
    pub record: AttendanceRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_camel_case_names() {
        let event = AttendanceEvent {
            event_type: AttendanceEventType::CheckIn,
            timestamp: "2024-01-01T09:00:00Z".to_string(),
            record: AttendanceRecord {
                id: 10,
                member_id: 3,
                member_identifier: "M-0003".to_string(),
                member_name: "Jo Soap".to_string(),
                date: "2024-01-01".to_string(),
                check_in_time: "09:00".to_string(),
                check_out_time: None,
                duration_minutes: 0.0,
                status: "present".to_string(),
                mode: "manual".to_string(),
                photo_path: None,
                recorded_by: None,
            },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "CheckIn");
        assert_eq!(json["record"]["memberId"], 3);
        assert_eq!(json["record"]["checkInTime"], "09:00");
    }
}

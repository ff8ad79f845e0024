//! Defensive normalization of inbound hub payloads.
//!
//! The hub contract is loose: event types have accumulated several spellings,
//! the record may sit under different keys, and numeric fields arrive as
//! numbers or strings depending on the server version. Everything that cannot
//! be normalized into a complete [`AttendanceEvent`] is discarded whole;
//! a partially-filled event is never produced.

use serde_json::{Map, Value};

use super::{AttendanceEvent, AttendanceEventType, AttendanceRecord, RecordedBy};

/// Convert an untyped push payload into an [`AttendanceEvent`], or `None` if
/// the payload is not a recognizable attendance event.
pub fn normalize_payload(payload: &Value) -> Option<AttendanceEvent> {
    let event_type = event_type_of(payload)?;
    let body = record_body(payload)?;

    // id and memberId gate the whole event: both must be finite numbers.
    let id = int_field(body, &["id"])?;
    let member_id = int_field(body, &["memberId", "member_id"])?;

    let record = AttendanceRecord {
        id,
        member_id,
        member_identifier: string_field(body, &["memberIdentifier", "member_identifier"]),
        member_name: string_field(body, &["memberName", "member_name"]),
        date: string_field(body, &["date"]),
        check_in_time: string_field(body, &["checkInTime", "check_in_time"]),
        check_out_time: opt_string_field(body, &["checkOutTime", "check_out_time"]),
        duration_minutes: number_field(body, &["durationMinutes", "duration_minutes"])
            .unwrap_or(0.0),
        status: string_field(body, &["status"]),
        mode: string_field(body, &["mode"]),
        photo_path: opt_string_field(body, &["photoPath", "photo_path"]),
        recorded_by: recorded_by_of(body),
    };

    let timestamp = payload
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    Some(AttendanceEvent {
        event_type,
        timestamp,
        record,
    })
}

/// Resolve the event type from any of its historical field names and
/// spellings.
fn event_type_of(payload: &Value) -> Option<AttendanceEventType> {
    let raw = ["eventType", "event_type", "type"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))?;

    // "CheckIn", "check-in" and "check_in" all collapse to the same form
    let canonical = raw.trim().to_ascii_lowercase().replace('-', "_");
    match canonical.as_str() {
        "check_in" | "checkin" => Some(AttendanceEventType::CheckIn),
        "check_out" | "checkout" => Some(AttendanceEventType::CheckOut),
        _ => None,
    }
}

/// The record object may be nested under several keys; the first present
/// object wins.
fn record_body(payload: &Value) -> Option<&Map<String, Value>> {
    ["data", "attendance", "record"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_object))
}

fn recorded_by_of(body: &Map<String, Value>) -> Option<RecordedBy> {
    let nested = ["recordedBy", "recorded_by"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_object))?;

    Some(RecordedBy {
        user_id: int_field(nested, &["userId", "user_id"]),
        user_name: string_field(nested, &["userName", "user_name"]),
        email: string_field(nested, &["email"]),
        role: string_field(nested, &["role"]),
    })
}

/// A numeric field that may arrive as a JSON number or a numeric string.
/// Non-finite values are rejected.
fn number_field(body: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    let value = keys.iter().find_map(|key| body.get(*key))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

fn int_field(body: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    number_field(body, keys).map(|n| n as i64)
}

/// String field coerced to `""` when missing or not a string.
fn string_field(body: &Map<String, Value>, keys: &[&str]) -> String {
    opt_string_field(body, keys).unwrap_or_default()
}

fn opt_string_field(body: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| body.get(*key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalizes_check_in_with_string_ids() {
        let payload = json!({
            "eventType": "check-in",
            "data": {
                "id": "10",
                "memberId": "3",
                "date": "2024-01-01",
                "checkInTime": "09:00"
            }
        });

        let event = normalize_payload(&payload).expect("payload should normalize");
        assert_eq!(event.event_type, AttendanceEventType::CheckIn);
        assert_eq!(event.record.id, 10);
        assert_eq!(event.record.member_id, 3);
        assert_eq!(event.record.date, "2024-01-01");
        assert_eq!(event.record.check_in_time, "09:00");
    }

    #[test]
    fn test_accepts_event_type_spelling_variants() {
        for spelling in ["CheckIn", "check_in", "CHECK-IN", "checkin"] {
            let payload = json!({
                "type": spelling,
                "record": { "id": 1, "memberId": 2 }
            });
            let event = normalize_payload(&payload).unwrap();
            assert_eq!(event.event_type, AttendanceEventType::CheckIn);
        }

        for spelling in ["CheckOut", "check-out", "checkout"] {
            let payload = json!({
                "event_type": spelling,
                "data": { "id": 1, "memberId": 2 }
            });
            let event = normalize_payload(&payload).unwrap();
            assert_eq!(event.event_type, AttendanceEventType::CheckOut);
        }
    }

    #[test]
    fn test_rejects_non_numeric_id() {
        let payload = json!({
            "eventType": "CheckIn",
            "data": { "id": "abc", "memberId": "3" }
        });
        assert!(normalize_payload(&payload).is_none());
    }

    #[test]
    fn test_rejects_missing_member_id() {
        let payload = json!({
            "eventType": "CheckIn",
            "data": { "id": 10 }
        });
        assert!(normalize_payload(&payload).is_none());
    }

    #[test]
    fn test_rejects_unknown_event_type() {
        let payload = json!({
            "eventType": "membership-renewed",
            "data": { "id": 10, "memberId": 3 }
        });
        assert!(normalize_payload(&payload).is_none());

        let no_type = json!({ "data": { "id": 10, "memberId": 3 } });
        assert!(normalize_payload(&no_type).is_none());
    }

    #[test]
    fn test_first_present_record_container_wins() {
        let payload = json!({
            "eventType": "CheckIn",
            "data": { "id": 1, "memberId": 2, "memberName": "from data" },
            "attendance": { "id": 9, "memberId": 9, "memberName": "from attendance" }
        });
        let event = normalize_payload(&payload).unwrap();
        assert_eq!(event.record.member_name, "from data");

        let attendance_only = json!({
            "eventType": "CheckIn",
            "attendance": { "id": 5, "memberId": 6 }
        });
        assert_eq!(normalize_payload(&attendance_only).unwrap().record.id, 5);
    }

    #[test]
    fn test_missing_fields_coerce_to_defaults() {
        let payload = json!({
            "eventType": "CheckOut",
            "record": { "id": 4, "memberId": 7 }
        });

        let event = normalize_payload(&payload).unwrap();
        assert_eq!(event.record.member_name, "");
        assert_eq!(event.record.status, "");
        assert_eq!(event.record.duration_minutes, 0.0);
        assert!(event.record.check_out_time.is_none());
        assert!(event.record.photo_path.is_none());
        assert!(event.record.recorded_by.is_none());
        // fallback timestamp is still populated
        assert!(!event.timestamp.is_empty());
    }

    #[test]
    fn test_snake_case_record_fields_accepted() {
        let payload = json!({
            "eventType": "CheckIn",
            "timestamp": "2024-03-02T08:15:00Z",
            "data": {
                "id": 42,
                "member_id": 8,
                "member_name": "Sam Lifter",
                "check_in_time": "08:15",
                "duration_minutes": "12.5",
                "recorded_by": { "user_id": 2, "user_name": "reception", "email": "", "role": "staff" }
            }
        });

        let event = normalize_payload(&payload).unwrap();
        assert_eq!(event.timestamp, "2024-03-02T08:15:00Z");
        assert_eq!(event.record.member_id, 8);
        assert_eq!(event.record.member_name, "Sam Lifter");
        assert_eq!(event.record.duration_minutes, 12.5);
        let recorded_by = event.record.recorded_by.unwrap();
        assert_eq!(recorded_by.user_id, Some(2));
        assert_eq!(recorded_by.user_name, "reception");
    }

    #[test]
    fn test_non_object_payloads_are_discarded() {
        assert!(normalize_payload(&json!(null)).is_none());
        assert!(normalize_payload(&json!("check-in")).is_none());
        assert!(normalize_payload(&json!([1, 2, 3])).is_none());
        assert!(normalize_payload(&json!({ "eventType": "CheckIn" })).is_none());
    }
}

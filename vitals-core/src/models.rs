//! Records exchanged between devices, the kernel and monitoring sessions.

use crate::status::{HasStatus, Status};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

/// One vitals packet from a wearable. Channels the device did not report stay `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VitalsReading {
    #[serde(rename = "deviceId", alias = "deviceID")]
    pub device_id: String,
    /// ISO-8601, as sent by the device. Not guaranteed monotonic or unique.
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "heartRate", alias = "HR", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(rename = "o2Sat", alias = "SpO2", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub spo2: Option<f64>,
    #[serde(rename = "skinTemp", alias = "Temp", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub skin_temp: Option<f64>,
    #[serde(rename = "accX", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub acc_x: Option<f64>,
    #[serde(rename = "accY", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub acc_y: Option<f64>,
    #[serde(rename = "accZ", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub acc_z: Option<f64>,
    #[serde(rename = "gyroX", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub gyro_x: Option<f64>,
    #[serde(rename = "gyroY", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub gyro_y: Option<f64>,
    #[serde(rename = "gyroZ", default, deserialize_with = "lenient_channel", skip_serializing_if = "Option::is_none")]
    pub gyro_z: Option<f64>,
}

/// Numbers and numeric strings are accepted; anything else (or a non-finite value) is absent.
fn lenient_channel<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let value = match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}

/// Active pairing of a patient with a monitoring device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "patientId")]
    pub patient_id: String,
    #[serde(rename = "deviceId", alias = "deviceID")]
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Registration time; vitals older than this belong to a previous wearer.
    pub timestamp: String,
    #[serde(default)]
    pub status: Status,
}

impl Assignment {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or(&self.patient_id)
    }
}

impl HasStatus for Assignment {
    fn status(&self) -> Status {
        self.status
    }
}

/// Registration request body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    #[serde(rename = "patientId")]
    pub patient_id: String,
    #[serde(rename = "deviceId", alias = "deviceID")]
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Recent readings for one device, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceVitals {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub readings: Vec<VitalsReading>,
}

/// One line of the audit trail (administrative or data event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// A critical transition detected by a monitoring session. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub patient_id: String,
    pub patient_name: String,
    pub detected_at: OffsetDateTime,
}

/// Current UTC time in the RFC 3339 form used for every stored timestamp.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// RFC 3339, or ISO-8601 without an offset (taken as UTC).
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    OffsetDateTime::parse(value, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(value, &Iso8601::DEFAULT))
        .or_else(|_| PrimitiveDateTime::parse(value, &Iso8601::DEFAULT).map(PrimitiveDateTime::assume_utc))
        .ok()
}

/// Total order over stored timestamps: parseable values by instant, above
/// every unparseable one; unparseable values among themselves by string.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (None, None) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

pub fn is_after(candidate: &str, threshold: &str) -> bool {
    compare_timestamps(candidate, threshold) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_accepts_both_field_spellings() {
        let a: VitalsReading = serde_json::from_str(
            r#"{"deviceID": "w-1", "timestamp": "2025-03-01T10:00:00Z", "heartRate": 72, "o2Sat": 97.5}"#,
        )
        .unwrap();
        let b: VitalsReading = serde_json::from_str(
            r#"{"deviceId": "w-1", "timestamp": "2025-03-01T10:00:00Z", "HR": 72, "SpO2": 97.5}"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.heart_rate, Some(72.0));
    }

    #[test]
    fn test_missing_and_garbage_channels_are_absent() {
        let r: VitalsReading = serde_json::from_str(
            r#"{"deviceId": "w-1", "timestamp": "t", "heartRate": "n/a", "skinTemp": "36.6", "accX": null}"#,
        )
        .unwrap();
        assert_eq!(r.heart_rate, None);
        assert_eq!(r.skin_temp, Some(36.6));
        assert_eq!(r.acc_x, None);
        assert_eq!(r.spo2, None);

        let out = serde_json::to_value(&r).unwrap();
        assert!(out.get("heartRate").is_none());
        assert!(out.get("o2Sat").is_none());
        assert_eq!(out["skinTemp"], 36.6);
    }

    #[test]
    fn test_assignment_without_status_is_unknown() {
        let a: Assignment = serde_json::from_str(
            r#"{"patientId": "p1", "deviceID": "w-1", "timestamp": "2025-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(a.status, Status::Unknown);
        assert_eq!(a.display_name(), "p1");
    }

    #[test]
    fn test_timestamp_comparison() {
        // same instant, different offsets
        assert_eq!(
            compare_timestamps("2025-03-01T10:00:00Z", "2025-03-01T11:00:00+01:00"),
            Ordering::Equal
        );
        assert!(is_after("2025-03-01T10:00:00.500Z", "2025-03-01T10:00:00Z"));
        assert!(!is_after("2025-03-01T10:00:00Z", "2025-03-01T10:00:00Z"));
        // unparseable values fall back to string order, below any real instant
        assert!(is_after("b", "a"));
        assert!(is_after("2025-03-01T10:00:00Z", "zzz"));
    }

    #[test]
    fn test_zoneless_timestamps_are_utc() {
        assert_eq!(
            parse_timestamp("2025-03-01T10:00:00.7"),
            parse_timestamp("2025-03-01T10:00:00.700Z")
        );
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_mixed_timestamp_forms_order_transitively() {
        let a = "2025-03-01T10:00:00Z";
        let b = "2025-03-01T10:00:00.5Z";
        let c = "2025-03-01T10:00:00.7";
        let junk = "garbage";

        assert_eq!(compare_timestamps(a, b), Ordering::Less);
        assert_eq!(compare_timestamps(b, c), Ordering::Less);
        assert_eq!(compare_timestamps(a, c), Ordering::Less);
        for ts in [a, b, c] {
            assert_eq!(compare_timestamps(junk, ts), Ordering::Less);
            assert_eq!(compare_timestamps(ts, junk), Ordering::Greater);
        }
    }
}

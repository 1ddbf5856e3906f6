//! Canonical event model shared by the live window, recorder and exporter.
//!
//! Serialized field names are camelCase (`sensorType`, `previousActivity`,
//! `activitySwitch`) so that structured exports read the same as the stream
//! relay records.

use crate::collector::types::SensorType;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Sensor-specific payload. Exactly one shape per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Vector { x: f64, y: f64, z: f64 },
    Quaternion { quaternion: [f64; 4] },
    Illuminance { illuminance: f64 },
    Euler { alpha: f64, beta: f64, gamma: f64 },
}

impl Payload {
    pub const IDENTITY_QUATERNION: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

    pub fn x(&self) -> Option<f64> {
        match self {
            Payload::Vector { x, .. } => Some(*x),
            _ => None,
        }
    }

    pub fn y(&self) -> Option<f64> {
        match self {
            Payload::Vector { y, .. } => Some(*y),
            _ => None,
        }
    }

    pub fn z(&self) -> Option<f64> {
        match self {
            Payload::Vector { z, .. } => Some(*z),
            _ => None,
        }
    }

    pub fn alpha(&self) -> Option<f64> {
        match self {
            Payload::Euler { alpha, .. } => Some(*alpha),
            _ => None,
        }
    }

    pub fn beta(&self) -> Option<f64> {
        match self {
            Payload::Euler { beta, .. } => Some(*beta),
            _ => None,
        }
    }

    pub fn gamma(&self) -> Option<f64> {
        match self {
            Payload::Euler { gamma, .. } => Some(*gamma),
            _ => None,
        }
    }

    pub fn quaternion(&self) -> Option<[f64; 4]> {
        match self {
            Payload::Quaternion { quaternion } => Some(*quaternion),
            _ => None,
        }
    }

    pub fn illuminance(&self) -> Option<f64> {
        match self {
            Payload::Illuminance { illuminance } => Some(*illuminance),
            _ => None,
        }
    }
}

/// One normalized sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    /// Milliseconds since the Unix epoch, stamped at normalization
    pub timestamp: i64,
    /// Activity label active at capture; empty before one is chosen
    pub activity: String,
    pub sensor_type: SensorType,
    #[serde(flatten)]
    pub payload: Payload,
}

/// In-band marker recorded when the activity changes mid-session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySwitchMarker {
    pub timestamp: i64,
    /// The new activity
    pub activity: String,
    pub previous_activity: String,
    /// Always `true`; lets consumers of the serialized form tell markers apart
    pub activity_switch: bool,
}

impl ActivitySwitchMarker {
    pub fn new(timestamp: i64, previous: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            timestamp,
            activity: activity.into(),
            previous_activity: previous.into(),
            activity_switch: true,
        }
    }
}

/// One entry of a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionEntry {
    // Listed first: a reading never carries `previousActivity`
    Switch(ActivitySwitchMarker),
    Reading(CanonicalEvent),
}

impl SessionEntry {
    pub fn timestamp(&self) -> i64 {
        match self {
            SessionEntry::Switch(m) => m.timestamp,
            SessionEntry::Reading(e) => e.timestamp,
        }
    }

    pub fn activity(&self) -> &str {
        match self {
            SessionEntry::Switch(m) => &m.activity,
            SessionEntry::Reading(e) => &e.activity,
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(self, SessionEntry::Switch(_))
    }

    pub fn as_reading(&self) -> Option<&CanonicalEvent> {
        match self {
            SessionEntry::Reading(e) => Some(e),
            SessionEntry::Switch(_) => None,
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// ISO-8601 rendering with millisecond precision, e.g. `2024-01-22T10:00:01.250Z`.
pub fn iso_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel(ts: i64) -> CanonicalEvent {
        CanonicalEvent {
            timestamp: ts,
            activity: "Walking".to_string(),
            sensor_type: SensorType::Accelerometer,
            payload: Payload::Vector {
                x: 1.0,
                y: 0.0,
                z: 9.8,
            },
        }
    }

    #[test]
    fn test_event_serializes_flat() {
        let json = serde_json::to_value(accel(5)).unwrap();
        assert_eq!(json["sensorType"], "accelerometer");
        assert_eq!(json["x"], 1.0);
        assert_eq!(json["z"], 9.8);
        assert!(json.get("alpha").is_none());
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn test_entries_deserialize_to_the_right_variant() {
        let entries = vec![
            SessionEntry::Reading(accel(1)),
            SessionEntry::Switch(ActivitySwitchMarker::new(2, "Walking", "Running")),
            SessionEntry::Reading(CanonicalEvent {
                timestamp: 3,
                activity: "Running".to_string(),
                sensor_type: SensorType::RelativeOrientation,
                payload: Payload::Quaternion {
                    quaternion: Payload::IDENTITY_QUATERNION,
                },
            }),
            SessionEntry::Reading(CanonicalEvent {
                timestamp: 4,
                activity: "Running".to_string(),
                sensor_type: SensorType::Orientation,
                payload: Payload::Euler {
                    alpha: 0.0,
                    beta: 12.5,
                    gamma: -3.0,
                },
            }),
        ];
        let json = serde_json::to_string(&entries).unwrap();
        let back: Vec<SessionEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entries);
        assert!(back[1].is_switch());
    }

    #[test]
    fn test_payload_accessors_distinguish_absent_from_zero() {
        let p = Payload::Vector {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        assert_eq!(p.x(), Some(0.0));
        assert_eq!(p.alpha(), None);
        assert_eq!(p.quaternion(), None);
    }

    #[test]
    fn test_iso_timestamp() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_705_917_601_250), "2024-01-22T10:00:01.250Z");
    }
}

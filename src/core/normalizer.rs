//! Raw reading → canonical event conversion.
//!
//! Normalization never fails. The payload shape is decided by the sensor type;
//! whatever the raw reading is missing is repaired locally:
//! - vector, scalar and angle components default to `0`
//! - a quaternion that is absent or malformed becomes the identity rotation
//! - non-finite numbers are treated as missing

use crate::collector::types::{
    LegacyMotion, PayloadShape, RawEuler, RawReading, RawSample, RawVector, SensorType,
};
use crate::core::event::{CanonicalEvent, Payload};

/// Normalize one reading from `sensor_type`.
pub fn normalize(
    sensor_type: SensorType,
    raw: &RawReading,
    activity: &str,
    now: i64,
) -> CanonicalEvent {
    CanonicalEvent {
        timestamp: now,
        activity: activity.to_string(),
        sensor_type,
        payload: payload_for(sensor_type, raw),
    }
}

/// Normalize a sample into one or more events.
///
/// A coarse legacy motion event splits into up to three events
/// (accelerometer, accelerometer-with-gravity, gyroscope); everything else
/// yields exactly one.
pub fn normalize_sample(sample: &RawSample, activity: &str, now: i64) -> Vec<CanonicalEvent> {
    match &sample.reading {
        RawReading::Motion(motion) => split_motion(motion, activity, now),
        raw => vec![normalize(sample.sensor_type, raw, activity, now)],
    }
}

/// Split a legacy motion event into its component readings.
pub fn split_motion(motion: &LegacyMotion, activity: &str, now: i64) -> Vec<CanonicalEvent> {
    let mut events = Vec::with_capacity(3);

    if let Some(acc) = &motion.acceleration {
        events.push(event(now, activity, SensorType::Accelerometer, vector(acc)));
    }
    if let Some(acc) = &motion.acceleration_including_gravity {
        events.push(event(
            now,
            activity,
            SensorType::AccelerometerWithGravity,
            vector(acc),
        ));
    }
    if let Some(rate) = &motion.rotation_rate {
        // Rotation rate alpha/beta/gamma map onto the gyroscope x/y/z axes
        events.push(event(
            now,
            activity,
            SensorType::Gyroscope,
            Payload::Vector {
                x: component(rate.alpha),
                y: component(rate.beta),
                z: component(rate.gamma),
            },
        ));
    }

    events
}

fn event(now: i64, activity: &str, sensor_type: SensorType, payload: Payload) -> CanonicalEvent {
    CanonicalEvent {
        timestamp: now,
        activity: activity.to_string(),
        sensor_type,
        payload,
    }
}

fn payload_for(sensor_type: SensorType, raw: &RawReading) -> Payload {
    match sensor_type.payload_shape() {
        PayloadShape::Vector => match raw {
            RawReading::Vector(v) => vector(v),
            _ => vector(&RawVector::default()),
        },
        PayloadShape::Quaternion => Payload::Quaternion {
            quaternion: match raw {
                RawReading::Quaternion(q) => quaternion(q.as_deref()),
                _ => Payload::IDENTITY_QUATERNION,
            },
        },
        PayloadShape::Illuminance => Payload::Illuminance {
            illuminance: match raw {
                RawReading::Illuminance(lux) => component(*lux),
                _ => 0.0,
            },
        },
        PayloadShape::Euler => match raw {
            RawReading::Orientation(angles) => euler(angles),
            _ => euler(&RawEuler::default()),
        },
    }
}

fn component(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn vector(v: &RawVector) -> Payload {
    Payload::Vector {
        x: component(v.x),
        y: component(v.y),
        z: component(v.z),
    }
}

fn euler(angles: &RawEuler) -> Payload {
    Payload::Euler {
        alpha: component(angles.alpha),
        beta: component(angles.beta),
        gamma: component(angles.gamma),
    }
}

fn quaternion(values: Option<&[f64]>) -> [f64; 4] {
    match values {
        Some([a, b, c, d]) if [a, b, c, d].iter().all(|v| v.is_finite()) => [*a, *b, *c, *d],
        _ => Payload::IDENTITY_QUATERNION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_reading() {
        let raw = RawReading::Vector(RawVector::new(1.0, 0.0, 9.8));
        let e = normalize(SensorType::Accelerometer, &raw, "Running", 42);
        assert_eq!(e.timestamp, 42);
        assert_eq!(e.activity, "Running");
        assert_eq!(
            e.payload,
            Payload::Vector {
                x: 1.0,
                y: 0.0,
                z: 9.8
            }
        );
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let raw = RawReading::Vector(RawVector {
            x: Some(2.0),
            y: None,
            z: Some(f64::NAN),
        });
        let e = normalize(SensorType::Magnetometer, &raw, "", 0);
        assert_eq!(
            e.payload,
            Payload::Vector {
                x: 2.0,
                y: 0.0,
                z: 0.0
            }
        );

        let e = normalize(SensorType::AmbientLight, &RawReading::Illuminance(None), "", 0);
        assert_eq!(e.payload, Payload::Illuminance { illuminance: 0.0 });
    }

    #[test]
    fn test_quaternion_defaults_to_identity() {
        for raw in [
            RawReading::Quaternion(None),
            RawReading::Quaternion(Some(vec![1.0, 2.0])),
            RawReading::Quaternion(Some(vec![0.0, f64::INFINITY, 0.0, 1.0])),
        ] {
            let e = normalize(SensorType::AbsoluteOrientation, &raw, "", 0);
            assert_eq!(
                e.payload,
                Payload::Quaternion {
                    quaternion: [0.0, 0.0, 0.0, 1.0]
                }
            );
        }

        let raw = RawReading::Quaternion(Some(vec![0.1, 0.2, 0.3, 0.9]));
        let e = normalize(SensorType::RelativeOrientation, &raw, "", 0);
        assert_eq!(e.payload.quaternion(), Some([0.1, 0.2, 0.3, 0.9]));
    }

    #[test]
    fn test_mismatched_shape_still_yields_well_formed_event() {
        let raw = RawReading::Illuminance(Some(300.0));
        let e = normalize(SensorType::Gyroscope, &raw, "Sitting", 7);
        assert_eq!(
            e.payload,
            Payload::Vector {
                x: 0.0,
                y: 0.0,
                z: 0.0
            }
        );
        assert_eq!(e.sensor_type, SensorType::Gyroscope);
    }

    #[test]
    fn test_legacy_motion_splits_into_three_events() {
        let motion = LegacyMotion {
            acceleration: Some(RawVector::new(0.1, 0.2, 0.3)),
            acceleration_including_gravity: Some(RawVector::new(0.1, 0.2, 9.9)),
            rotation_rate: Some(RawEuler::new(5.0, 6.0, 7.0)),
        };
        let sample = RawSample::new(SensorType::Accelerometer, RawReading::Motion(motion));
        let events = normalize_sample(&sample, "Biking", 10);

        let types: Vec<SensorType> = events.iter().map(|e| e.sensor_type).collect();
        assert_eq!(
            types,
            vec![
                SensorType::Accelerometer,
                SensorType::AccelerometerWithGravity,
                SensorType::Gyroscope
            ]
        );
        assert_eq!(events[2].payload.x(), Some(5.0));
        assert_eq!(events[2].payload.z(), Some(7.0));
        assert!(events.iter().all(|e| e.timestamp == 10 && e.activity == "Biking"));
    }

    #[test]
    fn test_partial_legacy_motion() {
        let motion = LegacyMotion {
            acceleration: None,
            acceleration_including_gravity: Some(RawVector::default()),
            rotation_rate: None,
        };
        let events = split_motion(&motion, "", 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sensor_type, SensorType::AccelerometerWithGravity);
    }

    #[test]
    fn test_legacy_orientation_is_one_event() {
        let sample = RawSample::new(
            SensorType::Orientation,
            RawReading::Orientation(RawEuler {
                alpha: Some(90.0),
                beta: None,
                gamma: Some(-10.0),
            }),
        );
        let events = normalize_sample(&sample, "Standing", 1);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].payload,
            Payload::Euler {
                alpha: 90.0,
                beta: 0.0,
                gamma: -10.0
            }
        );
    }
}

//! Sensor identifiers and raw reading shapes for the motion recorder.
//!
//! Raw readings are what a platform driver hands over before normalization.
//! Every numeric field is optional: drivers report what the hardware gave them
//! and the normalizer decides how gaps are filled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Every sensor stream the recorder knows how to tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SensorType {
    Accelerometer,
    Gyroscope,
    Magnetometer,
    LinearAcceleration,
    AbsoluteOrientation,
    RelativeOrientation,
    AmbientLight,
    Gravity,
    /// Only produced by the coarse legacy motion stream
    AccelerometerWithGravity,
    /// Euler angles from the coarse legacy orientation stream
    Orientation,
}

/// Which payload shape a sensor type carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Vector,
    Quaternion,
    Illuminance,
    Euler,
}

impl SensorType {
    pub const ALL: [SensorType; 10] = [
        SensorType::Accelerometer,
        SensorType::Gyroscope,
        SensorType::Magnetometer,
        SensorType::LinearAcceleration,
        SensorType::AbsoluteOrientation,
        SensorType::RelativeOrientation,
        SensorType::AmbientLight,
        SensorType::Gravity,
        SensorType::AccelerometerWithGravity,
        SensorType::Orientation,
    ];

    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Accelerometer => "accelerometer",
            SensorType::Gyroscope => "gyroscope",
            SensorType::Magnetometer => "magnetometer",
            SensorType::LinearAcceleration => "linearAcceleration",
            SensorType::AbsoluteOrientation => "absoluteOrientation",
            SensorType::RelativeOrientation => "relativeOrientation",
            SensorType::AmbientLight => "ambientLight",
            SensorType::Gravity => "gravity",
            SensorType::AccelerometerWithGravity => "accelerometerWithGravity",
            SensorType::Orientation => "orientation",
        }
    }

    pub fn payload_shape(&self) -> PayloadShape {
        match self {
            SensorType::AbsoluteOrientation | SensorType::RelativeOrientation => {
                PayloadShape::Quaternion
            }
            SensorType::AmbientLight => PayloadShape::Illuminance,
            SensorType::Orientation => PayloadShape::Euler,
            _ => PayloadShape::Vector,
        }
    }

    /// Legacy coarse stream able to stand in for this sensor, if any.
    pub fn legacy_fallback(&self) -> Option<LegacyStream> {
        match self {
            SensorType::Accelerometer
            | SensorType::AccelerometerWithGravity
            | SensorType::Gyroscope => Some(LegacyStream::Motion),
            SensorType::Orientation => Some(LegacyStream::Orientation),
            _ => None,
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', '-', ' '], "");
        SensorType::ALL
            .into_iter()
            .find(|t| t.as_str().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown sensor type '{s}'"))
    }
}

/// The two coarse event streams of older motion APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyStream {
    /// Combined acceleration, acceleration-with-gravity and rotation rate
    Motion,
    /// Alpha/beta/gamma device orientation
    Orientation,
}

impl LegacyStream {
    /// Every sensor type one event of this stream can carry.
    pub fn sensor_types(&self) -> &'static [SensorType] {
        match self {
            LegacyStream::Motion => &[
                SensorType::Accelerometer,
                SensorType::AccelerometerWithGravity,
                SensorType::Gyroscope,
            ],
            LegacyStream::Orientation => &[SensorType::Orientation],
        }
    }
}

/// Three-axis reading as reported by a driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVector {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl RawVector {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }
}

/// Alpha/beta/gamma triplet (rotation rate or orientation angles).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEuler {
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
}

impl RawEuler {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            alpha: Some(alpha),
            beta: Some(beta),
            gamma: Some(gamma),
        }
    }
}

/// One event of the coarse legacy motion stream.
///
/// A single event may carry any subset of the three groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyMotion {
    pub acceleration: Option<RawVector>,
    pub acceleration_including_gravity: Option<RawVector>,
    pub rotation_rate: Option<RawEuler>,
}

impl LegacyMotion {
    /// Drop the groups whose sensor type is not in `keep`.
    pub fn retain(mut self, keep: &BTreeSet<SensorType>) -> Self {
        if !keep.contains(&SensorType::Accelerometer) {
            self.acceleration = None;
        }
        if !keep.contains(&SensorType::AccelerometerWithGravity) {
            self.acceleration_including_gravity = None;
        }
        if !keep.contains(&SensorType::Gyroscope) {
            self.rotation_rate = None;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.acceleration.is_none()
            && self.acceleration_including_gravity.is_none()
            && self.rotation_rate.is_none()
    }
}

/// A raw, not yet normalized reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawReading {
    Vector(RawVector),
    /// Four components expected; anything else is treated as absent
    Quaternion(Option<Vec<f64>>),
    Illuminance(Option<f64>),
    Orientation(RawEuler),
    Motion(LegacyMotion),
}

/// A raw reading together with the sensor that produced it.
///
/// This is the only thing sources push into the pipeline channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub sensor_type: SensorType,
    pub reading: RawReading,
}

impl RawSample {
    pub fn new(sensor_type: SensorType, reading: RawReading) -> Self {
        Self {
            sensor_type,
            reading,
        }
    }
}

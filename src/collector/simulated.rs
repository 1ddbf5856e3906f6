//! Simulated sensor platform.
//!
//! Produces deterministic synthetic waveforms so the recorder can run on
//! machines without motion hardware (CI, desktops, non-Linux targets) and so
//! tests can control exactly which sensors exist and which fail at start time.

use crate::collector::capability::SensorPlatform;
use crate::collector::source::{CollectorError, SensorDriver};
use crate::collector::types::{
    LegacyMotion, LegacyStream, PayloadShape, RawEuler, RawReading, RawVector, SensorType,
};
use std::collections::BTreeSet;

/// Standard gravity in m/s²
const GRAVITY: f64 = 9.81;

/// Phase advance per reading
const PHASE_STEP: f64 = 0.05;

/// A platform whose sensors are all synthetic.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlatform {
    native: BTreeSet<SensorType>,
    legacy_motion: bool,
    legacy_orientation: bool,
    failing: BTreeSet<SensorType>,
    permission_error: Option<String>,
}

impl SimulatedPlatform {
    /// No sensors at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every fine-grained sensor plus both legacy streams.
    pub fn all_native() -> Self {
        Self {
            native: SensorType::ALL
                .into_iter()
                .filter(|t| t.legacy_fallback() != Some(LegacyStream::Orientation))
                .filter(|t| *t != SensorType::AccelerometerWithGravity)
                .collect(),
            legacy_motion: true,
            legacy_orientation: true,
            ..Self::default()
        }
    }

    /// Only the given fine-grained sensors, no legacy streams.
    pub fn with_native(sensors: impl IntoIterator<Item = SensorType>) -> Self {
        Self {
            native: sensors.into_iter().collect(),
            ..Self::default()
        }
    }

    /// An older runtime: coarse motion and orientation streams only.
    pub fn legacy_only() -> Self {
        Self {
            legacy_motion: true,
            legacy_orientation: true,
            ..Self::default()
        }
    }

    /// Sensors that are reported available but fail when opened.
    pub fn failing_on_open(mut self, sensors: impl IntoIterator<Item = SensorType>) -> Self {
        self.failing.extend(sensors);
        self
    }

    /// Make the permission request fail with `reason`.
    pub fn denying_permissions(mut self, reason: impl Into<String>) -> Self {
        self.permission_error = Some(reason.into());
        self
    }
}

impl SensorPlatform for SimulatedPlatform {
    fn name(&self) -> &str {
        "simulated"
    }

    fn has_native(&self, sensor: SensorType) -> bool {
        self.native.contains(&sensor)
    }

    fn has_legacy(&self, stream: LegacyStream) -> bool {
        match stream {
            LegacyStream::Motion => self.legacy_motion,
            LegacyStream::Orientation => self.legacy_orientation,
        }
    }

    fn native_driver(&self, sensor: SensorType) -> Option<Box<dyn SensorDriver>> {
        if !self.has_native(sensor) {
            return None;
        }
        Some(Box::new(SimulatedDriver {
            sensor_type: sensor,
            tick: 0,
            fail_open: self.failing.contains(&sensor),
        }))
    }

    fn legacy_driver(&self, stream: LegacyStream) -> Option<Box<dyn SensorDriver>> {
        if !self.has_legacy(stream) {
            return None;
        }
        Some(Box::new(SimulatedLegacyDriver { stream, tick: 0 }))
    }

    fn request_permissions(&self) -> Result<(), CollectorError> {
        match &self.permission_error {
            Some(reason) => Err(CollectorError::PermissionDenied(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Synthetic fine-grained sensor.
pub struct SimulatedDriver {
    sensor_type: SensorType,
    tick: u64,
    fail_open: bool,
}

impl SensorDriver for SimulatedDriver {
    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn open(&mut self) -> Result<(), CollectorError> {
        if self.fail_open {
            return Err(CollectorError::Unavailable(self.sensor_type));
        }
        Ok(())
    }

    fn read(&mut self) -> Option<RawReading> {
        self.tick += 1;
        Some(synthetic_reading(self.sensor_type, self.tick as f64 * PHASE_STEP))
    }
}

/// Synthetic coarse legacy stream.
pub struct SimulatedLegacyDriver {
    stream: LegacyStream,
    tick: u64,
}

impl SensorDriver for SimulatedLegacyDriver {
    fn sensor_type(&self) -> SensorType {
        match self.stream {
            LegacyStream::Motion => SensorType::Accelerometer,
            LegacyStream::Orientation => SensorType::Orientation,
        }
    }

    fn open(&mut self) -> Result<(), CollectorError> {
        Ok(())
    }

    fn read(&mut self) -> Option<RawReading> {
        self.tick += 1;
        let phase = self.tick as f64 * PHASE_STEP;
        Some(match self.stream {
            LegacyStream::Motion => RawReading::Motion(LegacyMotion {
                acceleration: Some(motion_vector(SensorType::LinearAcceleration, phase)),
                acceleration_including_gravity: Some(motion_vector(
                    SensorType::AccelerometerWithGravity,
                    phase,
                )),
                rotation_rate: Some(RawEuler::new(
                    20.0 * phase.sin(),
                    10.0 * phase.cos(),
                    5.0 * (2.0 * phase).sin(),
                )),
            }),
            LegacyStream::Orientation => synthetic_reading(SensorType::Orientation, phase),
        })
    }
}

/// One synthetic reading of the right shape for `sensor` at `phase`.
pub fn synthetic_reading(sensor: SensorType, phase: f64) -> RawReading {
    match sensor.payload_shape() {
        PayloadShape::Vector => RawReading::Vector(motion_vector(sensor, phase)),
        PayloadShape::Quaternion => {
            // Slow rotation about the z axis
            let half = phase / 2.0;
            RawReading::Quaternion(Some(vec![0.0, 0.0, half.sin(), half.cos()]))
        }
        PayloadShape::Illuminance => RawReading::Illuminance(Some(320.0 + 20.0 * phase.sin())),
        PayloadShape::Euler => RawReading::Orientation(RawEuler::new(
            (phase * 10.0) % 360.0,
            10.0 * phase.sin(),
            5.0 * phase.cos(),
        )),
    }
}

fn motion_vector(sensor: SensorType, phase: f64) -> RawVector {
    let (s, c) = phase.sin_cos();
    match sensor {
        SensorType::Accelerometer | SensorType::AccelerometerWithGravity => {
            RawVector::new(0.5 * s, 0.5 * c, GRAVITY + 0.2 * (2.0 * phase).sin())
        }
        SensorType::LinearAcceleration => RawVector::new(0.5 * s, 0.5 * c, 0.2 * (2.0 * phase).sin()),
        SensorType::Gravity => RawVector::new(0.0, 0.0, GRAVITY),
        SensorType::Gyroscope => RawVector::new(0.3 * c, 0.2 * s, 0.1 * (3.0 * phase).sin()),
        SensorType::Magnetometer => RawVector::new(22.0 + s, -5.0 + c, 40.0),
        _ => RawVector::default(),
    }
}

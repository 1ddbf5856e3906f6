//! Capability detection: which sensors the runtime can provide.

use crate::collector::source::{CollectorError, SensorDriver};
use crate::collector::types::{LegacyStream, SensorType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A runtime that exposes sensors.
///
/// Queries must be side-effect free and cheap enough to call repeatedly.
pub trait SensorPlatform: Send {
    /// Short human-readable name (e.g. "iio", "simulated").
    fn name(&self) -> &str;

    /// Whether the fine-grained API for `sensor` is present.
    fn has_native(&self, sensor: SensorType) -> bool;

    /// Whether a coarse legacy stream is present.
    fn has_legacy(&self, stream: LegacyStream) -> bool;

    /// Driver for the fine-grained API, if the platform has one for `sensor`.
    fn native_driver(&self, sensor: SensorType) -> Option<Box<dyn SensorDriver>>;

    /// Driver for a coarse legacy stream.
    fn legacy_driver(&self, stream: LegacyStream) -> Option<Box<dyn SensorDriver>>;

    /// Ask for sensor access. Best effort; the default grants nothing special.
    fn request_permissions(&self) -> Result<(), CollectorError> {
        Ok(())
    }
}

/// Boolean availability per sensor type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMap(BTreeMap<SensorType, bool>);

impl CapabilityMap {
    pub fn is_available(&self, sensor: SensorType) -> bool {
        self.0.get(&sensor).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SensorType, bool)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn available(&self) -> Vec<SensorType> {
        self.iter().filter(|(_, ok)| *ok).map(|(t, _)| t).collect()
    }
}

impl FromIterator<(SensorType, bool)> for CapabilityMap {
    fn from_iter<I: IntoIterator<Item = (SensorType, bool)>>(iter: I) -> Self {
        let mut map: BTreeMap<SensorType, bool> =
            SensorType::ALL.into_iter().map(|t| (t, false)).collect();
        map.extend(iter);
        Self(map)
    }
}

/// Build the capability map for every known sensor type.
///
/// A sensor counts as available when either its native API or the legacy
/// stream that can stand in for it is present. Missing sensors are `false`,
/// never an error.
pub fn detect(platform: &dyn SensorPlatform) -> CapabilityMap {
    SensorType::ALL
        .into_iter()
        .map(|sensor| {
            let native = platform.has_native(sensor);
            let legacy = sensor
                .legacy_fallback()
                .map(|stream| platform.has_legacy(stream))
                .unwrap_or(false);
            (sensor, native || legacy)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::simulated::SimulatedPlatform;

    #[test]
    fn test_detect_covers_every_sensor_type() {
        let caps = detect(&SimulatedPlatform::none());
        assert_eq!(caps.iter().count(), SensorType::ALL.len());
        assert!(caps.available().is_empty());
    }

    #[test]
    fn test_legacy_streams_count_as_available() {
        let caps = detect(&SimulatedPlatform::legacy_only());
        assert!(caps.is_available(SensorType::Accelerometer));
        assert!(caps.is_available(SensorType::AccelerometerWithGravity));
        assert!(caps.is_available(SensorType::Gyroscope));
        assert!(caps.is_available(SensorType::Orientation));
        assert!(!caps.is_available(SensorType::Magnetometer));
    }

    #[test]
    fn test_detect_is_repeatable() {
        let platform = SimulatedPlatform::all_native();
        assert_eq!(detect(&platform), detect(&platform));
    }

    #[test]
    fn test_capability_map_serializes_as_object() {
        let caps = detect(&SimulatedPlatform::with_native([SensorType::Gravity]));
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["gravity"], true);
        assert_eq!(json["magnetometer"], false);
    }
}

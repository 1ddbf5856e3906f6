//! Sensor acquisition for the motion recorder.
//!
//! This module detects which sensors a platform offers, wraps each one in a
//! start/stop-able source, and pushes raw samples into a single channel.

pub mod capability;
pub mod simulated;
pub mod source;
pub mod types;

#[cfg(target_os = "linux")]
pub mod iio;

// Re-export commonly used types
pub use capability::{detect, CapabilityMap, SensorPlatform};
pub use simulated::SimulatedPlatform;
pub use source::{
    CollectorError, LegacySensorSource, NativeSensorSource, SensorDriver, SensorSource,
    SourceControl, SourceKind, SourceSet,
};
pub use types::{
    LegacyMotion, LegacyStream, PayloadShape, RawEuler, RawReading, RawSample, RawVector,
    SensorType,
};

#[cfg(target_os = "linux")]
pub use iio::IioPlatform;

/// The platform the binary uses when not simulating.
#[cfg(target_os = "linux")]
pub fn system_platform() -> Box<dyn SensorPlatform> {
    Box::new(IioPlatform::default())
}

/// The platform the binary uses when not simulating.
///
/// Targets without IIO get an empty platform: every sensor reports unavailable.
#[cfg(not(target_os = "linux"))]
pub fn system_platform() -> Box<dyn SensorPlatform> {
    Box::new(SimulatedPlatform::none())
}

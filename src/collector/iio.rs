//! Linux Industrial I/O (IIO) sensor platform.
//!
//! Sensors show up as directories under `/sys/bus/iio/devices`, each exposing
//! one file per channel (`in_accel_x_raw`, `in_anglvel_y_raw`, ...). A value is
//! `(raw + offset) * scale`, where scale and offset may be given per axis or
//! per channel type. IIO has no coarse legacy stream, so fallbacks are absent.

use crate::collector::capability::SensorPlatform;
use crate::collector::source::{CollectorError, SensorDriver};
use crate::collector::types::{LegacyStream, RawReading, RawVector, SensorType};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Default sysfs location of IIO devices.
pub const IIO_DEVICES_ROOT: &str = "/sys/bus/iio/devices";

/// How a sensor type maps onto IIO channel files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelLayout {
    /// `in_<prefix>_{x,y,z}_raw`
    Axes(&'static str),
    /// `in_illuminance_input` (lux) or `in_illuminance_raw`
    Illuminance,
    /// `in_rot_quaternion_raw` holding four space-separated values
    Quaternion,
}

fn layout_for(sensor: SensorType) -> Option<ChannelLayout> {
    match sensor {
        SensorType::Accelerometer => Some(ChannelLayout::Axes("accel")),
        SensorType::Gyroscope => Some(ChannelLayout::Axes("anglvel")),
        SensorType::Magnetometer => Some(ChannelLayout::Axes("magn")),
        SensorType::Gravity => Some(ChannelLayout::Axes("gravity")),
        SensorType::LinearAcceleration => Some(ChannelLayout::Axes("accel_linear")),
        SensorType::AmbientLight => Some(ChannelLayout::Illuminance),
        SensorType::AbsoluteOrientation => Some(ChannelLayout::Quaternion),
        _ => None,
    }
}

impl ChannelLayout {
    /// Files whose presence marks a device as providing this layout.
    fn probe_files(&self) -> Vec<String> {
        match self {
            ChannelLayout::Axes(prefix) => vec![format!("in_{prefix}_x_raw")],
            ChannelLayout::Illuminance => vec![
                "in_illuminance_input".to_string(),
                "in_illuminance_raw".to_string(),
            ],
            ChannelLayout::Quaternion => vec!["in_rot_quaternion_raw".to_string()],
        }
    }
}

/// IIO devices under a sysfs root.
#[derive(Debug, Clone)]
pub struct IioPlatform {
    root: PathBuf,
}

impl Default for IioPlatform {
    fn default() -> Self {
        Self::new(IIO_DEVICES_ROOT)
    }
}

impl IioPlatform {
    /// Use a custom devices root (tests point this at a temporary tree).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First device directory providing `sensor`.
    fn find_device(&self, sensor: SensorType) -> Option<PathBuf> {
        let layout = layout_for(sensor)?;
        let probes = layout.probe_files();

        let mut devices: Vec<PathBuf> = fs::read_dir(&self.root)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("iio:device"))
                    .unwrap_or(false)
            })
            .collect();
        devices.sort();

        devices
            .into_iter()
            .find(|dir| probes.iter().any(|f| dir.join(f).exists()))
    }
}

impl SensorPlatform for IioPlatform {
    fn name(&self) -> &str {
        "iio"
    }

    fn has_native(&self, sensor: SensorType) -> bool {
        self.find_device(sensor).is_some()
    }

    fn has_legacy(&self, _stream: LegacyStream) -> bool {
        false
    }

    fn native_driver(&self, sensor: SensorType) -> Option<Box<dyn SensorDriver>> {
        let device = self.find_device(sensor)?;
        let layout = layout_for(sensor)?;
        debug!(%sensor, device = %device.display(), "found IIO device");
        Some(Box::new(IioDriver {
            sensor_type: sensor,
            layout,
            device,
        }))
    }

    fn legacy_driver(&self, _stream: LegacyStream) -> Option<Box<dyn SensorDriver>> {
        None
    }

    fn request_permissions(&self) -> Result<(), CollectorError> {
        // sysfs permissions are decided by udev rules; reading the root is the
        // closest thing to a permission check.
        fs::read_dir(&self.root)
            .map(|_| ())
            .map_err(|e| CollectorError::PermissionDenied(format!("{}: {e}", self.root.display())))
    }
}

/// Reads one sensor's channel files.
pub struct IioDriver {
    sensor_type: SensorType,
    layout: ChannelLayout,
    device: PathBuf,
}

impl IioDriver {
    fn read_file(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.device.join(name)).ok()
    }

    fn read_number(&self, name: &str) -> Option<f64> {
        self.read_file(name)?.trim().parse().ok()
    }

    /// Per-axis attribute first, then the channel-wide one.
    fn attribute(&self, prefix: &str, axis: &str, attr: &str) -> Option<f64> {
        self.read_number(&format!("in_{prefix}_{axis}_{attr}"))
            .or_else(|| self.read_number(&format!("in_{prefix}_{attr}")))
    }

    fn read_axis(&self, prefix: &str, axis: &str) -> Option<f64> {
        let raw = self.read_number(&format!("in_{prefix}_{axis}_raw"))?;
        let offset = self.attribute(prefix, axis, "offset").unwrap_or(0.0);
        let scale = self.attribute(prefix, axis, "scale").unwrap_or(1.0);
        Some((raw + offset) * scale)
    }

    fn read_illuminance(&self) -> Option<f64> {
        if let Some(lux) = self.read_number("in_illuminance_input") {
            return Some(lux);
        }
        let raw = self.read_number("in_illuminance_raw")?;
        let scale = self.read_number("in_illuminance_scale").unwrap_or(1.0);
        Some(raw * scale)
    }

    fn read_quaternion(&self) -> Option<Vec<f64>> {
        let text = self.read_file("in_rot_quaternion_raw")?;
        let scale = self.read_number("in_rot_quaternion_scale").unwrap_or(1.0);
        let values: Option<Vec<f64>> = text
            .split_whitespace()
            .map(|v| v.parse::<f64>().ok().map(|v| v * scale))
            .collect();
        values.filter(|v| v.len() == 4)
    }
}

impl SensorDriver for IioDriver {
    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn open(&mut self) -> Result<(), CollectorError> {
        if self.device.is_dir() {
            Ok(())
        } else {
            Err(CollectorError::Unavailable(self.sensor_type))
        }
    }

    fn read(&mut self) -> Option<RawReading> {
        Some(match self.layout {
            ChannelLayout::Axes(prefix) => RawReading::Vector(RawVector {
                x: self.read_axis(prefix, "x"),
                y: self.read_axis(prefix, "y"),
                z: self.read_axis(prefix, "z"),
            }),
            ChannelLayout::Illuminance => RawReading::Illuminance(self.read_illuminance()),
            ChannelLayout::Quaternion => RawReading::Quaternion(self.read_quaternion()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::capability::detect;
    use std::path::Path;

    fn write(dir: &Path, name: &str, value: &str) {
        fs::write(dir.join(name), value).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let accel = root.path().join("iio:device0");
        fs::create_dir(&accel).unwrap();
        write(&accel, "in_accel_x_raw", "100\n");
        write(&accel, "in_accel_y_raw", "0\n");
        write(&accel, "in_accel_z_raw", "980\n");
        write(&accel, "in_accel_scale", "0.01\n");
        write(&accel, "in_accel_z_offset", "0\n");

        let light = root.path().join("iio:device1");
        fs::create_dir(&light).unwrap();
        write(&light, "in_illuminance_raw", "150");
        write(&light, "in_illuminance_scale", "2");

        let orient = root.path().join("iio:device2");
        fs::create_dir(&orient).unwrap();
        write(&orient, "in_rot_quaternion_raw", "0 0 0 10000");
        write(&orient, "in_rot_quaternion_scale", "0.0001");
        root
    }

    #[test]
    fn test_detects_devices_from_sysfs_tree() {
        let root = fixture();
        let caps = detect(&IioPlatform::new(root.path()));
        assert!(caps.is_available(SensorType::Accelerometer));
        assert!(caps.is_available(SensorType::AmbientLight));
        assert!(caps.is_available(SensorType::AbsoluteOrientation));
        assert!(!caps.is_available(SensorType::Gyroscope));
        assert!(!caps.is_available(SensorType::Orientation));
    }

    #[test]
    fn test_missing_root_reports_nothing() {
        let caps = detect(&IioPlatform::new("/definitely/not/here"));
        assert!(caps.available().is_empty());
    }

    #[test]
    fn test_reads_scaled_values() {
        let root = fixture();
        let platform = IioPlatform::new(root.path());

        let mut accel = platform.native_driver(SensorType::Accelerometer).unwrap();
        accel.open().unwrap();
        match accel.read() {
            Some(RawReading::Vector(v)) => {
                assert!((v.x.unwrap() - 1.0).abs() < 1e-9);
                assert_eq!(v.y, Some(0.0));
                assert!((v.z.unwrap() - 9.8).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut light = platform.native_driver(SensorType::AmbientLight).unwrap();
        assert_eq!(light.read(), Some(RawReading::Illuminance(Some(300.0))));

        let mut orient = platform
            .native_driver(SensorType::AbsoluteOrientation)
            .unwrap();
        match orient.read() {
            Some(RawReading::Quaternion(Some(q))) => assert!((q[3] - 1.0).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_vanished_device_fails_open() {
        let root = fixture();
        let platform = IioPlatform::new(root.path());
        let mut driver = platform.native_driver(SensorType::Accelerometer).unwrap();
        fs::remove_dir_all(root.path().join("iio:device0")).unwrap();
        assert!(driver.open().is_err());
    }
}

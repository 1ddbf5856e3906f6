//! Archive exporters: CSV, human-readable text and pretty JSON.
//!
//! All three are pure functions of an archive snapshot. Output order is
//! archive order, then event order within each session.

use crate::core::archive::SessionArchive;
use crate::core::event::{iso_timestamp, CanonicalEvent, SessionEntry};
use crate::core::recorder::Session;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Stem of every exported file name.
pub const EXPORT_FILE_STEM: &str = "motion_sensor_data";

/// Column order of the CSV export.
pub const CSV_HEADER: [&str; 13] = [
    "Timestamp",
    "Activity",
    "SensorType",
    "X",
    "Y",
    "Z",
    "Alpha",
    "Beta",
    "Gamma",
    "Quaternion",
    "Illuminance",
    "SessionID",
    "SamplingRate",
];

/// Sensor type column value for activity switch rows.
pub const SWITCH_TOKEN: &str = "ACTIVITY_SWITCH";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No recorded sessions to export")]
    EmptyArchive,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Txt,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Txt, ExportFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Txt => "text/plain",
            ExportFormat::Json => "application/json",
        }
    }

    /// `motion_sensor_data.<ext>`
    pub fn filename(&self) -> String {
        format!("{EXPORT_FILE_STEM}.{}", self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "txt" | "text" => Ok(ExportFormat::Txt),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format: {other} (expected csv, txt or json)")),
        }
    }
}

/// Exporter output ready to hand to a [`FileSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub filename: String,
    pub content: String,
}

/// Export the archive in `format`.
///
/// An empty archive is reported as [`ExportError::EmptyArchive`] and nothing
/// is produced.
pub fn export(archive: &SessionArchive, format: ExportFormat) -> Result<ExportArtifact, ExportError> {
    if archive.is_empty() {
        return Err(ExportError::EmptyArchive);
    }

    let content = match format {
        ExportFormat::Csv => export_csv(archive)?,
        ExportFormat::Txt => export_txt(archive)?,
        ExportFormat::Json => export_json(archive)?,
    };

    Ok(ExportArtifact {
        format,
        filename: format.filename(),
        content,
    })
}

/// One header row plus one row per session entry.
pub fn export_csv(archive: &SessionArchive) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for session in archive.all() {
        for entry in &session.events {
            writer.write_record(csv_row(session, entry))?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

fn csv_row(session: &Session, entry: &SessionEntry) -> Vec<String> {
    let mut row = Vec::with_capacity(CSV_HEADER.len());
    row.push(iso_timestamp(entry.timestamp()));
    row.push(entry.activity().to_string());

    match entry {
        SessionEntry::Switch(_) => {
            row.push(SWITCH_TOKEN.to_string());
            row.extend(std::iter::repeat(String::new()).take(8));
        }
        SessionEntry::Reading(event) => {
            let p = &event.payload;
            row.push(event.sensor_type.to_string());
            for value in [p.x(), p.y(), p.z(), p.alpha(), p.beta(), p.gamma()] {
                row.push(cell(value));
            }
            row.push(p.quaternion().map(quaternion_text).unwrap_or_default());
            row.push(cell(p.illuminance()));
        }
    }

    row.push(session.id.to_string());
    row.push(session.sampling_rate.to_string());
    row
}

// Absent stays empty; a real zero renders as "0"
fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn quaternion_text(q: [f64; 4]) -> String {
    let parts: Vec<String> = q.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Human-readable report, one block per session.
pub fn export_txt(archive: &SessionArchive) -> Result<String, ExportError> {
    let mut out = String::new();
    out.push_str("Motion Sensor Recording Data\n");
    out.push_str("================================\n\n");

    for session in archive.all() {
        out.push_str(&format!("Session ID: {}\n", session.id));
        out.push_str(&format!("Activity: {}\n", session.activity));
        out.push_str(&format!("Start Time: {}\n", iso_timestamp(session.start_time)));
        out.push_str(&format!("End Time: {}\n", iso_timestamp(session.end_time)));
        out.push_str(&format!("Duration: {:.2} seconds\n", session.duration_secs()));
        out.push_str(&format!("Sampling Rate: {} Hz\n", session.sampling_rate));
        out.push_str(&format!("Data Points: {}\n\n", session.events.len()));

        for entry in &session.events {
            match entry {
                SessionEntry::Switch(marker) => out.push_str(&format!(
                    "[{}] ACTIVITY SWITCH: {} -> {}\n",
                    iso_timestamp(marker.timestamp),
                    marker.previous_activity,
                    marker.activity
                )),
                SessionEntry::Reading(event) => out.push_str(&txt_line(event)?),
            }
        }
        out.push_str("\n---\n\n");
    }

    Ok(out)
}

fn txt_line(event: &CanonicalEvent) -> Result<String, ExportError> {
    Ok(format!(
        "[{}] {}: {}\n",
        iso_timestamp(event.timestamp),
        event.sensor_type,
        serde_json::to_string(event)?
    ))
}

/// The whole archive, losslessly, pretty-printed.
pub fn export_json(archive: &SessionArchive) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(archive.all())?)
}

/// Destination for exported artifacts.
pub trait FileSink {
    /// Store the artifact and return where it went.
    fn write(&self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError>;
}

/// Writes artifacts into a directory under their own file name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileSink for DirectorySink {
    fn write(&self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.filename);
        fs::write(&path, &artifact.content)?;
        info!(path = %path.display(), bytes = artifact.content.len(), "export written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::SensorType;
    use crate::core::event::{ActivitySwitchMarker, Payload};

    const T0: i64 = 1_705_917_600_000;

    fn reading(ts: i64, activity: &str, sensor_type: SensorType, payload: Payload) -> SessionEntry {
        SessionEntry::Reading(CanonicalEvent {
            timestamp: ts,
            activity: activity.to_string(),
            sensor_type,
            payload,
        })
    }

    fn sample_archive() -> SessionArchive {
        let mut archive = SessionArchive::new();
        archive.append(Session {
            id: T0 as u64 + 2_000,
            activity: "Walking".to_string(),
            start_time: T0,
            end_time: T0 + 2_000,
            events: vec![
                reading(
                    T0 + 10,
                    "Walking",
                    SensorType::Accelerometer,
                    Payload::Vector {
                        x: 0.0,
                        y: -0.5,
                        z: 9.8,
                    },
                ),
                SessionEntry::Switch(ActivitySwitchMarker::new(T0 + 20, "Walking", "Running")),
                reading(
                    T0 + 30,
                    "Running",
                    SensorType::RelativeOrientation,
                    Payload::Quaternion {
                        quaternion: Payload::IDENTITY_QUATERNION,
                    },
                ),
                reading(
                    T0 + 40,
                    "Running",
                    SensorType::AmbientLight,
                    Payload::Illuminance { illuminance: 320.5 },
                ),
            ],
            sampling_rate: 50,
        });
        archive
    }

    #[test]
    fn test_empty_archive_is_reported() {
        let archive = SessionArchive::new();
        for format in ExportFormat::ALL {
            assert!(matches!(
                export(&archive, format),
                Err(ExportError::EmptyArchive)
            ));
        }
    }

    #[test]
    fn test_csv_rows() {
        let csv = export_csv(&sample_archive()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "Timestamp,Activity,SensorType,X,Y,Z,Alpha,Beta,Gamma,Quaternion,Illuminance,SessionID,SamplingRate"
        );
        // Zero is a value, not an empty cell
        assert_eq!(
            lines[1],
            "2024-01-22T10:00:00.010Z,Walking,accelerometer,0,-0.5,9.8,,,,,,1705917602000,50"
        );
        assert_eq!(
            lines[2],
            "2024-01-22T10:00:00.020Z,Running,ACTIVITY_SWITCH,,,,,,,,,1705917602000,50"
        );
        assert_eq!(
            lines[3],
            "2024-01-22T10:00:00.030Z,Running,relativeOrientation,,,,,,,\"[0,0,0,1]\",,1705917602000,50"
        );
        assert!(lines[4].contains(",ambientLight,,,,,,,,320.5,"));
    }

    #[test]
    fn test_txt_layout() {
        let txt = export_txt(&sample_archive()).unwrap();
        assert!(txt.starts_with("Motion Sensor Recording Data\n"));
        assert!(txt.contains("Session ID: 1705917602000\n"));
        assert!(txt.contains("Start Time: 2024-01-22T10:00:00.000Z\n"));
        assert!(txt.contains("Duration: 2.00 seconds\n"));
        assert!(txt.contains("Sampling Rate: 50 Hz\n"));
        assert!(txt.contains("Data Points: 4\n"));
        assert!(txt.contains("[2024-01-22T10:00:00.020Z] ACTIVITY SWITCH: Walking -> Running\n"));
        assert!(txt.contains("[2024-01-22T10:00:00.010Z] accelerometer: {"));
        assert!(txt.ends_with("\n---\n\n"));
    }

    #[test]
    fn test_json_is_lossless() {
        let archive = sample_archive();
        let json = export_json(&archive).unwrap();
        let back: Vec<Session> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_slice(), archive.all());
        assert!(json.contains("\"previousActivity\": \"Walking\""));
        assert!(json.contains("\"samplingRate\": 50"));
    }

    #[test]
    fn test_exports_are_deterministic() {
        let archive = sample_archive();
        for format in ExportFormat::ALL {
            let a = export(&archive, format).unwrap();
            let b = export(&archive, format).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.filename, format!("motion_sensor_data.{}", format.extension()));
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("json".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("exports"));
        let artifact = export(&sample_archive(), ExportFormat::Txt).unwrap();

        let path = sink.write(&artifact).unwrap();
        assert_eq!(path.file_name().unwrap(), "motion_sensor_data.txt");
        assert_eq!(std::fs::read_to_string(path).unwrap(), artifact.content);
    }
}

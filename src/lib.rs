//! Motion Recorder - multi-sensor acquisition with activity-labelled sessions.
//!
//! This library fans in readings from independently clocked motion and
//! environment sensors, normalizes them into one event stream, keeps a bounded
//! live window for display, and records activity-labelled sessions that can be
//! exported as CSV, text or JSON.
//!
//! # Guarantees
//!
//! - **One order**: the recorder sees a single arrival order of readings and
//!   activity switches, whatever the sensors' individual clocks do
//! - **Clean boundaries**: nothing delivered after `stop` lands in the sealed
//!   session or in any later one
//! - **Graceful degradation**: missing sensors, start-time failures and relay
//!   errors never stop acquisition
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Motion Recorder                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │ Capability │──▶│  Sources   │──▶│ Normalizer │            │
//! │  │  (detect)  │   │ (threads)  │   │            │            │
//! │  └────────────┘   └────────────┘   └─────┬──────┘            │
//! │                                          │                   │
//! │                     ┌────────────────────┼──────────┐        │
//! │                     ▼                    ▼          ▼        │
//! │              ┌────────────┐      ┌────────────┐ ┌────────┐   │
//! │              │Live Window │      │  Recorder  │▶│ Relay  │   │
//! │              └────────────┘      └─────┬──────┘ └────────┘   │
//! │                                        ▼                     │
//! │                                 ┌────────────┐               │
//! │                                 │  Archive   │──▶ Exporter   │
//! │                                 └────────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use motion_recorder::{collector::SimulatedPlatform, config::Config, pipeline::Pipeline};
//! use motion_recorder::core::ExportFormat;
//! use std::time::Duration;
//!
//! let mut pipeline = Pipeline::new(Config::default(), Box::new(SimulatedPlatform::all_native()));
//! pipeline.start_recording(Some("Walking")).unwrap();
//! for _ in 0..20 {
//!     pipeline.pump(Duration::from_millis(50));
//! }
//! pipeline.stop_recording();
//!
//! let csv = pipeline.export(ExportFormat::Csv).unwrap();
//! println!("{}", csv.content);
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod relay;
pub mod stats;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use collector::{detect, CapabilityMap, CollectorError, SensorPlatform, SensorType};
pub use config::{Config, ConfigError, SensorSelection};
pub use core::{
    CanonicalEvent, ExportError, ExportFormat, Payload, RecorderError, Session, SessionArchive,
    SessionEntry, StopOutcome,
};
pub use pipeline::{Pipeline, PipelineStatus};
pub use relay::{ConnectionState, RelayConfig, RelayError, RelayTransport, StreamRelay};
pub use stats::{RecordingStats, SharedRecordingStats};

#[cfg(feature = "relay")]
pub use relay::HttpRelayTransport;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

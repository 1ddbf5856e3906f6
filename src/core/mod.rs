//! Core pipeline state for the motion recorder.
//!
//! This module contains:
//! - The canonical event model and reading normalization
//! - The bounded live window used for display
//! - The session recorder state machine and the session archive
//! - Archive exporters (CSV, text, JSON)

pub mod archive;
pub mod event;
pub mod export;
pub mod live_window;
pub mod normalizer;
pub mod recorder;

// Re-export commonly used types
pub use archive::SessionArchive;
pub use event::{
    iso_timestamp, now_millis, ActivitySwitchMarker, CanonicalEvent, Payload, SessionEntry,
};
pub use export::{
    export, DirectorySink, ExportArtifact, ExportError, ExportFormat, FileSink, CSV_HEADER,
};
pub use live_window::{LiveWindow, DEFAULT_CHART_WINDOW, DEFAULT_LIVE_CAPACITY};
pub use normalizer::{normalize, normalize_sample};
pub use recorder::{
    RecorderError, RecorderState, Session, SessionRecorder, SessionSummary, StopOutcome,
};

//! Statistics about what the recorder captured and where it went.

pub mod counters;

pub use counters::{
    create_shared_stats, create_shared_stats_with_persistence, RecordingStats,
    SharedRecordingStats, StatsSnapshot,
};

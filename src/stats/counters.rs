//! Acquisition counters.
//!
//! Tracks how much data flowed through the pipeline and what happened to it.
//! Counters can be persisted so totals survive across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Pipeline statistics for the current process.
#[derive(Debug)]
pub struct RecordingStats {
    /// Canonical events produced by the normalizer
    readings_normalized: AtomicU64,
    /// Events appended to an open session
    readings_recorded: AtomicU64,
    /// Events that only reached the live window
    readings_while_idle: AtomicU64,
    /// Switch markers written into sessions
    activity_switches: AtomicU64,
    sessions_sealed: AtomicU64,
    sessions_discarded: AtomicU64,
    /// Relay sends that failed
    relay_failures: AtomicU64,
    exports: AtomicU64,
    started_at: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl RecordingStats {
    pub fn new() -> Self {
        Self {
            readings_normalized: AtomicU64::new(0),
            readings_recorded: AtomicU64::new(0),
            readings_while_idle: AtomicU64::new(0),
            activity_switches: AtomicU64::new(0),
            sessions_sealed: AtomicU64::new(0),
            sessions_discarded: AtomicU64::new(0),
            relay_failures: AtomicU64::new(0),
            exports: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats backed by a file, picking up previously saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            warn!("Could not load previous recording stats: {e}");
        }

        stats
    }

    pub fn record_normalized(&self, count: u64) {
        self.readings_normalized.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_recorded(&self) {
        self.readings_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle(&self) {
        self.readings_while_idle.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_activity_switch(&self) {
        self.activity_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_sealed(&self) {
        self.sessions_sealed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_discarded(&self) {
        self.sessions_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relay_failure(&self) {
        self.relay_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export(&self) {
        self.exports.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            readings_normalized: self.readings_normalized.load(Ordering::Relaxed),
            readings_recorded: self.readings_recorded.load(Ordering::Relaxed),
            readings_while_idle: self.readings_while_idle.load(Ordering::Relaxed),
            activity_switches: self.activity_switches.load(Ordering::Relaxed),
            sessions_sealed: self.sessions_sealed.load(Ordering::Relaxed),
            sessions_discarded: self.sessions_discarded.load(Ordering::Relaxed),
            relay_failures: self.relay_failures.load(Ordering::Relaxed),
            exports: self.exports.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Recording Statistics:\n\
             - Readings normalized: {}\n\
             - Readings recorded: {}\n\
             - Readings seen while idle: {}\n\
             - Activity switches: {}\n\
             - Sessions sealed: {}\n\
             - Empty sessions discarded: {}\n\
             - Relay send failures: {}\n\
             - Exports: {}\n\
             - Uptime: {} seconds",
            s.readings_normalized,
            s.readings_recorded,
            s.readings_while_idle,
            s.activity_switches,
            s.sessions_sealed,
            s.sessions_discarded,
            s.relay_failures,
            s.exports,
            s.uptime_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let s = self.snapshot();
            let persisted = PersistedStats {
                readings_normalized: s.readings_normalized,
                readings_recorded: s.readings_recorded,
                readings_while_idle: s.readings_while_idle,
                activity_switches: s.activity_switches,
                sessions_sealed: s.sessions_sealed,
                sessions_discarded: s.sessions_discarded,
                relay_failures: s.relay_failures,
                exports: s.exports,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let p: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.readings_normalized
                    .store(p.readings_normalized, Ordering::Relaxed);
                self.readings_recorded
                    .store(p.readings_recorded, Ordering::Relaxed);
                self.readings_while_idle
                    .store(p.readings_while_idle, Ordering::Relaxed);
                self.activity_switches
                    .store(p.activity_switches, Ordering::Relaxed);
                self.sessions_sealed
                    .store(p.sessions_sealed, Ordering::Relaxed);
                self.sessions_discarded
                    .store(p.sessions_discarded, Ordering::Relaxed);
                self.relay_failures.store(p.relay_failures, Ordering::Relaxed);
                self.exports.store(p.exports, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        for counter in [
            &self.readings_normalized,
            &self.readings_recorded,
            &self.readings_while_idle,
            &self.activity_switches,
            &self.sessions_sealed,
            &self.sessions_discarded,
            &self.relay_failures,
            &self.exports,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for RecordingStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub readings_normalized: u64,
    pub readings_recorded: u64,
    pub readings_while_idle: u64,
    pub activity_switches: u64,
    pub sessions_sealed: u64,
    pub sessions_discarded: u64,
    pub relay_failures: u64,
    pub exports: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    readings_normalized: u64,
    readings_recorded: u64,
    readings_while_idle: u64,
    activity_switches: u64,
    sessions_sealed: u64,
    sessions_discarded: u64,
    relay_failures: u64,
    exports: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared statistics.
pub type SharedRecordingStats = Arc<RecordingStats>;

pub fn create_shared_stats() -> SharedRecordingStats {
    Arc::new(RecordingStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedRecordingStats {
    Arc::new(RecordingStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = RecordingStats::new();

        stats.record_normalized(3);
        stats.record_recorded();
        stats.record_recorded();
        stats.record_idle();
        stats.record_session_sealed();

        let s = stats.snapshot();
        assert_eq!(s.readings_normalized, 3);
        assert_eq!(s.readings_recorded, 2);
        assert_eq!(s.readings_while_idle, 1);
        assert_eq!(s.sessions_sealed, 1);
        assert_eq!(s.exports, 0);
    }

    #[test]
    fn test_reset() {
        let stats = RecordingStats::new();
        stats.record_normalized(100);
        stats.record_relay_failure();
        stats.reset();

        let s = stats.snapshot();
        assert_eq!(s.readings_normalized, 0);
        assert_eq!(s.relay_failures, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.json");

        let stats = RecordingStats::with_persistence(path.clone());
        stats.record_session_sealed();
        stats.record_export();
        stats.save().unwrap();

        let reloaded = RecordingStats::with_persistence(path);
        let s = reloaded.snapshot();
        assert_eq!(s.sessions_sealed, 1);
        assert_eq!(s.exports, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = RecordingStats::new().summary();
        assert!(summary.contains("Readings normalized"));
        assert!(summary.contains("Sessions sealed"));
        assert!(summary.contains("Relay send failures"));
    }
}

//! Session recorder: the Idle ⇄ Recording state machine.
//!
//! The recorder exclusively owns the open session. Events enter it only
//! through [`SessionRecorder::on_event`], and only while recording; anything
//! that arrives after `stop()` is dropped based on the current state, never on
//! the event's own timestamp.

use crate::collector::source::SourceControl;
use crate::core::archive::SessionArchive;
use crate::core::event::{ActivitySwitchMarker, CanonicalEvent, SessionEntry};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One sealed recording run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: u64,
    /// Activity at the time recording started
    pub activity: String,
    pub start_time: i64,
    pub end_time: i64,
    /// Readings and switch markers in arrival order
    pub events: Vec<SessionEntry>,
    /// Requested sampling rate in Hz
    pub sampling_rate: u32,
}

impl Session {
    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time) as f64 / 1000.0
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            activity: self.activity.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_secs: self.duration_secs(),
            sampling_rate: self.sampling_rate,
            event_count: self.events.len(),
        }
    }
}

/// Lightweight description of a session for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: u64,
    pub activity: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_secs: f64,
    pub sampling_rate: u32,
    pub event_count: usize,
}

/// Precondition failures of [`SessionRecorder::start`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecorderError {
    #[error("Select an activity before starting a recording")]
    NoActivity,
    #[error("A recording is already in progress")]
    AlreadyRecording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
}

/// What `stop()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was recording
    AlreadyIdle,
    /// The session had no entries and was dropped
    Discarded,
    /// The session was appended to the archive
    Sealed { id: u64, entries: usize },
}

#[derive(Debug)]
struct OpenSession {
    activity: String,
    start_time: i64,
    sampling_rate: u32,
    events: Vec<SessionEntry>,
}

/// Owns "is recording", the open session and the current activity label.
#[derive(Debug, Default)]
pub struct SessionRecorder {
    current_activity: String,
    open: Option<OpenSession>,
    last_id: u64,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        if self.open.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.open.is_some()
    }

    /// Label stamped on newly captured events.
    pub fn current_activity(&self) -> &str {
        &self.current_activity
    }

    /// Entries in the open session, 0 when idle.
    pub fn open_entry_count(&self) -> usize {
        self.open.as_ref().map(|s| s.events.len()).unwrap_or(0)
    }

    /// Start time of the open session.
    /// Validate `start` preconditions without changing anything.
    pub fn check_start(&self, activity: &str) -> Result<(), RecorderError> {
        if self.open.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }
        if activity.trim().is_empty() {
            return Err(RecorderError::NoActivity);
        }
        Ok(())
    }

    /// Open a new, empty session labelled `activity`.
    pub fn start(
        &mut self,
        activity: &str,
        sampling_rate: u32,
        now: i64,
    ) -> Result<(), RecorderError> {
        self.check_start(activity)?;

        let activity = activity.trim().to_string();
        self.current_activity = activity.clone();
        self.open = Some(OpenSession {
            activity,
            start_time: now,
            sampling_rate,
            events: Vec::new(),
        });
        Ok(())
    }

    /// Append a copy of `event` to the open session.
    ///
    /// Returns `false` (and does nothing) when idle.
    pub fn on_event(&mut self, event: &CanonicalEvent) -> bool {
        match self.open.as_mut() {
            Some(session) => {
                session.events.push(SessionEntry::Reading(event.clone()));
                true
            }
            None => false,
        }
    }

    /// Change the current activity label.
    ///
    /// While recording, a changed label also appends an activity-switch marker
    /// at this point of the event sequence. Returns whether a marker was added.
    /// Empty labels are ignored.
    pub fn switch_activity(&mut self, activity: &str, now: i64) -> bool {
        let activity = activity.trim();
        if activity.is_empty() {
            return false;
        }

        let mut marked = false;
        if let Some(session) = self.open.as_mut() {
            if activity != self.current_activity {
                session.events.push(SessionEntry::Switch(ActivitySwitchMarker::new(
                    now,
                    self.current_activity.clone(),
                    activity,
                )));
                marked = true;
            }
        }
        self.current_activity = activity.to_string();
        marked
    }

    /// Close the open session.
    ///
    /// Sources are always told to stop when a session was open, even if the
    /// session turns out empty and is discarded. Idle recorders do nothing.
    pub fn stop(
        &mut self,
        archive: &mut SessionArchive,
        sources: &mut dyn SourceControl,
        now: i64,
    ) -> StopOutcome {
        let Some(open) = self.open.take() else {
            return StopOutcome::AlreadyIdle;
        };

        sources.stop_all();

        if open.events.is_empty() {
            info!(activity = %open.activity, "discarded empty session");
            return StopOutcome::Discarded;
        }

        let end_time = now.max(open.start_time);
        let id = self.next_id(end_time);
        let entries = open.events.len();

        archive.append(Session {
            id,
            activity: open.activity,
            start_time: open.start_time,
            end_time,
            events: open.events,
            sampling_rate: open.sampling_rate,
        });
        info!(id, entries, "session sealed");

        StopOutcome::Sealed { id, entries }
    }

    /// Time-based id that still strictly increases within the process.
    fn next_id(&mut self, end_time: i64) -> u64 {
        let id = (self.last_id + 1).max(end_time.max(0) as u64);
        self.last_id = id;
        id
    }
}

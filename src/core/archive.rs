//! Append-only archive of sealed sessions.

use crate::core::recorder::{Session, SessionSummary};

/// Sealed sessions in the order they were recorded. Sessions are never
/// removed or modified once appended.
#[derive(Debug, Default)]
pub struct SessionArchive {
    sessions: Vec<Session>,
}

impl SessionArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, session: Session) {
        self.sessions.push(session);
    }

    /// All sessions, oldest first.
    pub fn all(&self) -> &[Session] {
        &self.sessions
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn last(&self) -> Option<&Session> {
        self.sessions.last()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions.iter().map(Session::summary).collect()
    }

    /// Total entries across all sessions.
    pub fn entry_count(&self) -> usize {
        self.sessions.iter().map(|s| s.events.len()).sum()
    }
}

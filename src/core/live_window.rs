//! Bounded live window feeding real-time display.
//!
//! The window keeps the most recent `capacity` entries, oldest first, and is
//! independent of recording state. It stores its own copies; nothing in here
//! aliases session or archive data.

use std::collections::VecDeque;

/// Default number of entries kept for display.
pub const DEFAULT_LIVE_CAPACITY: usize = 100;

/// Default number of entries a chart shows.
pub const DEFAULT_CHART_WINDOW: usize = 50;

/// Fixed-capacity FIFO of recent entries.
#[derive(Debug, Clone)]
pub struct LiveWindow<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> LiveWindow<T> {
    /// Create a window holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// The most recent `k` entries (or fewer), oldest first.
    pub fn snapshot(&self, k: usize) -> Vec<T> {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> Default for LiveWindow<T> {
    fn default() -> Self {
        Self::new(DEFAULT_LIVE_CAPACITY)
    }
}

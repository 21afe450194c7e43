//! Coalesced repaint scheduling.
//!
//! Requests land in a single pending slot drained by the host's pump,
//! so any number of requests within one dispatch cycle produce one
//! repaint. A refreshing request is never downgraded by a later
//! non-refreshing one.

use std::cell::Cell;

pub struct RepaintTask {
    /// Re-extract the visible sub-region before painting.
    pub refresh: bool,
}

pub struct RepaintQueue {
    pending: Cell<Option<bool>>,
    requests: Cell<u64>,
    fires: Cell<u64>,
}

impl RepaintQueue {
    pub fn new() -> Self {
        Self {
            pending: Cell::new(None),
            requests: Cell::new(0),
            fires: Cell::new(0),
        }
    }

    pub fn request(&self, refresh: bool) {
        self.requests.set(self.requests.get() + 1);
        let combined = match self.pending.get() {
            Some(prev) => prev || refresh,
            None => refresh,
        };
        self.pending.set(Some(combined));
    }

    pub fn take(&self) -> Option<RepaintTask> {
        let refresh = self.pending.take()?;
        self.fires.set(self.fires.get() + 1);
        Some(RepaintTask { refresh })
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }

    /// Total requests seen, for diagnostics.
    pub fn requests(&self) -> u64 {
        self.requests.get()
    }

    /// Total repaints actually fired.
    pub fn fires(&self) -> u64 {
        self.fires.get()
    }
}

impl Default for RepaintQueue {
    fn default() -> Self {
        Self::new()
    }
}

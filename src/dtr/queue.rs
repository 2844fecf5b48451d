use std::collections::{BTreeMap, HashMap};

use super::model::{DayEntry, EntryStatus, Shift};

/// Fields of one day changed since the last flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub shifts: Option<Vec<Shift>>,
    pub status: Option<EntryStatus>,
}

impl EntryPatch {
    pub fn shifts(shifts: Vec<Shift>) -> Self {
        Self {
            shifts: Some(shifts),
            status: None,
        }
    }

    /// Fold a newer patch into this one; newer fields win.
    pub fn merge(&mut self, newer: EntryPatch) {
        if newer.shifts.is_some() {
            self.shifts = newer.shifts;
        }
        if newer.status.is_some() {
            self.status = newer.status;
        }
    }

    pub fn apply_to(&self, entry: &mut DayEntry) {
        if let Some(shifts) = &self.shifts {
            entry.shifts = shifts.clone();
        }
        if let Some(status) = self.status {
            entry.status = status;
        }
    }
}

/// Pending per-day changes for a single edit session.
///
/// Also hands out the monotonic per-day revision attached to every write.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    pending: BTreeMap<u32, EntryPatch>,
    revisions: HashMap<u32, u64>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from what the server already holds.
    pub fn seed_revision(&mut self, day: u32, revision: u64) {
        let current = self.revisions.entry(day).or_default();
        *current = (*current).max(revision);
    }

    pub fn revision(&self, day: u32) -> u64 {
        self.revisions.get(&day).copied().unwrap_or_default()
    }

    /// Merge `patch` into the day's pending change and return the new revision.
    pub fn push(&mut self, day: u32, patch: EntryPatch) -> u64 {
        self.pending.entry(day).or_default().merge(patch);

        let revision = self.revisions.entry(day).or_default();
        *revision += 1;
        *revision
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, day: u32) -> bool {
        self.pending.contains_key(&day)
    }

    pub fn drain(&mut self) -> Vec<(u32, EntryPatch)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

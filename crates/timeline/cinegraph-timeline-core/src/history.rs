//! Snapshot history: every mutation goes through a labeled, reversible
//! transaction.
//!
//! A transaction snapshots the affected tracks (bincode of the full track
//! struct) before and after the mutation runs. Failure mid-mutation restores
//! the `before` state and pushes nothing, which is what makes edit
//! operations atomic. Undo restores `before`, redo restores `after`; any new
//! commit clears the redo stack.

use cinegraph_api_core::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::clip::Clip;
use crate::track::{Track, TrackId};

/// Default bound on undo depth; oldest entries are evicted past it.
const MAX_HISTORY: usize = 100;

/// State of one track at snapshot time; `None` records absence, so undo can
/// delete tracks an operation created.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackSnapshot {
    track: TrackId,
    data: Option<Vec<u8>>,
}

impl TrackSnapshot {
    fn capture(clip: &Clip, id: TrackId) -> Result<Self, CoreError> {
        let data = match clip.find(id) {
            Ok(track) => Some(
                bincode::serialize(track)
                    .map_err(|e| CoreError::decode(format!("snapshot failed: {e}")))?,
            ),
            Err(_) => None,
        };
        Ok(Self { track: id, data })
    }

    fn restore(&self, clip: &mut Clip) -> Result<(), CoreError> {
        match &self.data {
            Some(bytes) => {
                let track: Track = bincode::deserialize(bytes)
                    .map_err(|e| CoreError::decode(format!("snapshot restore failed: {e}")))?;
                clip.insert_track_raw(track);
            }
            None => clip.remove_track_raw(self.track),
        }
        Ok(())
    }
}

/// Full before/after state for one labeled operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Patch {
    tracks: Vec<TrackSnapshot>,
    roots: Vec<TrackId>,
}

impl Patch {
    fn capture(clip: &Clip, affected: &[TrackId]) -> Result<Self, CoreError> {
        let mut tracks = Vec::with_capacity(affected.len());
        for id in affected {
            tracks.push(TrackSnapshot::capture(clip, *id)?);
        }
        Ok(Self {
            tracks,
            roots: clip.roots().to_vec(),
        })
    }

    fn apply(&self, clip: &mut Clip) -> Result<(), CoreError> {
        for snapshot in &self.tracks {
            snapshot.restore(clip)?;
        }
        clip.set_roots_raw(self.roots.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryEntry {
    label: String,
    before: Patch,
    after: Patch,
}

/// Bounded undo/redo log over a clip's tracks.
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_depth: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
        }
    }

    /// Run `mutate` atomically under `label`, snapshotting `affected` tracks.
    ///
    /// On error the clip is restored to the before state, nothing is pushed,
    /// and the error is returned. `affected` must list every track the
    /// mutation touches, including tracks it creates or deletes.
    pub fn transaction<T>(
        &mut self,
        clip: &mut Clip,
        label: &str,
        affected: &[TrackId],
        mutate: impl FnOnce(&mut Clip) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let before = Patch::capture(clip, affected)?;
        match mutate(clip) {
            Ok(out) => {
                let after = Patch::capture(clip, affected)?;
                self.push(HistoryEntry {
                    label: label.to_string(),
                    before,
                    after,
                });
                tracing::debug!(label, tracks = affected.len(), "history push");
                Ok(out)
            }
            Err(err) => {
                before.apply(clip)?;
                tracing::debug!(label, %err, "transaction rolled back");
                Err(err)
            }
        }
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.redo_stack.clear();
        self.undo_stack.push_back(entry);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.label.as_str())
    }

    /// Restore the most recent operation's before state. Returns the label.
    pub fn undo(&mut self, clip: &mut Clip) -> Option<String> {
        let entry = self.undo_stack.pop_back()?;
        if let Err(err) = entry.before.apply(clip) {
            tracing::warn!(%err, label = %entry.label, "undo restore failed");
            return None;
        }
        let label = entry.label.clone();
        self.redo_stack.push_back(entry);
        Some(label)
    }

    /// Reapply the most recently undone operation. Returns the label.
    pub fn redo(&mut self, clip: &mut Clip) -> Option<String> {
        let entry = self.redo_stack.pop_back()?;
        if let Err(err) = entry.after.apply(clip) {
            tracing::warn!(%err, label = %entry.label, "redo restore failed");
            return None;
        }
        let label = entry.label.clone();
        self.undo_stack.push_back(entry);
        Some(label)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

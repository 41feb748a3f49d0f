//! The clip: root container owning the track forest and project metadata.
//!
//! Tracks live in an arena keyed by GUID; parent/child links are ids, so the
//! tree is cycle-free by construction and enforced again on reparenting.

use cinegraph_api_core::{CoreError, Value};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::curve::Interp;
use crate::time::Tick;
use crate::track::{Track, TrackId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Project sample rate; must divide the tick base.
    pub sample_rate: i32,
    /// Interpolation given to newly inserted keyframes.
    pub default_interp: Interp,
    /// Explicit duration override; `None` derives from block ranges.
    pinned_duration: Option<Tick>,
    tracks: HashMap<TrackId, Track>,
    roots: Vec<TrackId>,
}

impl Clip {
    pub fn new(sample_rate: i32) -> Result<Self, CoreError> {
        Tick::frame_period(sample_rate)?;
        Ok(Self {
            sample_rate,
            default_interp: Interp::Linear,
            pinned_duration: None,
            tracks: HashMap::new(),
            roots: Vec::new(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn roots(&self) -> &[TrackId] {
        &self.roots
    }

    pub fn find(&self, id: TrackId) -> Result<&Track, CoreError> {
        self.tracks.get(&id).ok_or_else(|| CoreError::TrackNotFound {
            id: id.to_string(),
        })
    }

    pub fn find_mut(&mut self, id: TrackId) -> Result<&mut Track, CoreError> {
        self.tracks
            .get_mut(&id)
            .ok_or_else(|| CoreError::TrackNotFound {
                id: id.to_string(),
            })
    }

    /// Child of `parent` by display name.
    pub fn find_child(&self, parent: TrackId, name: &str) -> Option<&Track> {
        let parent = self.tracks.get(&parent)?;
        parent
            .children
            .iter()
            .filter_map(|id| self.tracks.get(id))
            .find(|t| t.name == name)
    }

    fn check_sibling_name(
        &self,
        siblings: &[TrackId],
        name: &str,
        target_type: &str,
    ) -> Result<(), CoreError> {
        let clash = siblings
            .iter()
            .filter_map(|id| self.tracks.get(id))
            .any(|t| t.name == name && t.target_type == target_type);
        if clash {
            return Err(CoreError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Add a root track.
    pub fn add_root(&mut self, mut track: Track) -> Result<TrackId, CoreError> {
        self.check_sibling_name(&self.roots, &track.name, &track.target_type)?;
        track.parent = None;
        let id = track.id;
        self.tracks.insert(id, track);
        self.roots.push(id);
        Ok(id)
    }

    /// Add a child under `parent`. Fails `DuplicateName` when a sibling with
    /// the same name and compatible type exists, `Locked` when the parent is
    /// locked.
    pub fn add_child(&mut self, parent: TrackId, mut track: Track) -> Result<TrackId, CoreError> {
        let parent_track = self.find(parent)?;
        if parent_track.locked {
            return Err(CoreError::Locked {
                id: parent.to_string(),
            });
        }
        self.check_sibling_name(&parent_track.children, &track.name, &track.target_type)?;
        track.parent = Some(parent);
        let id = track.id;
        self.tracks.insert(id, track);
        if let Some(p) = self.tracks.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Remove a track and all descendants; returns the removed ids in
    /// depth-first order.
    pub fn remove(&mut self, id: TrackId) -> Result<Vec<TrackId>, CoreError> {
        let track = self.find(id)?;
        if track.locked {
            return Err(CoreError::Locked { id: id.to_string() });
        }
        let parent = track.parent;
        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(t) = self.tracks.remove(&next) {
                stack.extend(t.children.iter().copied());
                removed.push(next);
            }
        }
        match parent {
            Some(p) => {
                if let Some(pt) = self.tracks.get_mut(&p) {
                    pt.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|c| *c != id),
        }
        tracing::debug!(track = %id, count = removed.len(), "removed track subtree");
        Ok(removed)
    }

    /// Move `id` under `new_parent` (`None` for root), rejecting cycles.
    pub fn reparent(&mut self, id: TrackId, new_parent: Option<TrackId>) -> Result<(), CoreError> {
        let track = self.find(id)?;
        if track.locked {
            return Err(CoreError::Locked { id: id.to_string() });
        }
        let (name, target_type, old_parent) = (
            track.name.clone(),
            track.target_type.clone(),
            track.parent,
        );
        if let Some(p) = new_parent {
            // Walk up from the destination; hitting `id` means a cycle.
            let mut cursor = Some(p);
            while let Some(c) = cursor {
                if c == id {
                    return Err(CoreError::CyclicParent { id: id.to_string() });
                }
                cursor = self.find(c)?.parent;
            }
            let siblings = self.find(p)?.children.clone();
            self.check_sibling_name(&siblings, &name, &target_type)?;
        } else {
            self.check_sibling_name(&self.roots.clone(), &name, &target_type)?;
        }
        match old_parent {
            Some(p) => {
                if let Some(pt) = self.tracks.get_mut(&p) {
                    pt.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|c| *c != id),
        }
        match new_parent {
            Some(p) => {
                if let Some(pt) = self.tracks.get_mut(&p) {
                    pt.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        if let Some(t) = self.tracks.get_mut(&id) {
            t.parent = new_parent;
        }
        Ok(())
    }

    /// Depth-first (preorder) traversal over the whole forest.
    pub fn iter_depth_first(&self) -> impl Iterator<Item = &Track> {
        let mut order = Vec::with_capacity(self.tracks.len());
        let mut stack: Vec<TrackId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(track) = self.tracks.get(&id) {
                order.push(track);
                stack.extend(track.children.iter().rev().copied());
            }
        }
        order.into_iter()
    }

    /// Root-to-node display-name sequence.
    pub fn path(&self, id: TrackId) -> Result<Vec<String>, CoreError> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let track = self.find(c)?;
            names.push(track.name.clone());
            cursor = track.parent;
        }
        names.reverse();
        Ok(names)
    }

    /// All property tracks, depth-first.
    pub fn property_tracks(&self) -> impl Iterator<Item = &Track> {
        self.iter_depth_first().filter(|t| t.is_property())
    }

    /// Clip duration: pinned when set, else the far edge of the union of
    /// block ranges (zero for an empty clip).
    pub fn duration(&self) -> Tick {
        if let Some(pinned) = self.pinned_duration {
            return pinned;
        }
        self.tracks
            .values()
            .filter_map(|t| t.data_bounds())
            .map(|b| b.end)
            .max()
            .unwrap_or(Tick::ZERO)
    }

    pub fn pinned_duration(&self) -> Option<Tick> {
        self.pinned_duration
    }

    pub fn set_pinned_duration(&mut self, duration: Option<Tick>) {
        self.pinned_duration = duration;
    }

    /// View of this clip with extra tracks muted (recording preview).
    pub fn view(&self) -> ClipView<'_> {
        ClipView {
            clip: self,
            muted_overlay: HashSet::new(),
        }
    }

    pub fn view_without(&self, muted: impl IntoIterator<Item = TrackId>) -> ClipView<'_> {
        ClipView {
            clip: self,
            muted_overlay: muted.into_iter().collect(),
        }
    }

    // Raw arena access for history restore; bypasses lock checks on purpose.
    pub(crate) fn insert_track_raw(&mut self, track: Track) {
        self.tracks.insert(track.id, track);
    }

    pub(crate) fn remove_track_raw(&mut self, id: TrackId) {
        self.tracks.remove(&id);
    }

    pub(crate) fn set_roots_raw(&mut self, roots: Vec<TrackId>) {
        self.roots = roots;
    }

    pub(crate) fn contains(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }
}

/// A filtered, read-only view of a clip used by playback. Tracks muted on the
/// clip or in the overlay are invisible through it.
#[derive(Clone)]
pub struct ClipView<'a> {
    clip: &'a Clip,
    muted_overlay: HashSet<TrackId>,
}

impl<'a> ClipView<'a> {
    pub fn clip(&self) -> &'a Clip {
        self.clip
    }

    /// A track is audible when neither it nor any ancestor is muted, on the
    /// clip or in this view's overlay.
    pub fn is_audible(&self, track: &Track) -> bool {
        if track.muted || self.muted_overlay.contains(&track.id) {
            return false;
        }
        let mut cursor = track.parent;
        while let Some(id) = cursor {
            match self.clip.tracks.get(&id) {
                Some(parent) if parent.muted || self.muted_overlay.contains(&id) => return false,
                Some(parent) => cursor = parent.parent,
                None => return false,
            }
        }
        true
    }

    /// Audible property tracks, depth-first.
    pub fn property_tracks(&self) -> impl Iterator<Item = &'a Track> + '_ {
        self.clip
            .iter_depth_first()
            .filter(|t| t.is_property() && self.is_audible(t))
    }

    /// Sampled value of an audible track at `t`.
    pub fn value_at(&self, id: TrackId, t: Tick) -> Result<Option<Value>, CoreError> {
        let track = self.clip.find(id)?;
        if !self.is_audible(track) {
            return Ok(None);
        }
        track.value_at(t, self.clip.sample_rate)
    }
}

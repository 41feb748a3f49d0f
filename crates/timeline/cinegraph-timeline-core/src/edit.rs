//! Edit operations: copy, paste, cut, delete and move over the current
//! selection, all routed through the history log.
//!
//! The clipboard is a UTF-8 JSON document of per-track payload groups with a
//! shared anchor time; paste places payloads at `playhead - anchor` and
//! validates that each group's target type is assignable to its destination
//! track. A failure anywhere rolls the whole operation back and pushes no
//! history entry.

use cinegraph_api_core::CoreError;
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::clip::Clip;
use crate::curve::{Interp, Keyframe};
use crate::history::History;
use crate::time::{Tick, TimeRange};
use crate::track::{TrackContent, TrackId};

/// A user-selected time range plus the interpolation newly inserted
/// keyframes pick up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSelection {
    pub range: TimeRange,
    pub default_interp: Interp,
}

impl TimeSelection {
    pub fn new(range: TimeRange, default_interp: Interp) -> Self {
        Self {
            range,
            default_interp,
        }
    }
}

/// Tracks plus time window an edit operation acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub tracks: Vec<TrackId>,
    pub time: TimeSelection,
}

/// One copied track's payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardGroup {
    pub guid: TrackId,
    #[serde(rename = "targetType")]
    pub target_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyframes: Vec<Keyframe>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

impl ClipboardGroup {
    fn earliest_time(&self) -> Option<Tick> {
        let key_min = self.keyframes.iter().map(|k| k.time).min();
        let block_min = self.blocks.iter().map(|b| b.range.start).min();
        match (key_min, block_min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn is_empty(&self) -> bool {
        self.keyframes.is_empty() && self.blocks.is_empty()
    }
}

/// The clipboard document: `{ "time": <ticks>, "keyframes": [ <group>... ] }`
/// where `time` is the anchor (minimum payload time across all groups).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clipboard {
    pub time: Tick,
    pub keyframes: Vec<ClipboardGroup>,
}

impl Clipboard {
    pub fn is_empty(&self) -> bool {
        self.keyframes.iter().all(ClipboardGroup::is_empty)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Serialize the selection's keyframes and blocks per track.
pub fn copy(clip: &Clip, selection: &Selection) -> Result<Clipboard, CoreError> {
    let range = selection.time.range;
    let mut groups = Vec::new();
    for id in &selection.tracks {
        let track = clip.find(*id)?;
        let mut group = ClipboardGroup {
            guid: *id,
            target_type: track.target_type.clone(),
            keyframes: Vec::new(),
            blocks: Vec::new(),
        };
        match &track.content {
            TrackContent::Empty => {}
            TrackContent::Curve(curve) => group.keyframes = curve.keys_in(&range),
            TrackContent::Blocks(list) => group.blocks = list.extract(&range),
        }
        if !group.is_empty() {
            groups.push(group);
        }
    }
    let anchor = groups
        .iter()
        .filter_map(ClipboardGroup::earliest_time)
        .min()
        .unwrap_or(range.start);
    Ok(Clipboard {
        time: anchor,
        keyframes: groups,
    })
}

fn shift_group(group: &ClipboardGroup, offset: Tick) -> (Vec<Keyframe>, Vec<Block>) {
    let keyframes = group
        .keyframes
        .iter()
        .map(|k| Keyframe {
            time: k.time + offset,
            ..k.clone()
        })
        .collect();
    let blocks = group
        .blocks
        .iter()
        .map(|b| Block {
            range: b.range.shift(offset),
            data: b.data.clone(),
        })
        .collect();
    (keyframes, blocks)
}

/// Paste the clipboard at the playhead.
///
/// With exactly one group and a selected track of assignable type the group
/// lands there; otherwise groups land on the tracks their guids name.
/// Placement offset is `playhead - anchor`. Atomic: any failure rolls the
/// whole paste back.
pub fn paste(
    clip: &mut Clip,
    history: &mut History,
    clipboard: &Clipboard,
    playhead: Tick,
    selected: Option<TrackId>,
) -> Result<(), CoreError> {
    let offset = playhead - clipboard.time;
    // Destination per group, resolved before mutating anything.
    let mut destinations: Vec<(TrackId, &ClipboardGroup)> = Vec::new();
    let single_selected = match (clipboard.keyframes.as_slice(), selected) {
        ([only], Some(track)) => Some((only, track)),
        _ => None,
    };
    match single_selected {
        Some((group, track)) => destinations.push((track, group)),
        None => {
            for group in &clipboard.keyframes {
                destinations.push((group.guid, group));
            }
        }
    }
    for (dest, group) in &destinations {
        let track = clip.find(*dest)?;
        if track.target_type != group.target_type {
            return Err(CoreError::TypeMismatch {
                expected: track
                    .value_kind()
                    .unwrap_or(cinegraph_api_core::ValueKind::Action),
                actual: cinegraph_api_core::ValueKind::from_tag(&group.target_type)
                    .unwrap_or(cinegraph_api_core::ValueKind::Action),
            });
        }
    }

    let affected: Vec<TrackId> = destinations.iter().map(|(id, _)| *id).collect();
    history.transaction(clip, "Paste", &affected, |clip| {
        for (dest, group) in &destinations {
            let (keyframes, blocks) = shift_group(group, offset);
            let track = clip.find_mut(*dest)?;
            if !keyframes.is_empty() {
                let curve = track.curve_mut()?;
                for key in keyframes {
                    curve.insert(key);
                }
            }
            if !blocks.is_empty() {
                track.blocks_mut()?.add_range(blocks)?;
            }
        }
        Ok(())
    })?;
    tracing::debug!(groups = destinations.len(), "pasted clipboard");
    Ok(())
}

/// Remove blocks/keyframes inside the selection.
pub fn delete(clip: &mut Clip, history: &mut History, selection: &Selection) -> Result<(), CoreError> {
    let range = selection.time.range;
    history.transaction(clip, "Delete", &selection.tracks, |clip| {
        for id in &selection.tracks {
            let track = clip.find_mut(*id)?;
            match &track.content {
                TrackContent::Empty => {}
                TrackContent::Curve(_) => {
                    track.curve_mut()?.remove_range(&range);
                }
                TrackContent::Blocks(_) => {
                    track.blocks_mut()?.remove(&range);
                }
            }
        }
        Ok(())
    })
}

/// Copy then delete.
pub fn cut(
    clip: &mut Clip,
    history: &mut History,
    selection: &Selection,
) -> Result<Clipboard, CoreError> {
    let clipboard = copy(clip, selection)?;
    delete(clip, history, selection)?;
    Ok(clipboard)
}

/// Shift the selected span by `delta`; landing collisions follow the
/// overwrite policy.
pub fn move_selection(
    clip: &mut Clip,
    history: &mut History,
    selection: &Selection,
    delta: Tick,
) -> Result<(), CoreError> {
    let range = selection.time.range;
    history.transaction(clip, "Move", &selection.tracks, |clip| {
        for id in &selection.tracks {
            let track = clip.find_mut(*id)?;
            match &track.content {
                TrackContent::Empty => {}
                TrackContent::Curve(_) => {
                    let curve = track.curve_mut()?;
                    let keys = curve.take_range(&range);
                    for mut key in keys {
                        key.time = key.time + delta;
                        curve.insert(key);
                    }
                }
                TrackContent::Blocks(_) => {
                    let list = track.blocks_mut()?;
                    let taken = list.take(&range);
                    list.add_range(crate::block::shift_blocks(taken, delta))?;
                }
            }
        }
        Ok(())
    })
}

//! Playback: sampling the track tree at a time and writing through the
//! binder into the scene.
//!
//! Per sample step the order is fixed: time advances, binder invalidations
//! are processed by the host, every property write lands, bone accessors
//! compose and apply, then the scene renders. The player never aborts: an
//! unresolved track is skipped for the tick and a bad read yields the kind's
//! default.

use cinegraph_api_core::{ops, CoreError, ScenePath, Value, WriteBatch, WriteOp};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::binding::{Binder, BoneApplier, BoneInfo, ObjectHandle, SceneQuery};
use crate::block::BlockData;
use crate::clip::Clip;
use crate::time::{Tick, BASE_RATE};
use crate::track::{TrackId, TrackKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Time advances at wall clock times `rate`.
    Playing,
    Paused,
    /// Time is set externally (timeline dragging).
    Scrubbing,
}

/// An action block crossed during this step.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub track: TrackId,
    pub at: Tick,
    pub payload: Vec<u8>,
}

/// What one sample step produced, for preview surfaces and tests. Writes are
/// also applied to the scene before this is returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerOutputs {
    pub batch: WriteBatch,
    pub events: Vec<ActionEvent>,
}

impl PlayerOutputs {
    fn clear(&mut self) {
        self.batch.clear();
        self.events.clear();
    }
}

/// Samples a clip snapshot and drives scene targets.
pub struct Player {
    clip: Option<Clip>,
    binder: Option<Box<dyn Binder>>,
    mode: PlaybackMode,
    time: Tick,
    rate: f64,
    /// Time of the previous sample step, for action-crossing detection.
    last_sampled: Option<Tick>,
    outputs: PlayerOutputs,
}

impl Player {
    pub fn new() -> Self {
        Self {
            clip: None,
            binder: None,
            mode: PlaybackMode::Paused,
            time: Tick::ZERO,
            rate: 1.0,
            last_sampled: None,
            outputs: PlayerOutputs::default(),
        }
    }

    /// Install the clip snapshot playback reads from.
    pub fn set_clip(&mut self, clip: Clip) {
        self.clip = Some(clip);
        self.last_sampled = None;
    }

    pub fn clear_clip(&mut self) {
        self.clip = None;
    }

    pub fn set_binder(&mut self, binder: Box<dyn Binder>) {
        self.binder = Some(binder);
    }

    /// Host notification that the scene graph changed.
    pub fn invalidate_bindings(&mut self) {
        if let Some(binder) = self.binder.as_mut() {
            binder.invalidate();
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn time(&self) -> Tick {
        self.time
    }

    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn play(&mut self) {
        self.mode = PlaybackMode::Playing;
    }

    pub fn pause(&mut self) {
        self.mode = PlaybackMode::Paused;
    }

    /// Enter scrubbing and jump to `t`.
    pub fn scrub(&mut self, t: Tick) {
        self.mode = PlaybackMode::Scrubbing;
        self.time = t;
    }

    pub fn set_time(&mut self, t: Tick) {
        self.time = t;
    }

    /// One sample step: advance time (when playing), sample every audible
    /// property track, write through the binder, then compose and apply bone
    /// overrides. Returns what happened for preview rendering.
    pub fn advance(
        &mut self,
        dt: f64,
        scene: &mut dyn SceneQuery,
        bones: &mut dyn BoneApplier,
    ) -> &PlayerOutputs {
        if self.mode == PlaybackMode::Playing {
            let delta = (dt * self.rate * BASE_RATE as f64).round() as i64;
            self.time = self.time + Tick(delta);
        }
        self.sample_at_current_time(scene, bones);
        &self.outputs
    }

    fn sample_at_current_time(&mut self, scene: &mut dyn SceneQuery, bones: &mut dyn BoneApplier) {
        self.outputs.clear();
        let t = self.time;
        let crossed_from = self.last_sampled;
        self.last_sampled = Some(t);

        let Some(clip) = self.clip.as_ref() else {
            return;
        };
        let Some(binder) = self.binder.as_mut() else {
            return;
        };

        let view = clip.view();
        let mut overrides: BoneOverrides = BoneOverrides::default();

        for track in view.property_tracks() {
            if track.value_kind() == Some(cinegraph_api_core::ValueKind::Action) {
                collect_action_crossings(clip, track.id, crossed_from, t, &mut self.outputs.events);
                continue;
            }
            let value = match track.value_at(t, clip.sample_rate) {
                Ok(Some(v)) => v,
                Ok(None) => match track.value_kind() {
                    Some(kind) => Value::default_for(kind),
                    None => continue,
                },
                Err(_) => continue,
            };
            let binding = match binder.resolve_property(clip, track.id, scene) {
                Ok(b) => b,
                // Unresolved this tick: silently skipped.
                Err(_) => continue,
            };
            if let Some(bone) = binding.bone_name() {
                if let Value::Transform { pos, rot, scale } = &value {
                    overrides.store(binding.object, bone, (*pos, *rot, *scale));
                    if let Ok(path) = track_scene_path(clip, track.id) {
                        self.outputs.batch.push(WriteOp::new(path, value.clone()));
                    }
                }
                continue;
            }
            if !binding.is_writable() {
                continue;
            }
            if binding.write(scene, &value).is_ok() {
                if let Ok(path) = track_scene_path(clip, track.id) {
                    self.outputs.batch.push(WriteOp::new(path, value));
                }
            }
        }

        // All property writes are done; now compose bones in hierarchy order.
        overrides.compose_and_apply(scene, bones);
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

/// Fire events for action blocks whose start lies in `(from, to]`. Backward
/// jumps fire nothing and re-arm at the new time.
fn collect_action_crossings(
    clip: &Clip,
    track: TrackId,
    from: Option<Tick>,
    to: Tick,
    events: &mut Vec<ActionEvent>,
) {
    let Ok(t) = clip.find(track) else {
        return;
    };
    let Ok(blocks) = t.compiled_blocks(clip.sample_rate) else {
        return;
    };
    let from = match from {
        Some(f) if f <= to => f,
        // First sample or a backward scrub: arm without firing.
        _ => return,
    };
    for block in &blocks {
        if let BlockData::Action { payload } = &block.data {
            let at = block.range.start;
            if at > from && at <= to {
                events.push(ActionEvent {
                    track,
                    at,
                    payload: payload.clone(),
                });
            }
        }
    }
}

type Trs = ([f32; 3], [f32; 4], [f32; 3]);

/// Per-object bone override accumulation for one sample step.
#[derive(Default)]
struct BoneOverrides {
    by_object: HashMap<ObjectHandle, HashMap<String, Trs>>,
}

impl BoneOverrides {
    fn store(&mut self, object: ObjectHandle, bone: &str, trs: Trs) {
        self.by_object
            .entry(object)
            .or_default()
            .insert(bone.to_string(), trs);
    }

    /// Recompute local transforms in hierarchy order: a bone's stored
    /// object-space transform composes with its (possibly also overridden)
    /// ancestor chain, and the final locals are pushed to the applier.
    fn compose_and_apply(self, scene: &dyn SceneQuery, applier: &mut dyn BoneApplier) {
        for (object, stored) in self.by_object {
            let bone_list = scene.bones(object);
            let Some(order) = hierarchy_order(&bone_list) else {
                tracing::warn!(?object, "bone hierarchy has a cycle; overrides dropped");
                continue;
            };
            let mut object_space: Vec<Option<Trs>> = vec![None; bone_list.len()];
            let mut affected: Vec<bool> = vec![false; bone_list.len()];
            for idx in order {
                let bone = &bone_list[idx];
                let current = stored.get(&bone.name).copied().or_else(|| {
                    match scene.bone_object_transform(object, &bone.name) {
                        Some(Value::Transform { pos, rot, scale }) => Some((pos, rot, scale)),
                        _ => None,
                    }
                });
                let Some(os) = current else {
                    continue;
                };
                object_space[idx] = Some(os);
                let parent_affected = bone
                    .parent
                    .map(|p| affected.get(p).copied().unwrap_or(false))
                    .unwrap_or(false);
                affected[idx] = parent_affected || stored.contains_key(&bone.name);
                if !affected[idx] {
                    continue;
                }
                let local = match bone.parent.and_then(|p| object_space.get(p).copied().flatten())
                {
                    Some(parent_os) => ops::transform_mul(ops::transform_invert(parent_os), os),
                    None => os,
                };
                applier.apply_local(
                    object,
                    &bone.name,
                    Value::Transform {
                        pos: local.0,
                        rot: local.1,
                        scale: local.2,
                    },
                );
            }
        }
    }
}

/// Parent-before-child visit order for a bone list, regardless of how the
/// model orders its bones. `None` when the reported hierarchy has a cycle.
pub(crate) fn hierarchy_order(bones: &[BoneInfo]) -> Option<Vec<usize>> {
    let n = bones.len();
    let mut order = Vec::with_capacity(n);
    let mut placed = vec![false; n];
    let mut remaining = n;
    while remaining > 0 {
        let mut progressed = false;
        for i in 0..n {
            if placed[i] {
                continue;
            }
            let ready = match bones[i].parent {
                Some(p) => p < n && placed[p],
                None => true,
            };
            if ready {
                placed[i] = true;
                order.push(i);
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            return None;
        }
    }
    Some(order)
}

/// Scene path of a track: reference-track names form the object path, then
/// property-track names chain as selectors.
pub fn track_scene_path(clip: &Clip, track: TrackId) -> Result<ScenePath, CoreError> {
    let mut refs: Vec<String> = Vec::new();
    let mut props: Vec<String> = Vec::new();
    let mut cursor = Some(track);
    while let Some(id) = cursor {
        let t = clip.find(id)?;
        match t.kind {
            TrackKind::Reference => refs.push(t.name.clone()),
            TrackKind::Property => props.push(t.name.clone()),
        }
        cursor = t.parent;
    }
    refs.reverse();
    props.reverse();
    let (target, objects) = refs.split_last().ok_or_else(|| CoreError::NotBound {
        id: track.to_string(),
    })?;
    Ok(ScenePath::new(objects.to_vec(), target.clone(), props))
}

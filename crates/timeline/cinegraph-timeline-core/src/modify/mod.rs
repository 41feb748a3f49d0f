//! Non-destructive modifications: read-only analyses of source tracks that
//! emit compiled tracks.
//!
//! A modification samples the selection at the project rate, computes derived
//! values, and returns [`CompiledPropertyTrack`]s. Nothing lands in the clip
//! until the result, staged in an [`EditOverlay`], is committed through the
//! history; cancel simply drops the overlay.

mod bone_bake;
mod motion_params;
mod rotate_with_motion;

pub use bone_bake::AnimParamsToBones;
pub use motion_params::MotionToAnimParams;
pub use rotate_with_motion::RotateWithMotion;

use cinegraph_api_core::{ops, CoreError, Value, ValueKind};

use crate::binding::{Binder, SceneQuery};
use crate::block::Block;
use crate::clip::Clip;
use crate::edit::TimeSelection;
use crate::history::History;
use crate::time::{Tick, TimeRange};
use crate::track::{Track, TrackContent, TrackId, TrackKind};

/// The selection's tracks over a read-only clip.
pub struct TrackListView<'a> {
    clip: &'a Clip,
    tracks: Vec<TrackId>,
}

impl<'a> TrackListView<'a> {
    pub fn new(clip: &'a Clip, tracks: Vec<TrackId>) -> Self {
        Self { clip, tracks }
    }

    pub fn clip(&self) -> &'a Clip {
        self.clip
    }

    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    /// Selected, unlocked reference tracks of the given target type.
    pub fn references_of_type(&self, target_type: &str) -> Vec<TrackId> {
        self.tracks
            .iter()
            .filter_map(|id| self.clip.find(*id).ok())
            .filter(|t| {
                t.kind == TrackKind::Reference && t.target_type == target_type && !t.locked
            })
            .map(|t| t.id)
            .collect()
    }

    /// Child property track of `parent` by name, when it has data in `range`.
    pub fn child_with_data(
        &self,
        parent: TrackId,
        name: &str,
        range: &TimeRange,
    ) -> Option<&'a Track> {
        let child = self.clip.find_child(parent, name)?;
        if !child.is_property() || child.locked {
            return None;
        }
        let bounds = child.data_bounds()?;
        bounds.overlaps(range).then_some(child)
    }
}

/// Host services a modification may need while running.
pub struct ModificationHost<'a> {
    pub scene: &'a dyn SceneQuery,
    pub binder: &'a mut dyn Binder,
}

/// How a compiled track lands on its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Overwrite the destination span.
    Replace,
    /// Combine with the destination's current values.
    Additive,
}

/// One output track of a modification, addressed by where it should live in
/// the tree rather than by an id that may not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPropertyTrack {
    /// Existing track the output nests under (object or component track).
    pub parent: TrackId,
    /// Intermediate accessor `(name, target_type)` to route through, e.g.
    /// `("Bones", "bone")`; created on commit when missing.
    pub accessor: Option<(String, String)>,
    /// Destination property track name (property, parameter or bone name).
    pub name: String,
    /// Value tag of the destination track.
    pub target_type: String,
    pub blocks: Vec<Block>,
    pub overlay: OverlayMode,
}

/// A read-only analysis that emits compiled tracks.
pub trait Modification {
    fn name(&self) -> &str;

    /// Whether the selection contains anything this modification can use.
    fn can_start(&self, view: &TrackListView, selection: &TimeSelection) -> bool;

    /// Run the analysis and return the compiled output. A cancelled
    /// modification returns an empty result.
    fn start(
        &mut self,
        view: &TrackListView,
        selection: &TimeSelection,
        host: &mut ModificationHost,
    ) -> Result<Vec<CompiledPropertyTrack>, CoreError>;

    /// Short-circuit emission; partially emitted blocks are discarded.
    fn cancel(&mut self);
}

/// Sample a source track on the selection's frame grid. Returns one value
/// per frame (inclusive endpoints), falling back to the kind's default
/// before any data.
pub(crate) fn sample_source(
    track: &Track,
    range: &TimeRange,
    rate: i32,
    project_rate: i32,
) -> Result<Vec<Value>, CoreError> {
    let period = Tick::frame_period(rate)?;
    let frames = range.frame_count(rate)?;
    let kind = track.value_kind().unwrap_or(ValueKind::Float);
    let mut out = Vec::with_capacity(frames as usize + 1);
    for f in 0..=frames {
        let t = range.start + Tick(f * period.ticks());
        let v = track
            .value_at(t, project_rate)?
            .unwrap_or_else(|| Value::default_for(kind));
        out.push(v);
    }
    Ok(out)
}

/// Compile one run of per-frame values into a block over the sampled span,
/// collapsing to Constant when every sample agrees approximately.
pub(crate) fn compile_run(
    start: Tick,
    rate: i32,
    values: Vec<Value>,
) -> Result<Block, CoreError> {
    let period = Tick::frame_period(rate)?;
    if values.len() < 2 {
        let value = values.into_iter().next().ok_or_else(|| {
            CoreError::decode("modification emitted an empty run")
        })?;
        return Block::constant(
            TimeRange {
                start,
                end: start + period,
            },
            value,
        );
    }
    let end = start + Tick((values.len() as i64 - 1) * period.ticks());
    let range = TimeRange { start, end };
    if values.iter().all(|v| ops::almost_eq(&values[0], v)) {
        let value = values.into_iter().next().ok_or_else(|| {
            CoreError::decode("modification emitted an empty run")
        })?;
        Block::constant(range, value)
    } else {
        Block::samples(range, rate, values)
    }
}

/// Staged modification results awaiting commit or cancel.
#[derive(Debug, Default)]
pub struct EditOverlay {
    entries: Vec<CompiledPropertyTrack>,
}

impl EditOverlay {
    pub fn new(entries: Vec<CompiledPropertyTrack>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CompiledPropertyTrack] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Preview value of an overlay entry at `t`, blended over the clip's
    /// current state.
    pub fn preview_value(
        &self,
        clip: &Clip,
        entry_index: usize,
        t: Tick,
    ) -> Option<Value> {
        let entry = self.entries.get(entry_index)?;
        let mut list = crate::block::BlockList::new();
        list.add_range(entry.blocks.clone()).ok()?;
        let emitted = list.value_at(t)?;
        match entry.overlay {
            OverlayMode::Replace => Some(emitted),
            OverlayMode::Additive => {
                let base = clip
                    .find(entry.parent)
                    .ok()
                    .and_then(|p| {
                        let leaf = clip.find_child(p.id, &entry.name)?;
                        leaf.value_at(t, clip.sample_rate).ok().flatten()
                    })
                    .unwrap_or_else(|| {
                        Value::default_for(
                            ValueKind::from_tag(&entry.target_type).unwrap_or(ValueKind::Float),
                        )
                    });
                Some(ops::additive_combine(&base, &emitted))
            }
        }
    }

    /// Drop the overlay without touching the clip.
    pub fn cancel(self) {}

    /// Land every entry in the clip under one history label, creating
    /// destination tracks (and accessors) as needed.
    pub fn commit(
        self,
        clip: &mut Clip,
        history: &mut History,
        label: &str,
    ) -> Result<Vec<TrackId>, CoreError> {
        // Plan destinations first so created ids are known to the snapshot.
        struct Plan {
            entry: CompiledPropertyTrack,
            accessor_create: Option<Track>,
            accessor_id: Option<TrackId>,
            leaf_create: Option<Track>,
            leaf_id: TrackId,
        }
        let mut plans: Vec<Plan> = Vec::with_capacity(self.entries.len());
        let mut affected: Vec<TrackId> = Vec::new();
        for entry in self.entries {
            clip.find(entry.parent)?;
            affected.push(entry.parent);
            let prior_accessor = plans
                .iter()
                .find(|p| p.entry.parent == entry.parent && p.entry.accessor == entry.accessor)
                .and_then(|p| p.accessor_id);
            let (accessor_create, accessor_id, leaf_parent) = match (&entry.accessor, prior_accessor)
            {
                (Some(_), Some(id)) => (None, Some(id), id),
                (Some((name, target_type)), None) => match clip.find_child(entry.parent, name) {
                    Some(existing) => (None, Some(existing.id), existing.id),
                    None => {
                        let mut track = Track::property(name.clone(), ValueKind::Bone);
                        track.target_type = target_type.clone();
                        track.content = TrackContent::Empty;
                        let id = track.id;
                        (Some(track), Some(id), id)
                    }
                },
                (None, _) => (None, None, entry.parent),
            };
            if let Some(id) = accessor_id {
                affected.push(id);
            }
            let (leaf_create, leaf_id) = match plans
                .iter()
                .find(|p| {
                    p.leaf_create.is_some()
                        && p.entry.parent == entry.parent
                        && p.entry.accessor == entry.accessor
                        && p.entry.name == entry.name
                })
                .map(|p| p.leaf_id)
            {
                Some(id) => (None, id),
                None => match clip.find_child(leaf_parent, &entry.name) {
                    Some(existing) => (None, existing.id),
                    None => {
                        let kind =
                            ValueKind::from_tag(&entry.target_type).unwrap_or(ValueKind::Float);
                        let track = Track::property(entry.name.clone(), kind);
                        let id = track.id;
                        (Some(track), id)
                    }
                },
            };
            affected.push(leaf_id);
            plans.push(Plan {
                entry,
                accessor_create,
                accessor_id,
                leaf_create,
                leaf_id,
            });
        }

        let sample_rate = clip.sample_rate;
        let created: Vec<TrackId> = plans
            .iter()
            .filter(|p| p.leaf_create.is_some())
            .map(|p| p.leaf_id)
            .collect();
        history.transaction(clip, label, &affected, |clip| {
            for plan in plans {
                let leaf_parent = match (plan.accessor_create, plan.accessor_id) {
                    (Some(track), Some(id)) => {
                        if !clip.contains(id) {
                            clip.add_child(plan.entry.parent, track)?;
                        }
                        id
                    }
                    (None, Some(id)) => id,
                    _ => plan.entry.parent,
                };
                if let Some(track) = plan.leaf_create {
                    if !clip.contains(plan.leaf_id) {
                        clip.add_child(leaf_parent, track)?;
                    }
                }
                let blocks = match plan.entry.overlay {
                    OverlayMode::Replace => plan.entry.blocks,
                    OverlayMode::Additive => {
                        let base = clip.find(plan.leaf_id)?;
                        combine_additive(base, &plan.entry.blocks, sample_rate)?
                    }
                };
                clip.find_mut(plan.leaf_id)?.blocks_mut()?.add_range(blocks)?;
            }
            Ok(())
        })?;
        Ok(created)
    }
}

/// Resample additive delta blocks against the destination's current values.
fn combine_additive(
    base: &Track,
    deltas: &[Block],
    project_rate: i32,
) -> Result<Vec<Block>, CoreError> {
    let rate = base.effective_rate(project_rate);
    let period = Tick::frame_period(rate)?;
    let mut out = Vec::with_capacity(deltas.len());
    for delta in deltas {
        let frames = delta.range.frame_count(rate)?;
        let mut values = Vec::with_capacity(frames as usize + 1);
        for f in 0..=frames {
            let t = delta.range.start + Tick(f * period.ticks());
            let d = delta.value_at(t);
            let b = base
                .value_at(t, project_rate)?
                .unwrap_or_else(|| Value::default_for(d.kind()));
            values.push(ops::additive_combine(&b, &d));
        }
        out.push(compile_run(delta.range.start, rate, values)?);
    }
    Ok(out)
}

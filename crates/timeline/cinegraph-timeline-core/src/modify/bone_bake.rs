//! Anim Params To Bones: bake animation-graph output into bone tracks.
//!
//! For each selected skinned renderer that has parameter tracks, a shadow
//! model is spawned from the scene, fed the parameter values frame by frame,
//! and stepped at the project sample period. The resulting object-space bone
//! transforms become one Transform track per bone under the renderer's bone
//! accessor. Bones are visited parent-before-child regardless of the order
//! the model reports them in.

use cinegraph_api_core::{CoreError, Value, ValueKind};

use crate::binding::{BONES_ACCESSOR, PARAMS_ACCESSOR};
use crate::edit::TimeSelection;
use crate::player::hierarchy_order;
use crate::time::Tick;
use crate::track::{Track, TrackId, TrackKind};

use super::{
    compile_run, CompiledPropertyTrack, Modification, ModificationHost, OverlayMode,
    TrackListView,
};

#[derive(Debug, Default)]
pub struct AnimParamsToBones {
    cancelled: bool,
}

impl AnimParamsToBones {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Float parameter tracks under the renderer's parameter accessor that have
/// data inside the selection.
fn param_tracks<'a>(
    view: &TrackListView<'a>,
    renderer: TrackId,
    selection: &TimeSelection,
) -> Vec<&'a Track> {
    let clip = view.clip();
    let Some(accessor) = clip.find_child(renderer, PARAMS_ACCESSOR) else {
        return Vec::new();
    };
    accessor
        .children
        .iter()
        .filter_map(|id| clip.find(*id).ok())
        .filter(|t| {
            t.value_kind() == Some(ValueKind::Float)
                && t.data_bounds()
                    .map(|b| b.overlaps(&selection.range))
                    .unwrap_or(false)
        })
        .collect()
}

fn selected_renderers(view: &TrackListView) -> Vec<TrackId> {
    let clip = view.clip();
    let mut renderers = view.references_of_type("SkinnedModelRenderer");
    // Selecting an object selects its renderer children too.
    for id in view.tracks() {
        if let Ok(track) = clip.find(*id) {
            for child in &track.children {
                if let Ok(t) = clip.find(*child) {
                    if t.kind == TrackKind::Reference
                        && t.target_type == "SkinnedModelRenderer"
                        && !t.locked
                    {
                        renderers.push(t.id);
                    }
                }
            }
        }
    }
    renderers.sort_by_key(|id| id.0);
    renderers.dedup();
    renderers
}

impl Modification for AnimParamsToBones {
    fn name(&self) -> &str {
        "Anim Params To Bones"
    }

    fn can_start(&self, view: &TrackListView, selection: &TimeSelection) -> bool {
        selected_renderers(view)
            .iter()
            .any(|r| !param_tracks(view, *r, selection).is_empty())
    }

    fn start(
        &mut self,
        view: &TrackListView,
        selection: &TimeSelection,
        host: &mut ModificationHost,
    ) -> Result<Vec<CompiledPropertyTrack>, CoreError> {
        let clip = view.clip();
        let rate = clip.sample_rate;
        let period = Tick::frame_period(rate)?;
        let period_secs = period.as_secs_f64() as f32;
        let frames = selection.range.frame_count(rate)?;
        let mut out = Vec::new();

        for renderer in selected_renderers(view) {
            let params = param_tracks(view, renderer, selection);
            if params.is_empty() {
                continue;
            }
            let Some(object) = host.binder.resolve_ref(clip, renderer, host.scene) else {
                tracing::warn!(track = %renderer, "renderer unbound; skipping bake");
                continue;
            };
            let Some(mut shadow) = host.scene.spawn_shadow_model(object) else {
                continue;
            };
            let bones = shadow.bones();
            let order = hierarchy_order(&bones)
                .ok_or_else(|| CoreError::decode("model bone hierarchy has a cycle"))?;

            let mut per_bone: Vec<Vec<Value>> =
                vec![Vec::with_capacity(frames as usize + 1); bones.len()];
            for f in 0..=frames {
                if self.cancelled {
                    // Discard everything emitted so far.
                    self.cancelled = false;
                    return Ok(Vec::new());
                }
                let t = selection.range.start + Tick(f * period.ticks());
                for track in &params {
                    if let Some(v) = track.value_at(t, rate)? {
                        shadow.set_parameter(&track.name, &v);
                    }
                }
                shadow.update(period_secs);
                for &idx in &order {
                    per_bone[idx].push(shadow.bone_object_transform(idx));
                }
            }

            for &idx in &order {
                let values = std::mem::take(&mut per_bone[idx]);
                if values.is_empty() {
                    continue;
                }
                out.push(CompiledPropertyTrack {
                    parent: renderer,
                    accessor: Some((BONES_ACCESSOR.to_string(), "bone".to_string())),
                    name: bones[idx].name.clone(),
                    target_type: "transform".to_string(),
                    blocks: vec![compile_run(selection.range.start, rate, values)?],
                    overlay: OverlayMode::Replace,
                });
            }
        }
        tracing::debug!(outputs = out.len(), "anim-params-to-bones compiled");
        Ok(out)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}

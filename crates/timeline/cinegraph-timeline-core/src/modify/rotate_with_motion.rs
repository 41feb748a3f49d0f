//! Rotate With Motion: face each object along its direction of travel.
//!
//! For every selected object whose `LocalPosition` track has data in the
//! selection, emit a `LocalRotation` track: at each frame with motion the
//! rotation looks along the position delta, still frames inherit the
//! previous rotation, and frames before the first motion are back-filled
//! from it. Objects that never move are skipped.

use cinegraph_api_core::{ops, CoreError, Value};

use crate::binding::{LOCAL_POSITION, LOCAL_ROTATION};
use crate::edit::TimeSelection;

use super::{
    compile_run, sample_source, CompiledPropertyTrack, Modification, ModificationHost,
    OverlayMode, TrackListView,
};

#[derive(Debug, Default)]
pub struct RotateWithMotion {
    cancelled: bool,
}

impl RotateWithMotion {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Modification for RotateWithMotion {
    fn name(&self) -> &str {
        "Rotate With Motion"
    }

    fn can_start(&self, view: &TrackListView, selection: &TimeSelection) -> bool {
        view.references_of_type("GameObject").iter().any(|obj| {
            view.child_with_data(*obj, LOCAL_POSITION, &selection.range)
                .is_some()
        })
    }

    fn start(
        &mut self,
        view: &TrackListView,
        selection: &TimeSelection,
        _host: &mut ModificationHost,
    ) -> Result<Vec<CompiledPropertyTrack>, CoreError> {
        if std::mem::take(&mut self.cancelled) {
            return Ok(Vec::new());
        }
        let clip = view.clip();
        let rate = clip.sample_rate;
        let mut out = Vec::new();

        for obj in view.references_of_type("GameObject") {
            let Some(pos_track) = view.child_with_data(obj, LOCAL_POSITION, &selection.range)
            else {
                continue;
            };
            let positions = sample_source(pos_track, &selection.range, rate, rate)?;
            let positions: Vec<[f32; 3]> = positions
                .iter()
                .filter_map(Value::as_vec3)
                .collect();
            if positions.len() < 2 {
                continue;
            }

            let mut rotations: Vec<Option<[f32; 4]>> = vec![None; positions.len()];
            let mut first_motion: Option<usize> = None;
            for i in 1..positions.len() {
                let prev = positions[i - 1];
                let cur = positions[i];
                let moved = !ops::exact_eq(&Value::Vec3(prev), &Value::Vec3(cur));
                if moved {
                    let delta = [cur[0] - prev[0], cur[1] - prev[1], cur[2] - prev[2]];
                    rotations[i] = Some(ops::quat_look_along(delta));
                    first_motion.get_or_insert(i);
                } else {
                    rotations[i] = rotations[i - 1];
                }
            }
            // Never moved: nothing to say about this object.
            let Some(first) = first_motion else {
                continue;
            };
            let fill = rotations[first];
            for slot in rotations.iter_mut().take(first) {
                *slot = fill;
            }

            let values: Vec<Value> = rotations
                .into_iter()
                .map(|q| Value::Quat(q.unwrap_or([0.0, 0.0, 0.0, 1.0])))
                .collect();
            out.push(CompiledPropertyTrack {
                parent: obj,
                accessor: None,
                name: LOCAL_ROTATION.to_string(),
                target_type: "quat".to_string(),
                blocks: vec![compile_run(selection.range.start, rate, values)?],
                overlay: OverlayMode::Replace,
            });
        }
        tracing::debug!(outputs = out.len(), "rotate-with-motion compiled");
        Ok(out)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}

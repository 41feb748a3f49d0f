//! Motion To Anim Parameters: derive animation-graph locomotion parameters
//! from an object's motion tracks.
//!
//! Velocities are finite-differenced positions times the sample rate, yaw
//! speed is the wrapped degree delta times the sample rate, acceleration is
//! the velocity delta between frames. Velocity and acceleration rotate into
//! object-local space through the object's orientation; `move_y` and
//! `skid_y` are negated, and the skid pair is scaled by 1/800.

use cinegraph_api_core::{ops, CoreError, Value};

use crate::binding::{LOCAL_POSITION, LOCAL_ROTATION, PARAMS_ACCESSOR};
use crate::edit::TimeSelection;
use crate::track::{TrackId, TrackKind};

use super::{
    compile_run, sample_source, CompiledPropertyTrack, Modification, ModificationHost,
    OverlayMode, TrackListView,
};

const SKID_SCALE: f32 = 1.0 / 800.0;

#[derive(Debug, Default)]
pub struct MotionToAnimParams {
    cancelled: bool,
}

impl MotionToAnimParams {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The object's skinned renderer child track, if any.
fn renderer_child(view: &TrackListView, obj: TrackId) -> Option<TrackId> {
    let clip = view.clip();
    let track = clip.find(obj).ok()?;
    track
        .children
        .iter()
        .filter_map(|id| clip.find(*id).ok())
        .find(|t| t.kind == TrackKind::Reference && t.target_type == "SkinnedModelRenderer")
        .map(|t| t.id)
}

impl Modification for MotionToAnimParams {
    fn name(&self) -> &str {
        "Motion To Anim Parameters"
    }

    fn can_start(&self, view: &TrackListView, selection: &TimeSelection) -> bool {
        view.references_of_type("GameObject").iter().any(|obj| {
            renderer_child(view, *obj).is_some()
                && view
                    .child_with_data(*obj, LOCAL_POSITION, &selection.range)
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
            let Some(renderer) = renderer_child(view, obj) else {
                continue;
            };
            let Some(pos_track) = view.child_with_data(obj, LOCAL_POSITION, &selection.range)
            else {
                continue;
            };
            let positions: Vec<[f32; 3]> = sample_source(pos_track, &selection.range, rate, rate)?
                .iter()
                .filter_map(Value::as_vec3)
                .collect();
            if positions.len() < 2 {
                continue;
            }
            let n = positions.len();

            // Orientation from the rotation track when present, identity
            // otherwise; the analysis reads tracks only.
            let orientations: Vec<[f32; 4]> = match view.child_with_data(
                obj,
                LOCAL_ROTATION,
                &selection.range,
            ) {
                Some(rot_track) => sample_source(rot_track, &selection.range, rate, rate)?
                    .iter()
                    .map(|v| v.as_quat().unwrap_or([0.0, 0.0, 0.0, 1.0]))
                    .collect(),
                None => vec![[0.0, 0.0, 0.0, 1.0]; n],
            };

            let rate_f = rate as f32;
            let mut velocity = vec![[0.0f32; 3]; n];
            for i in 1..n {
                let (p, q) = (positions[i - 1], positions[i]);
                velocity[i] = [
                    (q[0] - p[0]) * rate_f,
                    (q[1] - p[1]) * rate_f,
                    (q[2] - p[2]) * rate_f,
                ];
            }
            velocity[0] = velocity[1];

            let mut accel = vec![[0.0f32; 3]; n];
            for i in 1..n {
                accel[i] = [
                    velocity[i][0] - velocity[i - 1][0],
                    velocity[i][1] - velocity[i - 1][1],
                    velocity[i][2] - velocity[i - 1][2],
                ];
            }

            let mut yaw_speed = vec![0.0f32; n];
            for i in 1..n {
                let delta = ops::quat_yaw_degrees(orientations[i])
                    - ops::quat_yaw_degrees(orientations[i - 1]);
                yaw_speed[i] = ops::wrap_degrees(delta) * rate_f;
            }
            yaw_speed[0] = yaw_speed[1];

            let mut params: [(&str, Vec<Value>); 9] = [
                ("move_x", Vec::with_capacity(n)),
                ("move_y", Vec::with_capacity(n)),
                ("move_z", Vec::with_capacity(n)),
                ("direction", Vec::with_capacity(n)),
                ("speed", Vec::with_capacity(n)),
                ("groundspeed", Vec::with_capacity(n)),
                ("rotationspeed", Vec::with_capacity(n)),
                ("skid_x", Vec::with_capacity(n)),
                ("skid_y", Vec::with_capacity(n)),
            ];
            for i in 0..n {
                let inverse = ops::quat_conjugate(orientations[i]);
                let local_v = ops::rotate_vec3(inverse, velocity[i]);
                let local_a = ops::rotate_vec3(inverse, accel[i]);
                let v = velocity[i];
                let speed = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                let ground = (v[0] * v[0] + v[1] * v[1]).sqrt();
                let direction = if ground > f32::EPSILON {
                    ops::wrap_degrees(local_v[1].atan2(local_v[0]).to_degrees())
                } else {
                    0.0
                };
                params[0].1.push(Value::Float(local_v[0]));
                params[1].1.push(Value::Float(-local_v[1]));
                params[2].1.push(Value::Float(local_v[2]));
                params[3].1.push(Value::Float(direction));
                params[4].1.push(Value::Float(speed));
                params[5].1.push(Value::Float(ground));
                params[6].1.push(Value::Float(yaw_speed[i]));
                params[7].1.push(Value::Float(local_a[0] * SKID_SCALE));
                params[8].1.push(Value::Float(-local_a[1] * SKID_SCALE));
            }

            for (name, values) in params {
                out.push(CompiledPropertyTrack {
                    parent: renderer,
                    accessor: Some((PARAMS_ACCESSOR.to_string(), "params".to_string())),
                    name: name.to_string(),
                    target_type: "float".to_string(),
                    blocks: vec![compile_run(selection.range.start, rate, values)?],
                    overlay: OverlayMode::Replace,
                });
            }
        }
        tracing::debug!(outputs = out.len(), "motion-to-params compiled");
        Ok(out)
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}

//! Shared fixtures: an in-memory scene, a recording bone applier, and a
//! scripted shadow model.
#![allow(dead_code)]

use cinegraph_timeline_core::{
    BoneApplier, BoneInfo, Clip, ObjectHandle, SceneQuery, Tick, TimeRange, Track, TrackId, Value,
    ValueKind,
};
use hashbrown::HashMap;

pub fn secs(s: i64) -> Tick {
    Tick::from_secs(s)
}

pub fn range(a: i64, b: i64) -> TimeRange {
    TimeRange::new(secs(a), secs(b)).unwrap()
}

/// An in-memory stand-in for the live scene.
#[derive(Default)]
pub struct MockScene {
    pub objects: HashMap<String, ObjectHandle>,
    pub types: HashMap<u64, String>,
    pub props: HashMap<(u64, String), Value>,
    pub read_only: Vec<(u64, String)>,
    pub bones: HashMap<u64, Vec<BoneInfo>>,
    pub bone_transforms: HashMap<(u64, String), Value>,
    pub shadow_frames: Option<ShadowScript>,
}

impl MockScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object at `path` with the given type; returns its handle.
    pub fn add_object(&mut self, path: &str, type_name: &str) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u64 + 1);
        self.objects.insert(path.to_string(), handle);
        self.types.insert(handle.0, type_name.to_string());
        handle
    }

    pub fn set_prop(&mut self, object: ObjectHandle, name: &str, value: Value) {
        self.props.insert((object.0, name.to_string()), value);
    }

    pub fn prop(&self, object: ObjectHandle, name: &str) -> Option<&Value> {
        self.props.get(&(object.0, name.to_string()))
    }
}

impl SceneQuery for MockScene {
    fn find_object(&self, path: &cinegraph_timeline_core::ScenePath) -> Option<ObjectHandle> {
        self.objects.get(&path.to_string()).copied()
    }

    fn object_type(&self, object: ObjectHandle) -> Option<String> {
        self.types.get(&object.0).cloned()
    }

    fn read_property(&self, object: ObjectHandle, property: &str) -> Option<Value> {
        self.props.get(&(object.0, property.to_string())).cloned()
    }

    fn write_property(&mut self, object: ObjectHandle, property: &str, value: &Value) -> bool {
        if self
            .read_only
            .iter()
            .any(|(o, p)| *o == object.0 && p == property)
        {
            return false;
        }
        self.props
            .insert((object.0, property.to_string()), value.clone());
        true
    }

    fn bones(&self, object: ObjectHandle) -> Vec<BoneInfo> {
        self.bones.get(&object.0).cloned().unwrap_or_default()
    }

    fn bone_object_transform(&self, object: ObjectHandle, bone: &str) -> Option<Value> {
        self.bone_transforms
            .get(&(object.0, bone.to_string()))
            .cloned()
    }

    fn spawn_shadow_model(
        &self,
        _object: ObjectHandle,
    ) -> Option<Box<dyn cinegraph_timeline_core::binding::ShadowModel>> {
        self.shadow_frames.clone().map(|script| {
            Box::new(ScriptedShadowModel {
                script,
                frame: 0,
                params: HashMap::new(),
            }) as Box<dyn cinegraph_timeline_core::binding::ShadowModel>
        })
    }
}

/// Bone list plus per-update object-space transforms the model plays back.
#[derive(Clone)]
pub struct ShadowScript {
    pub bones: Vec<BoneInfo>,
    /// `frames[f][bone_index]` = object-space transform after update `f`.
    pub frames: Vec<Vec<Value>>,
}

pub struct ScriptedShadowModel {
    script: ShadowScript,
    frame: usize,
    params: HashMap<String, Value>,
}

impl ScriptedShadowModel {
    pub fn last_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

impl cinegraph_timeline_core::binding::ShadowModel for ScriptedShadowModel {
    fn set_parameter(&mut self, name: &str, value: &Value) {
        self.params.insert(name.to_string(), value.clone());
    }

    fn update(&mut self, _dt: f32) {
        if self.frame + 1 < self.script.frames.len() {
            self.frame += 1;
        }
    }

    fn bones(&self) -> Vec<BoneInfo> {
        self.script.bones.clone()
    }

    fn bone_object_transform(&self, index: usize) -> Value {
        self.script.frames[self.frame][index].clone()
    }
}

/// Records every applied bone local in order.
#[derive(Default)]
pub struct RecordingApplier {
    pub applied: Vec<(ObjectHandle, String, Value)>,
}

impl BoneApplier for RecordingApplier {
    fn apply_local(&mut self, object: ObjectHandle, bone: &str, local: Value) {
        self.applied.push((object, bone.to_string(), local));
    }
}

/// Clip with `Player` (GameObject) and a `LocalPosition` Vec3 child track.
pub fn player_clip(rate: i32) -> (Clip, TrackId, TrackId) {
    let mut clip = Clip::new(rate).unwrap();
    let root = clip
        .add_root(Track::reference("Player", "GameObject"))
        .unwrap();
    let pos = clip
        .add_child(root, Track::property("LocalPosition", ValueKind::Vec3))
        .unwrap();
    (clip, root, pos)
}

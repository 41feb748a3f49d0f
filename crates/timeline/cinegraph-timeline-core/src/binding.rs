//! Binding: resolving track identity to live scene targets.
//!
//! The track tree names things; the scene owns them. A [`Binder`] turns a
//! track id into either an object handle (reference tracks) or a
//! [`PropertyBinding`] (property tracks), caching the latest resolution until
//! the scene notifies of a graph change. Property lookup goes through the
//! [`PropertyTable`]: every component type registers its property names and
//! value kinds at startup, and the binder verifies the track's declared type
//! against the table, failing `TypeMismatch` on disagreement.
//!
//! Bone and animation-parameter accessors are pseudo-properties: their child
//! tracks are named after bones/parameters, and bone writes are composed at
//! the scene's bone-update phase through the [`BoneApplier`].

use cinegraph_api_core::{CoreError, ScenePath, Value, ValueKind};
use hashbrown::HashMap;

use crate::clip::Clip;
use crate::track::{TrackId, TrackKind};

/// Opaque handle to a live scene object or component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u64);

/// One bone of a skinned model. `parent` indexes into the same list.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneInfo {
    pub name: String,
    pub parent: Option<usize>,
}

/// Read access to the live scene; implemented by the host runtime.
pub trait SceneQuery {
    /// Look an object up by hierarchy path.
    fn find_object(&self, path: &ScenePath) -> Option<ObjectHandle>;

    /// Scene type name of an object (the key into the property table).
    fn object_type(&self, object: ObjectHandle) -> Option<String>;

    /// Current value of a property (animation parameters included).
    fn read_property(&self, object: ObjectHandle, property: &str) -> Option<Value>;

    /// Write a property value. `false` means the target is read-only or gone.
    fn write_property(&mut self, object: ObjectHandle, property: &str, value: &Value) -> bool;

    /// Bone table of a skinned model, in model order.
    fn bones(&self, object: ObjectHandle) -> Vec<BoneInfo>;

    /// Current object-space transform of a bone.
    fn bone_object_transform(&self, object: ObjectHandle, bone: &str) -> Option<Value>;

    /// Spawn a shadow model of a skinned renderer for offline parameter
    /// baking; `None` when the object has no animation graph.
    fn spawn_shadow_model(&self, object: ObjectHandle) -> Option<Box<dyn ShadowModel>>;
}

/// Receives composed bone overrides during the scene's bone-update phase.
pub trait BoneApplier {
    /// Push one bone's final local transform; called in hierarchy order.
    fn apply_local(&mut self, object: ObjectHandle, bone: &str, local: Value);
}

/// A detached copy of a skinned model driven purely by parameter values;
/// what `AnimParamsToBones` bakes from.
pub trait ShadowModel {
    fn set_parameter(&mut self, name: &str, value: &Value);
    /// Advance the model's animation by `dt` seconds.
    fn update(&mut self, dt: f32);
    fn bones(&self) -> Vec<BoneInfo>;
    /// Object-space transform of bone `index` after the last update.
    fn bone_object_transform(&self, index: usize) -> Value;
}

/// What a component type says about one of its properties.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySpec {
    /// Plain value property.
    Value { kind: ValueKind, writable: bool },
    /// Pseudo-property whose children are bone names (Transform tracks).
    BoneAccessor,
    /// Pseudo-property whose children are animation-graph parameters
    /// (float tracks, dynamically named).
    ParamAccessor,
}

/// Startup-registered `{type name -> {property name -> spec}}` tables; the
/// language-neutral stand-in for reflected member lookup.
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    types: HashMap<String, HashMap<String, PropertySpec>>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(
        &mut self,
        type_name: impl Into<String>,
        properties: impl IntoIterator<Item = (String, PropertySpec)>,
    ) {
        self.types
            .entry(type_name.into())
            .or_default()
            .extend(properties);
    }

    pub fn lookup(&self, type_name: &str, property: &str) -> Option<&PropertySpec> {
        self.types.get(type_name)?.get(property)
    }
}

/// Where a resolved property binding lands.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTarget {
    Property {
        name: String,
        kind: ValueKind,
        writable: bool,
    },
    Bone {
        bone: String,
    },
    Param {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBinding {
    pub object: ObjectHandle,
    pub target: ResolvedTarget,
}

impl PropertyBinding {
    pub fn is_writable(&self) -> bool {
        match &self.target {
            ResolvedTarget::Property { writable, .. } => *writable,
            ResolvedTarget::Bone { .. } | ResolvedTarget::Param { .. } => true,
        }
    }

    /// Whether writes route through the bone override table instead of a
    /// direct scene write.
    pub fn bone_name(&self) -> Option<&str> {
        match &self.target {
            ResolvedTarget::Bone { bone } => Some(bone),
            _ => None,
        }
    }

    /// Read the current live value.
    pub fn read(&self, scene: &dyn SceneQuery) -> Option<Value> {
        match &self.target {
            ResolvedTarget::Property { name, .. } | ResolvedTarget::Param { name } => {
                scene.read_property(self.object, name)
            }
            ResolvedTarget::Bone { bone } => scene.bone_object_transform(self.object, bone),
        }
    }

    /// Write through to the scene. Bone targets must go through the player's
    /// override table instead and return `NotBound` here.
    pub fn write(&self, scene: &mut dyn SceneQuery, value: &Value) -> Result<(), CoreError> {
        let name = match &self.target {
            ResolvedTarget::Property {
                name,
                writable: true,
                ..
            } => name,
            ResolvedTarget::Param { name } => name,
            _ => {
                return Err(CoreError::NotBound {
                    id: format!("{:?}", self.object),
                })
            }
        };
        if scene.write_property(self.object, name, value) {
            Ok(())
        } else {
            Err(CoreError::NotBound {
                id: format!("{:?}", self.object),
            })
        }
    }
}

/// Binder surface the editor talks to; [`SceneBinder`] is the standard
/// implementation.
pub trait Binder {
    /// Handle of a reference track's target; `None` when unbound or gone.
    fn resolve_ref(
        &mut self,
        clip: &Clip,
        track: TrackId,
        scene: &dyn SceneQuery,
    ) -> Option<ObjectHandle>;

    /// Full resolution of a property track down to a readable/writable
    /// target.
    fn resolve_property(
        &mut self,
        clip: &Clip,
        track: TrackId,
        scene: &dyn SceneQuery,
    ) -> Result<PropertyBinding, CoreError>;

    /// Scene graph changed (add/remove/reparent): drop cached resolutions.
    fn invalidate(&mut self);
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Ref(ObjectHandle),
    Prop(PropertyBinding),
}

/// Standard binder: property-table lookups plus a per-track resolution cache.
#[derive(Default)]
pub struct SceneBinder {
    table: PropertyTable,
    cache: HashMap<TrackId, CacheEntry>,
}

impl SceneBinder {
    pub fn new(table: PropertyTable) -> Self {
        Self {
            table,
            cache: HashMap::new(),
        }
    }

    pub fn table(&self) -> &PropertyTable {
        &self.table
    }

    /// Split a track's ancestry into the reference chain (object names, root
    /// first) and the property chain (accessor plus selectors, root first).
    fn chains(clip: &Clip, track: TrackId) -> Result<(Vec<String>, Vec<String>), CoreError> {
        let mut refs = Vec::new();
        let mut props = Vec::new();
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
        Ok((refs, props))
    }

    fn object_path(refs: &[String]) -> Option<ScenePath> {
        let (target, objects) = refs.split_last()?;
        Some(ScenePath::new(objects.to_vec(), target.clone(), Vec::new()))
    }

    fn resolve_property_uncached(
        &self,
        clip: &Clip,
        track: TrackId,
        scene: &dyn SceneQuery,
    ) -> Result<PropertyBinding, CoreError> {
        let t = clip.find(track)?;
        let track_kind = t.value_kind().ok_or_else(|| CoreError::NotBound {
            id: track.to_string(),
        })?;
        let (refs, props) = Self::chains(clip, track)?;
        let not_bound = || CoreError::NotBound {
            id: track.to_string(),
        };
        let path = Self::object_path(&refs).ok_or_else(not_bound)?;
        let object = scene.find_object(&path).ok_or_else(not_bound)?;
        let type_name = scene.object_type(object).ok_or_else(not_bound)?;
        let accessor = props.first().ok_or_else(not_bound)?;
        let spec = self
            .table
            .lookup(&type_name, accessor)
            .ok_or_else(not_bound)?;

        match spec {
            PropertySpec::Value { kind, writable } => {
                if props.len() != 1 {
                    return Err(not_bound());
                }
                if *kind != track_kind {
                    return Err(CoreError::TypeMismatch {
                        expected: *kind,
                        actual: track_kind,
                    });
                }
                Ok(PropertyBinding {
                    object,
                    target: ResolvedTarget::Property {
                        name: accessor.clone(),
                        kind: *kind,
                        writable: *writable,
                    },
                })
            }
            PropertySpec::BoneAccessor => {
                let bone = props.get(1).ok_or_else(not_bound)?;
                if props.len() != 2 {
                    return Err(not_bound());
                }
                if track_kind != ValueKind::Transform {
                    return Err(CoreError::TypeMismatch {
                        expected: ValueKind::Transform,
                        actual: track_kind,
                    });
                }
                Ok(PropertyBinding {
                    object,
                    target: ResolvedTarget::Bone { bone: bone.clone() },
                })
            }
            PropertySpec::ParamAccessor => {
                let param = props.get(1).ok_or_else(not_bound)?;
                if props.len() != 2 {
                    return Err(not_bound());
                }
                if track_kind != ValueKind::Float {
                    return Err(CoreError::TypeMismatch {
                        expected: ValueKind::Float,
                        actual: track_kind,
                    });
                }
                Ok(PropertyBinding {
                    object,
                    target: ResolvedTarget::Param {
                        name: param.clone(),
                    },
                })
            }
        }
    }
}

impl Binder for SceneBinder {
    fn resolve_ref(
        &mut self,
        clip: &Clip,
        track: TrackId,
        scene: &dyn SceneQuery,
    ) -> Option<ObjectHandle> {
        if let Some(CacheEntry::Ref(handle)) = self.cache.get(&track) {
            return Some(*handle);
        }
        let (refs, _) = Self::chains(clip, track).ok()?;
        let path = Self::object_path(&refs)?;
        let handle = scene.find_object(&path)?;
        self.cache.insert(track, CacheEntry::Ref(handle));
        Some(handle)
    }

    fn resolve_property(
        &mut self,
        clip: &Clip,
        track: TrackId,
        scene: &dyn SceneQuery,
    ) -> Result<PropertyBinding, CoreError> {
        if let Some(CacheEntry::Prop(binding)) = self.cache.get(&track) {
            return Ok(binding.clone());
        }
        let binding = self.resolve_property_uncached(clip, track, scene)?;
        self.cache.insert(track, CacheEntry::Prop(binding.clone()));
        Ok(binding)
    }

    fn invalidate(&mut self) {
        tracing::debug!(entries = self.cache.len(), "binder cache invalidated");
        self.cache.clear();
    }
}

/// Canonical accessor names used by the stock property tables.
pub const BONES_ACCESSOR: &str = "Bones";
pub const PARAMS_ACCESSOR: &str = "Parameters";
pub const LOCAL_POSITION: &str = "LocalPosition";
pub const LOCAL_ROTATION: &str = "LocalRotation";

/// Property table entries every host registers for plain game objects and
/// skinned renderers; hosts extend these with their own component types.
pub fn standard_table() -> PropertyTable {
    let mut table = PropertyTable::new();
    table.register_type(
        "GameObject",
        [
            (
                LOCAL_POSITION.to_string(),
                PropertySpec::Value {
                    kind: ValueKind::Vec3,
                    writable: true,
                },
            ),
            (
                LOCAL_ROTATION.to_string(),
                PropertySpec::Value {
                    kind: ValueKind::Quat,
                    writable: true,
                },
            ),
            (
                "LocalScale".to_string(),
                PropertySpec::Value {
                    kind: ValueKind::Vec3,
                    writable: true,
                },
            ),
        ],
    );
    table.register_type(
        "SkinnedModelRenderer",
        [
            (BONES_ACCESSOR.to_string(), PropertySpec::BoneAccessor),
            (PARAMS_ACCESSOR.to_string(), PropertySpec::ParamAccessor),
            (
                "Tint".to_string(),
                PropertySpec::Value {
                    kind: ValueKind::Rgba,
                    writable: true,
                },
            ),
        ],
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;
    use hashbrown::HashMap;

    struct MiniScene {
        objects: HashMap<String, ObjectHandle>,
        types: HashMap<u64, String>,
        values: HashMap<(u64, String), Value>,
        read_only: Vec<String>,
    }

    impl MiniScene {
        fn new() -> Self {
            Self {
                objects: HashMap::new(),
                types: HashMap::new(),
                values: HashMap::new(),
                read_only: Vec::new(),
            }
        }

        fn add(&mut self, path: &str, type_name: &str) -> ObjectHandle {
            let handle = ObjectHandle(self.objects.len() as u64 + 1);
            self.objects.insert(path.to_string(), handle);
            self.types.insert(handle.0, type_name.to_string());
            handle
        }
    }

    impl SceneQuery for MiniScene {
        fn find_object(&self, path: &ScenePath) -> Option<ObjectHandle> {
            self.objects.get(&path.to_string()).copied()
        }
        fn object_type(&self, object: ObjectHandle) -> Option<String> {
            self.types.get(&object.0).cloned()
        }
        fn read_property(&self, object: ObjectHandle, property: &str) -> Option<Value> {
            self.values.get(&(object.0, property.to_string())).cloned()
        }
        fn write_property(&mut self, object: ObjectHandle, property: &str, value: &Value) -> bool {
            if self.read_only.iter().any(|p| p == property) {
                return false;
            }
            self.values
                .insert((object.0, property.to_string()), value.clone());
            true
        }
        fn bones(&self, _object: ObjectHandle) -> Vec<BoneInfo> {
            Vec::new()
        }
        fn bone_object_transform(&self, _object: ObjectHandle, _bone: &str) -> Option<Value> {
            None
        }
        fn spawn_shadow_model(&self, _object: ObjectHandle) -> Option<Box<dyn ShadowModel>> {
            None
        }
    }

    fn clip_with_position() -> (crate::clip::Clip, TrackId) {
        let mut clip = crate::clip::Clip::new(30).unwrap();
        let root = clip
            .add_root(Track::reference("Player", "GameObject"))
            .unwrap();
        let pos = clip
            .add_child(root, Track::property(LOCAL_POSITION, ValueKind::Vec3))
            .unwrap();
        (clip, pos)
    }

    #[test]
    fn resolves_plain_property() {
        let (clip, pos) = clip_with_position();
        let mut scene = MiniScene::new();
        let object = scene.add("Player", "GameObject");
        let mut binder = SceneBinder::new(standard_table());
        let binding = binder.resolve_property(&clip, pos, &scene).unwrap();
        assert_eq!(binding.object, object);
        assert!(binding.is_writable());
        assert!(binding.bone_name().is_none());
        binding
            .write(&mut scene, &Value::Vec3([1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(
            binding.read(&scene),
            Some(Value::Vec3([1.0, 2.0, 3.0]))
        );
    }

    #[test]
    fn declared_type_must_match_table() {
        let mut clip = crate::clip::Clip::new(30).unwrap();
        let root = clip
            .add_root(Track::reference("Player", "GameObject"))
            .unwrap();
        let wrong = clip
            .add_child(root, Track::property(LOCAL_POSITION, ValueKind::Float))
            .unwrap();
        let mut scene = MiniScene::new();
        scene.add("Player", "GameObject");
        let mut binder = SceneBinder::new(standard_table());
        assert!(matches!(
            binder.resolve_property(&clip, wrong, &scene),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn missing_object_is_not_bound() {
        let (clip, pos) = clip_with_position();
        let scene = MiniScene::new();
        let mut binder = SceneBinder::new(standard_table());
        assert!(matches!(
            binder.resolve_property(&clip, pos, &scene),
            Err(CoreError::NotBound { .. })
        ));
    }

    #[test]
    fn cache_survives_until_invalidated() {
        let (clip, pos) = clip_with_position();
        let mut scene = MiniScene::new();
        let object = scene.add("Player", "GameObject");
        let mut binder = SceneBinder::new(standard_table());
        binder.resolve_property(&clip, pos, &scene).unwrap();
        // The object disappears; the stale resolution is served from cache
        // until the scene notifies of the change.
        scene.objects.clear();
        let cached = binder.resolve_property(&clip, pos, &scene).unwrap();
        assert_eq!(cached.object, object);
        binder.invalidate();
        assert!(binder.resolve_property(&clip, pos, &scene).is_err());
    }

    #[test]
    fn bone_accessor_children_resolve_as_bones() {
        let mut clip = crate::clip::Clip::new(30).unwrap();
        let root = clip
            .add_root(Track::reference("Player", "GameObject"))
            .unwrap();
        let renderer = clip
            .add_child(root, Track::reference("Body", "SkinnedModelRenderer"))
            .unwrap();
        let accessor = {
            let mut track = Track::property(BONES_ACCESSOR, ValueKind::Bone);
            track.content = crate::track::TrackContent::Empty;
            clip.add_child(renderer, track).unwrap()
        };
        let spine = clip
            .add_child(accessor, Track::property("spine_01", ValueKind::Transform))
            .unwrap();
        let mut scene = MiniScene::new();
        scene.add("Player", "GameObject");
        scene.add("Player/Body", "SkinnedModelRenderer");
        let mut binder = SceneBinder::new(standard_table());
        let binding = binder.resolve_property(&clip, spine, &scene).unwrap();
        assert_eq!(binding.bone_name(), Some("spine_01"));
        // Bone writes route through the override table, never straight in.
        assert!(binding
            .write(&mut scene, &Value::default_for(ValueKind::Transform))
            .is_err());
    }

    #[test]
    fn read_only_property_rejects_writes() {
        let (clip, pos) = clip_with_position();
        let mut scene = MiniScene::new();
        scene.add("Player", "GameObject");
        scene.read_only.push(LOCAL_POSITION.to_string());
        let mut binder = SceneBinder::new(standard_table());
        let binding = binder.resolve_property(&clip, pos, &scene).unwrap();
        assert!(matches!(
            binding.write(&mut scene, &Value::Vec3([0.0; 3])),
            Err(CoreError::NotBound { .. })
        ));
    }
}

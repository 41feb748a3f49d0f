//! Typed values animated by property tracks.
//!
//! Every payload a track can carry is one variant of [`Value`]; dispatch is
//! on the enum discriminator, never on host-runtime type information. The
//! stable string tags returned by [`ValueKind::tag`] are the `target_type`
//! strings stored in tracks, documents and the clipboard.

use serde::{Deserialize, Serialize};

/// Coarse kind of a [`Value`], used for dispatch and type checks.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Quat,
    Rgba,
    Transform,
    /// Opaque handle into a skinned model's bone table; not interpolable.
    Bone,
    /// Atomic event payload; fires on crossing, never interpolated.
    Action,
}

impl ValueKind {
    /// Stable string tag used as `target_type` in tracks and documents.
    pub fn tag(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Vec2 => "vec2",
            ValueKind::Vec3 => "vec3",
            ValueKind::Vec4 => "vec4",
            ValueKind::Quat => "quat",
            ValueKind::Rgba => "rgba",
            ValueKind::Transform => "transform",
            ValueKind::Bone => "bone",
            ValueKind::Action => "action",
        }
    }

    /// Reverse lookup from a stable tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<ValueKind> {
        Some(match tag {
            "bool" => ValueKind::Bool,
            "int" => ValueKind::Int,
            "float" => ValueKind::Float,
            "vec2" => ValueKind::Vec2,
            "vec3" => ValueKind::Vec3,
            "vec4" => ValueKind::Vec4,
            "quat" => ValueKind::Quat,
            "rgba" => ValueKind::Rgba,
            "transform" => ValueKind::Transform,
            "bone" => ValueKind::Bone,
            "action" => ValueKind::Action,
            _ => return None,
        })
    }

    /// Whether values of this kind can be blended between samples.
    pub fn is_interpolable(self) -> bool {
        !matches!(self, ValueKind::Bone | ValueKind::Action)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),

    Int(i32),

    Float(f32),

    Vec2([f32; 2]),

    Vec3([f32; 3]),

    Vec4([f32; 4]),

    /// Unit quaternion (x, y, z, w).
    Quat([f32; 4]),

    /// RGBA color, linear by convention.
    Rgba([f32; 4]),

    /// Transform split to TRS so each part blends with its own rule.
    Transform {
        pos: [f32; 3],
        rot: [f32; 4], // quat (x,y,z,w)
        scale: [f32; 3],
    },

    /// Named bone handle resolved through a bone accessor.
    Bone(String),

    /// Opaque event payload.
    Action(Vec<u8>),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Vec4(_) => ValueKind::Vec4,
            Value::Quat(_) => ValueKind::Quat,
            Value::Rgba(_) => ValueKind::Rgba,
            Value::Transform { .. } => ValueKind::Transform,
            Value::Bone(_) => ValueKind::Bone,
            Value::Action(_) => ValueKind::Action,
        }
    }

    /// Neutral value for a kind; what sampling yields before any block.
    pub fn default_for(kind: ValueKind) -> Value {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Vec2 => Value::Vec2([0.0; 2]),
            ValueKind::Vec3 => Value::Vec3([0.0; 3]),
            ValueKind::Vec4 => Value::Vec4([0.0; 4]),
            ValueKind::Quat => Value::Quat(IDENTITY_QUAT),
            ValueKind::Rgba => Value::Rgba([0.0, 0.0, 0.0, 1.0]),
            ValueKind::Transform => Value::Transform {
                pos: [0.0; 3],
                rot: IDENTITY_QUAT,
                scale: [1.0; 3],
            },
            ValueKind::Bone => Value::Bone(String::new()),
            ValueKind::Action => Value::Action(Vec::new()),
        }
    }

    /// Convenience constructors
    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Vec3([x, y, z])
    }

    pub fn quat(x: f32, y: f32, z: f32, w: f32) -> Self {
        Value::Quat([x, y, z, w])
    }

    pub fn transform(pos: [f32; 3], rot: [f32; 4], scale: [f32; 3]) -> Self {
        Value::Transform { pos, rot, scale }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_quat(&self) -> Option<[f32; 4]> {
        match self {
            Value::Quat(q) => Some(*q),
            _ => None,
        }
    }
}

pub(crate) const IDENTITY_QUAT: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

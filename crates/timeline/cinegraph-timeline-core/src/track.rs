//! Tracks: the nodes of the movie's track tree.
//!
//! A reference track names a scene object or component and carries no data of
//! its own; a property track targets a property on its parent's resolved
//! target and holds either a block sequence or a keyframe curve. Identity is
//! a stable GUID so parents and children link by id, never by reference.

use cinegraph_api_core::{CoreError, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::block::{Block, BlockList};
use crate::curve::KeyframeCurve;
use crate::time::{Tick, TimeRange};

/// Stable track identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Resolves to a scene object/component; a naming parent for children.
    Reference,
    /// Targets a property path on the parent's resolved target.
    Property,
}

/// What a property track stores. Reference tracks hold `Empty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackContent {
    Empty,
    Blocks(BlockList),
    Curve(KeyframeCurve),
}

impl TrackContent {
    pub fn is_empty(&self) -> bool {
        match self {
            TrackContent::Empty => true,
            TrackContent::Blocks(list) => list.is_empty(),
            TrackContent::Curve(curve) => curve.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub parent: Option<TrackId>,
    pub children: Vec<TrackId>,
    pub kind: TrackKind,
    /// For property tracks: the value-kind tag. For reference tracks: the
    /// scene target type name (object or component type).
    pub target_type: String,
    pub locked: bool,
    pub muted: bool,
    /// Per-track sample rate; `None` inherits the project rate.
    pub sample_rate: Option<i32>,
    pub content: TrackContent,
}

impl Track {
    pub fn reference(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            parent: None,
            children: Vec::new(),
            kind: TrackKind::Reference,
            target_type: target_type.into(),
            locked: false,
            muted: false,
            sample_rate: None,
            content: TrackContent::Empty,
        }
    }

    /// Sampled property track (block storage).
    pub fn property(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            parent: None,
            children: Vec::new(),
            kind: TrackKind::Property,
            target_type: kind.tag().to_string(),
            locked: false,
            muted: false,
            sample_rate: None,
            content: TrackContent::Blocks(BlockList::new()),
        }
    }

    /// Keyframed property track.
    pub fn keyframed(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            content: TrackContent::Curve(KeyframeCurve::new()),
            ..Self::property(name, kind)
        }
    }

    pub fn is_property(&self) -> bool {
        self.kind == TrackKind::Property
    }

    /// Declared value kind of a property track, if the tag is a value tag.
    pub fn value_kind(&self) -> Option<ValueKind> {
        ValueKind::from_tag(&self.target_type)
    }

    /// Effective sample rate given the project rate.
    pub fn effective_rate(&self, project_rate: i32) -> i32 {
        self.sample_rate.unwrap_or(project_rate)
    }

    fn check_unlocked(&self) -> Result<(), CoreError> {
        if self.locked {
            return Err(CoreError::Locked {
                id: self.id.to_string(),
            });
        }
        Ok(())
    }

    /// Sampled value at `t`, or the kind's default when no data reaches `t`.
    pub fn value_at(&self, t: Tick, project_rate: i32) -> Result<Option<Value>, CoreError> {
        match &self.content {
            TrackContent::Empty => Ok(None),
            TrackContent::Blocks(list) => Ok(list.value_at(t)),
            TrackContent::Curve(curve) => curve.value_at(t, self.effective_rate(project_rate)),
        }
    }

    /// The track's block view: borrowed for sampled tracks, compiled for
    /// keyframed ones.
    pub fn compiled_blocks(&self, project_rate: i32) -> Result<Vec<Block>, CoreError> {
        match &self.content {
            TrackContent::Empty => Ok(Vec::new()),
            TrackContent::Blocks(list) => Ok(list.blocks().to_vec()),
            TrackContent::Curve(curve) => curve.compile(self.effective_rate(project_rate)),
        }
    }

    /// Time span covered by this track's data.
    pub fn data_bounds(&self) -> Option<TimeRange> {
        match &self.content {
            TrackContent::Empty => None,
            TrackContent::Blocks(list) => list.bounds(),
            TrackContent::Curve(curve) => curve.bounds(),
        }
    }

    /// Mutable block storage, rejecting locked tracks and keyframed content.
    pub fn blocks_mut(&mut self) -> Result<&mut BlockList, CoreError> {
        self.check_unlocked()?;
        match &mut self.content {
            TrackContent::Blocks(list) => Ok(list),
            _ => Err(CoreError::decode("track does not store blocks")),
        }
    }

    /// Mutable curve storage, rejecting locked tracks and sampled content.
    pub fn curve_mut(&mut self) -> Result<&mut KeyframeCurve, CoreError> {
        self.check_unlocked()?;
        match &mut self.content {
            TrackContent::Curve(curve) => Ok(curve),
            _ => Err(CoreError::decode("track does not store keyframes")),
        }
    }
}

//! Write operations emitted by playback toward the live scene.
//!
//! A WriteOp serializes to JSON as:
//!   { "path": "Player/Body.LocalPosition", "value": { "type": "vec3", "data": [1,2,3] } }
//!
//! WriteBatch is a thin Vec<WriteOp> with helpers; the player fills one per
//! tick and the host (or the in-core binder) applies it.

use crate::{path::ScenePath, value::Value};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOp {
    pub path: ScenePath,
    pub value: Value,
}

impl WriteOp {
    pub fn new(path: ScenePath, value: Value) -> Self {
        Self { path, value }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = serde_json::to_string(&self.value).map_err(|_| fmt::Error)?;
        write!(f, "{{ path: {}, value: {} }}", self.path, val)
    }
}

/// A batch of write operations for one sampled time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch(pub Vec<WriteOp>);

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch(Vec::new())
    }

    pub fn push(&mut self, op: WriteOp) {
        self.0.push(op);
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn into_vec(self) -> Vec<WriteOp> {
        self.0
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

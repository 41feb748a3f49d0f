//! ScenePath parsing and formatting.
//!
//! Grammar:
//!   object/.../Object.property.subproperty
//! - '/' separates scene-object segments from root to leaf
//! - the last '/'-separated segment holds the target object plus optional
//!   '.'-separated property selectors
//!   Examples:
//!   "level/Player/Body.LocalPosition" -> objects=["level","Player"], target="Body", properties=["LocalPosition"]
//!   "Player/Renderer.Bones.spine_01"  -> objects=["Player"], target="Renderer", properties=["Bones","spine_01"]
//!
//! Paths are string-based on purpose; the Binder resolves them against the
//! live scene and owns all caching.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScenePath {
    /// Scene-object segments preceding the target (may be empty).
    pub objects: Vec<String>,
    /// Target object name.
    pub target: String,
    /// Ordered property selectors on the target (may be empty).
    pub properties: Vec<String>,
}

impl ScenePath {
    pub fn new(objects: Vec<String>, target: impl Into<String>, properties: Vec<String>) -> Self {
        Self {
            objects,
            target: target.into(),
            properties,
        }
    }

    /// Parse a path string according to the grammar above.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("empty scene path".to_string());
        }
        let mut segments: Vec<&str> = s.split('/').collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err("scene path has an empty object segment".to_string());
        }
        let last = segments.pop().unwrap_or_default();
        let mut selectors: Vec<&str> = last.split('.').collect();
        let target = selectors.remove(0);
        if target.is_empty() {
            return Err("scene path has an empty target name".to_string());
        }
        if selectors.iter().any(|p| p.is_empty()) {
            return Err("scene path has an empty property selector".to_string());
        }
        let all = segments.iter().chain(selectors.iter()).chain([&target]);
        if all
            .flat_map(|seg| seg.chars())
            .any(|c| c.is_whitespace())
        {
            return Err("scene path contains whitespace".to_string());
        }
        Ok(ScenePath {
            objects: segments.into_iter().map(str::to_string).collect(),
            target: target.to_string(),
            properties: selectors.into_iter().map(str::to_string).collect(),
        })
    }

    /// Path to the same target with one more property selector appended;
    /// how bone and parameter accessors address their children.
    pub fn child(&self, selector: impl Into<String>) -> ScenePath {
        let mut properties = self.properties.clone();
        properties.push(selector.into());
        ScenePath {
            objects: self.objects.clone(),
            target: self.target.clone(),
            properties,
        }
    }

    /// Final property selector, if any.
    pub fn leaf_property(&self) -> Option<&str> {
        self.properties.last().map(String::as_str)
    }
}

impl fmt::Display for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.objects.clone();
        if self.properties.is_empty() {
            parts.push(self.target.clone());
        } else {
            parts.push(format!("{}.{}", self.target, self.properties.join(".")));
        }
        f.write_str(&parts.join("/"))
    }
}

impl FromStr for ScenePath {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenePath::parse(s)
    }
}

// Serialize as the path string; documents stay human-readable.
impl Serialize for ScenePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ScenePath {
    fn deserialize<D>(deserializer: D) -> Result<ScenePath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ScenePath::parse(&s).map_err(de::Error::custom)
    }
}

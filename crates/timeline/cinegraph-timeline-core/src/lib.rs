//! Cinegraph Timeline Core
//!
//! The data model and edit-time machinery behind the movie maker: fixed-tick
//! time, typed value blocks and keyframe curves, the track tree, the binder
//! and player, the live recorder, snapshot-history edit operations, and the
//! non-destructive modification pipeline. The scene runtime stays on the far
//! side of the [`binding::SceneQuery`] and [`binding::BoneApplier`] traits.

pub mod binding;
pub mod block;
pub mod clip;
pub mod context;
pub mod curve;
pub mod edit;
pub mod history;
pub mod modify;
pub mod player;
pub mod recorder;
pub mod stored_clip;
pub mod time;
pub mod track;

// Re-exports for embedders
pub use binding::{
    Binder, BoneApplier, BoneInfo, ObjectHandle, PropertySpec, PropertyTable, SceneBinder,
    SceneQuery, ShadowModel,
};
pub use block::{Block, BlockData, BlockList};
pub use clip::{Clip, ClipView};
pub use context::EditorContext;
pub use curve::{Interp, Keyframe, KeyframeCurve};
pub use edit::{Clipboard, Selection, TimeSelection};
pub use history::History;
pub use modify::{CompiledPropertyTrack, Modification, OverlayMode};
pub use player::{PlaybackMode, Player, PlayerOutputs};
pub use recorder::{Recorder, RecorderOptions, SourceClip};
pub use time::{Tick, TimeRange, BASE_RATE};
pub use track::{Track, TrackContent, TrackId, TrackKind};

pub use cinegraph_api_core::{CoreError, ScenePath, Value, ValueKind, WriteBatch, WriteOp};

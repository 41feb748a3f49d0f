//! Cinegraph API Core (engine-agnostic)
//!
//! Leaf crate shared by the timeline authoring core and host adapters. It
//! defines the typed `Value` sum type with its interpolation/equality/codec
//! operations, the `ScenePath` grammar for addressing scene targets, the
//! `WriteOp`/`WriteBatch` contracts emitted by playback, and the shared
//! `CoreError` type.

pub mod codec;
pub mod error;
pub mod ops;
pub mod path;
pub mod value;
pub mod write_ops;

pub use codec::{decode_value, encode_value};
pub use error::CoreError;
pub use path::ScenePath;
pub use value::{Value, ValueKind};
pub use write_ops::{WriteBatch, WriteOp};

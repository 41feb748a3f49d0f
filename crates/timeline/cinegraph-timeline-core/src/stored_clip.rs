//! Persisted project document.
//!
//! The on-disk schema is decoupled from the in-memory model: document structs
//! mirror the format exactly and convert explicitly, so internal refactors
//! never leak into saved files. Times serialize as integer ticks and float
//! payloads round-trip bit-exactly through serde_json's shortest-repr
//! printing.

use cinegraph_api_core::{CoreError, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::block::{Block, BlockData, BlockList};
use crate::clip::Clip;
use crate::curve::{Interp, Keyframe, KeyframeCurve};
use crate::time::{Tick, TimeRange};
use crate::track::{Track, TrackContent, TrackId, TrackKind};

#[derive(Debug, Serialize, Deserialize)]
struct ClipDoc {
    #[serde(rename = "sampleRate")]
    sample_rate: i32,
    #[serde(rename = "defaultInterpolation")]
    default_interpolation: InterpDoc,
    /// Present only when the duration is explicitly pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<i64>,
    tracks: Vec<TrackDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrackDoc {
    id: Uuid,
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<Uuid>,
    kind: TrackKindDoc,
    name: String,
    #[serde(rename = "targetType")]
    target_type: String,
    locked: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    muted: bool,
    #[serde(rename = "sampleRate", default, skip_serializing_if = "Option::is_none")]
    sample_rate: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blocks: Option<Vec<BlockDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keyframes: Option<Vec<KeyframeDoc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum TrackKindDoc {
    Ref,
    Prop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum InterpDoc {
    Step,
    Linear,
    Cubic,
}

impl From<Interp> for InterpDoc {
    fn from(i: Interp) -> Self {
        match i {
            Interp::Step => InterpDoc::Step,
            Interp::Linear => InterpDoc::Linear,
            Interp::Cubic => InterpDoc::Cubic,
        }
    }
}

impl From<InterpDoc> for Interp {
    fn from(i: InterpDoc) -> Self {
        match i {
            InterpDoc::Step => Interp::Step,
            InterpDoc::Linear => Interp::Linear,
            InterpDoc::Cubic => Interp::Cubic,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RangeDoc {
    start: i64,
    end: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SamplesPayload {
    #[serde(rename = "sampleRate")]
    sample_rate: i32,
    values: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum BlockDoc {
    Constant { range: RangeDoc, payload: Value },
    Samples { range: RangeDoc, payload: SamplesPayload },
    Action { range: RangeDoc, payload: Vec<u8> },
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyframeDoc {
    time: i64,
    value: Value,
    interp: InterpDoc,
}

fn range_doc(range: &TimeRange) -> RangeDoc {
    RangeDoc {
        start: range.start.ticks(),
        end: range.end.ticks(),
    }
}

fn range_from_doc(doc: &RangeDoc) -> Result<TimeRange, CoreError> {
    TimeRange::new(Tick(doc.start), Tick(doc.end))
}

fn block_doc(block: &Block) -> BlockDoc {
    match &block.data {
        BlockData::Constant { value } => BlockDoc::Constant {
            range: range_doc(&block.range),
            payload: value.clone(),
        },
        BlockData::Samples {
            sample_rate,
            values,
        } => BlockDoc::Samples {
            range: range_doc(&block.range),
            payload: SamplesPayload {
                sample_rate: *sample_rate,
                values: values.clone(),
            },
        },
        BlockData::Action { payload } => BlockDoc::Action {
            range: range_doc(&block.range),
            payload: payload.clone(),
        },
    }
}

fn block_from_doc(doc: BlockDoc) -> Result<Block, CoreError> {
    match doc {
        BlockDoc::Constant { range, payload } => {
            Block::constant(range_from_doc(&range)?, payload)
        }
        BlockDoc::Samples { range, payload } => Block::samples(
            range_from_doc(&range)?,
            payload.sample_rate,
            payload.values,
        ),
        BlockDoc::Action { range, payload } => {
            let range = range_from_doc(&range)?;
            Ok(Block::action(range.start, range.duration(), payload))
        }
    }
}

/// Serialize a clip to the project document.
pub fn save_clip(clip: &Clip) -> Result<String, CoreError> {
    let mut tracks = Vec::with_capacity(clip.track_count());
    for track in clip.iter_depth_first() {
        let (blocks, keyframes) = match &track.content {
            TrackContent::Empty => (None, None),
            TrackContent::Blocks(list) => (
                Some(list.blocks().iter().map(block_doc).collect()),
                None,
            ),
            TrackContent::Curve(curve) => (
                None,
                Some(
                    curve
                        .keys()
                        .iter()
                        .map(|k| KeyframeDoc {
                            time: k.time.ticks(),
                            value: k.value.clone(),
                            interp: k.interp.into(),
                        })
                        .collect(),
                ),
            ),
        };
        tracks.push(TrackDoc {
            id: track.id.0,
            parent_id: track.parent.map(|p| p.0),
            kind: match track.kind {
                TrackKind::Reference => TrackKindDoc::Ref,
                TrackKind::Property => TrackKindDoc::Prop,
            },
            name: track.name.clone(),
            target_type: track.target_type.clone(),
            locked: track.locked,
            muted: track.muted,
            sample_rate: track.sample_rate,
            blocks,
            keyframes,
        });
    }
    let doc = ClipDoc {
        sample_rate: clip.sample_rate,
        default_interpolation: clip.default_interp.into(),
        duration: clip.pinned_duration().map(Tick::ticks),
        tracks,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parse a project document back into a clip.
pub fn load_clip(s: &str) -> Result<Clip, CoreError> {
    let doc: ClipDoc = serde_json::from_str(s)?;
    let mut clip = Clip::new(doc.sample_rate)?;
    clip.default_interp = doc.default_interpolation.into();
    clip.set_pinned_duration(doc.duration.map(Tick));

    // Documents list tracks depth-first, so parents precede children.
    let mut roots: Vec<TrackId> = Vec::new();
    let mut order: Vec<(TrackId, Option<TrackId>)> = Vec::new();
    for td in doc.tracks {
        let content = match (td.blocks, td.keyframes) {
            (Some(blocks), None) => {
                let mut list = BlockList::new();
                let blocks = blocks
                    .into_iter()
                    .map(block_from_doc)
                    .collect::<Result<Vec<_>, _>>()?;
                list.add_range(blocks)?;
                TrackContent::Blocks(list)
            }
            (None, Some(keys)) => TrackContent::Curve(KeyframeCurve::from_keys(
                keys.into_iter()
                    .map(|k| Keyframe::new(Tick(k.time), k.value, k.interp.into()))
                    .collect(),
            )),
            (None, None) => TrackContent::Empty,
            (Some(_), Some(_)) => {
                return Err(CoreError::decode(
                    "track carries both blocks and keyframes",
                ))
            }
        };
        let id = TrackId(td.id);
        let parent = td.parent_id.map(TrackId);
        if let Some(p) = parent {
            if !clip.contains(p) {
                return Err(CoreError::decode(format!(
                    "track {} references missing parent {}",
                    td.id, p
                )));
            }
        }
        clip.insert_track_raw(Track {
            id,
            name: td.name,
            parent,
            children: Vec::new(),
            kind: match td.kind {
                TrackKindDoc::Ref => TrackKind::Reference,
                TrackKindDoc::Prop => TrackKind::Property,
            },
            target_type: td.target_type,
            locked: td.locked,
            muted: td.muted,
            sample_rate: td.sample_rate,
            content,
        });
        order.push((id, parent));
    }
    for (id, parent) in order {
        match parent {
            Some(p) => clip.find_mut(p)?.children.push(id),
            None => roots.push(id),
        }
    }
    clip.set_roots_raw(roots);
    Ok(clip)
}

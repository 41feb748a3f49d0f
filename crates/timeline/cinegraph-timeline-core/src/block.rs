//! Time-sampled blocks and the per-track block sequence.
//!
//! A block is a `(range, payload)` unit of track data. Within one track the
//! sequence is ordered by start and pairwise disjoint; neighbors may touch
//! but never share interior time. All insert/overwrite/split arithmetic is
//! integer tick math; sample re-slicing always lands on the block's own frame
//! grid and rounds toward preserving existing data.

use cinegraph_api_core::{ops, CoreError, Value};
use serde::{Deserialize, Serialize};

use crate::time::{Tick, TimeRange};

// Externally tagged on purpose: blocks ride inside history snapshots, and
// the binary codec there cannot buffer internally tagged payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockData {
    /// A single value held across the whole range.
    Constant { value: Value },
    /// Dense values on the block's frame grid; sample `i` sits at
    /// `start + i / sample_rate`, endpoints included.
    Samples { sample_rate: i32, values: Vec<Value> },
    /// Atomic event; fires once when playback crosses it.
    Action { payload: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub range: TimeRange,
    pub data: BlockData,
}

impl Block {
    pub fn constant(range: TimeRange, value: Value) -> Result<Block, CoreError> {
        if range.is_empty() {
            return Err(CoreError::OutOfRange {
                ticks: range.start.ticks(),
            });
        }
        Ok(Block {
            range,
            data: BlockData::Constant { value },
        })
    }

    /// Samples block. A full run carries the range's frame count plus one
    /// values (endpoints included); shorter runs are legal and reads past the
    /// last sample clamp to it.
    pub fn samples(
        range: TimeRange,
        sample_rate: i32,
        values: Vec<Value>,
    ) -> Result<Block, CoreError> {
        if range.is_empty() {
            return Err(CoreError::OutOfRange {
                ticks: range.start.ticks(),
            });
        }
        let capacity = range.frame_count(sample_rate)? + 1;
        if values.is_empty() || values.len() as i64 > capacity {
            return Err(CoreError::decode(format!(
                "samples block holds up to {capacity} values, got {}",
                values.len()
            )));
        }
        Ok(Block {
            range,
            data: BlockData::Samples {
                sample_rate,
                values,
            },
        })
    }

    /// Action block; zero duration is allowed.
    pub fn action(at: Tick, duration: Tick, payload: Vec<u8>) -> Block {
        Block {
            range: TimeRange {
                start: at,
                end: at + duration.max(Tick::ZERO),
            },
            data: BlockData::Action { payload },
        }
    }

    /// Overlap test that also catches zero-duration action blocks sitting
    /// inside `range`.
    pub fn intersects(&self, range: &TimeRange) -> bool {
        if self.range.is_empty() {
            range.contains(self.range.start)
        } else {
            self.range.overlaps(range)
        }
    }

    /// Value at a time inside the block's range.
    pub fn value_at(&self, t: Tick) -> Value {
        match &self.data {
            BlockData::Constant { value } => value.clone(),
            BlockData::Samples {
                sample_rate,
                values,
            } => {
                let period = Tick(crate::time::BASE_RATE / *sample_rate as i64);
                let off = t - self.range.start;
                let idx = off.ticks().div_euclid(period.ticks());
                let last = values.len() as i64 - 1;
                if idx >= last {
                    return values[last as usize].clone();
                }
                let idx = idx.max(0);
                let rem = off.ticks() - idx * period.ticks();
                if rem == 0 {
                    return values[idx as usize].clone();
                }
                let frac = rem as f32 / period.ticks() as f32;
                ops::lerp(&values[idx as usize], &values[idx as usize + 1], frac)
            }
            BlockData::Action { payload } => Value::Action(payload.clone()),
        }
    }

    /// Value at the block's trailing edge; what sampling past the block holds.
    pub fn end_value(&self) -> Value {
        match &self.data {
            BlockData::Constant { value } => value.clone(),
            BlockData::Samples { values, .. } => values[values.len() - 1].clone(),
            BlockData::Action { payload } => Value::Action(payload.clone()),
        }
    }

    fn period(&self) -> Option<Tick> {
        match &self.data {
            BlockData::Samples { sample_rate, .. } => {
                Some(Tick(crate::time::BASE_RATE / *sample_rate as i64))
            }
            _ => None,
        }
    }

    /// Keep only `[start, cut)`. Samples re-slice at the last frame boundary
    /// not past `cut`. `None` when nothing with positive duration remains.
    fn truncate_right(&self, cut: Tick) -> Option<Block> {
        if cut >= self.range.end {
            return Some(self.clone());
        }
        if cut <= self.range.start {
            return None;
        }
        match &self.data {
            BlockData::Constant { value } => Some(Block {
                range: TimeRange {
                    start: self.range.start,
                    end: cut,
                },
                data: BlockData::Constant {
                    value: value.clone(),
                },
            }),
            BlockData::Samples {
                sample_rate,
                values,
            } => {
                let period = self.period().unwrap_or(Tick(1));
                let kept = (cut - self.range.start).floor_to(period);
                if kept == Tick::ZERO {
                    return None;
                }
                let last_idx = ((kept.ticks() / period.ticks()) as usize).min(values.len() - 1);
                Some(Block {
                    range: TimeRange {
                        start: self.range.start,
                        end: self.range.start + kept,
                    },
                    data: BlockData::Samples {
                        sample_rate: *sample_rate,
                        values: values[..=last_idx].to_vec(),
                    },
                })
            }
            // An action crossed by the cut is removed atomically.
            BlockData::Action { .. } => None,
        }
    }

    /// Keep only `[cut, end)`. Samples re-slice at the first frame boundary
    /// not before `cut`.
    fn truncate_left(&self, cut: Tick) -> Option<Block> {
        if cut <= self.range.start {
            return Some(self.clone());
        }
        if cut >= self.range.end {
            return None;
        }
        match &self.data {
            BlockData::Constant { value } => Some(Block {
                range: TimeRange {
                    start: cut,
                    end: self.range.end,
                },
                data: BlockData::Constant {
                    value: value.clone(),
                },
            }),
            BlockData::Samples {
                sample_rate,
                values,
            } => {
                let period = self.period().unwrap_or(Tick(1));
                let skipped = (cut - self.range.start).ceil_to(period);
                let new_start = self.range.start + skipped;
                if new_start >= self.range.end {
                    return None;
                }
                let first_idx = (skipped.ticks() / period.ticks()) as usize;
                if first_idx >= values.len() {
                    // The run stopped short of the cut; the held tail value
                    // survives as a constant.
                    return Some(Block {
                        range: TimeRange {
                            start: new_start,
                            end: self.range.end,
                        },
                        data: BlockData::Constant {
                            value: values[values.len() - 1].clone(),
                        },
                    });
                }
                Some(Block {
                    range: TimeRange {
                        start: new_start,
                        end: self.range.end,
                    },
                    data: BlockData::Samples {
                        sample_rate: *sample_rate,
                        values: values[first_idx..].to_vec(),
                    },
                })
            }
            BlockData::Action { .. } => None,
        }
    }

    /// Clone the portion of this block inside `range`, grid-aligned.
    fn slice(&self, range: &TimeRange) -> Option<Block> {
        self.truncate_left(range.start)
            .and_then(|b| b.truncate_right(range.end))
    }

    /// Merge with a touching continuation of the same payload, if any.
    ///
    /// Constants merge when exactly equal; samples merge when rates match,
    /// the seam lies on the shared frame grid and the boundary sample agrees
    /// bit-exactly. This is what makes remove-then-readd restore a track's
    /// prior block structure.
    fn try_merge(&self, next: &Block) -> Option<Block> {
        if self.range.end != next.range.start {
            return None;
        }
        match (&self.data, &next.data) {
            (BlockData::Constant { value: a }, BlockData::Constant { value: b })
                if ops::exact_eq(a, b) =>
            {
                Some(Block {
                    range: TimeRange {
                        start: self.range.start,
                        end: next.range.end,
                    },
                    data: BlockData::Constant { value: a.clone() },
                })
            }
            (
                BlockData::Samples {
                    sample_rate: ra,
                    values: va,
                },
                BlockData::Samples {
                    sample_rate: rb,
                    values: vb,
                },
            ) if ra == rb => {
                let period = crate::time::BASE_RATE / *ra as i64;
                let seam_on_grid = (next.range.start - self.range.start)
                    .ticks()
                    .rem_euclid(period)
                    == 0;
                let boundary_agrees = match (va.last(), vb.first()) {
                    (Some(a), Some(b)) => ops::exact_eq(a, b),
                    _ => false,
                };
                if !seam_on_grid || !boundary_agrees {
                    return None;
                }
                let mut values = va.clone();
                values.extend_from_slice(&vb[1..]);
                Some(Block {
                    range: TimeRange {
                        start: self.range.start,
                        end: next.range.end,
                    },
                    data: BlockData::Samples {
                        sample_rate: *ra,
                        values,
                    },
                })
            }
            _ => None,
        }
    }
}

/// Translate a block sequence by `delta`; used by move and by recorder
/// commit to place relative blocks at an absolute time.
pub fn shift_blocks(mut blocks: Vec<Block>, delta: Tick) -> Vec<Block> {
    for b in &mut blocks {
        b.range = b.range.shift(delta);
    }
    blocks
}

/// Ordered, non-overlapping block sequence of a single sampled track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockList {
    blocks: Vec<Block>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Union bounds of all blocks, `None` when empty.
    pub fn bounds(&self) -> Option<TimeRange> {
        let first = self.blocks.first()?;
        let last = self.blocks.last()?;
        Some(TimeRange {
            start: first.range.start,
            end: last.range.end,
        })
    }

    /// Blocks whose ranges intersect `range`, in time order.
    pub fn get_blocks<'a>(&'a self, range: &'a TimeRange) -> impl Iterator<Item = &'a Block> {
        self.blocks.iter().filter(move |b| b.intersects(range))
    }

    /// Value at `t`: the containing block's interpolation, else the last
    /// known value (rightmost block ending at or before `t`), else `None`.
    pub fn value_at(&self, t: Tick) -> Option<Value> {
        // Last block starting at or before t.
        let idx = match self.blocks.partition_point(|b| b.range.start <= t) {
            0 => return None,
            n => n - 1,
        };
        let block = &self.blocks[idx];
        if block.range.contains(t) {
            Some(block.value_at(t))
        } else {
            // Past the block's end (covers end-clamp on the final block).
            Some(block.end_value())
        }
    }

    /// Insert a pre-sorted, pairwise-disjoint block sequence. Conflicting
    /// spans of existing blocks are removed, truncated, or split around each
    /// incoming block.
    pub fn add_range(&mut self, incoming: Vec<Block>) -> Result<(), CoreError> {
        for pair in incoming.windows(2) {
            if pair[1].range.start < pair[0].range.end {
                return Err(CoreError::OutOfRange {
                    ticks: pair[1].range.start.ticks(),
                });
            }
        }
        for block in incoming {
            if !block.range.is_empty() {
                self.carve(&block.range);
            }
            let at = self
                .blocks
                .partition_point(|b| b.range.start <= block.range.start);
            self.blocks.insert(at, block);
        }
        self.coalesce();
        Ok(())
    }

    /// Erase everything inside `range`, truncating or splitting blocks that
    /// partially overlap it.
    pub fn remove(&mut self, range: &TimeRange) {
        self.carve(range);
    }

    /// Clone the portions of blocks inside `range` (used by copy).
    pub fn extract(&self, range: &TimeRange) -> Vec<Block> {
        self.blocks
            .iter()
            .filter(|b| b.intersects(range))
            .filter_map(|b| {
                if b.range.is_empty() {
                    Some(b.clone())
                } else {
                    b.slice(range)
                }
            })
            .collect()
    }

    /// Remove and return the portions of blocks inside `range` (cut / move).
    pub fn take(&mut self, range: &TimeRange) -> Vec<Block> {
        let taken = self.extract(range);
        self.carve(range);
        taken
    }

    fn coalesce(&mut self) {
        let mut merged: Vec<Block> = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            match merged.last().and_then(|last| last.try_merge(&block)) {
                Some(joined) => {
                    merged.pop();
                    merged.push(joined);
                }
                None => merged.push(block),
            }
        }
        self.blocks = merged;
    }

    fn carve(&mut self, range: &TimeRange) {
        if range.is_empty() {
            return;
        }
        let mut rebuilt: Vec<Block> = Vec::with_capacity(self.blocks.len() + 1);
        for block in self.blocks.drain(..) {
            if !block.intersects(range) {
                rebuilt.push(block);
                continue;
            }
            // Keep whatever survives on each side of the carved span.
            if let Some(left) = block.truncate_right(range.start) {
                rebuilt.push(left);
            }
            if let Some(right) = block.truncate_left(range.end) {
                rebuilt.push(right);
            }
        }
        self.blocks = rebuilt;
    }

    /// Debug invariant: ordered by start, pairwise disjoint.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        for pair in self.blocks.windows(2) {
            assert!(pair[0].range.start <= pair[1].range.start, "out of order");
            assert!(
                pair[0].range.end <= pair[1].range.start,
                "overlapping blocks: {:?} then {:?}",
                pair[0].range,
                pair[1].range
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::BASE_RATE;

    fn secs(s: i64) -> Tick {
        Tick::from_secs(s)
    }

    fn range(a: i64, b: i64) -> TimeRange {
        TimeRange::new(secs(a), secs(b)).unwrap()
    }

    fn float_ramp(range: TimeRange, rate: i32) -> Block {
        let n = range.frame_count(rate).unwrap() + 1;
        let values = (0..n).map(|i| Value::Float(i as f32)).collect();
        Block::samples(range, rate, values).unwrap()
    }

    #[test]
    fn samples_block_validates_len_and_rate() {
        let r = range(0, 2);
        assert!(Block::samples(r, 30, vec![Value::Float(0.0); 61]).is_ok());
        // Short runs clamp at read time; overfull and empty are malformed.
        assert!(Block::samples(r, 30, vec![Value::Float(0.0); 60]).is_ok());
        assert!(Block::samples(r, 30, vec![Value::Float(0.0); 62]).is_err());
        assert!(Block::samples(r, 30, vec![]).is_err());
        assert!(Block::samples(r, 7, vec![Value::Float(0.0); 61]).is_err());
    }

    #[test]
    fn short_run_clamps_to_last_sample() {
        // 60 values over a range with capacity 61: the last quarter second
        // holds the final sample.
        let values: Vec<Value> = (0..60).map(|i| Value::Float(i as f32)).collect();
        let mut list = BlockList::new();
        list.add_range(vec![Block::samples(range(0, 2), 30, values).unwrap()])
            .unwrap();
        assert_eq!(list.value_at(secs(2)), Some(Value::Float(59.0)));
    }

    #[test]
    fn sampling_interpolates_on_the_grid() {
        // Full ramp 0..=60 over [0, 2s) at 30 Hz, endpoints included.
        let mut list = BlockList::new();
        list.add_range(vec![float_ramp(range(0, 2), 30)]).unwrap();

        assert_eq!(list.value_at(Tick(BASE_RATE / 2)), Some(Value::Float(15.0)));
        assert_eq!(list.value_at(secs(1)), Some(Value::Float(30.0)));
        // End-clamp: 2s is past the half-open range, holds the last sample.
        assert_eq!(list.value_at(secs(2)), Some(Value::Float(60.0)));
        // Between frames: halfway through frame 0.
        assert_eq!(list.value_at(Tick(1000)), Some(Value::Float(0.5)));
        assert_eq!(list.value_at(Tick(-1)), None);
    }

    #[test]
    fn overwrite_truncates_both_sides() {
        let mut list = BlockList::new();
        list.add_range(vec![
            Block::constant(range(0, 10), Value::Float(1.0)).unwrap()
        ])
        .unwrap();
        let incoming = float_ramp(range(3, 7), 30);
        list.add_range(vec![incoming.clone()]).unwrap();

        list.assert_invariants();
        let blocks = list.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].range, range(0, 3));
        assert!(matches!(blocks[0].data, BlockData::Constant { .. }));
        assert_eq!(blocks[1], incoming);
        assert_eq!(blocks[2].range, range(7, 10));
        assert_eq!(list.value_at(secs(1)), Some(Value::Float(1.0)));
        assert_eq!(list.value_at(secs(8)), Some(Value::Float(1.0)));
    }

    #[test]
    fn insert_strictly_inside_splits() {
        let mut list = BlockList::new();
        list.add_range(vec![
            Block::constant(range(0, 10), Value::Float(1.0)).unwrap()
        ])
        .unwrap();
        list.remove(&range(4, 6));
        list.assert_invariants();
        assert_eq!(list.len(), 2);
        assert_eq!(list.blocks()[0].range, range(0, 4));
        assert_eq!(list.blocks()[1].range, range(6, 10));
        // Gap samples hold the last known value.
        assert_eq!(list.value_at(secs(5)), Some(Value::Float(1.0)));
    }

    #[test]
    fn incoming_fully_covering_removes_existing() {
        let mut list = BlockList::new();
        list.add_range(vec![
            Block::constant(range(2, 4), Value::Float(1.0)).unwrap()
        ])
        .unwrap();
        list.add_range(vec![
            Block::constant(range(0, 10), Value::Float(2.0)).unwrap()
        ])
        .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.value_at(secs(3)), Some(Value::Float(2.0)));
    }

    #[test]
    fn samples_truncation_keeps_data_on_grid() {
        // 30 Hz ramp over [0, 2s); cut off-grid at 0.7s (frame 21 sits at 0.7s
        // exactly, so right-truncation keeps frames 0..=21).
        let mut list = BlockList::new();
        list.add_range(vec![float_ramp(range(0, 2), 30)]).unwrap();
        list.remove(&TimeRange::new(Tick(42_000), secs(2)).unwrap());
        list.assert_invariants();
        let kept = &list.blocks()[0];
        assert_eq!(kept.range.end, Tick(42_000));
        match &kept.data {
            BlockData::Samples { values, .. } => assert_eq!(values.len(), 22),
            other => panic!("unexpected {other:?}"),
        }

        // Cut strictly between frames: boundary rounds toward kept data.
        let mut list = BlockList::new();
        list.add_range(vec![float_ramp(range(0, 2), 30)]).unwrap();
        list.remove(&TimeRange::new(Tick(41_500), secs(2)).unwrap());
        let kept = &list.blocks()[0];
        // Last frame not crossing 41'500 is frame 20 at 40'000.
        assert_eq!(kept.range.end, Tick(40_000));
    }

    #[test]
    fn left_truncation_advances_to_next_frame() {
        let mut list = BlockList::new();
        list.add_range(vec![float_ramp(range(0, 2), 30)]).unwrap();
        list.remove(&TimeRange::new(Tick::ZERO, Tick(41_500)).unwrap());
        let kept = &list.blocks()[0];
        // First frame at or after 41'500 is frame 21 at 42'000.
        assert_eq!(kept.range.start, Tick(42_000));
        assert_eq!(kept.value_at(Tick(42_000)), Value::Float(21.0));
    }

    #[test]
    fn zero_duration_action_carved_only_when_contained() {
        let mut list = BlockList::new();
        list.add_range(vec![Block::action(secs(1), Tick::ZERO, vec![7])])
            .unwrap();
        list.remove(&range(2, 3));
        assert_eq!(list.len(), 1);
        list.remove(&range(0, 2));
        assert!(list.is_empty());
    }

    #[test]
    fn remove_then_readd_restores_state() {
        let mut list = BlockList::new();
        list.add_range(vec![
            Block::constant(range(0, 2), Value::Float(1.0)).unwrap(),
            float_ramp(range(3, 5), 30),
        ])
        .unwrap();
        let before = list.clone();
        let window = range(1, 4);
        let taken = list.take(&window);
        assert!(list.extract(&window).is_empty());
        list.add_range(taken).unwrap();
        list.assert_invariants();
        assert_eq!(list, before);
    }

    #[test]
    fn shift_translates_ranges_only() {
        let blocks = vec![
            Block::constant(range(0, 2), Value::Float(1.0)).unwrap(),
            Block::action(secs(3), Tick::ZERO, vec![9]),
        ];
        let shifted = shift_blocks(blocks, secs(5));
        assert_eq!(shifted[0].range, range(5, 7));
        assert_eq!(shifted[1].range.start, secs(8));
        assert!(matches!(&shifted[0].data, BlockData::Constant { value } if *value == Value::Float(1.0)));
    }

    #[test]
    fn rejects_overlapping_incoming() {
        let mut list = BlockList::new();
        let r = list.add_range(vec![
            Block::constant(range(0, 5), Value::Float(0.0)).unwrap(),
            Block::constant(range(3, 8), Value::Float(1.0)).unwrap(),
        ]);
        assert!(r.is_err());
    }
}

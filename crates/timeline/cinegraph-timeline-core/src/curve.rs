//! Keyframe curves and their compilation into block sequences.
//!
//! A keyframed property track stores an ordered `(time, value, interp)`
//! sequence. Sampling always goes through compilation: each consecutive pair
//! of keyframes yields exactly one block over `[k_i.time, k_{i+1}.time)`.
//! The block is Constant when stepped or when the endpoints agree under
//! approximate equality, otherwise Samples generated at the track's rate.

use cinegraph_api_core::{ops, CoreError, Value};
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockList};
use crate::time::{Tick, TimeRange};

/// Interpolation out of a keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interp {
    Step,
    #[default]
    Linear,
    Cubic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: Tick,
    pub value: Value,
    pub interp: Interp,
}

impl Keyframe {
    pub fn new(time: Tick, value: Value, interp: Interp) -> Self {
        Self {
            time,
            value,
            interp,
        }
    }
}

/// Ordered keyframe sequence; times are unique, inserts at an occupied time
/// replace the occupant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeCurve {
    keys: Vec<Keyframe>,
}

impl KeyframeCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by_key(|k| k.time);
        keys.dedup_by(|b, a| a.time == b.time);
        Self { keys }
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Time span from first to last key; `None` when empty.
    pub fn bounds(&self) -> Option<TimeRange> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        Some(TimeRange {
            start: first.time,
            end: last.time,
        })
    }

    pub fn insert(&mut self, key: Keyframe) {
        match self.keys.binary_search_by_key(&key.time, |k| k.time) {
            Ok(i) => self.keys[i] = key,
            Err(i) => self.keys.insert(i, key),
        }
    }

    /// Keys with `start <= time < end`, cloned.
    pub fn keys_in(&self, range: &TimeRange) -> Vec<Keyframe> {
        self.keys
            .iter()
            .filter(|k| range.contains(k.time))
            .cloned()
            .collect()
    }

    /// Remove keys inside `range`; returns how many went away.
    pub fn remove_range(&mut self, range: &TimeRange) -> usize {
        let before = self.keys.len();
        self.keys.retain(|k| !range.contains(k.time));
        before - self.keys.len()
    }

    /// Remove and return keys inside `range` (cut / move).
    pub fn take_range(&mut self, range: &TimeRange) -> Vec<Keyframe> {
        let taken = self.keys_in(range);
        self.remove_range(range);
        taken
    }

    /// Compile into a block sequence at `sample_rate`.
    pub fn compile(&self, sample_rate: i32) -> Result<Vec<Block>, CoreError> {
        let period = Tick::frame_period(sample_rate)?;
        let mut blocks = Vec::new();
        for i in 0..self.keys.len().saturating_sub(1) {
            let left = &self.keys[i];
            let right = &self.keys[i + 1];
            let range = TimeRange {
                start: left.time,
                end: right.time,
            };
            if range.is_empty() {
                continue;
            }
            if ops::almost_eq(&left.value, &right.value) {
                blocks.push(Block::constant(range, left.value.clone())?);
                continue;
            }
            match left.interp {
                Interp::Step => blocks.push(Block::constant(range, left.value.clone())?),
                Interp::Linear => {
                    let values = self.sample_segment(range, period, |t| {
                        ops::lerp(&left.value, &right.value, t)
                    });
                    blocks.push(Block::samples(range, sample_rate, values)?);
                }
                Interp::Cubic => {
                    let before = match i.checked_sub(1).and_then(|j| self.keys.get(j)) {
                        Some(k) => k.value.clone(),
                        None => ops::mirror(&left.value, &right.value),
                    };
                    let after = match self.keys.get(i + 2) {
                        Some(k) => k.value.clone(),
                        None => ops::mirror(&right.value, &left.value),
                    };
                    let values = self.sample_segment(range, period, |t| {
                        ops::cubic(&before, &left.value, &right.value, &after, t)
                    });
                    blocks.push(Block::samples(range, sample_rate, values)?);
                }
            }
        }
        Ok(blocks)
    }

    /// Compile straight into a queryable block list.
    pub fn compile_list(&self, sample_rate: i32) -> Result<BlockList, CoreError> {
        let mut list = BlockList::new();
        list.add_range(self.compile(sample_rate)?)?;
        Ok(list)
    }

    fn sample_segment(
        &self,
        range: TimeRange,
        period: Tick,
        eval: impl Fn(f32) -> Value,
    ) -> Vec<Value> {
        let duration = range.duration().ticks();
        let frames = duration.div_euclid(period.ticks());
        (0..=frames)
            .map(|f| {
                let t = (f * period.ticks()) as f32 / duration as f32;
                eval(t.clamp(0.0, 1.0))
            })
            .collect()
    }

    /// Sampled value at `t`, compiling on demand. Before the first key the
    /// first key's value holds; past the last block the last value holds.
    pub fn value_at(&self, t: Tick, sample_rate: i32) -> Result<Option<Value>, CoreError> {
        if self.keys.is_empty() {
            return Ok(None);
        }
        let first = &self.keys[0];
        if t < first.time || self.keys.len() == 1 {
            return Ok(Some(first.value.clone()));
        }
        let last = &self.keys[self.keys.len() - 1];
        if t >= last.time {
            return Ok(Some(last.value.clone()));
        }
        Ok(self.compile_list(sample_rate)?.value_at(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockData;

    fn key(secs: i64, v: f32, interp: Interp) -> Keyframe {
        Keyframe::new(Tick::from_secs(secs), Value::Float(v), interp)
    }

    #[test]
    fn insert_keeps_order_and_replaces() {
        let mut curve = KeyframeCurve::new();
        curve.insert(key(2, 2.0, Interp::Linear));
        curve.insert(key(0, 0.0, Interp::Linear));
        curve.insert(key(2, 5.0, Interp::Step));
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.keys()[1].value, Value::Float(5.0));
        assert_eq!(curve.keys()[1].interp, Interp::Step);
    }

    #[test]
    fn step_pair_compiles_to_constant() {
        let curve =
            KeyframeCurve::from_keys(vec![key(0, 1.0, Interp::Step), key(2, 9.0, Interp::Step)]);
        let blocks = curve.compile(30).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(
            matches!(&blocks[0].data, BlockData::Constant { value } if *value == Value::Float(1.0))
        );
    }

    #[test]
    fn linear_pair_compiles_to_samples() {
        let curve = KeyframeCurve::from_keys(vec![
            key(0, 0.0, Interp::Linear),
            key(1, 60.0, Interp::Linear),
        ]);
        let blocks = curve.compile(60).unwrap();
        assert_eq!(blocks.len(), 1);
        match &blocks[0].data {
            BlockData::Samples {
                sample_rate,
                values,
            } => {
                assert_eq!(*sample_rate, 60);
                assert_eq!(values.len(), 61);
                assert_eq!(values[0], Value::Float(0.0));
                assert_eq!(values[30], Value::Float(30.0));
                assert_eq!(values[60], Value::Float(60.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn near_equal_endpoints_collapse() {
        let curve = KeyframeCurve::from_keys(vec![
            key(0, 1.0, Interp::Linear),
            Keyframe::new(
                Tick::from_secs(1),
                Value::Float(1.0 + 1e-7),
                Interp::Linear,
            ),
        ]);
        let blocks = curve.compile(30).unwrap();
        assert!(matches!(blocks[0].data, BlockData::Constant { .. }));
    }

    #[test]
    fn cubic_segment_passes_through_keys() {
        let curve = KeyframeCurve::from_keys(vec![
            key(0, 0.0, Interp::Cubic),
            key(1, 10.0, Interp::Cubic),
            key(2, 0.0, Interp::Cubic),
        ]);
        let list = curve.compile_list(60).unwrap();
        assert_eq!(list.value_at(Tick::ZERO), Some(Value::Float(0.0)));
        assert_eq!(list.value_at(Tick::from_secs(1)), Some(Value::Float(10.0)));
        // The hump is symmetric, so the midpoint of the first segment
        // overshoots the straight line between the keys.
        let mid = list.value_at(Tick(30_000)).unwrap();
        let Value::Float(v) = mid else {
            panic!("not a float")
        };
        assert!(v > 5.0, "midpoint {v} should lean into the curve");
    }

    #[test]
    fn value_at_clamps_outside_keys() {
        let curve = KeyframeCurve::from_keys(vec![
            key(1, 5.0, Interp::Linear),
            key(2, 7.0, Interp::Linear),
        ]);
        assert_eq!(
            curve.value_at(Tick::ZERO, 30).unwrap(),
            Some(Value::Float(5.0))
        );
        assert_eq!(
            curve.value_at(Tick::from_secs(3), 30).unwrap(),
            Some(Value::Float(7.0))
        );
        let single = KeyframeCurve::from_keys(vec![key(1, 4.0, Interp::Linear)]);
        assert_eq!(
            single.value_at(Tick::from_secs(9), 30).unwrap(),
            Some(Value::Float(4.0))
        );
    }
}

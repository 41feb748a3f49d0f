//! Fixed-rational time values and half-open time ranges.
//!
//! Time is a signed count of ticks, one tick being 1/[`BASE_RATE`] seconds.
//! The base is highly composite so every supported sample rate divides it
//! evenly, keeping all boundary arithmetic exact integer math. Floats appear
//! only in display helpers, never at block boundaries.

use cinegraph_api_core::CoreError;
use serde::{Deserialize, Serialize};

/// Ticks per second. 60 * 1000, so 24/25/30/50/60/100/120... all divide it.
pub const BASE_RATE: i64 = 60_000;

/// A moment (or duration) on the timeline, in ticks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tick(pub i64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    #[inline]
    pub fn ticks(self) -> i64 {
        self.0
    }

    /// Tick duration of one frame at `rate` Hz.
    ///
    /// Fails with `InvalidSampleRate` unless `rate > 0` and `rate` divides
    /// [`BASE_RATE`].
    pub fn frame_period(rate: i32) -> Result<Tick, CoreError> {
        if rate <= 0 || BASE_RATE % rate as i64 != 0 {
            return Err(CoreError::InvalidSampleRate { rate });
        }
        Ok(Tick(BASE_RATE / rate as i64))
    }

    /// `frame` frames at `rate` Hz.
    pub fn from_frames(frame: i64, rate: i32) -> Result<Tick, CoreError> {
        Ok(Tick(frame.saturating_mul(Self::frame_period(rate)?.0)))
    }

    /// Whole seconds helper for tests and durations.
    pub fn from_secs(secs: i64) -> Tick {
        Tick(secs.saturating_mul(BASE_RATE))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / BASE_RATE as f64
    }

    #[inline]
    pub fn saturating_add(self, other: Tick) -> Tick {
        Tick(self.0.saturating_add(other.0))
    }

    #[inline]
    pub fn saturating_sub(self, other: Tick) -> Tick {
        Tick(self.0.saturating_sub(other.0))
    }

    /// Scale by the rational `num/den`. `den` must be non-zero.
    pub fn scale(self, num: i64, den: i64) -> Tick {
        debug_assert!(den != 0);
        Tick(self.0.saturating_mul(num) / den)
    }

    /// Greatest multiple of `step` not exceeding `self`. Exact for negative
    /// values as well (floors toward negative infinity).
    pub fn floor_to(self, step: Tick) -> Tick {
        debug_assert!(step.0 > 0);
        Tick(self.0.div_euclid(step.0) * step.0)
    }

    /// Smallest multiple of `step` not below `self`.
    pub fn ceil_to(self, step: Tick) -> Tick {
        debug_assert!(step.0 > 0);
        let floored = self.0.div_euclid(step.0) * step.0;
        if floored == self.0 {
            self
        } else {
            Tick(floored + step.0)
        }
    }

    /// Whole frames at `rate` contained in a duration of `self` ticks,
    /// truncating any remainder.
    pub fn frame_count(self, rate: i32) -> Result<i64, CoreError> {
        let period = Self::frame_period(rate)?;
        Ok(self.0.div_euclid(period.0))
    }
}

impl std::ops::Add for Tick {
    type Output = Tick;
    fn add(self, rhs: Tick) -> Tick {
        self.saturating_add(rhs)
    }
}

impl std::ops::AddAssign for Tick {
    fn add_assign(&mut self, rhs: Tick) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Tick {
    type Output = Tick;
    fn sub(self, rhs: Tick) -> Tick {
        self.saturating_sub(rhs)
    }
}

impl std::ops::SubAssign for Tick {
    fn sub_assign(&mut self, rhs: Tick) {
        *self = *self - rhs;
    }
}

impl std::ops::Neg for Tick {
    type Output = Tick;
    fn neg(self) -> Tick {
        Tick(self.0.saturating_neg())
    }
}

/// Half-open time range `[start, end)` with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Tick,
    pub end: Tick,
}

impl TimeRange {
    pub fn new(start: Tick, end: Tick) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::OutOfRange {
                ticks: (start - end).ticks(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn from_duration(duration: Tick) -> Self {
        Self {
            start: Tick::ZERO,
            end: duration.max(Tick::ZERO),
        }
    }

    #[inline]
    pub fn duration(&self) -> Tick {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Half-open membership: `start <= t < end`. Empty ranges contain nothing.
    #[inline]
    pub fn contains(&self, t: Tick) -> bool {
        t >= self.start && t < self.end
    }

    /// True when the interiors of the two ranges share any time.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TimeRange { start, end })
    }

    /// Union, but only when the ranges overlap or touch; disjoint ranges with
    /// a gap yield `None`.
    pub fn union_if_contiguous(&self, other: &TimeRange) -> Option<TimeRange> {
        if self.overlaps(other) || self.end == other.start || other.end == self.start {
            Some(TimeRange {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            })
        } else {
            None
        }
    }

    /// Clamp this range into `bounds`; may come back empty.
    pub fn clamp_to(&self, bounds: &TimeRange) -> TimeRange {
        let start = self.start.clamp(bounds.start, bounds.end);
        let end = self.end.clamp(bounds.start, bounds.end);
        TimeRange {
            start,
            end: end.max(start),
        }
    }

    pub fn shift(&self, delta: Tick) -> TimeRange {
        TimeRange {
            start: self.start + delta,
            end: self.end + delta,
        }
    }

    /// Split at `t`, which must lie inside the range.
    pub fn split_at(&self, t: Tick) -> Option<(TimeRange, TimeRange)> {
        self.contains(t).then_some((
            TimeRange {
                start: self.start,
                end: t,
            },
            TimeRange {
                start: t,
                end: self.end,
            },
        ))
    }

    /// Whole frames at `rate` spanned by this range, truncating.
    pub fn frame_count(&self, rate: i32) -> Result<i64, CoreError> {
        self.duration().frame_count(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_period_validates_rate() {
        assert_eq!(Tick::frame_period(30).unwrap(), Tick(2000));
        assert_eq!(Tick::frame_period(60).unwrap(), Tick(1000));
        assert!(Tick::frame_period(0).is_err());
        assert!(Tick::frame_period(-24).is_err());
        assert!(Tick::frame_period(7).is_err());
    }

    #[test]
    fn from_frames_is_exact() {
        assert_eq!(Tick::from_frames(15, 30).unwrap(), Tick(30_000));
        assert_eq!(Tick::from_frames(60, 60).unwrap(), Tick::from_secs(1));
    }

    #[test]
    fn floor_ceil_align_to_grid() {
        let step = Tick(2000);
        assert_eq!(Tick(4500).floor_to(step), Tick(4000));
        assert_eq!(Tick(4500).ceil_to(step), Tick(6000));
        assert_eq!(Tick(4000).floor_to(step), Tick(4000));
        assert_eq!(Tick(4000).ceil_to(step), Tick(4000));
        assert_eq!(Tick(-500).floor_to(step), Tick(-2000));
        assert_eq!(Tick(-500).ceil_to(step), Tick(0));
    }

    #[test]
    fn frame_count_truncates() {
        let range = TimeRange::new(Tick::ZERO, Tick(4999)).unwrap();
        assert_eq!(range.frame_count(30).unwrap(), 2);
        let exact = TimeRange::new(Tick::ZERO, Tick::from_secs(2)).unwrap();
        assert_eq!(exact.frame_count(30).unwrap(), 60);
    }

    #[test]
    fn saturating_arithmetic() {
        assert_eq!(Tick(i64::MAX) + Tick(1), Tick(i64::MAX));
        assert_eq!(Tick(i64::MIN) - Tick(1), Tick(i64::MIN));
    }

    #[test]
    fn half_open_membership() {
        let r = TimeRange::new(Tick(10), Tick(20)).unwrap();
        assert!(r.contains(Tick(10)));
        assert!(r.contains(Tick(19)));
        assert!(!r.contains(Tick(20)));
        assert!(!TimeRange::new(Tick(5), Tick(5)).unwrap().contains(Tick(5)));
    }

    #[test]
    fn intersect_and_union() {
        let a = TimeRange::new(Tick(0), Tick(10)).unwrap();
        let b = TimeRange::new(Tick(5), Tick(15)).unwrap();
        let c = TimeRange::new(Tick(10), Tick(12)).unwrap();
        let d = TimeRange::new(Tick(20), Tick(25)).unwrap();
        assert_eq!(
            a.intersect(&b),
            Some(TimeRange::new(Tick(5), Tick(10)).unwrap())
        );
        assert_eq!(a.intersect(&d), None);
        // Touching ranges intersect nowhere but union contiguously.
        assert_eq!(a.intersect(&c), None);
        assert_eq!(
            a.union_if_contiguous(&c),
            Some(TimeRange::new(Tick(0), Tick(12)).unwrap())
        );
        assert_eq!(a.union_if_contiguous(&d), None);
    }

    #[test]
    fn scale_by_rational() {
        // Half speed doubles the duration, 3/2 stretches it.
        assert_eq!(Tick::from_secs(2).scale(2, 1), Tick::from_secs(4));
        assert_eq!(Tick::from_secs(2).scale(1, 2), Tick::from_secs(1));
        assert_eq!(Tick(3000).scale(3, 2), Tick(4500));
    }

    #[test]
    fn clamp_to_bounds() {
        let bounds = TimeRange::new(Tick(10), Tick(20)).unwrap();
        let inside = TimeRange::new(Tick(12), Tick(18)).unwrap();
        assert_eq!(inside.clamp_to(&bounds), inside);
        let spilling = TimeRange::new(Tick(0), Tick(30)).unwrap();
        assert_eq!(spilling.clamp_to(&bounds), bounds);
        let disjoint = TimeRange::new(Tick(30), Tick(40)).unwrap();
        assert!(disjoint.clamp_to(&bounds).is_empty());
    }

    #[test]
    fn split_inside_only() {
        let r = TimeRange::new(Tick(0), Tick(10)).unwrap();
        let (left, right) = r.split_at(Tick(4)).unwrap();
        assert_eq!(left.end, Tick(4));
        assert_eq!(right.start, Tick(4));
        assert!(r.split_at(Tick(0)).is_some());
        assert!(r.split_at(Tick(10)).is_none());
    }
}

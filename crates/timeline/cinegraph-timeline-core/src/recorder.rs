//! Live recorder: consumes scene values at a fixed rate and emits block data
//! into recording tracks.
//!
//! The recorder runs on its own relative timeline starting at zero; frames
//! are emitted only on sample-grid crossings, so every produced sample sits
//! on `start + k / sampleRate` no matter how unevenly `advance` is driven.
//! `NotBound` closes the open block and re-arms that track for the tick;
//! every other error aborts the recording. Committed blocks are merged into
//! the clip through the overwrite policy, shifted to the recorder's absolute
//! start, with a fresh provenance GUID attached.

use cinegraph_api_core::{ops, CoreError, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::binding::{Binder, SceneQuery};
use crate::block::Block;
use crate::clip::Clip;
use crate::history::History;
use crate::time::{Tick, TimeRange, BASE_RATE};
use crate::track::TrackId;

#[derive(Debug, Clone)]
pub struct RecorderOptions {
    pub sample_rate: i32,
    /// Absolute clip time recording begins at; floored to the sample grid.
    pub start_time: Tick,
    /// Origin tag carried in the provenance metadata ("viewport", "batch"...).
    pub origin: String,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            sample_rate: 30,
            start_time: Tick::ZERO,
            origin: "editor".to_string(),
        }
    }
}

/// Provenance identity a recording stamps onto its output.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceClip {
    pub id: Uuid,
    /// Unix seconds at recorder creation.
    pub recorded_at: u64,
    pub origin: String,
}

#[derive(Debug)]
enum TrackState {
    /// Waiting for the first readable value.
    Armed,
    /// Open samples run starting at grid frame `start_frame`.
    Recording { start_frame: i64, values: Vec<Value> },
    Finished,
}

#[derive(Debug)]
struct TrackRecording {
    track: TrackId,
    state: TrackState,
    finished: Vec<Block>,
}

/// Captures live values for a set of property tracks.
pub struct Recorder {
    binder: Box<dyn Binder>,
    options: RecorderOptions,
    source: SourceClip,
    period: Tick,
    /// Relative time accumulated from `advance` deltas.
    time: Tick,
    /// Last grid frame that was sampled; -1 before the first.
    frame: i64,
    tracks: Vec<TrackRecording>,
    stopped: bool,
}

impl Recorder {
    /// Build a recorder over `tracks`. Locked and non-property tracks are
    /// skipped up front.
    pub fn new(
        binder: Box<dyn Binder>,
        options: RecorderOptions,
        tracks: &[TrackId],
        clip: &Clip,
    ) -> Result<Self, CoreError> {
        let period = Tick::frame_period(options.sample_rate)?;
        let mut recordings = Vec::with_capacity(tracks.len());
        for id in tracks {
            let track = clip.find(*id)?;
            if track.locked || !track.is_property() {
                tracing::warn!(track = %id, "skipping locked or non-property track");
                continue;
            }
            recordings.push(TrackRecording {
                track: *id,
                state: TrackState::Armed,
                finished: Vec::new(),
            });
        }
        let options = RecorderOptions {
            start_time: options.start_time.floor_to(period),
            ..options
        };
        let source = SourceClip {
            id: Uuid::new_v4(),
            recorded_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            origin: options.origin.clone(),
        };
        tracing::info!(
            source = %source.id,
            rate = options.sample_rate,
            tracks = recordings.len(),
            "recording started"
        );
        Ok(Self {
            binder,
            options,
            source,
            period,
            time: Tick::ZERO,
            frame: -1,
            tracks: recordings,
            stopped: false,
        })
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    pub fn source(&self) -> &SourceClip {
        &self.source
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Ids of the tracks being recorded; playback during recording mutes
    /// these so live values read from the pre-recording state.
    pub fn recording_tracks(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.track).collect()
    }

    /// Advance by `dt` seconds, sampling every grid frame crossed.
    /// Non-positive deltas leave the recorder unchanged.
    pub fn advance(
        &mut self,
        dt: f64,
        clip: &Clip,
        scene: &dyn SceneQuery,
    ) -> Result<(), CoreError> {
        if self.stopped || dt <= 0.0 {
            return Ok(());
        }
        self.time = self.time + Tick((dt * BASE_RATE as f64).round() as i64);
        let target_frame = self.time.ticks().div_euclid(self.period.ticks());
        while self.frame < target_frame {
            self.frame += 1;
            let frame = self.frame;
            if let Err(err) = self.sample_frame(frame, clip, scene) {
                tracing::warn!(%err, "recording aborted");
                self.stop();
                return Err(err);
            }
        }
        Ok(())
    }

    fn sample_frame(
        &mut self,
        frame: i64,
        clip: &Clip,
        scene: &dyn SceneQuery,
    ) -> Result<(), CoreError> {
        let period = self.period;
        for rec in &mut self.tracks {
            if matches!(rec.state, TrackState::Finished) {
                continue;
            }
            let track = clip.find(rec.track)?;
            let expected = match track.value_kind() {
                Some(kind) => kind,
                None => continue,
            };
            let read = self
                .binder
                .resolve_property(clip, rec.track, scene)
                .map(|binding| binding.read(scene));
            let value = match read {
                Ok(Some(v)) => v,
                // Unreadable this tick: close the open run and re-arm.
                Ok(None) | Err(CoreError::NotBound { .. }) => {
                    if let TrackState::Recording {
                        start_frame,
                        values,
                    } = std::mem::replace(&mut rec.state, TrackState::Armed)
                    {
                        rec.finished
                            .push(finalize_run(start_frame, values, period, self.options.sample_rate)?);
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };
            if value.kind() != expected {
                return Err(CoreError::TypeMismatch {
                    expected,
                    actual: value.kind(),
                });
            }
            match &mut rec.state {
                TrackState::Armed => {
                    rec.state = TrackState::Recording {
                        start_frame: frame,
                        values: vec![value],
                    };
                }
                TrackState::Recording { values, .. } => values.push(value),
                TrackState::Finished => {}
            }
        }
        Ok(())
    }

    /// In-progress tail of a track for preview rendering; a published
    /// snapshot, never the live buffer.
    pub fn current_block(&self, track: TrackId) -> Option<Block> {
        let rec = self.tracks.iter().find(|r| r.track == track)?;
        match &rec.state {
            TrackState::Recording {
                start_frame,
                values,
            } if values.len() >= 2 => {
                let start = Tick(start_frame * self.period.ticks());
                let end = Tick((start_frame + values.len() as i64 - 1) * self.period.ticks());
                Block::samples(
                    TimeRange { start, end },
                    self.options.sample_rate,
                    values.clone(),
                )
                .ok()
            }
            _ => None,
        }
    }

    /// Blocks already closed for a track (recorder-relative times).
    pub fn finished_blocks(&self, track: TrackId) -> &[Block] {
        self.tracks
            .iter()
            .find(|r| r.track == track)
            .map(|r| r.finished.as_slice())
            .unwrap_or(&[])
    }

    /// Finalize every open run. Effective immediately; later `advance` calls
    /// are no-ops.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let period = self.period;
        let rate = self.options.sample_rate;
        for rec in &mut self.tracks {
            if let TrackState::Recording {
                start_frame,
                values,
            } = std::mem::replace(&mut rec.state, TrackState::Finished)
            {
                if let Ok(block) = finalize_run(start_frame, values, period, rate) {
                    rec.finished.push(block);
                }
            }
        }
        tracing::info!(source = %self.source.id, "recording stopped");
    }

    /// Merge the recording into the clip under one "Record" history entry,
    /// shifted to the recorder's absolute start time.
    pub fn commit(mut self, clip: &mut Clip, history: &mut History) -> Result<SourceClip, CoreError> {
        self.stop();
        let shift = self.options.start_time;
        let affected: Vec<TrackId> = self.tracks.iter().map(|r| r.track).collect();
        let recordings = std::mem::take(&mut self.tracks);
        history.transaction(clip, "Record", &affected, |clip| {
            for rec in &recordings {
                if rec.finished.is_empty() {
                    continue;
                }
                let shifted = crate::block::shift_blocks(rec.finished.clone(), shift);
                clip.find_mut(rec.track)?.blocks_mut()?.add_range(shifted)?;
            }
            Ok(())
        })?;
        tracing::info!(source = %self.source.id, "recording committed");
        Ok(self.source)
    }
}

/// Turn a recorded sample run into a block. Runs that never vary collapse to
/// a Constant over the recorded range; a single sample spans one frame.
fn finalize_run(
    start_frame: i64,
    values: Vec<Value>,
    period: Tick,
    sample_rate: i32,
) -> Result<Block, CoreError> {
    let start = Tick(start_frame * period.ticks());
    if values.len() == 1 {
        let range = TimeRange {
            start,
            end: start + period,
        };
        let value = values.into_iter().next().ok_or_else(|| {
            CoreError::decode("empty sample run")
        })?;
        return Block::constant(range, value);
    }
    let end = Tick((start_frame + values.len() as i64 - 1) * period.ticks());
    let range = TimeRange { start, end };
    let uniform = values.iter().all(|v| ops::almost_eq(&values[0], v));
    if uniform {
        let value = values.into_iter().next().ok_or_else(|| {
            CoreError::decode("empty sample run")
        })?;
        Block::constant(range, value)
    } else {
        Block::samples(range, sample_rate, values)
    }
}

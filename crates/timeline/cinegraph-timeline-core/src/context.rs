//! Editor context: one explicit object threading the project, history,
//! player and recorder through the API instead of global session state.

use cinegraph_api_core::CoreError;

use crate::binding::{Binder, SceneQuery};
use crate::clip::Clip;
use crate::edit::TimeSelection;
use crate::history::History;
use crate::modify::{EditOverlay, Modification, ModificationHost, TrackListView};
use crate::player::Player;
use crate::recorder::{Recorder, RecorderOptions, SourceClip};
use crate::track::TrackId;

/// The single mutable root an embedding editor drives.
pub struct EditorContext {
    pub clip: Clip,
    pub history: History,
    pub player: Player,
    recorder: Option<Recorder>,
}

impl EditorContext {
    pub fn new(sample_rate: i32) -> Result<Self, CoreError> {
        Ok(Self {
            clip: Clip::new(sample_rate)?,
            history: History::new(),
            player: Player::new(),
            recorder: None,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.as_ref().map(|r| !r.is_stopped()).unwrap_or(false)
    }

    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    /// Refresh the player's snapshot from the live clip. While recording, the
    /// snapshot mutes the recording tracks so preview playback reads their
    /// pre-recording state.
    pub fn sync_player(&mut self) {
        let mut snapshot = self.clip.clone();
        if let Some(recorder) = &self.recorder {
            for id in recorder.recording_tracks() {
                if let Ok(track) = snapshot.find_mut(id) {
                    track.muted = true;
                }
            }
        }
        self.player.set_clip(snapshot);
    }

    /// Begin recording `tracks` with a dedicated binder.
    pub fn start_recording(
        &mut self,
        binder: Box<dyn Binder>,
        options: RecorderOptions,
        tracks: &[TrackId],
    ) -> Result<(), CoreError> {
        let recorder = Recorder::new(binder, options, tracks, &self.clip)?;
        self.recorder = Some(recorder);
        self.sync_player();
        Ok(())
    }

    /// Advance the active recording; no-op when none is running.
    pub fn advance_recording(&mut self, dt: f64, scene: &dyn SceneQuery) -> Result<(), CoreError> {
        match self.recorder.as_mut() {
            Some(recorder) => recorder.advance(dt, &self.clip, scene),
            None => Ok(()),
        }
    }

    /// Stop the active recording, keeping it around for commit.
    pub fn stop_recording(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop();
        }
    }

    /// Merge the stopped recording into the clip; returns its provenance.
    pub fn commit_recording(&mut self) -> Result<Option<SourceClip>, CoreError> {
        let Some(recorder) = self.recorder.take() else {
            return Ok(None);
        };
        let source = recorder.commit(&mut self.clip, &mut self.history)?;
        self.sync_player();
        Ok(Some(source))
    }

    /// Discard the active recording without committing.
    pub fn cancel_recording(&mut self) {
        self.recorder = None;
        self.sync_player();
    }

    /// Run a modification over the selection and stage its output.
    pub fn run_modification(
        &mut self,
        modification: &mut dyn Modification,
        tracks: Vec<TrackId>,
        selection: &TimeSelection,
        scene: &dyn SceneQuery,
        binder: &mut dyn Binder,
    ) -> Result<EditOverlay, CoreError> {
        let view = TrackListView::new(&self.clip, tracks);
        let mut host = ModificationHost { scene, binder };
        let entries = modification.start(&view, selection, &mut host)?;
        Ok(EditOverlay::new(entries))
    }

    pub fn undo(&mut self) -> Option<String> {
        let label = self.history.undo(&mut self.clip);
        if label.is_some() {
            self.sync_player();
        }
        label
    }

    pub fn redo(&mut self) -> Option<String> {
        let label = self.history.redo(&mut self.clip);
        if label.is_some() {
            self.sync_player();
        }
        label
    }
}

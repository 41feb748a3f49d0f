mod common;

use cinegraph_timeline_core::{
    binding::standard_table, Block, BlockData, CoreError, History, Recorder, RecorderOptions,
    SceneBinder, Tick, Value,
};
use common::{player_clip, range, secs, MockScene};

fn binder() -> Box<SceneBinder> {
    Box::new(SceneBinder::new(standard_table()))
}

fn options(rate: i32, start_secs: i64) -> RecorderOptions {
    RecorderOptions {
        sample_rate: rate,
        start_time: secs(start_secs),
        origin: "test".into(),
    }
}

/// it should expose the in-progress tail as a preview block while recording
#[test]
fn current_block_previews_open_run() {
    let (clip, _, pos) = player_clip(30);
    let mut scene = MockScene::new();
    let object = scene.add_object("Player", "GameObject");
    let mut recorder = Recorder::new(binder(), options(30, 0), &[pos], &clip).unwrap();

    assert!(recorder.current_block(pos).is_none());
    for step in 0..10 {
        scene.set_prop(object, "LocalPosition", Value::Vec3([step as f32, 0.0, 0.0]));
        recorder.advance(1.0 / 30.0, &clip, &scene).unwrap();
    }
    let preview = recorder.current_block(pos).expect("open run");
    match &preview.data {
        BlockData::Samples { values, .. } => assert!(values.len() >= 2),
        other => panic!("unexpected preview {other:?}"),
    }
    assert!(recorder.finished_blocks(pos).is_empty());
}

/// it should close the open run on NotBound and re-arm afterwards
#[test]
fn unbound_gap_splits_blocks() {
    let (clip, _, pos) = player_clip(30);
    let mut scene = MockScene::new();
    let object = scene.add_object("Player", "GameObject");
    let mut recorder = Recorder::new(binder(), options(30, 0), &[pos], &clip).unwrap();

    for step in 0..10 {
        scene.set_prop(object, "LocalPosition", Value::Vec3([step as f32, 0.0, 0.0]));
        recorder.advance(1.0 / 30.0, &clip, &scene).unwrap();
    }
    // The property disappears for a while.
    scene.props.remove(&(object.0, "LocalPosition".to_string()));
    for _ in 0..5 {
        recorder.advance(1.0 / 30.0, &clip, &scene).unwrap();
    }
    assert_eq!(recorder.finished_blocks(pos).len(), 1);
    // It comes back; a second run opens.
    for step in 0..10 {
        scene.set_prop(object, "LocalPosition", Value::Vec3([0.0, step as f32, 0.0]));
        recorder.advance(1.0 / 30.0, &clip, &scene).unwrap();
    }
    recorder.stop();
    let finished = recorder.finished_blocks(pos);
    assert_eq!(finished.len(), 2);
    assert!(finished[0].range.end <= finished[1].range.start);
}

/// it should abort recording when a read comes back with the wrong type
#[test]
fn type_mismatch_aborts_recording() {
    let (clip, _, pos) = player_clip(30);
    let mut scene = MockScene::new();
    let object = scene.add_object("Player", "GameObject");
    scene.set_prop(object, "LocalPosition", Value::Float(1.0));
    let mut recorder = Recorder::new(binder(), options(30, 0), &[pos], &clip).unwrap();
    let err = recorder.advance(1.0 / 30.0, &clip, &scene);
    assert!(matches!(err, Err(CoreError::TypeMismatch { .. })));
    assert!(recorder.is_stopped());
}

/// it should skip locked tracks when the recording starts
#[test]
fn locked_tracks_are_not_recorded() {
    let (mut clip, _, pos) = player_clip(30);
    clip.find_mut(pos).unwrap().locked = true;
    let recorder = Recorder::new(binder(), options(30, 0), &[pos], &clip).unwrap();
    assert!(recorder.recording_tracks().is_empty());
}

/// it should commit shifted to the absolute start and undo as one entry
#[test]
fn commit_shifts_and_undoes_atomically() {
    let (mut clip, _, pos) = player_clip(30);
    let mut scene = MockScene::new();
    let object = scene.add_object("Player", "GameObject");
    let mut recorder = Recorder::new(binder(), options(30, 3), &[pos], &clip).unwrap();
    for step in 0..30 {
        scene.set_prop(object, "LocalPosition", Value::Vec3([step as f32, 0.0, 0.0]));
        recorder.advance(1.0 / 30.0, &clip, &scene).unwrap();
    }
    let mut history = History::new();
    let source = recorder.commit(&mut clip, &mut history).unwrap();
    assert_eq!(source.origin, "test");

    let track = clip.find(pos).unwrap();
    let bounds = track.data_bounds().expect("recorded data");
    assert_eq!(bounds.start, secs(3));
    // Frames 0 and 1 land during the first advance; frame 2 carries the
    // second step's value.
    assert_eq!(
        track.value_at(secs(3) + Tick(4000), 30).unwrap(),
        Some(Value::Vec3([1.0, 0.0, 0.0]))
    );

    assert_eq!(history.undo(&mut clip), Some("Record".to_string()));
    assert!(clip.find(pos).unwrap().content.is_empty());
}

/// it should merge committed blocks into existing data via overwrite policy
#[test]
fn commit_overwrites_existing_span() {
    let (mut clip, _, pos) = player_clip(30);
    clip.find_mut(pos)
        .unwrap()
        .blocks_mut()
        .unwrap()
        .add_range(vec![
            Block::constant(range(0, 10), Value::Vec3([9.0; 3])).unwrap(),
        ])
        .unwrap();

    let mut scene = MockScene::new();
    let object = scene.add_object("Player", "GameObject");
    scene.set_prop(object, "LocalPosition", Value::Vec3([1.0; 3]));
    let mut recorder = Recorder::new(binder(), options(30, 4), &[pos], &clip).unwrap();
    for _ in 0..60 {
        recorder.advance(1.0 / 30.0, &clip, &scene).unwrap();
    }
    let mut history = History::new();
    recorder.commit(&mut clip, &mut history).unwrap();

    let track = clip.find(pos).unwrap();
    assert_eq!(track.value_at(secs(2), 30).unwrap(), Some(Value::Vec3([9.0; 3])));
    assert_eq!(track.value_at(secs(5), 30).unwrap(), Some(Value::Vec3([1.0; 3])));
    assert_eq!(track.value_at(secs(8), 30).unwrap(), Some(Value::Vec3([9.0; 3])));
}

/// it should ignore non-positive advances entirely
#[test]
fn non_positive_advance_is_a_no_op() {
    let (clip, _, pos) = player_clip(30);
    let mut scene = MockScene::new();
    let object = scene.add_object("Player", "GameObject");
    scene.set_prop(object, "LocalPosition", Value::Vec3([0.0; 3]));
    let mut recorder = Recorder::new(binder(), options(30, 0), &[pos], &clip).unwrap();
    recorder.advance(0.0, &clip, &scene).unwrap();
    recorder.advance(-1.0, &clip, &scene).unwrap();
    assert!(recorder.current_block(pos).is_none());
    assert!(recorder.finished_blocks(pos).is_empty());
}

mod common;

use cinegraph_timeline_core::{
    binding::standard_table, edit, stored_clip, Block, BlockData, History, Interp, Recorder,
    RecorderOptions, SceneBinder, Selection, Tick, TimeSelection, Track, Value, ValueKind,
    BASE_RATE,
};
use common::{player_clip, range, secs, MockScene};

fn selection(tracks: Vec<cinegraph_timeline_core::TrackId>, a: i64, b: i64) -> Selection {
    Selection {
        tracks,
        time: TimeSelection::new(range(a, b), Interp::Linear),
    }
}

/// it should sample a 30 Hz ramp exactly on and between grid points
#[test]
fn scenario_block_sampling() {
    let (mut clip, root, _) = player_clip(30);
    // One Samples block over [0, 2s) at rate 30 with values 0, 1, ..., 59.
    let ramp: Vec<Value> = (0..60).map(|i| Value::Float(i as f32)).collect();
    let float_track = clip
        .add_child(root, Track::property("Health", ValueKind::Float))
        .unwrap();
    clip.find_mut(float_track)
        .unwrap()
        .blocks_mut()
        .unwrap()
        .add_range(vec![Block::samples(range(0, 2), 30, ramp).unwrap()])
        .unwrap();
    let track = clip.find(float_track).unwrap();

    assert_eq!(
        track.value_at(Tick(BASE_RATE / 2), 30).unwrap(),
        Some(Value::Float(15.0))
    );
    assert_eq!(track.value_at(secs(1), 30).unwrap(), Some(Value::Float(30.0)));
    // End-clamp.
    assert_eq!(track.value_at(secs(2), 30).unwrap(), Some(Value::Float(59.0)));
}

/// it should truncate an overwritten constant on both sides of the insert
#[test]
fn scenario_overwrite_truncation() {
    let (mut clip, _, pos) = player_clip(30);
    let a = Value::Vec3([1.0, 0.0, 0.0]);
    let blocks = {
        let list = clip.find_mut(pos).unwrap().blocks_mut().unwrap();
        list.add_range(vec![Block::constant(range(0, 10), a.clone()).unwrap()])
            .unwrap();
        let samples: Vec<Value> = (0..=120)
            .map(|i| Value::Vec3([0.0, i as f32, 0.0]))
            .collect();
        list.add_range(vec![Block::samples(range(3, 7), 30, samples).unwrap()])
            .unwrap();
        list.blocks().to_vec()
    };

    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].range, range(0, 3));
    assert!(matches!(&blocks[0].data, BlockData::Constant { value } if *value == a));
    assert_eq!(blocks[1].range, range(3, 7));
    assert!(matches!(blocks[1].data, BlockData::Samples { .. }));
    assert_eq!(blocks[2].range, range(7, 10));
    assert!(matches!(&blocks[2].data, BlockData::Constant { value } if *value == a));
}

/// it should fail a type-incompatible paste without pushing history
#[test]
fn scenario_paste_compatibility() {
    let (mut clip, root, _) = player_clip(30);
    let float_track = clip
        .add_child(root, Track::property("Health", ValueKind::Float))
        .unwrap();
    let int_track = clip
        .add_child(root, Track::property("Level", ValueKind::Int))
        .unwrap();
    clip.find_mut(float_track)
        .unwrap()
        .blocks_mut()
        .unwrap()
        .add_range(vec![Block::constant(range(0, 1), Value::Float(1.0)).unwrap()])
        .unwrap();

    let mut history = History::new();
    let clipboard = edit::copy(&clip, &selection(vec![float_track], 0, 1)).unwrap();
    let result = edit::paste(&mut clip, &mut history, &clipboard, secs(0), Some(int_track));
    assert!(matches!(
        result,
        Err(cinegraph_timeline_core::CoreError::TypeMismatch { .. })
    ));
    assert!(!history.can_undo());
    assert!(clip.find(int_track).unwrap().content.is_empty());
}

/// it should collapse a constant recording into a single Constant block
#[test]
fn scenario_recorder_constancy() {
    let (clip, _, pos) = player_clip(30);
    let mut scene = MockScene::new();
    let player = scene.add_object("Player", "GameObject");
    scene.set_prop(player, "LocalPosition", Value::Vec3([4.0, 5.0, 6.0]));

    let binder = Box::new(SceneBinder::new(standard_table()));
    let mut recorder = Recorder::new(
        binder,
        RecorderOptions {
            sample_rate: 30,
            start_time: Tick::ZERO,
            origin: "test".into(),
        },
        &[pos],
        &clip,
    )
    .unwrap();

    // Two seconds at 60 ticks of 1/30 s.
    for _ in 0..60 {
        recorder.advance(1.0 / 30.0, &clip, &scene).unwrap();
    }
    recorder.stop();
    let finished = recorder.finished_blocks(pos);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].range, range(0, 2));
    assert!(matches!(
        &finished[0].data,
        BlockData::Constant { value } if *value == Value::Vec3([4.0, 5.0, 6.0])
    ));
}

/// it should roll an entire paste back when one destination is locked
#[test]
fn scenario_undo_atomicity() {
    let (mut clip, root, pos) = player_clip(30);
    let mut tracks = vec![pos];
    for name in ["A", "B", "C"] {
        let id = clip
            .add_child(root, Track::property(name, ValueKind::Vec3))
            .unwrap();
        tracks.push(id);
    }
    for id in &tracks {
        clip.find_mut(*id)
            .unwrap()
            .blocks_mut()
            .unwrap()
            .add_range(vec![
                Block::constant(range(0, 2), Value::Vec3([1.0, 2.0, 3.0])).unwrap(),
            ])
            .unwrap();
    }

    let mut history = History::new();
    let clipboard = edit::copy(&clip, &selection(tracks.clone(), 0, 2)).unwrap();
    // Lock the last destination; the paste must fail as a whole.
    let last = *tracks.last().unwrap();
    clip.find_mut(last).unwrap().locked = true;
    let pristine: Vec<Track> = tracks
        .iter()
        .map(|id| clip.find(*id).unwrap().clone())
        .collect();

    let result = edit::paste(&mut clip, &mut history, &clipboard, secs(5), None);
    assert!(matches!(
        result,
        Err(cinegraph_timeline_core::CoreError::Locked { .. })
    ));
    assert!(!history.can_undo());
    for (id, before) in tracks.iter().zip(&pristine) {
        assert_eq!(clip.find(*id).unwrap(), before);
    }
}

/// it should keep get_blocks ordered, disjoint and intersecting the query
#[test]
fn invariant_get_blocks_ordering() {
    let (mut clip, _, pos) = player_clip(30);
    {
        let list = clip.find_mut(pos).unwrap().blocks_mut().unwrap();
        list.add_range(vec![
            Block::constant(range(0, 2), Value::Vec3([0.0; 3])).unwrap(),
            Block::constant(range(3, 5), Value::Vec3([1.0; 3])).unwrap(),
            Block::constant(range(7, 9), Value::Vec3([2.0; 3])).unwrap(),
        ])
        .unwrap();
        list.remove(&range(1, 4));
        list.add_range(vec![
            Block::constant(range(1, 3), Value::Vec3([9.0; 3])).unwrap()
        ])
        .unwrap();
    }
    let track = clip.find(pos).unwrap();
    let list = match &track.content {
        cinegraph_timeline_core::TrackContent::Blocks(list) => list,
        other => panic!("unexpected content {other:?}"),
    };
    let query = range(0, 9);
    let got: Vec<&Block> = list.get_blocks(&query).collect();
    assert!(!got.is_empty());
    for pair in got.windows(2) {
        assert!(pair[0].range.start < pair[1].range.start);
        assert!(pair[0].range.end <= pair[1].range.start);
    }
    for b in &got {
        assert!(b.intersects(&query));
    }
}

/// it should restore a track exactly after remove-then-readd of a span
#[test]
fn invariant_remove_readd_idempotence() {
    let (mut clip, _, pos) = player_clip(30);
    let list = clip.find_mut(pos).unwrap().blocks_mut().unwrap();
    let samples: Vec<Value> = (0..=150)
        .map(|i| Value::Vec3([i as f32, 0.0, 0.0]))
        .collect();
    list.add_range(vec![
        Block::constant(range(0, 2), Value::Vec3([5.0; 3])).unwrap(),
        Block::samples(range(2, 7), 30, samples).unwrap(),
    ])
    .unwrap();
    let before = list.clone();
    let window = range(1, 5);
    let taken = list.take(&window);
    list.add_range(taken).unwrap();
    assert_eq!(*list, before);
}

/// it should make pasting the same clipboard twice equal pasting once
#[test]
fn invariant_paste_idempotence() {
    let (mut clip, _, pos) = player_clip(30);
    clip.find_mut(pos)
        .unwrap()
        .blocks_mut()
        .unwrap()
        .add_range(vec![
            Block::constant(range(0, 3), Value::Vec3([1.0, 2.0, 3.0])).unwrap(),
        ])
        .unwrap();
    let mut history = History::new();
    let clipboard = edit::copy(&clip, &selection(vec![pos], 0, 3)).unwrap();
    edit::paste(&mut clip, &mut history, &clipboard, secs(6), None).unwrap();
    let once = clip.find(pos).unwrap().clone();
    edit::paste(&mut clip, &mut history, &clipboard, secs(6), None).unwrap();
    assert_eq!(clip.find(pos).unwrap(), &once);
}

/// it should round-trip a full project document exactly
#[test]
fn invariant_project_round_trip() {
    let (mut clip, root, pos) = player_clip(30);
    clip.find_mut(pos)
        .unwrap()
        .blocks_mut()
        .unwrap()
        .add_range(vec![
            Block::samples(
                range(0, 1),
                30,
                (0..=30).map(|i| Value::Vec3([i as f32, -0.5, 0.125])).collect(),
            )
            .unwrap(),
        ])
        .unwrap();
    let fov = clip
        .add_child(root, Track::keyframed("Fov", ValueKind::Float))
        .unwrap();
    {
        let curve = clip.find_mut(fov).unwrap().curve_mut().unwrap();
        curve.insert(cinegraph_timeline_core::Keyframe::new(
            Tick::ZERO,
            Value::Float(70.0),
            Interp::Cubic,
        ));
        curve.insert(cinegraph_timeline_core::Keyframe::new(
            secs(3),
            Value::Float(35.5),
            Interp::Linear,
        ));
    }

    let doc = stored_clip::save_clip(&clip).unwrap();
    let loaded = stored_clip::load_clip(&doc).unwrap();
    assert_eq!(loaded, clip);
}

/// it should record a constant so any sample in the range reads it back
#[test]
fn invariant_recording_round_trip() {
    let (mut clip, _, pos) = player_clip(30);
    let mut scene = MockScene::new();
    let player = scene.add_object("Player", "GameObject");
    let v = Value::Vec3([1.5, -2.5, 3.5]);
    scene.set_prop(player, "LocalPosition", v.clone());

    let binder = Box::new(SceneBinder::new(standard_table()));
    let mut recorder = Recorder::new(
        binder,
        RecorderOptions {
            sample_rate: 30,
            start_time: secs(4),
            origin: "test".into(),
        },
        &[pos],
        &clip,
    )
    .unwrap();
    for _ in 0..30 {
        recorder.advance(1.0 / 30.0, &clip, &scene).unwrap();
    }
    let mut history = History::new();
    recorder.commit(&mut clip, &mut history).unwrap();

    let track = clip.find(pos).unwrap();
    for ticks in [0i64, 1, 500, 30_000, 59_999, 60_000] {
        let t = secs(4) + Tick(ticks);
        let sampled = track.value_at(t, 30).unwrap().unwrap();
        assert!(
            cinegraph_api_core::ops::almost_eq(&sampled, &v),
            "at +{ticks} ticks: {sampled:?}"
        );
    }
    assert!(history.can_undo());
}

/// it should keep every recorded sample on the project grid
#[test]
fn invariant_recorder_grid() {
    let (clip, _, pos) = player_clip(30);
    let mut scene = MockScene::new();
    let player = scene.add_object("Player", "GameObject");
    scene.set_prop(player, "LocalPosition", Value::Vec3([0.0; 3]));

    let binder = Box::new(SceneBinder::new(standard_table()));
    let mut recorder = Recorder::new(
        binder,
        RecorderOptions {
            sample_rate: 30,
            start_time: Tick::ZERO,
            origin: "test".into(),
        },
        &[pos],
        &clip,
    )
    .unwrap();
    // Deliberately uneven advance cadence; emitted frames must stay on grid.
    let mut wobble = 0.011f64;
    for step in 0..100 {
        scene.set_prop(
            player,
            "LocalPosition",
            Value::Vec3([step as f32, 0.0, 0.0]),
        );
        recorder.advance(wobble, &clip, &scene).unwrap();
        wobble = if step % 3 == 0 { 0.029 } else { 0.017 };
    }
    recorder.stop();

    let period = Tick(BASE_RATE / 30);
    for block in recorder.finished_blocks(pos) {
        assert_eq!(block.range.start.ticks().rem_euclid(period.ticks()), 0);
        if let BlockData::Samples {
            sample_rate,
            values,
        } = &block.data
        {
            assert_eq!(*sample_rate, 30);
            let expected = block.range.frame_count(30).unwrap() + 1;
            assert_eq!(values.len() as i64, expected);
        }
    }
}

//! Recording session behaviour against a scripted output target
//!
//! Run with: cargo test --test session_scenarios

use camwriter::capture::{spawn_producer, SourceConnection, SyntheticCamera};
use camwriter::recording::{
    FrameOutcome, RecordingController, SinkFactory, Transition, VideoSettings,
};
use camwriter::testing::{frame_at, SinkEvent, SinkScript};
use camwriter::{Frame, RecorderError, SessionState, Timestamp};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

fn setup(script: &SinkScript) -> (RecordingController, TempDir) {
    let dir = tempdir().expect("tempdir");
    let controller = RecordingController::new(
        script.factory(),
        VideoSettings::default(),
        dir.path().join("videoFile.mp4"),
    );
    (controller, dir)
}

fn ts(values: &[i64]) -> Vec<Timestamp> {
    values.iter().copied().map(Timestamp::from_micros).collect()
}

fn stop(controller: &RecordingController) -> camwriter::FinalizeHandle {
    match controller.toggle_recording().expect("stop should succeed") {
        Transition::Stopped {
            finalize: Some(handle),
        } => handle,
        other => panic!("expected finalize handle, got {:?}", other),
    }
}

#[test]
fn frames_before_first_toggle_are_never_appended() {
    let script = SinkScript::new();
    let (controller, _dir) = setup(&script);
    let mut connection = SourceConnection::new("cam");

    for t in 0..50 {
        assert_eq!(
            controller.on_frame(&frame_at(t), &mut connection),
            FrameOutcome::NotRecording
        );
    }
    assert!(script.appended().is_empty());
    assert!(script.events().is_empty());
}

#[test]
fn first_writable_frame_anchors_the_timeline_once() {
    let script = SinkScript::new();
    let (controller, _dir) = setup(&script);
    let mut connection = SourceConnection::new("cam");

    controller.toggle_recording().unwrap();
    assert!(controller.anchor().is_none());

    for t in [42, 50, 58, 66] {
        controller.on_frame(&frame_at(t), &mut connection);
    }

    assert_eq!(controller.anchor(), Some(Timestamp::from_micros(42)));
    assert_eq!(script.session_starts(), ts(&[42]));

    // The timeline starts before any frame is appended
    let start = script
        .position(&SinkEvent::StartSession(Timestamp::from_micros(42)))
        .unwrap();
    let first_append = script
        .position(&SinkEvent::Append(Timestamp::from_micros(42)))
        .unwrap();
    assert!(start < first_append);
}

#[test]
fn frames_are_dropped_silently_while_not_ready() {
    let script = SinkScript::new();
    script.push_readiness(&[true, false, false, true, false]);
    let (controller, _dir) = setup(&script);
    let mut connection = SourceConnection::new("cam");

    controller.toggle_recording().unwrap();
    let outcomes: Vec<FrameOutcome> = [1, 2, 3, 4, 5]
        .iter()
        .map(|t| controller.on_frame(&frame_at(*t), &mut connection))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::Appended,
            FrameOutcome::NotReady,
            FrameOutcome::NotReady,
            FrameOutcome::Appended,
            FrameOutcome::NotReady,
        ]
    );
    assert_eq!(script.appended(), ts(&[1, 4]));
    assert_eq!(controller.state(), SessionState::Active);
}

#[test]
fn stop_marks_finished_before_finalize_and_clears_anchor_after() {
    let script = SinkScript::new();
    let (controller, _dir) = setup(&script);
    let mut connection = SourceConnection::new("cam");

    controller.toggle_recording().unwrap();
    controller.on_frame(&frame_at(100), &mut connection);

    script.hold_finish();
    let handle = stop(&controller);

    // Finalization is pending: the anchor must still be set
    assert!(!handle.is_finished());
    assert_eq!(controller.anchor(), Some(Timestamp::from_micros(100)));
    assert_eq!(controller.state(), SessionState::Finishing);
    assert_eq!(script.count(&SinkEvent::FinishWriting), 0);

    script.release_finish();
    handle.wait().unwrap();

    assert_eq!(controller.anchor(), None);
    let mark = script.position(&SinkEvent::MarkAsFinished).unwrap();
    let finish = script.position(&SinkEvent::FinishWriting).unwrap();
    assert!(mark < finish);
}

#[test]
fn rejected_configuration_never_reaches_append() {
    let script = SinkScript::new();
    script.reject_input();
    let (controller, _dir) = setup(&script);
    let mut connection = SourceConnection::new("cam");

    let err = controller.toggle_recording().unwrap_err();
    assert!(matches!(err, RecorderError::ConfigurationRejected(_)));
    assert!(controller.is_recording());

    for t in 0..10 {
        assert_eq!(
            controller.on_frame(&frame_at(t), &mut connection),
            FrameOutcome::NotWritable
        );
    }
    assert!(script.appended().is_empty());
    assert!(script.session_starts().is_empty());
    assert!(controller.anchor().is_none());
}

#[test]
fn stop_during_setup_still_finishes_the_output() {
    let script = SinkScript::new();
    let dir = tempdir().expect("tempdir");

    let (entered_tx, entered_rx) = mpsc::channel();
    let entered_tx = Mutex::new(entered_tx);
    let scripted = script.factory();
    let slow_factory = move |path: &Path| {
        let _ = entered_tx.lock().expect("signal lock").send(());
        thread::sleep(Duration::from_millis(200));
        scripted.create(path)
    };
    let controller = RecordingController::new(
        slow_factory,
        VideoSettings::default(),
        dir.path().join("videoFile.mp4"),
    );

    let starter = controller.clone();
    let start = thread::spawn(move || starter.toggle_recording());
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("setup should begin");

    // Stop lands while the output target is still being opened
    let stats = stop(&controller).wait().unwrap();
    assert_eq!(stats.video_frames, 0);
    assert!(matches!(
        start.join().expect("start thread"),
        Ok(Transition::Started { .. })
    ));

    let mark = script.position(&SinkEvent::MarkAsFinished).unwrap();
    let finish = script.position(&SinkEvent::FinishWriting).unwrap();
    assert!(mark < finish);
    assert!(!controller.is_recording());
    assert_eq!(controller.state(), SessionState::Idle);
}

#[test]
fn new_cycle_replaces_previous_file() {
    let script = SinkScript::new();
    let (controller, _dir) = setup(&script);
    let mut connection = SourceConnection::new("cam");

    controller.toggle_recording().unwrap();
    for t in [1, 2, 3] {
        controller.on_frame(&frame_at(t), &mut connection);
    }
    stop(&controller).wait().unwrap();

    let path = controller.last_recording().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n2\n3\n");

    controller.toggle_recording().unwrap();
    for t in [7, 8] {
        controller.on_frame(&frame_at(t), &mut connection);
    }
    stop(&controller).wait().unwrap();

    assert_eq!(controller.last_recording().unwrap(), path);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "7\n8\n");
    assert_eq!(script.session_starts(), ts(&[1, 7]));
}

#[test]
fn scenario_three_frames_all_ready() {
    let script = SinkScript::new();
    let (controller, _dir) = setup(&script);
    let mut connection = SourceConnection::new("cam");

    controller.toggle_recording().unwrap();
    for t in [100, 105, 110] {
        assert_eq!(
            controller.on_frame(&frame_at(t), &mut connection),
            FrameOutcome::Appended
        );
    }
    let stats = stop(&controller).wait().unwrap();

    assert_eq!(script.session_starts(), ts(&[100]));
    assert_eq!(script.appended(), ts(&[100, 105, 110]));
    assert_eq!(stats.video_frames, 3);
    assert!(stats.output_path.exists());
    assert_eq!(controller.state(), SessionState::Idle);
}

#[test]
fn scenario_anchor_skips_frame_sink_was_not_ready_for() {
    let script = SinkScript::new();
    script.push_readiness(&[false, true]);
    let (controller, _dir) = setup(&script);
    let mut connection = SourceConnection::new("cam");

    controller.toggle_recording().unwrap();
    assert_eq!(
        controller.on_frame(&frame_at(100), &mut connection),
        FrameOutcome::NotReady
    );
    assert_eq!(
        controller.on_frame(&frame_at(105), &mut connection),
        FrameOutcome::Appended
    );

    assert_eq!(controller.anchor(), Some(Timestamp::from_micros(105)));
    assert_eq!(script.session_starts(), ts(&[105]));
    assert_eq!(script.appended(), ts(&[105]));
}

#[test]
fn producer_thread_and_control_thread_share_the_session() {
    let script = SinkScript::new();
    let (controller, _dir) = setup(&script);

    controller.toggle_recording().unwrap();

    let camera = SyntheticCamera::new(32, 16, 30.0)
        .unpaced()
        .with_frame_limit(200);
    let producer_side = controller.clone();
    let handle = spawn_producer(
        camera,
        SourceConnection::new("synthetic"),
        move |frame: &Frame, connection: &mut SourceConnection| {
            producer_side.on_frame(frame, connection);
        },
        Arc::new(AtomicBool::new(false)),
    )
    .expect("spawn producer");

    let delivered = handle.join().expect("producer join").frames_delivered;
    let stats = stop(&controller).wait().unwrap();

    assert_eq!(delivered, 200);
    assert_eq!(stats.video_frames, 200);

    let appended = script.appended();
    assert!(appended.windows(2).all(|w| w[0] < w[1]), "capture order preserved");
    assert_eq!(script.session_starts(), vec![appended[0]]);
}

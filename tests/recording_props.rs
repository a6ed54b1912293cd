//! Property-based tests for the MP4 output target
//!
//! Run with: cargo test --test recording_props --features recording

use proptest::prelude::*;
use tempfile::tempdir;

#[cfg(feature = "recording")]
mod recording_tests {
    use super::*;
    use camwriter::capture::{FrameSource, SourceConnection, SyntheticCamera};
    use camwriter::recording::{
        FrameOutcome, H264Encoder, MediaSink, Mp4Sink, Mp4SinkFactory, RecordingController,
        Transition, VideoSettings,
    };
    use camwriter::testing::synthetic_nv12_frame;
    use camwriter::{PixelFormat, Timestamp};

    proptest! {
        /// INVARIANT: encoder accepts even dimensions
        #[test]
        fn encoder_accepts_even_dimensions(
            width in (8u32..960).prop_map(|w| w * 2),
            height in (8u32..540).prop_map(|h| h * 2),
            bitrate in 500_000u32..10_000_000,
        ) {
            let result = H264Encoder::new(width, height, bitrate, 30.0);
            prop_assert!(result.is_ok(), "Encoder should accept {}x{}: {:?}",
                width, height, result.err());
        }

        /// INVARIANT: encoded NV12 frames are Annex B
        #[test]
        fn encoded_nv12_frames_are_annex_b(frame_number in 0u64..255) {
            let mut encoder = H264Encoder::new(320, 240, 1_000_000, 30.0)
                .expect("Encoder creation should succeed");
            let frame = synthetic_nv12_frame(frame_number, 320, 240, Timestamp::ZERO);

            let encoded = encoder.encode_frame(&frame).expect("Encoding should succeed");
            if !encoded.data.is_empty() {
                prop_assert!(
                    encoded.data.starts_with(&[0, 0, 0, 1]) || encoded.data.starts_with(&[0, 0, 1]),
                    "Encoded frame should start with Annex B prefix, got: {:02x?}",
                    &encoded.data[..encoded.data.len().min(10)]
                );
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// INVARIANT: sink frame count matches appended frames
        #[test]
        fn sink_frame_count_matches(frame_count in 1i64..20) {
            let dir = tempdir().expect("tempdir");
            let output = dir.path().join("count.mp4");
            let settings = VideoSettings::new(320, 240, 30.0).with_realtime(false);

            let mut sink = Mp4Sink::create(&output).expect("sink creation");
            sink.add_input(&settings).expect("add input");
            sink.start_writing().expect("start writing");
            sink.start_session(Timestamp::ZERO);

            for i in 0..frame_count {
                let frame = synthetic_nv12_frame(i as u64, 320, 240, Timestamp::from_micros(i * 33_333));
                sink.append(&frame).expect("append");
            }

            let stats = Box::new(sink).finish_writing().expect("finish");
            prop_assert_eq!(stats.video_frames, frame_count as u64);
            prop_assert!(stats.bytes_written > 0);
        }
    }

    #[test]
    fn controller_records_portrait_mp4() {
        let dir = tempdir().expect("tempdir");
        let output = dir.path().join("videoFile.mp4");
        let controller = RecordingController::new(
            Mp4SinkFactory::new().with_title("camwriter test"),
            VideoSettings::default().with_realtime(false),
            &output,
        );

        let mut camera = SyntheticCamera::new(1280, 720, 30.0).unpaced().with_frame_limit(15);
        let mut connection = SourceConnection::new("synthetic");

        // First delivery happens before the controller forces portrait
        let warmup = camera.next_frame(&connection).expect("frame");
        assert_eq!(controller.on_frame(&warmup, &mut connection), FrameOutcome::NotRecording);

        controller.toggle_recording().expect("start");
        while let Some(frame) = camera.next_frame(&connection) {
            assert_eq!((frame.width, frame.height), (720, 1280));
            assert_eq!(frame.format, PixelFormat::Nv12);
            assert_eq!(controller.on_frame(&frame, &mut connection), FrameOutcome::Appended);
        }

        let stats = match controller.toggle_recording().expect("stop") {
            Transition::Stopped { finalize: Some(handle) } => handle.wait().expect("finalize"),
            other => panic!("unexpected transition {:?}", other),
        };

        assert_eq!(stats.video_frames, 14);
        assert!(stats.bytes_written > 0);
        let metadata = std::fs::metadata(&output).expect("File should exist");
        assert!(metadata.len() > 0);
        assert_eq!(controller.last_recording().expect("last recording"), output);
    }

    #[test]
    fn repeated_timestamp_is_reported_as_skipped() {
        let dir = tempdir().expect("tempdir");
        let controller = RecordingController::new(
            Mp4SinkFactory::new(),
            VideoSettings::new(320, 240, 30.0).with_realtime(false),
            dir.path().join("repeat.mp4"),
        );
        let mut connection = SourceConnection::new("synthetic");

        controller.toggle_recording().expect("start");
        let frame = synthetic_nv12_frame(0, 320, 240, Timestamp::from_micros(1_000));
        assert_eq!(controller.on_frame(&frame, &mut connection), FrameOutcome::Appended);
        assert_eq!(controller.on_frame(&frame, &mut connection), FrameOutcome::Skipped);

        let status = controller.status().expect("status");
        assert_eq!(status.frames_appended, 1);
        assert_eq!(status.frames_skipped, 1);

        let stats = match controller.toggle_recording().expect("stop") {
            Transition::Stopped { finalize: Some(handle) } => handle.wait().expect("finalize"),
            other => panic!("unexpected transition {:?}", other),
        };
        assert_eq!(stats.video_frames, 1);
        assert_eq!(stats.dropped_frames, 1);
    }

    #[test]
    fn mismatched_settings_are_reported_on_start() {
        let dir = tempdir().expect("tempdir");
        let controller = RecordingController::new(
            Mp4SinkFactory::new(),
            VideoSettings::new(721, 1280, 30.0),
            dir.path().join("odd.mp4"),
        );

        let err = controller.toggle_recording().expect_err("odd width is rejected");
        assert!(err.is_setup_failure());
    }
}

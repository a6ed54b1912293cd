//! Video recording module for camwriter
//!
//! The [`RecordingController`] owns the session state machine and forwards
//! accepted frames to a [`MediaSink`]. With the `recording` feature the
//! [`Mp4Sink`] provides a real output target using:
//! - openh264 for H.264 encoding
//! - muxide for MP4 muxing
//!
//! # Example
//! ```rust,ignore
//! use camwriter::capture::SourceConnection;
//! use camwriter::recording::{Mp4SinkFactory, RecordingController, VideoSettings};
//!
//! let controller = RecordingController::new(
//!     Mp4SinkFactory::new(),
//!     VideoSettings::default(),
//!     "recordings/videoFile.mp4",
//! );
//! controller.toggle_recording()?;
//!
//! // On the capture thread:
//! controller.on_frame(&frame, &mut connection);
//!
//! // When done:
//! if let Transition::Stopped { finalize: Some(handle) } = controller.toggle_recording()? {
//!     let stats = handle.wait()?;
//! }
//! ```

mod config;
mod controller;
mod sink;

#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod recorder;

pub use config::{RecordingStats, VideoCodec, VideoSettings};
pub use controller::{
    FinalizeHandle, FrameOutcome, RecorderStatus, RecordingController, SessionState, Transition,
};
pub use sink::{AppendStatus, MediaSink, SinkFactory, SinkStatus};

#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use recorder::{Mp4Sink, Mp4SinkFactory};

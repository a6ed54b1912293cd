//! camwriter: record live camera frames into a video container
//!
//! The crate centres on [`RecordingController`], a thread-safe recording
//! session state machine sitting between a capture source and an output
//! target (encoder + muxer).
//!
//! # Features
//! - Toggle-driven start/stop with background finalization
//! - Output timeline anchored to the first frame actually written
//! - Backpressure by dropping frames, never by blocking the capture thread
//! - H.264/MP4 output via openh264 + muxide (`recording` feature)
//!
//! # Usage
//! ```toml
//! [dependencies]
//! camwriter = { version = "0.1", features = ["recording"] }
//! ```
//!
//! ```rust,ignore
//! use camwriter::recording::{Mp4SinkFactory, RecordingController};
//! use camwriter::CamWriterConfig;
//!
//! camwriter::init_logging();
//! let config = CamWriterConfig::load_or_default();
//! let controller = RecordingController::from_config(Mp4SinkFactory::new(), &config);
//! controller.toggle_recording()?;
//! ```
pub mod capture;
pub mod config;
pub mod errors;
pub mod recording;
pub mod testing;
pub mod timing;
pub mod types;

pub use capture::{FrameSource, SourceConnection, SyntheticCamera};
pub use config::CamWriterConfig;
pub use errors::RecorderError;
pub use recording::{
    AppendStatus, FinalizeHandle, FrameOutcome, MediaSink, RecordingController, RecordingStats,
    SessionState, SinkFactory, SinkStatus, Transition, VideoSettings,
};
pub use types::{Frame, Orientation, PixelFormat, Timestamp};

/// Initialize logging for the recorder
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camwriter=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        mp4_output: cfg!(feature = "recording"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub mp4_output: bool,
}

//! Recording configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Video codec requested from the output target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
        }
    }
}

/// Input configuration handed to the output target when a session starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Output codec
    pub codec: VideoCodec,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Average bitrate target in bits per second
    pub average_bitrate: u32,
    /// Nominal frame rate used for container timing hints
    pub fps: f64,
    /// The producer is live: the sink must signal backpressure instead of blocking
    pub expects_realtime: bool,
}

impl VideoSettings {
    /// Portrait 720x1280 H.264 at 2.3 Mbps, real-time input
    pub fn portrait_720p() -> Self {
        Self {
            codec: VideoCodec::H264,
            width: 720,
            height: 1280,
            average_bitrate: 2_300_000,
            fps: 30.0,
            expects_realtime: true,
        }
    }

    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            ..Self::portrait_720p()
        }
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.average_bitrate = bitrate;
        self
    }

    pub fn with_realtime(mut self, enabled: bool) -> Self {
        self.expects_realtime = enabled;
        self
    }

    /// Duration of one frame at the nominal rate
    pub fn frame_interval_secs(&self) -> f64 {
        if self.fps > 0.0 {
            1.0 / self.fps
        } else {
            0.0
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {}x{} @ {} bps",
            self.codec.as_str(),
            self.width,
            self.height,
            self.average_bitrate
        )
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self::portrait_720p()
    }
}

/// Statistics returned after a session has been finalized
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Number of video frames written to the container
    pub video_frames: u64,
    /// Frames dropped by the sink (not ready or failed appends)
    pub dropped_frames: u64,
    /// Duration of the output timeline in seconds
    pub duration_secs: f64,
    /// Total bytes written to file
    pub bytes_written: u64,
    /// Output file path
    pub output_path: PathBuf,
}

impl RecordingStats {
    /// Calculate the average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}

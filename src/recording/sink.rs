//! Output target contract: the encoder/muxer a session writes into

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::config::{RecordingStats, VideoSettings};
use crate::errors::RecorderError;
use crate::types::{Frame, Timestamp};

/// Coarse writer status reported by an output target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkStatus {
    Unknown,
    Writing,
    Completed,
    Failed,
    Cancelled,
}

impl SinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkStatus::Unknown => "unknown",
            SinkStatus::Writing => "writing",
            SinkStatus::Completed => "completed",
            SinkStatus::Failed => "failed",
            SinkStatus::Cancelled => "cancelled",
        }
    }
}

/// What an output target did with a frame handed to [`MediaSink::append`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendStatus {
    /// Frame is part of the container
    Written,
    /// Frame was accepted but left out of the container (outside the
    /// timeline, out of order, or no encoder output)
    Skipped,
}

/// An encoder + muxer producing one container file.
///
/// Call order for one session: `add_input`, `start_writing`, `start_session`
/// once, any number of `append`, `mark_as_finished`, `finish_writing`.
pub trait MediaSink: Send {
    /// Whether the sink can accept an input with these settings
    fn can_add_input(&self, settings: &VideoSettings) -> bool;

    fn add_input(&mut self, settings: &VideoSettings) -> Result<(), RecorderError>;

    /// Moves the sink into `SinkStatus::Writing`
    fn start_writing(&mut self) -> Result<(), RecorderError>;

    fn status(&self) -> SinkStatus;

    /// Starts the output timeline at `at`; earlier frames are not written
    fn start_session(&mut self, at: Timestamp);

    /// Backpressure signal; when false the caller drops the frame
    fn is_ready_for_more_data(&self) -> bool;

    fn append(&mut self, frame: &Frame) -> Result<AppendStatus, RecorderError>;

    /// No further frames will arrive on the input
    fn mark_as_finished(&mut self);

    /// Flushes and closes the container. May block; run off the capture path.
    fn finish_writing(self: Box<Self>) -> Result<RecordingStats, RecorderError>;
}

/// Creates a fresh output target for each session
pub trait SinkFactory: Send + Sync {
    fn create(&self, path: &Path) -> Result<Box<dyn MediaSink>, RecorderError>;
}

impl<F> SinkFactory for F
where
    F: Fn(&Path) -> Result<Box<dyn MediaSink>, RecorderError> + Send + Sync,
{
    fn create(&self, path: &Path) -> Result<Box<dyn MediaSink>, RecorderError> {
        self(path)
    }
}

//! Capture source plumbing
//!
//! A [`FrameSource`] yields timestamped frames; [`spawn_producer`] delivers
//! them one at a time, in capture order, on a dedicated thread.

mod synthetic;

pub use synthetic::SyntheticCamera;

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::types::{Frame, Orientation};

/// Per-delivery connection state a frame handler may adjust
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConnection {
    device_id: String,
    orientation: Orientation,
}

impl SourceConnection {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            orientation: Orientation::default(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }
}

/// A sequential, real-time stream of frames
pub trait FrameSource: Send {
    /// Next frame, shaped by the connection's current orientation.
    /// `None` ends the stream.
    fn next_frame(&mut self, connection: &SourceConnection) -> Option<Frame>;
}

/// Counters returned when a producer thread exits
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProducerStats {
    pub frames_delivered: u64,
}

/// Run `source` on a named thread, handing each frame to `handler` until the
/// stream ends or `stop_flag` is set.
pub fn spawn_producer<S, H>(
    mut source: S,
    mut connection: SourceConnection,
    mut handler: H,
    stop_flag: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<ProducerStats>>
where
    S: FrameSource + 'static,
    H: FnMut(&Frame, &mut SourceConnection) + Send + 'static,
{
    std::thread::Builder::new()
        .name("camwriter-video-queue".to_string())
        .spawn(move || {
            let mut stats = ProducerStats::default();
            log::debug!("Producer started for {}", connection.device_id());

            while !stop_flag.load(Ordering::Relaxed) {
                let Some(frame) = source.next_frame(&connection) else {
                    break;
                };
                handler(&frame, &mut connection);
                stats.frames_delivered += 1;
            }

            log::debug!(
                "Producer for {} stopped after {} frames",
                connection.device_id(),
                stats.frames_delivered
            );
            stats
        })
}

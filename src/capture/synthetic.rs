use std::time::{Duration, Instant};

use super::{FrameSource, SourceConnection};
use crate::testing::synthetic_nv12_frame;
use crate::timing::PtsClock;
use crate::types::{Frame, Timestamp};

/// Software camera producing NV12 gradient frames.
///
/// Frames come out landscape at the native resolution and rotated to
/// portrait when the connection asks for it.
pub struct SyntheticCamera {
    native_width: u32,
    native_height: u32,
    fps: f64,
    paced: bool,
    frame_limit: Option<u64>,
    frame_number: u64,
    clock: PtsClock,
    next_deadline: Option<Instant>,
}

impl SyntheticCamera {
    pub fn new(native_width: u32, native_height: u32, fps: f64) -> Self {
        Self {
            native_width,
            native_height,
            fps,
            paced: true,
            frame_limit: None,
            frame_number: 0,
            clock: PtsClock::new(),
            next_deadline: None,
        }
    }

    /// Deliver frames as fast as possible with evenly spaced timestamps
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn with_clock(mut self, clock: PtsClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame_number
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1.0))
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self, connection: &SourceConnection) -> Option<Frame> {
        if self.frame_limit.is_some_and(|limit| self.frame_number >= limit) {
            return None;
        }

        let pts = if self.paced {
            let interval = self.frame_interval();
            let deadline = self.next_deadline.unwrap_or_else(Instant::now);
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            self.next_deadline = Some(deadline + interval);
            self.clock.now()
        } else {
            Timestamp::from_secs_f64(self.frame_number as f64 / self.fps.max(1.0))
        };

        let (width, height) = if connection.orientation().is_portrait() {
            (self.native_height, self.native_width)
        } else {
            (self.native_width, self.native_height)
        };

        let frame = synthetic_nv12_frame(self.frame_number, width, height, pts);
        self.frame_number += 1;
        Some(frame)
    }
}

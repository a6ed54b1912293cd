//! Core frame and timestamp types shared by capture sources and sinks

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

/// Presentation timestamp in microseconds on the capture clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Timestamp((secs * 1_000_000.0).round() as i64)
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl Sub for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 4:2:0 bi-planar, full range (Y plane followed by interleaved CbCr)
    Nv12,
    /// 4:2:0 planar (Y, U, V planes)
    I420,
    /// Packed 8-bit RGB
    Rgb24,
}

impl PixelFormat {
    /// Expected buffer length for a frame of the given dimensions
    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        let w = width as usize;
        let h = height as usize;
        match self {
            PixelFormat::Nv12 | PixelFormat::I420 => w * h + 2 * ((w / 2) * (h / 2)),
            PixelFormat::Rgb24 => w * h * 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Nv12 => "nv12",
            PixelFormat::I420 => "i420",
            PixelFormat::Rgb24 => "rgb24",
        }
    }
}

/// Video orientation reported on a capture connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeRight,
    LandscapeLeft,
}

impl Orientation {
    pub fn is_portrait(&self) -> bool {
        matches!(self, Orientation::Portrait | Orientation::PortraitUpsideDown)
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::LandscapeRight
    }
}

/// A single captured video frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pts: Timestamp,
}

impl Frame {
    pub fn new(
        data: impl Into<Bytes>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pts: Timestamp,
    ) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            format,
            pts,
        }
    }

    /// Whether the buffer length matches the declared format and dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.format.buffer_len(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversions() {
        let ts = Timestamp::from_secs_f64(1.5);
        assert_eq!(ts.as_micros(), 1_500_000);
        assert_eq!(ts.as_secs_f64(), 1.5);
        assert_eq!(Timestamp::from_micros(110) - Timestamp::from_micros(100), Timestamp::from_micros(10));
    }

    #[test]
    fn test_timestamp_sub_saturates() {
        let early = Timestamp::from_micros(i64::MIN);
        let late = Timestamp::from_micros(1);
        assert_eq!((early - late).as_micros(), i64::MIN);
    }

    #[test]
    fn test_buffer_len() {
        assert_eq!(PixelFormat::Nv12.buffer_len(720, 1280), 720 * 1280 * 3 / 2);
        assert_eq!(PixelFormat::I420.buffer_len(4, 4), 24);
        assert_eq!(PixelFormat::Rgb24.buffer_len(4, 4), 48);
    }

    #[test]
    fn test_frame_well_formed() {
        let frame = Frame::new(vec![0u8; 24], 4, 4, PixelFormat::Nv12, Timestamp::ZERO);
        assert!(frame.is_well_formed());
        let short = Frame::new(vec![0u8; 10], 4, 4, PixelFormat::Nv12, Timestamp::ZERO);
        assert!(!short.is_well_formed());
    }
}

//! Synthetic frame data for offline testing
//!
//! Produces NV12 (bi-planar 4:2:0, full range) buffers, the layout camera
//! pipelines typically deliver to a video data output.

use crate::types::{Frame, PixelFormat, Timestamp};

/// Create a synthetic NV12 frame whose content changes with `frame_number`
pub fn synthetic_nv12_frame(frame_number: u64, width: u32, height: u32, pts: Timestamp) -> Frame {
    let w = width as usize;
    let h = height as usize;
    let mut data = vec![0u8; PixelFormat::Nv12.buffer_len(width, height)];

    // Luma gradient that moves every frame (exercises temporal encoding)
    let base = (frame_number % 256) as u8;
    let (y_plane, uv_plane) = data.split_at_mut(w * h);
    for y in 0..h {
        for x in 0..w {
            y_plane[y * w + x] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }

    for (i, pair) in uv_plane.chunks_exact_mut(2).enumerate() {
        pair[0] = 128u8.wrapping_add((i % 32) as u8);
        pair[1] = 128u8.wrapping_sub(base / 4);
    }

    Frame::new(data, width, height, PixelFormat::Nv12, pts)
}

/// A small frame at the given timestamp (microseconds); content is irrelevant
pub fn frame_at(pts_us: i64) -> Frame {
    synthetic_nv12_frame(pts_us.unsigned_abs(), 16, 16, Timestamp::from_micros(pts_us))
}

//! H.264 encoder wrapper using openh264

use openh264::encoder::{BitRate, Encoder, EncoderConfig, FrameRate, FrameType, RateControlMode};
use openh264::formats::YUVBuffer;
use openh264::OpenH264API;

use crate::errors::RecorderError;
use crate::types::{Frame, PixelFormat};

/// H.264 encoder using openh264
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    bitrate: u32,
    fps: f64,
    frame_count: u64,
}

impl H264Encoder {
    /// Create a new H.264 encoder for frames of the given size
    ///
    /// Rate control targets `bitrate` bits per second at `fps`. Frame
    /// skipping is off so every input frame yields output.
    pub fn new(width: u32, height: u32, bitrate: u32, fps: f64) -> Result<Self, RecorderError> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(RecorderError::Encoding(format!(
                "Unsupported dimensions {}x{} (must be non-zero and even)",
                width, height
            )));
        }
        if bitrate == 0 || fps.is_nan() || fps <= 0.0 {
            return Err(RecorderError::Encoding(format!(
                "Unsupported rate {} bps at {} fps",
                bitrate, fps
            )));
        }

        let config = EncoderConfig::new()
            .bitrate(BitRate::from_bps(bitrate))
            .max_frame_rate(FrameRate::from_hz(fps as f32))
            .rate_control_mode(RateControlMode::Bitrate)
            .skip_frames(false);

        let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
            .map_err(|e| RecorderError::Encoding(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            bitrate,
            fps,
            frame_count: 0,
        })
    }

    /// Encode a captured frame, converting its pixel layout to I420 first
    pub fn encode_frame(&mut self, frame: &Frame) -> Result<EncodedFrame, RecorderError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(RecorderError::Encoding(format!(
                "Frame dimensions {}x{} don't match encoder {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        if !frame.is_well_formed() {
            return Err(RecorderError::Encoding(format!(
                "Invalid {} buffer: expected {} bytes, got {}",
                frame.format.as_str(),
                frame.format.buffer_len(frame.width, frame.height),
                frame.data.len()
            )));
        }

        let i420 = match frame.format {
            PixelFormat::I420 => frame.data.to_vec(),
            PixelFormat::Nv12 => nv12_to_i420(&frame.data, self.width, self.height),
            PixelFormat::Rgb24 => rgb_to_yuv420(&frame.data, self.width, self.height),
        };

        self.encode_i420(i420)
    }

    fn encode_i420(&mut self, yuv: Vec<u8>) -> Result<EncodedFrame, RecorderError> {
        let yuv_buffer = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| RecorderError::Encoding(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn force_keyframe(&mut self) {
        self.encoder.force_intra_frame();
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Encoded H.264 data in Annex B format (with start codes)
    pub data: Vec<u8>,
    /// Whether this frame is a keyframe (IDR/I frame)
    pub is_keyframe: bool,
}

/// De-interleave the CbCr plane of an NV12 buffer into separate U and V planes
fn nv12_to_i420(nv12: &[u8], width: u32, height: u32) -> Vec<u8> {
    let y_size = (width * height) as usize;
    let uv_size = ((width / 2) * (height / 2)) as usize;

    let mut out = Vec::with_capacity(y_size + uv_size * 2);
    out.extend_from_slice(&nv12[..y_size]);

    let interleaved = &nv12[y_size..y_size + uv_size * 2];
    out.extend(interleaved.iter().step_by(2));
    out.extend(interleaved.iter().skip(1).step_by(2));
    out
}

/// Convert RGB24 to YUV420 planar format
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let rgb_idx = (y * w + x) * 3;
            let r = rgb[rgb_idx] as i32;
            let g = rgb[rgb_idx + 1] as i32;
            let b = rgb[rgb_idx + 2] as i32;

            // BT.601
            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}

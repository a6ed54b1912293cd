//! Testing utilities for camwriter
//!
//! Synthetic NV12 frames and a scripted in-memory output target for
//! exercising the recording controller without an encoder.

pub mod scripted_sink;
pub mod synthetic_data;

pub use scripted_sink::{ScriptedSink, ScriptedSinkFactory, SinkEvent, SinkScript};
pub use synthetic_data::{frame_at, synthetic_nv12_frame};

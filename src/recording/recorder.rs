//! MP4 output target combining the H.264 encoder and muxide

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use muxide::api::{Metadata, Muxer, MuxerBuilder, VideoCodec as MuxVideoCodec};

use super::config::{RecordingStats, VideoCodec, VideoSettings};
use super::encoder::H264Encoder;
use super::sink::{AppendStatus, MediaSink, SinkFactory, SinkStatus};
use crate::errors::RecorderError;
use crate::types::{Frame, Timestamp};

/// Output target that encodes frames to H.264 and muxes them into an MP4 file
pub struct Mp4Sink {
    output_path: PathBuf,
    writer: Option<BufWriter<File>>,
    muxer: Option<Muxer<BufWriter<File>>>,
    encoder: Option<H264Encoder>,
    settings: Option<VideoSettings>,
    status: SinkStatus,
    session_start: Option<Timestamp>,
    input_finished: bool,
    last_pts: Option<f64>,
    busy_until: Option<Instant>,
    frame_count: u64,
    dropped_frames: u64,
    title: Option<String>,
}

impl Mp4Sink {
    /// Create the output file. The encoder and muxer are built when an input is added.
    pub fn create<P: AsRef<Path>>(output_path: P) -> Result<Self, RecorderError> {
        let output_path = output_path.as_ref().to_path_buf();

        let file = File::create(&output_path)
            .map_err(|e| RecorderError::Io(format!("Failed to create output file: {}", e)))?;

        Ok(Self {
            output_path,
            writer: Some(BufWriter::new(file)),
            muxer: None,
            encoder: None,
            settings: None,
            status: SinkStatus::Unknown,
            session_start: None,
            input_finished: false,
            last_pts: None,
            busy_until: None,
            frame_count: 0,
            dropped_frames: 0,
            title: None,
        })
    }

    /// Set the title metadata written into the container
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn fail(&mut self, err: RecorderError) -> RecorderError {
        self.status = SinkStatus::Failed;
        err
    }

    /// Real-time inputs get a backpressure window when an encode overruns a frame interval
    fn note_encode_time(&mut self, started: Instant) {
        let settings = match &self.settings {
            Some(s) if s.expects_realtime => s,
            _ => return,
        };
        let interval = Duration::from_secs_f64(settings.frame_interval_secs());
        let elapsed = started.elapsed();
        self.busy_until = if elapsed > interval {
            Some(Instant::now() + (elapsed - interval))
        } else {
            None
        };
    }
}

impl MediaSink for Mp4Sink {
    fn can_add_input(&self, settings: &VideoSettings) -> bool {
        self.writer.is_some()
            && self.settings.is_none()
            && settings.codec == VideoCodec::H264
            && settings.width > 0
            && settings.height > 0
            && settings.width % 2 == 0
            && settings.height % 2 == 0
            && settings.fps > 0.0
    }

    fn add_input(&mut self, settings: &VideoSettings) -> Result<(), RecorderError> {
        if !self.can_add_input(settings) {
            return Err(RecorderError::ConfigurationRejected(settings.describe()));
        }

        let writer = self
            .writer
            .take()
            .ok_or_else(|| RecorderError::ConfigurationRejected("input already added".into()))?;

        let encoder = H264Encoder::new(
            settings.width,
            settings.height,
            settings.average_bitrate,
            settings.fps,
        )?;

        let metadata = match &self.title {
            Some(title) => Metadata::new().with_title(title).with_current_time(),
            None => Metadata::new().with_current_time(),
        };

        let muxer = MuxerBuilder::new(writer)
            .video(MuxVideoCodec::H264, settings.width, settings.height, settings.fps)
            .with_fast_start(true)
            .with_metadata(metadata)
            .build()
            .map_err(|e| RecorderError::Muxing(format!("Failed to create muxer: {}", e)))?;

        self.encoder = Some(encoder);
        self.muxer = Some(muxer);
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn start_writing(&mut self) -> Result<(), RecorderError> {
        if self.muxer.is_none() {
            return Err(self.fail(RecorderError::StartWriting(
                "no video input attached".to_string(),
            )));
        }
        if self.status != SinkStatus::Unknown {
            return Err(RecorderError::StartWriting(format!(
                "cannot start writing from status {}",
                self.status.as_str()
            )));
        }
        self.status = SinkStatus::Writing;
        Ok(())
    }

    fn status(&self) -> SinkStatus {
        self.status
    }

    fn start_session(&mut self, at: Timestamp) {
        if self.session_start.is_none() {
            self.session_start = Some(at);
        }
    }

    fn is_ready_for_more_data(&self) -> bool {
        if self.status != SinkStatus::Writing || self.input_finished {
            return false;
        }
        self.busy_until.map_or(true, |until| Instant::now() >= until)
    }

    fn append(&mut self, frame: &Frame) -> Result<AppendStatus, RecorderError> {
        if self.status != SinkStatus::Writing || self.input_finished {
            return Err(RecorderError::NotRecording);
        }
        let start = self.session_start.ok_or_else(|| {
            RecorderError::Muxing("append before the output session started".to_string())
        })?;

        // Frames before the session start are outside the output timeline
        if frame.pts < start {
            self.dropped_frames += 1;
            return Ok(AppendStatus::Skipped);
        }
        let pts = (frame.pts - start).as_secs_f64();
        if self.last_pts.is_some_and(|last| pts <= last) {
            self.dropped_frames += 1;
            return Ok(AppendStatus::Skipped);
        }

        let started = Instant::now();
        let encoded = match self.encoder.as_mut() {
            Some(encoder) => encoder.encode_frame(frame),
            None => Err(RecorderError::Encoding("no encoder attached".to_string())),
        };
        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(e) => return Err(self.fail(e)),
        };

        // Encoder may return no data for some frames
        if encoded.data.is_empty() {
            self.dropped_frames += 1;
            self.note_encode_time(started);
            return Ok(AppendStatus::Skipped);
        }

        let written = match self.muxer.as_mut() {
            Some(muxer) => muxer
                .write_video(pts, &encoded.data, encoded.is_keyframe)
                .map_err(|e| RecorderError::Muxing(format!("Failed to write frame: {}", e))),
            None => Err(RecorderError::Muxing("no muxer attached".to_string())),
        };
        if let Err(e) = written {
            return Err(self.fail(e));
        }

        self.frame_count += 1;
        self.last_pts = Some(pts);
        self.note_encode_time(started);
        Ok(AppendStatus::Written)
    }

    fn mark_as_finished(&mut self) {
        self.input_finished = true;
    }

    fn finish_writing(self: Box<Self>) -> Result<RecordingStats, RecorderError> {
        let sink = *self;
        if sink.status == SinkStatus::Failed {
            return Err(RecorderError::Muxing(format!(
                "output target failed, {} is incomplete",
                sink.output_path.display()
            )));
        }

        let muxer = sink
            .muxer
            .ok_or_else(|| RecorderError::Muxing("no video input attached".to_string()))?;

        let muxer_stats = muxer
            .finish_with_stats()
            .map_err(|e| RecorderError::Muxing(format!("Failed to finalize recording: {}", e)))?;

        Ok(RecordingStats {
            video_frames: muxer_stats.video_frames,
            dropped_frames: sink.dropped_frames,
            duration_secs: muxer_stats.duration_secs,
            bytes_written: muxer_stats.bytes_written,
            output_path: sink.output_path,
        })
    }
}

/// Factory producing a fresh [`Mp4Sink`] per session
#[derive(Debug, Clone, Default)]
pub struct Mp4SinkFactory {
    title: Option<String>,
}

impl Mp4SinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl SinkFactory for Mp4SinkFactory {
    fn create(&self, path: &Path) -> Result<Box<dyn MediaSink>, RecorderError> {
        let sink = Mp4Sink::create(path)
            .map_err(|e| RecorderError::SinkCreation(e.to_string()))?;
        let sink = match &self.title {
            Some(title) => sink.with_title(title.clone()),
            None => sink,
        };
        Ok(Box::new(sink))
    }
}

//! In-memory output target with scripted behaviour
//!
//! Records every call made by the controller so tests can assert ordering,
//! and lets a test reject the input configuration, drive the readiness
//! signal frame by frame, skip frames, or hold finalization open.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::errors::RecorderError;
use crate::recording::{
    AppendStatus, MediaSink, RecordingStats, SinkFactory, SinkStatus, VideoSettings,
};
use crate::types::{Frame, Timestamp};

/// A call observed on a scripted sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Created(PathBuf),
    AddInput(VideoSettings),
    StartWriting,
    StartSession(Timestamp),
    Append(Timestamp),
    MarkAsFinished,
    FinishWriting,
}

#[derive(Default)]
struct ScriptState {
    events: Vec<SinkEvent>,
    readiness: VecDeque<bool>,
    skipped: Vec<Timestamp>,
    reject_input: bool,
    fail_creation: bool,
    hold_finish: bool,
}

/// Shared script and call log; clone freely between test and sinks
#[derive(Clone, Default)]
pub struct SinkScript {
    state: Arc<Mutex<ScriptState>>,
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl SinkScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> ScriptedSinkFactory {
        ScriptedSinkFactory {
            script: self.clone(),
        }
    }

    /// Make `can_add_input` return false
    pub fn reject_input(&self) {
        self.state().reject_input = true;
    }

    pub fn fail_creation(&self) {
        self.state().fail_creation = true;
    }

    /// Queue readiness answers; once exhausted the sink reports ready
    pub fn push_readiness(&self, answers: &[bool]) {
        self.state().readiness.extend(answers.iter().copied());
    }

    /// Make `append` accept but skip the frame with this timestamp
    pub fn skip_frame_at(&self, pts: Timestamp) {
        self.state().skipped.push(pts);
    }

    /// Block `finish_writing` until [`SinkScript::release_finish`]
    pub fn hold_finish(&self) {
        self.state().hold_finish = true;
        *self.gate.0.lock().expect("gate lock") = false;
    }

    pub fn release_finish(&self) {
        let (lock, cv) = &*self.gate;
        *lock.lock().expect("gate lock") = true;
        cv.notify_all();
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.state().events.clone()
    }

    /// Timestamps of appended frames, in order
    pub fn appended(&self) -> Vec<Timestamp> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Append(ts) => Some(*ts),
                _ => None,
            })
            .collect()
    }

    /// Timestamps passed to `start_session`
    pub fn session_starts(&self) -> Vec<Timestamp> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::StartSession(ts) => Some(*ts),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &SinkEvent) -> usize {
        self.state().events.iter().filter(|e| *e == event).count()
    }

    /// Index of the first occurrence of `event` in the call log
    pub fn position(&self, event: &SinkEvent) -> Option<usize> {
        self.state().events.iter().position(|e| e == event)
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().expect("script lock poisoned")
    }

    fn record(&self, event: SinkEvent) {
        self.state().events.push(event);
    }

    fn wait_for_release(&self) {
        if !self.state().hold_finish {
            return;
        }
        let (lock, cv) = &*self.gate;
        let mut released = lock.lock().expect("gate lock");
        while !*released {
            released = cv.wait(released).expect("gate lock");
        }
    }
}

/// Sink that writes the appended timestamps, one per line, on finish
pub struct ScriptedSink {
    script: SinkScript,
    path: PathBuf,
    status: SinkStatus,
    has_input: bool,
    finished_input: bool,
    appended: Vec<Timestamp>,
}

impl MediaSink for ScriptedSink {
    fn can_add_input(&self, _settings: &VideoSettings) -> bool {
        !self.script.state().reject_input && !self.has_input
    }

    fn add_input(&mut self, settings: &VideoSettings) -> Result<(), RecorderError> {
        if !self.can_add_input(settings) {
            return Err(RecorderError::ConfigurationRejected(settings.describe()));
        }
        self.has_input = true;
        self.script.record(SinkEvent::AddInput(settings.clone()));
        Ok(())
    }

    fn start_writing(&mut self) -> Result<(), RecorderError> {
        self.script.record(SinkEvent::StartWriting);
        if !self.has_input {
            self.status = SinkStatus::Failed;
            return Err(RecorderError::StartWriting("no input".to_string()));
        }
        self.status = SinkStatus::Writing;
        Ok(())
    }

    fn status(&self) -> SinkStatus {
        self.status
    }

    fn start_session(&mut self, at: Timestamp) {
        self.script.record(SinkEvent::StartSession(at));
    }

    fn is_ready_for_more_data(&self) -> bool {
        if self.finished_input {
            return false;
        }
        self.script.state().readiness.pop_front().unwrap_or(true)
    }

    fn append(&mut self, frame: &Frame) -> Result<AppendStatus, RecorderError> {
        if self.status != SinkStatus::Writing || self.finished_input {
            return Err(RecorderError::NotRecording);
        }
        if self.script.state().skipped.contains(&frame.pts) {
            return Ok(AppendStatus::Skipped);
        }
        self.appended.push(frame.pts);
        self.script.record(SinkEvent::Append(frame.pts));
        Ok(AppendStatus::Written)
    }

    fn mark_as_finished(&mut self) {
        self.finished_input = true;
        self.script.record(SinkEvent::MarkAsFinished);
    }

    fn finish_writing(self: Box<Self>) -> Result<RecordingStats, RecorderError> {
        self.script.wait_for_release();

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        for ts in &self.appended {
            writeln!(file, "{}", ts.as_micros())?;
        }
        let bytes_written = file.metadata()?.len();

        let duration_secs = match (self.appended.first(), self.appended.last()) {
            (Some(first), Some(last)) => (*last - *first).as_secs_f64(),
            _ => 0.0,
        };

        self.script.record(SinkEvent::FinishWriting);
        Ok(RecordingStats {
            video_frames: self.appended.len() as u64,
            dropped_frames: 0,
            duration_secs,
            bytes_written,
            output_path: self.path,
        })
    }
}

/// Factory handing out [`ScriptedSink`]s bound to one [`SinkScript`]
#[derive(Clone)]
pub struct ScriptedSinkFactory {
    script: SinkScript,
}

impl SinkFactory for ScriptedSinkFactory {
    fn create(&self, path: &Path) -> Result<Box<dyn MediaSink>, RecorderError> {
        if self.script.state().fail_creation {
            return Err(RecorderError::SinkCreation("scripted failure".to_string()));
        }

        // Refuse to clobber an existing file, like a platform asset writer
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| RecorderError::SinkCreation(format!("{}: {}", path.display(), e)))?;

        self.script.record(SinkEvent::Created(path.to_path_buf()));
        Ok(Box::new(ScriptedSink {
            script: self.script.clone(),
            path: path.to_path_buf(),
            status: SinkStatus::Unknown,
            has_input: false,
            finished_input: false,
            appended: Vec::new(),
        }))
    }
}

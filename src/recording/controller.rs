//! Recording session controller
//!
//! Gates capture frames into the current session's output target and drives
//! the `Idle -> Starting -> Active -> Finishing -> Idle` cycle. Control calls
//! (`toggle_recording`, `start_recording`, `stop_recording`) and the capture
//! callback (`on_frame`) may run on different threads; session state sits
//! behind one mutex that is only held for a single read-modify-write, and
//! the live output target has its own lock so encoding never blocks control
//! calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use uuid::Uuid;

use super::config::{RecordingStats, VideoSettings};
use super::sink::{AppendStatus, MediaSink, SinkFactory, SinkStatus};
use crate::capture::SourceConnection;
use crate::config::CamWriterConfig;
use crate::errors::RecorderError;
use crate::types::{Frame, Orientation, Timestamp};

/// Session-level state derived from the recording flag and the output target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No live output target
    Idle,
    /// Output target is writing but no frame has anchored the timeline yet
    Starting,
    /// Timeline anchored; frames are appended subject to readiness
    Active,
    /// Input marked finished; the container is being finalized
    Finishing,
}

/// What happened to a frame handed to [`RecordingController::on_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Recording flag is off
    NotRecording,
    /// Recording, but no output target in the writing state
    NotWritable,
    /// Output target signalled backpressure; frame dropped
    NotReady,
    /// Frame appended to the output target
    Appended,
    /// Output target took the frame but left it out of the container
    Skipped,
    /// Output target refused the frame; logged and dropped
    Failed,
}

/// Result of flipping the recording flag
#[derive(Debug)]
pub enum Transition {
    Started { session_id: Uuid },
    Stopped { finalize: Option<FinalizeHandle> },
}

/// Serializable snapshot of the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderStatus {
    pub state: SessionState,
    pub is_recording: bool,
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub anchor_us: Option<i64>,
    pub frames_appended: u64,
    pub frames_dropped: u64,
    pub frames_skipped: u64,
    pub output_path: PathBuf,
}

/// Output target plus counters shared with the capture path.
///
/// The capture path may hold `sink` while taking the session lock, never
/// the other way round.
struct SessionOutput {
    sink: Mutex<Option<Box<dyn MediaSink>>>,
    appended: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
}

impl SessionOutput {
    fn new(sink: Box<dyn MediaSink>) -> Self {
        Self {
            sink: Mutex::new(Some(sink)),
            appended: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    /// (appended, dropped, skipped)
    fn counts(&self) -> (u64, u64, u64) {
        (
            self.appended.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
        )
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    output: Option<Arc<SessionOutput>>,
}

struct Inner {
    recording: bool,
    /// Output target is being opened outside the lock
    setting_up: bool,
    session: Option<Session>,
    anchor: Option<Timestamp>,
    finalizing: bool,
    last_recording: Option<PathBuf>,
    last_stats: Option<RecordingStats>,
}

/// Handle to an in-flight finalization
///
/// Dropping the handle does not cancel finalization.
#[derive(Debug)]
pub struct FinalizeHandle {
    session_id: Uuid,
    thread: JoinHandle<Result<RecordingStats, RecorderError>>,
}

impl FinalizeHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the container is closed and the session is back to idle
    pub fn wait(self) -> Result<RecordingStats, RecorderError> {
        self.thread.join().map_err(|_| {
            RecorderError::Muxing(format!("finalize thread for {} panicked", self.session_id))
        })?
    }
}

/// Thread-safe recording session controller. Cloning shares the same session.
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<Mutex<Inner>>,
    setup_done: Arc<Condvar>,
    factory: Arc<dyn SinkFactory>,
    settings: VideoSettings,
    output_path: PathBuf,
}

impl RecordingController {
    /// Create a controller writing every session to `output_path`
    pub fn new<F, P>(factory: F, settings: VideoSettings, output_path: P) -> Self
    where
        F: SinkFactory + 'static,
        P: Into<PathBuf>,
    {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                recording: false,
                setting_up: false,
                session: None,
                anchor: None,
                finalizing: false,
                last_recording: None,
                last_stats: None,
            })),
            setup_done: Arc::new(Condvar::new()),
            factory: Arc::new(factory),
            settings,
            output_path: output_path.into(),
        }
    }

    pub fn from_config<F>(factory: F, config: &CamWriterConfig) -> Self
    where
        F: SinkFactory + 'static,
    {
        Self::new(factory, config.video.clone(), config.storage.output_path())
    }

    /// Flip the recording flag and run the matching start or stop.
    ///
    /// Turning recording on while the previous session is still finalizing
    /// is rejected with [`RecorderError::FinalizePending`].
    pub fn toggle_recording(&self) -> Result<Transition, RecorderError> {
        let recording = self.lock()?.recording;
        if recording {
            let finalize = self.stop_recording()?;
            Ok(Transition::Stopped { finalize })
        } else {
            let session_id = self.start_recording()?;
            Ok(Transition::Started { session_id })
        }
    }

    /// Turn recording on and open a fresh output target.
    ///
    /// On a setup failure the error is returned, no frames will be accepted,
    /// and the recording flag stays on until the next stop.
    pub fn start_recording(&self) -> Result<Uuid, RecorderError> {
        let session_id = Uuid::new_v4();
        {
            let mut inner = self.lock()?;
            if inner.finalizing {
                log::warn!("Refusing to start: previous recording is still finalizing");
                return Err(RecorderError::FinalizePending);
            }
            if inner.recording {
                log::warn!("Recording already started");
                return Ok(inner.session.as_ref().map_or(session_id, |s| s.id));
            }
            inner.recording = true;
            inner.setting_up = true;
            inner.anchor = None;
            inner.session = Some(Session {
                id: session_id,
                started_at: Utc::now(),
                output: None,
            });
        }

        log::info!("Starting recording session {}", session_id);

        // Sink setup touches the filesystem; keep it outside the lock
        let opened = self.open_sink();

        let mut guard = self.lock()?;
        guard.setting_up = false;
        self.setup_done.notify_all();

        let sink = match opened {
            Ok(sink) => sink,
            Err(e) => {
                log::error!("Recording session {} has no output target: {}", session_id, e);
                return Err(e);
            }
        };

        let owned =
            guard.recording && guard.session.as_ref().is_some_and(|s| s.id == session_id);
        if !owned {
            drop(guard);
            log::warn!("Recording session {} ended during setup", session_id);
            close_unused_sink(session_id, sink);
            return Err(RecorderError::NotRecording);
        }

        log::info!(
            "Output target ready for {} (status {})",
            self.output_path.display(),
            sink.status().as_str()
        );
        if let Some(session) = guard.session.as_mut() {
            session.output = Some(Arc::new(SessionOutput::new(sink)));
        }
        Ok(session_id)
    }

    /// Turn recording off, mark the input finished and finalize in the background.
    ///
    /// Waits for an output target that is still being opened. Returns `None`
    /// when the session never got a working output target.
    pub fn stop_recording(&self) -> Result<Option<FinalizeHandle>, RecorderError> {
        let session = {
            let mut inner = self.lock()?;
            while inner.setting_up {
                inner = self
                    .setup_done
                    .wait(inner)
                    .map_err(|_| RecorderError::PoisonedLock)?;
            }
            if !inner.recording {
                log::warn!("Recording not active");
                return Err(RecorderError::NotRecording);
            }
            inner.recording = false;
            let session = inner.session.take();
            match &session {
                Some(Session {
                    output: Some(_), ..
                }) => inner.finalizing = true,
                _ => inner.anchor = None,
            }
            session
        };

        let Some(session) = session else {
            return Ok(None);
        };
        let Some(output) = session.output else {
            log::info!("Recording session {} stopped without output", session.id);
            return Ok(None);
        };

        // Waits for an append already in flight on the capture thread
        let sink = {
            let mut slot = output.sink.lock().unwrap_or_else(|p| p.into_inner());
            slot.take()
        };
        let Some(mut sink) = sink else {
            let mut inner = self.lock()?;
            inner.finalizing = false;
            inner.anchor = None;
            return Ok(None);
        };

        sink.mark_as_finished();
        let (appended, dropped_by_controller, skipped) = output.counts();
        log::info!(
            "Session {} marked as finished ({} appended, {} dropped, {} skipped)",
            session.id,
            appended,
            dropped_by_controller,
            skipped
        );

        let inner = Arc::clone(&self.inner);
        let session_id = session.id;
        let spawned = std::thread::Builder::new()
            .name("camwriter-finalize".to_string())
            .spawn(move || finalize(inner, session_id, sink, dropped_by_controller));

        match spawned {
            Ok(thread) => Ok(Some(FinalizeHandle { session_id, thread })),
            Err(e) => {
                let mut inner = self.lock()?;
                inner.finalizing = false;
                inner.anchor = None;
                Err(RecorderError::Io(format!("finalize spawn failed: {e}")))
            }
        }
    }

    /// Capture callback: called once per frame on the producer thread.
    ///
    /// Never blocks on finalization and never buffers; frames the output
    /// target is not ready for are dropped. Encoding runs outside the
    /// session lock.
    pub fn on_frame(&self, frame: &Frame, connection: &mut SourceConnection) -> FrameOutcome {
        connection.set_orientation(Orientation::Portrait);

        let (session_id, output) = {
            let Some(inner) = self.lock_for_frame(frame) else {
                return FrameOutcome::Failed;
            };
            if !inner.recording {
                return FrameOutcome::NotRecording;
            }
            let current = inner
                .session
                .as_ref()
                .and_then(|s| s.output.as_ref().map(|o| (s.id, Arc::clone(o))));
            match current {
                Some(current) => current,
                None => return FrameOutcome::NotWritable,
            }
        };

        let mut slot = match output.sink.lock() {
            Ok(slot) => slot,
            Err(_) => {
                log::warn!("Dropping frame at {}: output lock poisoned", frame.pts);
                return FrameOutcome::Failed;
            }
        };
        let Some(sink) = slot.as_mut() else {
            return FrameOutcome::NotWritable;
        };
        if sink.status() != SinkStatus::Writing {
            return FrameOutcome::NotWritable;
        }

        if !sink.is_ready_for_more_data() {
            bump(&output.dropped);
            return FrameOutcome::NotReady;
        }

        // The first frame actually written anchors the output timeline
        let anchors = {
            let Some(mut inner) = self.lock_for_frame(frame) else {
                return FrameOutcome::Failed;
            };
            let current = inner.recording
                && inner.session.as_ref().is_some_and(|s| s.id == session_id);
            if !current {
                return FrameOutcome::NotRecording;
            }
            let anchors = inner.anchor.is_none();
            if anchors {
                inner.anchor = Some(frame.pts);
            }
            anchors
        };
        if anchors {
            sink.start_session(frame.pts);
            log::info!("Session {} timeline starts at {}", session_id, frame.pts);
        }

        match sink.append(frame) {
            Ok(AppendStatus::Written) => {
                bump(&output.appended);
                FrameOutcome::Appended
            }
            Ok(AppendStatus::Skipped) => {
                bump(&output.skipped);
                log::debug!("Output target skipped frame at {}", frame.pts);
                FrameOutcome::Skipped
            }
            Err(e) => {
                bump(&output.dropped);
                log::warn!("Failed to append frame at {}: {}", frame.pts, e);
                FrameOutcome::Failed
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        self.inner.lock().map(|inner| inner.recording).unwrap_or(false)
    }

    pub fn state(&self) -> SessionState {
        match self.inner.lock() {
            Ok(inner) => derive_state(&inner),
            Err(_) => SessionState::Idle,
        }
    }

    /// Presentation time of the first frame written in the current session
    pub fn anchor(&self) -> Option<Timestamp> {
        self.inner.lock().ok().and_then(|inner| inner.anchor)
    }

    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn status(&self) -> Result<RecorderStatus, RecorderError> {
        let inner = self.lock()?;
        let session = inner.session.as_ref();
        let (appended, dropped, skipped) = session
            .and_then(|s| s.output.as_ref())
            .map_or((0, 0, 0), |o| o.counts());
        Ok(RecorderStatus {
            state: derive_state(&inner),
            is_recording: inner.recording,
            session_id: session.map(|s| s.id),
            started_at: session.map(|s| s.started_at),
            anchor_us: inner.anchor.map(|a| a.as_micros()),
            frames_appended: appended,
            frames_dropped: dropped,
            frames_skipped: skipped,
            output_path: self.output_path.clone(),
        })
    }

    /// Path of the last successfully finalized recording
    pub fn last_recording(&self) -> Result<PathBuf, RecorderError> {
        let last = self.lock()?.last_recording.clone();
        match last {
            Some(path) if path.exists() => Ok(path),
            Some(path) => {
                log::warn!("Last recording {} no longer exists", path.display());
                Err(RecorderError::NoRecording(path.display().to_string()))
            }
            None => {
                log::warn!("Can't get video url: nothing has been recorded yet");
                Err(RecorderError::NoRecording("nothing recorded yet".to_string()))
            }
        }
    }

    pub fn last_stats(&self) -> Option<RecordingStats> {
        self.inner.lock().ok().and_then(|inner| inner.last_stats.clone())
    }

    fn open_sink(&self) -> Result<Box<dyn MediaSink>, RecorderError> {
        prepare_output_path(&self.output_path)?;

        let mut sink = self.factory.create(&self.output_path)?;

        if !sink.can_add_input(&self.settings) {
            log::error!("No input added: {}", self.settings.describe());
            return Err(RecorderError::ConfigurationRejected(self.settings.describe()));
        }
        sink.add_input(&self.settings)?;
        log::debug!("Input added: {}", self.settings.describe());

        sink.start_writing()?;
        Ok(sink)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, RecorderError> {
        self.inner.lock().map_err(|_| RecorderError::PoisonedLock)
    }

    fn lock_for_frame(&self, frame: &Frame) -> Option<MutexGuard<'_, Inner>> {
        match self.inner.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                log::warn!("Dropping frame at {}: session lock poisoned", frame.pts);
                None
            }
        }
    }
}

fn derive_state(inner: &Inner) -> SessionState {
    if inner.finalizing {
        return SessionState::Finishing;
    }
    let has_sink = inner
        .session
        .as_ref()
        .is_some_and(|s| s.output.is_some());
    match (inner.recording && has_sink, inner.anchor.is_some()) {
        (true, true) => SessionState::Active,
        (true, false) => SessionState::Starting,
        (false, _) => SessionState::Idle,
    }
}

/// Remove any previous recording at the fixed output location
fn prepare_output_path(path: &Path) -> Result<(), RecorderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            RecorderError::SinkCreation(format!("Failed to create output directory: {}", e))
        })?;
    }
    if path.exists() {
        fs::remove_file(path).map_err(|e| {
            RecorderError::SinkCreation(format!("Failed to remove previous recording: {}", e))
        })?;
        log::info!("Removed previous recording at {}", path.display());
    }
    Ok(())
}

/// Close an output target that no session owns any more
fn close_unused_sink(session_id: Uuid, mut sink: Box<dyn MediaSink>) {
    sink.mark_as_finished();
    match sink.finish_writing() {
        Ok(stats) => log::info!(
            "Closed unused output target of session {} ({})",
            session_id,
            stats.output_path.display()
        ),
        Err(e) => log::warn!(
            "Failed to close unused output target of session {}: {}",
            session_id,
            e
        ),
    }
}

fn finalize(
    inner: Arc<Mutex<Inner>>,
    session_id: Uuid,
    sink: Box<dyn MediaSink>,
    dropped_by_controller: u64,
) -> Result<RecordingStats, RecorderError> {
    let result = sink.finish_writing().map(|mut stats| {
        stats.dropped_frames += dropped_by_controller;
        stats
    });

    // Clear the anchor even if a panic elsewhere poisoned the lock
    let mut guard = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.anchor = None;
    guard.finalizing = false;

    match &result {
        Ok(stats) => {
            log::info!(
                "Finished writing session {}: {} frames, {:.2}s, {} bytes -> {}",
                session_id,
                stats.video_frames,
                stats.duration_secs,
                stats.bytes_written,
                stats.output_path.display()
            );
            guard.last_recording = Some(stats.output_path.clone());
            guard.last_stats = Some(stats.clone());
        }
        Err(e) => log::error!("Failed to finalize session {}: {}", session_id, e),
    }

    result
}

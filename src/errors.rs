use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Failed to create output target: {0}")]
    SinkCreation(String),
    #[error("Output target rejected video settings: {0}")]
    ConfigurationRejected(String),
    #[error("Output target failed to start writing: {0}")]
    StartWriting(String),
    #[error("Previous recording is still finalizing")]
    FinalizePending,
    #[error("Recording is not active")]
    NotRecording,
    #[error("No recording available: {0}")]
    NoRecording(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Muxing error: {0}")]
    Muxing(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Session lock poisoned by previous panic")]
    PoisonedLock,
}

impl RecorderError {
    /// Whether this error was raised while setting up a new session.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            RecorderError::SinkCreation(_)
                | RecorderError::ConfigurationRejected(_)
                | RecorderError::StartWriting(_)
        )
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        RecorderError::Io(e.to_string())
    }
}

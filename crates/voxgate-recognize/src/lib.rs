//! Speech recognition for voxgate.
//!
//! This crate provides a trait-based abstraction over an on-device
//! recognition engine and the [`RecognitionSession`] resource that owns one
//! request and its one-shot completion task.

mod convert;
mod endpoint;
mod model;
mod session;

#[cfg(feature = "local-whisper")]
mod whisper;

pub use convert::{StreamResampler, TARGET_SAMPLE_RATE, to_mono};
pub use endpoint::{EndpointConfig, Endpointer};
pub use model::{WhisperModel, model_path};
pub use session::RecognitionSession;
use thiserror::Error;
use voxgate_audio::AudioFrame;
#[cfg(feature = "local-whisper")]
pub use whisper::{WhisperEngine, WhisperEngineConfig};

/// Errors that can occur during recognition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Recognition engine error: {0}")]
    Engine(String),

    #[error("Recognition request could not be created: {0}")]
    RequestUnavailable(String),

    #[error("Unknown recognition request {0}")]
    UnknownRequest(u64),

    #[error("Unsupported recognition options: {0}")]
    Unsupported(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),
}

/// Result type for recognition operations.
pub type Result<T> = std::result::Result<T, RecognitionError>;

/// Opaque handle to a recognition request inside an engine.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RequestHandle(u64);

impl RequestHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Opaque handle to the completion task of a submitted request.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Final outcome handed to the completion callback. `Ok("")` means the
/// engine finished without recognizing speech.
pub type FinalCallback = Box<dyn FnOnce(Result<String>) + Send + 'static>;

/// How a request must be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// Never fall back to a network recognizer
    pub on_device_only: bool,
    /// Deliver interim results before the final one
    pub report_partial_results: bool,
    /// Language hint (ISO 639-1)
    pub language: Option<String>,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            on_device_only: true,
            report_partial_results: false,
            language: None,
        }
    }
}

impl RecognitionOptions {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Trait for recognition backends.
///
/// Engines invoke the completion callback at most once per submitted task,
/// from their own execution context. It must not be invoked from inside
/// `submit` or `cancel`; after `cancel` it must not be invoked at all. It
/// may run inside `append` when the engine cannot hand the work to its own
/// context, so callers must not block the audio thread on the completion.
pub trait RecognitionEngine: Send + Sync {
    /// Create a request configured with `options`.
    fn create_request(&self, options: &RecognitionOptions) -> Result<RequestHandle>;

    /// Start the recognition task for `request`.
    fn submit(&self, request: &RequestHandle, on_final: FinalCallback) -> Result<TaskHandle>;

    /// Append one captured buffer to `request`.
    fn append(&self, request: &RequestHandle, frame: &AudioFrame);

    /// Cancel the task. Its callback will not run.
    fn cancel(&self, task: &TaskHandle);

    /// Release the request and everything buffered for it.
    fn release(&self, request: RequestHandle);

    /// Returns the name of this engine for logging/debugging.
    fn name(&self) -> &str;
}

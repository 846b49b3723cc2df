// Re-export from sub-crates
pub use voxgate_audio::{
    AudioCaptureStream, AudioFrame, AudioHardware, CaptureError, CpalHardware, FrameCallback,
    InputFormat,
};
pub use voxgate_core::{
    APP_NAME, APP_NAME_PRETTY, Config, ConfigManager, DEFAULT_LOG_LEVEL, Observable,
    SessionEvent, SessionState, Subscription, Transcript,
};
pub use voxgate_recognize::{
    FinalCallback, RecognitionEngine, RecognitionError, RecognitionOptions, RecognitionSession,
    RequestHandle, TaskHandle,
};
#[cfg(feature = "local-whisper")]
pub use voxgate_recognize::{WhisperEngine, WhisperEngineConfig};

mod controller;
mod error;
pub mod notify;
pub mod permission;
pub mod prompter;

pub use controller::SessionController;
pub use error::{Result, SessionError};
pub use permission::{
    CapturePermission, PermissionGate, PermissionPrompter, PermissionStatus,
    TranscriptionAuthorization,
};
pub use prompter::ConsolePrompter;

// Version from this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

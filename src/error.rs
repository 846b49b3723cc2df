use thiserror::Error;
use voxgate_audio::CaptureError;
use voxgate_recognize::RecognitionError;

use crate::permission::TranscriptionAuthorization;

/// Why a capture attempt ended without recording.
///
/// None of these leave the controller in a bad state: by the time one is
/// returned the session is at rest and can be started again.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(
        "permission denied (capture granted: {capture_granted}, transcription: {transcription:?})"
    )]
    PermissionDenied {
        capture_granted: bool,
        transcription: TranscriptionAuthorization,
    },

    #[error("capture format invalid: {sample_rate} Hz, {channels} channel(s)")]
    CaptureFormatInvalid { sample_rate: u32, channels: u16 },

    #[error("capture engine failed to start: {0}")]
    CaptureEngineStartFailed(String),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}

impl From<CaptureError> for SessionError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::InvalidFormat {
                sample_rate,
                channels,
            } => SessionError::CaptureFormatInvalid {
                sample_rate,
                channels,
            },
            other => SessionError::CaptureEngineStartFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

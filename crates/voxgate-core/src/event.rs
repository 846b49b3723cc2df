//! Side-channel events emitted by the capture session.
//!
//! Failures never change the session beyond returning it to rest, so these
//! events are how callers learn why an attempt ended.

/// Events broadcast by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Capture or transcription permission is missing; the settings prompt
    /// was requested.
    PermissionDenied {
        capture_granted: bool,
        transcription_authorized: bool,
    },
    /// Audio capture could not start for this attempt
    CaptureFailed(String),
    /// The recognition engine reported an error
    RecognitionFailed(String),
    /// The engine finished without recognizing any speech
    NoSpeechDetected,
    /// A transcript was published
    TranscriptReady(String),
}

//! Capture and transcription permissions.
//!
//! The OS prompts themselves belong to a [`PermissionPrompter`]. The gate
//! only remembers the last answer for each permission and asks again while
//! an answer is still undetermined. A denial sticks for the life of the
//! process unless [`PermissionGate::invalidate`] is called after the user
//! has been to the system settings.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Whether microphone capture is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePermission {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

/// Whether on-device speech transcription is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptionAuthorization {
    Authorized,
    Denied,
    /// Blocked by device policy; the user cannot change it
    Restricted,
    #[default]
    NotDetermined,
}

impl TranscriptionAuthorization {
    pub fn is_authorized(&self) -> bool {
        matches!(self, TranscriptionAuthorization::Authorized)
    }
}

/// Both answers from [`PermissionGate::request_both`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionStatus {
    pub capture_granted: bool,
    pub transcription: TranscriptionAuthorization,
}

impl PermissionStatus {
    /// Capture may only start when both permissions are in place.
    pub fn is_granted(&self) -> bool {
        self.capture_granted && self.transcription.is_authorized()
    }
}

/// Platform side of permission handling: the OS prompts and the redirect
/// to the system settings.
#[async_trait]
pub trait PermissionPrompter: Send + Sync {
    /// Ask for microphone access. Resolves once the user answers.
    async fn request_capture_permission(&self) -> bool;

    /// Ask for speech transcription access. Resolves once the user answers.
    async fn request_transcription_permission(&self) -> TranscriptionAuthorization;

    /// Point the user at the system settings. Fire-and-forget.
    fn show_settings_prompt(&self);
}

struct Cached {
    capture: CapturePermission,
    transcription: TranscriptionAuthorization,
}

pub struct PermissionGate {
    prompter: Arc<dyn PermissionPrompter>,
    cached: Mutex<Cached>,
}

impl PermissionGate {
    pub fn new(prompter: Arc<dyn PermissionPrompter>) -> Self {
        Self::with_status(
            prompter,
            CapturePermission::Undetermined,
            TranscriptionAuthorization::NotDetermined,
        )
    }

    /// Start from answers already known to the platform.
    pub fn with_status(
        prompter: Arc<dyn PermissionPrompter>,
        capture: CapturePermission,
        transcription: TranscriptionAuthorization,
    ) -> Self {
        Self {
            prompter,
            cached: Mutex::new(Cached {
                capture,
                transcription,
            }),
        }
    }

    pub fn check_capture_permission(&self) -> CapturePermission {
        self.cached.lock().capture
    }

    pub fn check_transcription_permission(&self) -> TranscriptionAuthorization {
        self.cached.lock().transcription
    }

    /// Prompt for whichever permission is still undetermined and return
    /// both answers. Determined answers are returned without prompting.
    pub async fn request_both(&self) -> PermissionStatus {
        let capture = self.check_capture_permission();
        let capture_granted = match capture {
            CapturePermission::Undetermined => {
                let granted = self.prompter.request_capture_permission().await;
                self.cached.lock().capture = if granted {
                    CapturePermission::Granted
                } else {
                    CapturePermission::Denied
                };
                info!(granted, "Capture permission answered");
                granted
            }
            determined => determined == CapturePermission::Granted,
        };

        let transcription = match self.check_transcription_permission() {
            TranscriptionAuthorization::NotDetermined => {
                let answer = self.prompter.request_transcription_permission().await;
                self.cached.lock().transcription = answer;
                info!(answer = ?answer, "Transcription permission answered");
                answer
            }
            determined => determined,
        };

        debug!(capture_granted, transcription = ?transcription, "Permission check");
        PermissionStatus {
            capture_granted,
            transcription,
        }
    }

    /// Forget both answers so the next request asks again.
    pub fn invalidate(&self) {
        let mut cached = self.cached.lock();
        cached.capture = CapturePermission::Undetermined;
        cached.transcription = TranscriptionAuthorization::NotDetermined;
    }

    pub fn prompter(&self) -> &Arc<dyn PermissionPrompter> {
        &self.prompter
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingPrompter {
        capture: bool,
        transcription: TranscriptionAuthorization,
        capture_prompts: AtomicUsize,
        transcription_prompts: AtomicUsize,
    }

    impl CountingPrompter {
        fn new(capture: bool, transcription: TranscriptionAuthorization) -> Arc<Self> {
            Arc::new(Self {
                capture,
                transcription,
                capture_prompts: AtomicUsize::new(0),
                transcription_prompts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PermissionPrompter for CountingPrompter {
        async fn request_capture_permission(&self) -> bool {
            self.capture_prompts.fetch_add(1, Ordering::SeqCst);
            self.capture
        }

        async fn request_transcription_permission(&self) -> TranscriptionAuthorization {
            self.transcription_prompts.fetch_add(1, Ordering::SeqCst);
            self.transcription
        }

        fn show_settings_prompt(&self) {}
    }

    #[tokio::test]
    async fn test_prompts_once_then_caches() {
        let prompter = CountingPrompter::new(true, TranscriptionAuthorization::Authorized);
        let gate = PermissionGate::new(prompter.clone());
        assert_eq!(
            gate.check_capture_permission(),
            CapturePermission::Undetermined
        );

        assert!(gate.request_both().await.is_granted());
        assert!(gate.request_both().await.is_granted());

        assert_eq!(prompter.capture_prompts.load(Ordering::SeqCst), 1);
        assert_eq!(prompter.transcription_prompts.load(Ordering::SeqCst), 1);
        assert_eq!(gate.check_capture_permission(), CapturePermission::Granted);
    }

    #[tokio::test]
    async fn test_denial_is_sticky_until_invalidated() {
        let prompter = CountingPrompter::new(false, TranscriptionAuthorization::Authorized);
        let gate = PermissionGate::new(prompter.clone());

        let status = gate.request_both().await;
        assert!(!status.capture_granted);
        assert!(!status.is_granted());
        gate.request_both().await;
        assert_eq!(prompter.capture_prompts.load(Ordering::SeqCst), 1);

        gate.invalidate();
        gate.request_both().await;
        assert_eq!(prompter.capture_prompts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_undetermined_answer_asks_again() {
        let prompter = CountingPrompter::new(true, TranscriptionAuthorization::NotDetermined);
        let gate = PermissionGate::new(prompter.clone());

        gate.request_both().await;
        gate.request_both().await;
        assert_eq!(prompter.transcription_prompts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_known_status_skips_prompts() {
        let prompter = CountingPrompter::new(false, TranscriptionAuthorization::Denied);
        let gate = PermissionGate::with_status(
            prompter.clone(),
            CapturePermission::Granted,
            TranscriptionAuthorization::Restricted,
        );

        let status = gate.request_both().await;
        assert!(status.capture_granted);
        assert_eq!(status.transcription, TranscriptionAuthorization::Restricted);
        assert_eq!(prompter.capture_prompts.load(Ordering::SeqCst), 0);
        assert_eq!(prompter.transcription_prompts.load(Ordering::SeqCst), 0);
    }
}

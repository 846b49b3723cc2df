//! Session state types.

use std::fmt;
use std::sync::Arc;

/// The user-facing state of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Never started
    #[default]
    Idle,
    /// Capturing audio and feeding the recognizer
    Recording,
    /// Resting after at least one attempt
    Paused,
}

impl SessionState {
    /// Whether capture hardware and a recognition session are live.
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording)
    }

    /// `Idle` and `Paused` behave the same; only the history differs.
    pub fn is_resting(&self) -> bool {
        !self.is_recording()
    }

    /// Hint shown next to the capture button.
    pub fn prompt(&self) -> &'static str {
        match self {
            SessionState::Idle | SessionState::Paused => "Tap to speak",
            SessionState::Recording => "Tap to pause",
        }
    }
}

/// An immutable transcript of one utterance. Cloning is O(1).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Transcript(Arc<str>);

impl Transcript {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Transcript {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

impl From<&str> for Transcript {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl PartialEq<str> for Transcript {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Transcript {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_and_paused_rest() {
        assert!(SessionState::Idle.is_resting());
        assert!(SessionState::Paused.is_resting());
        assert!(SessionState::Recording.is_recording());
        assert_eq!(SessionState::Idle.prompt(), SessionState::Paused.prompt());
        assert_ne!(SessionState::Idle.prompt(), SessionState::Recording.prompt());
    }

    #[test]
    fn test_transcript_defaults_empty() {
        let transcript = Transcript::default();
        assert!(transcript.is_empty());
        assert_eq!(Transcript::from("hello world"), "hello world");
        assert_eq!(Transcript::new("hi").to_string(), "hi");
    }
}

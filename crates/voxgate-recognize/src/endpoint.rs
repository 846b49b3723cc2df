//! End-of-utterance detection.
//!
//! The recognizer only produces a final result, so it needs to decide on
//! its own when the speaker is done: some speech followed by enough
//! trailing silence, or the utterance running past its length cap.

use std::time::Duration;

use voxgate_core::Config;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointConfig {
    /// Frames at or under this level (dBFS) are silence
    pub silence_threshold_db: f32,
    /// Trailing silence after speech that ends the utterance
    pub end_of_speech: Duration,
    /// Hard cap on the utterance length
    pub max_utterance: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EndpointConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            silence_threshold_db: config.silence_threshold_db,
            end_of_speech: config.end_of_speech(),
            max_utterance: config.max_utterance(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Endpointer {
    config: EndpointConfig,
    heard_speech: bool,
    trailing_silence: Duration,
    total: Duration,
}

impl Endpointer {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            heard_speech: false,
            trailing_silence: Duration::ZERO,
            total: Duration::ZERO,
        }
    }

    /// Account for one frame. Returns true once the utterance is complete.
    pub fn observe(&mut self, level_db: f32, duration: Duration) -> bool {
        self.total += duration;
        if level_db > self.config.silence_threshold_db {
            self.heard_speech = true;
            self.trailing_silence = Duration::ZERO;
        } else if self.heard_speech {
            self.trailing_silence += duration;
        }

        self.total >= self.config.max_utterance
            || (self.heard_speech && self.trailing_silence >= self.config.end_of_speech)
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    pub fn elapsed(&self) -> Duration {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(100);

    fn endpointer() -> Endpointer {
        Endpointer::new(EndpointConfig {
            silence_threshold_db: -45.0,
            end_of_speech: Duration::from_millis(300),
            max_utterance: Duration::from_secs(2),
        })
    }

    #[test]
    fn test_silence_alone_waits_for_cap() {
        let mut endpointer = endpointer();
        for _ in 0..19 {
            assert!(!endpointer.observe(-80.0, FRAME));
        }
        assert!(endpointer.observe(-80.0, FRAME));
        assert!(!endpointer.heard_speech());
    }

    #[test]
    fn test_trailing_silence_ends_utterance() {
        let mut endpointer = endpointer();
        assert!(!endpointer.observe(-10.0, FRAME));
        assert!(!endpointer.observe(-80.0, FRAME));
        assert!(!endpointer.observe(-80.0, FRAME));
        assert!(endpointer.observe(-80.0, FRAME));
    }

    #[test]
    fn test_speech_resets_silence() {
        let mut endpointer = endpointer();
        endpointer.observe(-10.0, FRAME);
        endpointer.observe(-80.0, FRAME);
        endpointer.observe(-80.0, FRAME);
        assert!(!endpointer.observe(-20.0, FRAME));
        assert!(!endpointer.observe(-80.0, FRAME));
        assert!(!endpointer.observe(-80.0, FRAME));
        assert!(endpointer.observe(-80.0, FRAME));
        assert_eq!(endpointer.elapsed(), Duration::from_millis(700));
    }
}

//! Terminal permission prompter.
//!
//! Desktop platforms have no OS-level consent dialog for these
//! permissions, so the binary asks on the terminal instead and points the
//! user at the settings with a notification when access is refused.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::notify::notify;
use crate::permission::{PermissionPrompter, TranscriptionAuthorization};

const SETTINGS_HINT: &str =
    "Microphone access is off. Enable microphone and speech recognition access in the settings.";

#[derive(Debug, Default)]
pub struct ConsolePrompter {}

impl ConsolePrompter {
    pub fn new() -> Self {
        Self {}
    }

    async fn ask(&self, question: &str) -> Option<bool> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{} [y/N] ", question).as_bytes())
            .await
            .ok()?;
        stdout.flush().await.ok()?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .ok()?;
        if read == 0 {
            return None;
        }
        Some(parse_answer(&line))
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl PermissionPrompter for ConsolePrompter {
    async fn request_capture_permission(&self) -> bool {
        let granted = self
            .ask("Allow voxgate to use the microphone?")
            .await
            .unwrap_or(false);
        info!(granted, "Microphone permission");
        granted
    }

    async fn request_transcription_permission(&self) -> TranscriptionAuthorization {
        match self
            .ask("Allow voxgate to transcribe speech on this device?")
            .await
        {
            Some(true) => TranscriptionAuthorization::Authorized,
            Some(false) => TranscriptionAuthorization::Denied,
            // stdin closed, nobody to ask
            None => TranscriptionAuthorization::NotDetermined,
        }
    }

    fn show_settings_prompt(&self) {
        warn!("{}", SETTINGS_HINT);
        notify("permission needed", SETTINGS_HINT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer(" YES "));
        assert!(!parse_answer("\n"));
        assert!(!parse_answer("no"));
        assert!(!parse_answer("yep"));
    }
}

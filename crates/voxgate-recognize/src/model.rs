//! Whisper model files.
//!
//! Models are never fetched at runtime; they must already be present in
//! the models directory or be given by explicit path.

use std::path::PathBuf;

use anyhow::Result;
use voxgate_core::models_dir;

/// Available Whisper model variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhisperModel {
    /// Tiny model with Q8 quantization (43.5 MB)
    TinyQ8,
    /// Tiny English-only model with Q8 quantization (43.6 MB)
    TinyEnQ8,
    /// Base model with Q8 quantization (81.8 MB)
    #[default]
    BaseQ8,
    /// Base English-only model with Q8 quantization (81.8 MB)
    BaseEnQ8,
    /// Small model with Q8 quantization (264 MB)
    SmallQ8,
    /// Small English-only model with Q8 quantization (264 MB)
    SmallEnQ8,
}

impl WhisperModel {
    /// Returns the filename for this model.
    pub fn filename(&self) -> &'static str {
        match self {
            Self::TinyQ8 => "ggml-tiny-q8_0.bin",
            Self::TinyEnQ8 => "ggml-tiny.en-q8_0.bin",
            Self::BaseQ8 => "ggml-base-q8_0.bin",
            Self::BaseEnQ8 => "ggml-base.en-q8_0.bin",
            Self::SmallQ8 => "ggml-small-q8_0.bin",
            Self::SmallEnQ8 => "ggml-small.en-q8_0.bin",
        }
    }

    /// Whether the model only understands English.
    pub fn is_english_only(&self) -> bool {
        matches!(self, Self::TinyEnQ8 | Self::BaseEnQ8 | Self::SmallEnQ8)
    }

    /// Parses a model name string into a WhisperModel.
    ///
    /// Accepts names like "base-q8", "tiny-en-q8", "small", etc.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "tiny-q8" | "tiny" => Some(Self::TinyQ8),
            "tiny-en-q8" | "tiny-en" | "tiny.en" => Some(Self::TinyEnQ8),
            "base-q8" | "base" => Some(Self::BaseQ8),
            "base-en-q8" | "base-en" | "base.en" => Some(Self::BaseEnQ8),
            "small-q8" | "small" => Some(Self::SmallQ8),
            "small-en-q8" | "small-en" | "small.en" => Some(Self::SmallEnQ8),
            _ => None,
        }
    }
}

/// Returns the path where a model should be stored.
pub fn model_path(model: WhisperModel) -> Result<PathBuf> {
    Ok(models_dir()?.join(model.filename()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_name() {
        assert_eq!(
            WhisperModel::from_name("base-q8"),
            Some(WhisperModel::BaseQ8)
        );
        assert_eq!(WhisperModel::from_name("BASE"), Some(WhisperModel::BaseQ8));
        assert_eq!(
            WhisperModel::from_name("tiny-en"),
            Some(WhisperModel::TinyEnQ8)
        );
        assert_eq!(WhisperModel::from_name("invalid"), None);
    }

    #[test]
    fn test_model_filenames() {
        assert_eq!(WhisperModel::default().filename(), "ggml-base-q8_0.bin");
        assert!(WhisperModel::SmallEnQ8.is_english_only());
        assert!(!WhisperModel::SmallQ8.is_english_only());
    }
}

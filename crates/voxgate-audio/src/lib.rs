//! Audio capture for voxgate.
//!
//! There can only be one capture stream active at a time. The hardware sits
//! behind the [`AudioHardware`] trait so the stream logic can be driven by
//! cpal in the application and by fakes in tests.

mod device;
mod level;
mod stream;

pub use device::CpalHardware;
pub use level::{MIN_DB, db_fs};
pub use stream::AudioCaptureStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The input reported a zero sample rate, the hardware is not ready
    #[error("invalid input format: {sample_rate} Hz, {channels} channel(s)")]
    InvalidFormat { sample_rate: u32, channels: u16 },
    /// The hardware engine refused to start
    #[error("audio engine failed to start: {0}")]
    EngineStartFailed(String),
    /// No recording device available
    #[error("no input device available")]
    NoInputDevice,
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// The audio session could not be (de)activated
    #[error("audio session error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

/// Format negotiated with the input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl InputFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// A zero sample rate means the hardware has not negotiated a format.
    pub fn is_valid(&self) -> bool {
        self.sample_rate != 0 && self.channels != 0
    }
}

/// One buffer of interleaved f32 samples as delivered by the input.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub format: InputFormat,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, format: InputFormat) -> Self {
        Self { samples, format }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    /// Peak level of the buffer in dBFS.
    pub fn level_db(&self) -> f32 {
        db_fs(&self.samples)
    }
}

/// Callback invoked on the capture thread once per arriving buffer.
pub type FrameCallback = Box<dyn FnMut(AudioFrame) + Send + 'static>;

/// The process-wide audio input.
///
/// `start` installs the frame callback and starts the input; `stop` removes
/// it. `stop` must be idempotent and must not return until the callback is
/// uninstalled and will not be invoked again.
pub trait AudioHardware: Send {
    /// The format the input would deliver right now.
    fn current_input_format(&mut self) -> Result<InputFormat>;

    /// Install `callback` and start delivering buffers to it.
    fn start(&mut self, callback: FrameCallback) -> Result<()>;

    /// Stop the input and drop the installed callback, if any.
    fn stop(&mut self);

    /// Reserve the input for exclusive capture use.
    fn activate(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the reservation taken by [`AudioHardware::activate`].
    fn deactivate(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<H: AudioHardware + ?Sized> AudioHardware for Box<H> {
    fn current_input_format(&mut self) -> Result<InputFormat> {
        (**self).current_input_format()
    }

    fn start(&mut self, callback: FrameCallback) -> Result<()> {
        (**self).start(callback)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn activate(&mut self) -> Result<()> {
        (**self).activate()
    }

    fn deactivate(&mut self) -> Result<()> {
        (**self).deactivate()
    }
}

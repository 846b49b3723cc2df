//! The capture stream owned by a session.

use tracing::{debug, info, warn};

use crate::{AudioFrame, AudioHardware, CaptureError, InputFormat, Result};

/// Owns the hardware input and at most one installed frame callback.
///
/// The callback is installed exactly while the stream is started. `start`
/// on a started stream stops it first; `stop` is always safe.
pub struct AudioCaptureStream<H> {
    hardware: H,
    started: Option<InputFormat>,
}

impl<H: AudioHardware> AudioCaptureStream<H> {
    pub fn new(hardware: H) -> Self {
        Self {
            hardware,
            started: None,
        }
    }

    /// Start capturing, invoking `on_frame` once per arriving buffer until
    /// [`AudioCaptureStream::stop`] is called.
    pub fn start<F>(&mut self, on_frame: F) -> Result<InputFormat>
    where
        F: FnMut(AudioFrame) + Send + 'static,
    {
        self.stop();

        let format = self.hardware.current_input_format()?;
        if !format.is_valid() {
            warn!(
                sample_rate = format.sample_rate,
                channels = format.channels,
                "Input format is not ready"
            );
            return Err(CaptureError::InvalidFormat {
                sample_rate: format.sample_rate,
                channels: format.channels,
            });
        }

        if let Err(e) = self.hardware.start(Box::new(on_frame)) {
            // A failed start may still have installed the callback.
            self.hardware.stop();
            return Err(match e {
                e @ (CaptureError::EngineStartFailed(_) | CaptureError::InvalidFormat { .. }) => e,
                other => CaptureError::EngineStartFailed(other.to_string()),
            });
        }

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Capture stream started"
        );
        self.started = Some(format);
        Ok(format)
    }

    /// Stop capturing. The frame callback is removed before this returns,
    /// even if the stream never started.
    pub fn stop(&mut self) {
        self.hardware.stop();
        if self.started.take().is_some() {
            debug!("Capture stream stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::FrameCallback;

    #[derive(Default)]
    struct FakeHardware {
        format: Option<InputFormat>,
        fail_start: bool,
        callback: Option<FrameCallback>,
        stops: usize,
    }

    impl FakeHardware {
        fn with_format(sample_rate: u32, channels: u16) -> Self {
            Self {
                format: Some(InputFormat::new(sample_rate, channels)),
                ..Default::default()
            }
        }

        fn push(&mut self, samples: &[f32]) -> bool {
            let format = self.format.unwrap_or(InputFormat::new(0, 0));
            match self.callback.as_mut() {
                Some(callback) => {
                    callback(AudioFrame::new(samples.to_vec(), format));
                    true
                }
                None => false,
            }
        }
    }

    impl AudioHardware for FakeHardware {
        fn current_input_format(&mut self) -> Result<InputFormat> {
            self.format.ok_or(CaptureError::NoInputDevice)
        }

        fn start(&mut self, callback: FrameCallback) -> Result<()> {
            self.callback = Some(callback);
            if self.fail_start {
                return Err(CaptureError::EngineStartFailed("device busy".into()));
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.callback = None;
            self.stops += 1;
        }
    }

    fn counting_callback() -> (Arc<AtomicUsize>, impl FnMut(AudioFrame) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        (count, move |_frame: AudioFrame| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_start_delivers_frames_until_stop() {
        let mut stream = AudioCaptureStream::new(FakeHardware::with_format(16000, 1));
        let (count, callback) = counting_callback();

        let format = stream.start(callback).unwrap();
        assert_eq!(format, InputFormat::new(16000, 1));
        assert!(stream.is_started());

        assert!(stream.hardware_mut().push(&[0.1; 160]));
        assert!(stream.hardware_mut().push(&[0.1; 160]));
        stream.stop();
        assert!(!stream.hardware_mut().push(&[0.1; 160]));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!stream.is_started());
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        let mut stream = AudioCaptureStream::new(FakeHardware::with_format(0, 1));
        let (count, callback) = counting_callback();

        let err = stream.start(callback).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidFormat {
                sample_rate: 0,
                channels: 1
            }
        ));
        assert!(!stream.is_started());
        assert!(stream.hardware().callback.is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_start_removes_callback() {
        let mut hardware = FakeHardware::with_format(48000, 2);
        hardware.fail_start = true;
        let mut stream = AudioCaptureStream::new(hardware);
        let (_count, callback) = counting_callback();

        let err = stream.start(callback).unwrap_err();
        assert!(matches!(err, CaptureError::EngineStartFailed(_)));
        assert!(stream.hardware().callback.is_none());
        assert!(!stream.is_started());
    }

    #[test]
    fn test_restart_replaces_callback() {
        let mut stream = AudioCaptureStream::new(FakeHardware::with_format(16000, 1));
        let (first, callback) = counting_callback();
        stream.start(callback).unwrap();
        let (second, callback) = counting_callback();
        stream.start(callback).unwrap();

        stream.hardware_mut().push(&[0.0; 16]);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut stream = AudioCaptureStream::new(FakeHardware::with_format(16000, 1));
        stream.stop();
        stream.stop();
        assert!(!stream.is_started());
        assert_eq!(stream.hardware().stops, 2);
    }
}

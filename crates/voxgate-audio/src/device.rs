//! cpal-backed audio input.
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated thread
//! for as long as capture runs. `start` waits for the thread to report that
//! the stream is playing; `stop` signals it and joins, which drops the
//! stream and with it the frame callback.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use tracing::{debug, error, info};

use crate::{AudioFrame, AudioHardware, CaptureError, FrameCallback, InputFormat, Result};

struct StreamWorker {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// The default input device of the default cpal host.
#[derive(Default)]
pub struct CpalHardware {
    worker: Option<StreamWorker>,
}

impl CpalHardware {
    pub fn new() -> Self {
        Self::default()
    }
}

fn default_device() -> Result<(cpal::Device, cpal::SupportedStreamConfig)> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;
    let config = device
        .default_input_config()
        .map_err(|_| CaptureError::NoInputDevice)?;
    Ok((device, config))
}

impl AudioHardware for CpalHardware {
    fn current_input_format(&mut self) -> Result<InputFormat> {
        let (_, config) = default_device()?;
        Ok(InputFormat::new(config.sample_rate().0, config.channels()))
    }

    fn start(&mut self, callback: FrameCallback) -> Result<()> {
        self.stop();

        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("voxgate-capture".into())
            .spawn(move || {
                let stream = match open_stream(callback) {
                    Ok(stream) => stream,
                    Err(e) => {
                        ready_tx.send(Err(e)).ok();
                        return;
                    }
                };
                ready_tx.send(Ok(())).ok();
                // Runs until stop() signals or drops the sender.
                stop_rx.recv().ok();
                drop(stream);
                debug!("Capture thread exiting");
            })
            .map_err(|e| CaptureError::EngineStartFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(StreamWorker {
                    stop: stop_tx,
                    handle,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                handle.join().ok();
                Err(e)
            }
            Err(_) => {
                handle.join().ok();
                Err(CaptureError::EngineStartFailed(
                    "capture thread exited before the stream started".into(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.send(()).ok();
        if worker.handle.join().is_err() {
            error!("Capture thread panicked");
        }
    }
}

impl Drop for CpalHardware {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(callback: FrameCallback) -> Result<cpal::Stream> {
    let (device, config) = default_device()?;
    let format = InputFormat::new(config.sample_rate().0, config.channels());

    info!(
        device_name = %device.name().unwrap_or_else(|_| "unknown".into()),
        config = ?config,
        "Capturing from device"
    );

    let sample_format = config.sample_format();
    let config: cpal::StreamConfig = config.into();
    let stream = match sample_format {
        cpal::SampleFormat::I8 => build_stream::<i8>(&device, &config, format, callback),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, format, callback),
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, format, callback),
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, format, callback),
        sample_format => {
            return Err(CaptureError::SampleFormatNotSupported(format!(
                "{:?}",
                sample_format
            )));
        }
    }
    .map_err(|e| CaptureError::EngineStartFailed(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::EngineStartFailed(e.to_string()))?;

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: InputFormat,
    mut callback: FrameCallback,
) -> std::result::Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let err_fn = move |err| {
        error!("an error occurred on stream: {}", err);
    };

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples = data.iter().map(|&sample| f32::from_sample(sample)).collect();
            callback(AudioFrame::new(samples, format));
        },
        err_fn,
        None,
    )
}

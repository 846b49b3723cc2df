//! Local Whisper recognition using whisper-rs.
//!
//! Audio never leaves the machine. Each request buffers 16 kHz mono audio
//! until the [`Endpointer`] decides the utterance is over, then inference
//! runs on a worker thread and the completion callback fires once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use voxgate_audio::AudioFrame;
use voxgate_core::Config;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::convert::{StreamResampler, TARGET_SAMPLE_RATE, to_mono};
use crate::endpoint::{EndpointConfig, Endpointer};
use crate::model::{WhisperModel, model_path};
use crate::{
    FinalCallback, RecognitionEngine, RecognitionError, RecognitionOptions, RequestHandle,
    Result, TaskHandle,
};

/// Configuration for the local Whisper engine.
#[derive(Debug, Clone, Default)]
pub struct WhisperEngineConfig {
    /// The model to use.
    pub model: WhisperModel,
    /// Optional override path to the model file.
    pub model_path: Option<PathBuf>,
    /// When an utterance counts as finished.
    pub endpoint: EndpointConfig,
}

impl WhisperEngineConfig {
    pub fn from_config(config: &Config) -> Self {
        let model = match config.model() {
            Some(name) => WhisperModel::from_name(name).unwrap_or_else(|| {
                warn!(model = name, "Unknown model name, using the default");
                WhisperModel::default()
            }),
            None => WhisperModel::default(),
        };
        Self {
            model,
            model_path: config.model_path().map(|p| p.to_path_buf()),
            endpoint: EndpointConfig::from_config(config),
        }
    }
}

type CallbackSlot = Arc<Mutex<Option<FinalCallback>>>;

struct PendingRequest {
    language: Option<String>,
    samples: Vec<f32>,
    resampler: StreamResampler,
    endpointer: Endpointer,
    on_final: Option<FinalCallback>,
    cancelled: Arc<AtomicBool>,
    finished: bool,
}

struct Shared {
    config: WhisperEngineConfig,
    /// Lazily initialized whisper context.
    context: Mutex<Option<WhisperContext>>,
}

/// On-device recognizer backed by whisper.cpp.
pub struct WhisperEngine {
    shared: Arc<Shared>,
    requests: Mutex<HashMap<u64, PendingRequest>>,
    next_id: AtomicU64,
}

static LOGGING_HOOKS: Once = Once::new();

impl WhisperEngine {
    pub fn new(config: WhisperEngineConfig) -> Self {
        // Route whisper.cpp output through tracing.
        LOGGING_HOOKS.call_once(whisper_rs::install_logging_hooks);
        Self {
            shared: Arc::new(Shared {
                config,
                context: Mutex::new(None),
            }),
            requests: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Load the model now instead of on the first utterance.
    pub fn preload(&self) -> Result<()> {
        self.shared.ensure_context().map(|_| ())
    }

    /// Run inference for a finished utterance on a worker thread. If the
    /// worker cannot start, the callback is handed back together with the
    /// error so the caller can complete the request once its locks are gone.
    fn finish(
        &self,
        id: u64,
        pending: &mut PendingRequest,
    ) -> Option<(FinalCallback, RecognitionError)> {
        pending.finished = true;
        let on_final = pending.on_final.take()?;
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(on_final)));
        let samples = std::mem::take(&mut pending.samples);
        let language = pending.language.clone();
        let cancelled = pending.cancelled.clone();
        let shared = self.shared.clone();
        let worker_slot = slot.clone();

        let spawned = thread::Builder::new()
            .name(format!("voxgate-whisper-{id}"))
            .spawn(move || {
                let outcome = if samples.is_empty() {
                    Ok(String::new())
                } else {
                    shared.transcribe(&samples, language.as_deref())
                };
                if cancelled.load(Ordering::SeqCst) {
                    debug!(request = id, "Discarding result of cancelled request");
                    return;
                }
                if let Some(on_final) = worker_slot.lock().take() {
                    on_final(outcome);
                }
            });
        reclaim_on_spawn_failure(id, spawned, &slot)
    }
}

fn reclaim_on_spawn_failure<T>(
    id: u64,
    spawned: std::io::Result<T>,
    slot: &CallbackSlot,
) -> Option<(FinalCallback, RecognitionError)> {
    let e = spawned.err()?;
    error!(request = id, "Failed to spawn recognition worker: {}", e);
    let on_final = slot.lock().take()?;
    Some((
        on_final,
        RecognitionError::Engine(format!("recognition worker did not start: {}", e)),
    ))
}

impl Shared {
    /// Get or initialize the whisper context, returning a guard.
    fn ensure_context(&self) -> Result<parking_lot::MutexGuard<'_, Option<WhisperContext>>> {
        let mut guard = self.context.lock();
        if guard.is_none() {
            let path = match &self.config.model_path {
                Some(p) => p.clone(),
                None => model_path(self.config.model)
                    .map_err(|e| RecognitionError::ModelLoad(e.to_string()))?,
            };

            info!(path = ?path, "Loading Whisper model");

            let ctx = WhisperContext::new_with_params(
                path.to_str()
                    .ok_or_else(|| RecognitionError::ModelLoad("Invalid model path".to_string()))?,
                WhisperContextParameters::default(),
            )
            .map_err(|e| RecognitionError::ModelLoad(e.to_string()))?;

            info!("Whisper model loaded successfully");
            *guard = Some(ctx);
        }
        Ok(guard)
    }

    fn transcribe(&self, samples: &[f32], language: Option<&str>) -> Result<String> {
        let context = self.ensure_context()?;
        let ctx = context
            .as_ref()
            .ok_or_else(|| RecognitionError::ModelLoad("context missing".to_string()))?;

        let mut state = ctx
            .create_state()
            .map_err(|e| RecognitionError::Engine(format!("Failed to create state: {}", e)))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        params.set_no_context(true);
        params.set_single_segment(true);

        // Disable printing to stdout
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| RecognitionError::Engine(format!("Recognition failed: {}", e)))?;

        let mut result = String::new();
        for i in 0..state.full_n_segments() {
            if let Some(segment) = state.get_segment(i) {
                let text = segment.to_str_lossy().map_err(|e| {
                    RecognitionError::Engine(format!("Failed to get segment {}: {}", i, e))
                })?;
                result.push_str(&text);
            }
        }

        debug!(
            samples = samples.len(),
            chars = result.len(),
            "Recognition finished"
        );
        Ok(result.trim().to_string())
    }
}

impl RecognitionEngine for WhisperEngine {
    fn create_request(&self, options: &RecognitionOptions) -> Result<RequestHandle> {
        if !options.on_device_only {
            warn!("Network recognition requested, whisper always runs on device");
        }
        if options.report_partial_results {
            return Err(RecognitionError::Unsupported(
                "partial results are not produced".to_string(),
            ));
        }
        if let Some(language) = options.language.as_deref() {
            if self.shared.config.model.is_english_only() && language != "en" {
                warn!(language, model = ?self.shared.config.model, "English-only model");
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().insert(
            id,
            PendingRequest {
                language: options.language.clone(),
                samples: Vec::with_capacity(TARGET_SAMPLE_RATE as usize * 4),
                resampler: StreamResampler::new(TARGET_SAMPLE_RATE),
                endpointer: Endpointer::new(self.shared.config.endpoint),
                on_final: None,
                cancelled: Arc::new(AtomicBool::new(false)),
                finished: false,
            },
        );
        Ok(RequestHandle::new(id))
    }

    fn submit(&self, request: &RequestHandle, on_final: FinalCallback) -> Result<TaskHandle> {
        let mut requests = self.requests.lock();
        let pending = requests
            .get_mut(&request.id())
            .ok_or(RecognitionError::UnknownRequest(request.id()))?;
        if pending.on_final.is_some() || pending.finished {
            return Err(RecognitionError::Engine("request already submitted".to_string()));
        }
        pending.on_final = Some(on_final);
        Ok(TaskHandle::new(request.id()))
    }

    fn append(&self, request: &RequestHandle, frame: &AudioFrame) {
        let failed = {
            let mut requests = self.requests.lock();
            let Some(pending) = requests.get_mut(&request.id()) else {
                return;
            };
            if pending.finished {
                return;
            }

            let mono = to_mono(&frame.samples, frame.format.channels);
            let input = pending.resampler.process(&mono, frame.format.sample_rate);
            let duration =
                Duration::from_secs_f64(input.len() as f64 / TARGET_SAMPLE_RATE as f64);
            pending.samples.extend_from_slice(&input);

            if !pending.endpointer.observe(frame.level_db(), duration)
                || pending.on_final.is_none()
            {
                return;
            }
            info!(
                request = request.id(),
                heard_speech = pending.endpointer.heard_speech(),
                elapsed = ?pending.endpointer.elapsed(),
                "Utterance complete"
            );
            self.finish(request.id(), pending)
        };

        if let Some((on_final, e)) = failed {
            on_final(Err(e));
        }
    }

    fn cancel(&self, task: &TaskHandle) {
        if let Some(pending) = self.requests.lock().get_mut(&task.id()) {
            pending.cancelled.store(true, Ordering::SeqCst);
            pending.on_final = None;
            pending.finished = true;
        }
    }

    fn release(&self, request: RequestHandle) {
        if let Some(pending) = self.requests.lock().remove(&request.id()) {
            pending.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &str {
        "local-whisper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WhisperEngineConfig::default();
        assert_eq!(config.model, WhisperModel::BaseQ8);
        assert!(config.model_path.is_none());
    }

    #[test]
    fn test_partial_results_rejected() {
        let engine = WhisperEngine::new(WhisperEngineConfig::default());
        let options = RecognitionOptions {
            report_partial_results: true,
            ..Default::default()
        };
        assert!(matches!(
            engine.create_request(&options),
            Err(RecognitionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_spawn_failure_hands_callback_back() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();
        let on_final: FinalCallback = Box::new(move |outcome| sink.lock().push(outcome));
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(on_final)));

        let spawned: std::io::Result<()> = Err(std::io::Error::other("no threads left"));
        let (on_final, e) = reclaim_on_spawn_failure(7, spawned, &slot).unwrap();
        on_final(Err(e));

        assert!(slot.lock().is_none());
        assert!(matches!(
            delivered.lock().as_slice(),
            [Err(RecognitionError::Engine(_))]
        ));
    }

    #[test]
    fn test_spawned_worker_keeps_callback() {
        let on_final: FinalCallback = Box::new(|_| {});
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(on_final)));
        assert!(reclaim_on_spawn_failure(7, Ok(()), &slot).is_none());
        assert!(slot.lock().is_some());
    }

    #[test]
    fn test_double_submit_rejected() {
        let engine = WhisperEngine::new(WhisperEngineConfig::default());
        let request = engine
            .create_request(&RecognitionOptions::default())
            .unwrap();
        engine.submit(&request, Box::new(|_| {})).unwrap();
        assert!(engine.submit(&request, Box::new(|_| {})).is_err());
        engine.release(request);
    }
}

//! The capture session state machine.
//!
//! [`SessionController`] owns one audio capture stream and at most one live
//! recognition session. Two producers call into it from their own threads:
//! the capture callback (once per audio buffer) and the recognition
//! completion (once per session). Every mutation of the session state and
//! of the capture stream goes through the `inner` lock.
//!
//! Lock order is `inner` then `live`. The capture callback only ever takes
//! `live`, so stopping the stream while holding `inner` cannot deadlock
//! against a frame in flight. A completion the engine delivers from inside
//! `append` arrives with `live` held on the audio thread; it is parked in
//! `deferred` and handled on a separate thread.

use std::cell::Cell;
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use voxgate_audio::{AudioCaptureStream, AudioFrame, AudioHardware};
use voxgate_core::{Observable, SessionEvent, SessionState, Subscription, Transcript};
use voxgate_recognize::{RecognitionEngine, RecognitionOptions, RecognitionSession};

use crate::error::{Result, SessionError};
use crate::permission::{PermissionGate, PermissionPrompter};

const EVENT_CAPACITY: usize = 32;

type LiveSession = Arc<Mutex<Option<RecognitionSession>>>;

type Completion = (u64, voxgate_recognize::Result<String>);

type ParkedCompletion = Arc<Mutex<Option<Completion>>>;

thread_local! {
    /// Set while this thread is feeding a frame to the live session.
    static FEEDING: Cell<bool> = const { Cell::new(false) };
}

struct Inner {
    stream: AudioCaptureStream<Box<dyn AudioHardware>>,
    /// Bumped every time a recognition session is created. A completion
    /// only counts if it carries the current generation.
    generation: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    live: LiveSession,
    /// Completion parked by the audio thread, waiting for a handler.
    deferred: ParkedCompletion,
    state: Observable<SessionState>,
    transcript: Observable<Transcript>,
    events: broadcast::Sender<SessionEvent>,
    engine: Arc<dyn RecognitionEngine>,
    options: RecognitionOptions,
    gate: PermissionGate,
}

/// Drives one voice capture session.
///
/// Reusable across any number of attempts. Dropping the controller stops
/// capture, releases the recognition session and deactivates the audio
/// hardware.
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new<H>(
        hardware: H,
        engine: Arc<dyn RecognitionEngine>,
        prompter: Arc<dyn PermissionPrompter>,
        options: RecognitionOptions,
    ) -> Self
    where
        H: AudioHardware + 'static,
    {
        Self::with_gate(hardware, engine, PermissionGate::new(prompter), options)
    }

    /// Build with a gate that may already know the permission answers.
    pub fn with_gate<H>(
        hardware: H,
        engine: Arc<dyn RecognitionEngine>,
        gate: PermissionGate,
        options: RecognitionOptions,
    ) -> Self
    where
        H: AudioHardware + 'static,
    {
        let mut hardware: Box<dyn AudioHardware> = Box::new(hardware);
        if let Err(e) = hardware.activate() {
            warn!("Audio session could not be activated: {}", e);
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    stream: AudioCaptureStream::new(hardware),
                    generation: 0,
                }),
                live: Arc::new(Mutex::new(None)),
                deferred: Arc::new(Mutex::new(None)),
                state: Observable::new(SessionState::Idle),
                transcript: Observable::new(Transcript::default()),
                events,
                engine,
                options,
                gate,
            }),
        }
    }

    /// Check permissions, prompting if needed, and start capturing.
    ///
    /// On denial the settings prompt is shown and the state is left alone.
    /// Concurrent calls are not serialized here; callers should debounce.
    pub async fn request_capture(&self) -> Result<()> {
        let status = self.shared.gate.request_both().await;
        if !status.is_granted() {
            warn!(
                capture_granted = status.capture_granted,
                transcription = ?status.transcription,
                "Capture not permitted"
            );
            self.shared.gate.prompter().show_settings_prompt();
            self.shared.emit(SessionEvent::PermissionDenied {
                capture_granted: status.capture_granted,
                transcription_authorized: status.transcription.is_authorized(),
            });
            return Err(SessionError::PermissionDenied {
                capture_granted: status.capture_granted,
                transcription: status.transcription,
            });
        }
        self.start()
    }

    /// Start a fresh attempt, retiring any previous one first.
    pub fn start(&self) -> Result<()> {
        self.shared.run_deferred();
        let mut inner = self.shared.inner.lock();
        Shared::start_locked(&self.shared, &mut inner)
    }

    /// Stop capturing and return to rest. Safe to call in any state.
    pub fn pause(&self) {
        self.shared.run_deferred();
        let mut inner = self.shared.inner.lock();
        self.shared.pause_locked(&mut inner);
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    /// Every state transition, starting with the current state.
    pub fn subscribe_state(&self) -> Subscription<SessionState> {
        self.shared.state.subscribe()
    }

    /// The last published transcript, empty until an attempt succeeds.
    pub fn transcript(&self) -> Transcript {
        self.shared.transcript.get()
    }

    pub fn subscribe_transcript(&self) -> Subscription<Transcript> {
        self.shared.transcript.subscribe()
    }

    /// Failures and outcomes of attempts, from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn permissions(&self) -> &PermissionGate {
        &self.shared.gate
    }

    /// Whether the capture stream currently has a callback installed.
    pub fn is_capturing(&self) -> bool {
        self.shared.inner.lock().stream.is_started()
    }

    /// Id of the live recognition session, if any.
    pub fn live_session_id(&self) -> Option<u64> {
        self.shared.live.lock().as_ref().map(RecognitionSession::id)
    }
}

impl Shared {
    fn start_locked(this: &Arc<Self>, inner: &mut Inner) -> Result<()> {
        // Stop frames before the old session goes away.
        inner.stream.stop();
        this.retire_session();

        inner.generation += 1;
        let generation = inner.generation;
        let weak: Weak<Shared> = Arc::downgrade(this);
        let parked = this.deferred.clone();
        let session = RecognitionSession::create(this.engine.clone(), &this.options, move |outcome| {
            if FEEDING.with(Cell::get) {
                defer_completion(weak, &parked, (generation, outcome));
            } else if let Some(shared) = weak.upgrade() {
                shared.handle_completion(generation, outcome);
            }
        });
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to create recognition session: {}", e);
                if this.state.get() != SessionState::Paused {
                    this.set_state(SessionState::Paused);
                }
                this.emit(SessionEvent::RecognitionFailed(e.to_string()));
                return Err(e.into());
            }
        };
        let session_id = session.id();
        *this.live.lock() = Some(session);
        this.set_state(SessionState::Recording);

        let live = this.live.clone();
        let started = inner.stream.start(move |frame: AudioFrame| {
            FEEDING.with(|feeding| feeding.set(true));
            if let Some(session) = live.lock().as_ref() {
                session.feed(&frame);
            }
            FEEDING.with(|feeding| feeding.set(false));
        });

        match started {
            Ok(format) => {
                info!(
                    session = session_id,
                    generation,
                    sample_rate = format.sample_rate,
                    channels = format.channels,
                    "Recording started"
                );
                Ok(())
            }
            Err(e) => {
                warn!(session = session_id, "Capture failed to start: {}", e);
                this.pause_locked(inner);
                this.emit(SessionEvent::CaptureFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    fn pause_locked(&self, inner: &mut Inner) {
        if self.state.get().is_recording() {
            self.set_state(SessionState::Paused);
        }
        inner.stream.stop();
        self.retire_session();
    }

    fn run_deferred(&self) {
        let deferred = self.deferred.lock().take();
        if let Some((generation, outcome)) = deferred {
            self.handle_completion(generation, outcome);
        }
    }

    fn handle_completion(&self, generation: u64, outcome: voxgate_recognize::Result<String>) {
        let mut inner = self.inner.lock();
        if generation != inner.generation || !self.state.get().is_recording() {
            debug!(
                generation,
                current = inner.generation,
                "Ignoring completion of a superseded attempt"
            );
            return;
        }

        match outcome {
            Ok(text) if !text.trim().is_empty() => {
                info!(chars = text.len(), "Transcript ready");
                self.transcript.set(Transcript::from(text.clone()));
                self.pause_locked(&mut inner);
                self.emit(SessionEvent::TranscriptReady(text));
            }
            Ok(_) => {
                info!("No speech detected");
                self.pause_locked(&mut inner);
                self.emit(SessionEvent::NoSpeechDetected);
            }
            Err(e) => {
                warn!("Recognition failed: {}", e);
                self.pause_locked(&mut inner);
                self.emit(SessionEvent::RecognitionFailed(e.to_string()));
            }
        }
    }

    /// Take the live session out of the frame path, then release it.
    fn retire_session(&self) {
        let retired = self.live.lock().take();
        if let Some(mut session) = retired {
            session.cancel_and_release();
            debug!(session = session.id(), "Recognition session retired");
        }
    }

    fn set_state(&self, state: SessionState) {
        debug!(state = ?state, "State changed");
        self.state.set(state);
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        self.events.send(event).ok();
    }
}

/// Park a completion that arrived on the audio thread and handle it on its
/// own thread, where stopping the stream cannot wait on itself. The audio
/// thread never holds a strong reference, so the controller is never
/// dropped there.
fn defer_completion(weak: Weak<Shared>, parked: &ParkedCompletion, completion: Completion) {
    *parked.lock() = Some(completion);
    let spawned = thread::Builder::new()
        .name("voxgate-completion".to_string())
        .spawn(move || {
            if let Some(shared) = weak.upgrade() {
                shared.run_deferred();
            }
        });
    if let Err(e) = spawned {
        // Picked up by the next start() or pause().
        error!("Failed to spawn completion handler: {}", e);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if self.state.get().is_recording() {
            self.state.set(SessionState::Paused);
        }
        inner.stream.stop();
        if let Some(mut session) = self.live.lock().take() {
            session.cancel_and_release();
        }
        if let Err(e) = inner.stream.hardware_mut().deactivate() {
            warn!("Audio session did not deactivate: {}", e);
        }
        debug!("Session controller dropped");
    }
}

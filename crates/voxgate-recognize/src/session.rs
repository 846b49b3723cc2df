//! One recognition attempt: a request plus its completion task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info};
use voxgate_audio::AudioFrame;

use crate::{RecognitionEngine, RecognitionOptions, RequestHandle, Result, TaskHandle};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Owns a live recognition request and its completion task.
///
/// Resources are reclaimed by [`RecognitionSession::cancel_and_release`],
/// which is idempotent and also runs on drop. Once retired, frames are
/// dropped and a late completion from the engine is swallowed.
pub struct RecognitionSession {
    id: u64,
    engine: Arc<dyn RecognitionEngine>,
    request: Option<RequestHandle>,
    task: Option<TaskHandle>,
    live: Arc<AtomicBool>,
}

impl RecognitionSession {
    /// Create a request on `engine` and submit it. `on_final` runs at most
    /// once, and never after this session has been retired.
    pub fn create<F>(
        engine: Arc<dyn RecognitionEngine>,
        options: &RecognitionOptions,
        on_final: F,
    ) -> Result<Self>
    where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let live = Arc::new(AtomicBool::new(true));

        let request = engine.create_request(options)?;
        let guard = live.clone();
        let task = match engine.submit(
            &request,
            Box::new(move |outcome| {
                if guard.load(Ordering::SeqCst) {
                    on_final(outcome);
                } else {
                    debug!(session = id, "Dropping completion of retired session");
                }
            }),
        ) {
            Ok(task) => task,
            Err(e) => {
                engine.release(request);
                return Err(e);
            }
        };

        info!(session = id, engine = engine.name(), "Recognition session created");
        Ok(Self {
            id,
            engine,
            request: Some(request),
            task: Some(task),
            live,
        })
    }

    /// Append one captured buffer. Dropped once the session is retired.
    pub fn feed(&self, frame: &AudioFrame) {
        if !self.is_live() {
            return;
        }
        if let Some(request) = &self.request {
            self.engine.append(request, frame);
        }
    }

    /// Cancel the in-flight task and release the request.
    pub fn cancel_and_release(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        let task = self.task.take();
        let request = self.request.take();
        if task.is_none() && request.is_none() {
            return;
        }
        if let Some(task) = task {
            self.engine.cancel(&task);
        }
        if let Some(request) = request {
            self.engine.release(request);
        }
        debug!(session = self.id, "Recognition session released");
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.cancel_and_release();
    }
}

impl std::fmt::Debug for RecognitionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionSession")
            .field("id", &self.id)
            .field("engine", &self.engine.name())
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use parking_lot::Mutex;
    use voxgate_audio::InputFormat;

    use super::*;
    use crate::{FinalCallback, RecognitionError};

    #[derive(Default)]
    struct Recorded {
        next: u64,
        appended: HashMap<u64, usize>,
        callbacks: HashMap<u64, FinalCallback>,
        cancelled: Vec<u64>,
        released: Vec<u64>,
    }

    #[derive(Default)]
    struct FakeEngine {
        inner: Mutex<Recorded>,
        reject_submit: bool,
    }

    impl FakeEngine {
        fn complete(&self, task: u64, outcome: Result<String>) {
            let callback = self.inner.lock().callbacks.remove(&task);
            if let Some(callback) = callback {
                callback(outcome);
            }
        }
    }

    impl RecognitionEngine for FakeEngine {
        fn create_request(&self, _options: &RecognitionOptions) -> Result<RequestHandle> {
            let mut inner = self.inner.lock();
            inner.next += 1;
            Ok(RequestHandle::new(inner.next))
        }

        fn submit(&self, request: &RequestHandle, on_final: FinalCallback) -> Result<TaskHandle> {
            if self.reject_submit {
                return Err(RecognitionError::Engine("busy".into()));
            }
            self.inner.lock().callbacks.insert(request.id(), on_final);
            Ok(TaskHandle::new(request.id()))
        }

        fn append(&self, request: &RequestHandle, _frame: &AudioFrame) {
            *self.inner.lock().appended.entry(request.id()).or_default() += 1;
        }

        fn cancel(&self, task: &TaskHandle) {
            self.inner.lock().cancelled.push(task.id());
        }

        fn release(&self, request: RequestHandle) {
            self.inner.lock().released.push(request.id());
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn frame() -> AudioFrame {
        AudioFrame::new(vec![0.0; 160], InputFormat::new(16000, 1))
    }

    #[test]
    fn test_feed_reaches_engine_until_released() {
        let engine = Arc::new(FakeEngine::default());
        let mut session =
            RecognitionSession::create(engine.clone(), &RecognitionOptions::default(), |_| {})
                .unwrap();

        session.feed(&frame());
        session.feed(&frame());
        session.cancel_and_release();
        session.feed(&frame());

        let inner = engine.inner.lock();
        assert_eq!(inner.appended.get(&1), Some(&2));
        assert_eq!(inner.cancelled, vec![1]);
        assert_eq!(inner.released, vec![1]);
    }

    #[test]
    fn test_cancel_and_release_is_idempotent() {
        let engine = Arc::new(FakeEngine::default());
        let mut session =
            RecognitionSession::create(engine.clone(), &RecognitionOptions::default(), |_| {})
                .unwrap();

        session.cancel_and_release();
        session.cancel_and_release();
        drop(session);

        let inner = engine.inner.lock();
        assert_eq!(inner.cancelled.len(), 1);
        assert_eq!(inner.released.len(), 1);
    }

    #[test]
    fn test_completion_after_retirement_is_swallowed() {
        let engine = Arc::new(FakeEngine::default());
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();
        let mut session = RecognitionSession::create(
            engine.clone(),
            &RecognitionOptions::default(),
            move |outcome| sink.lock().push(outcome),
        )
        .unwrap();

        session.cancel_and_release();
        engine.complete(1, Ok("too late".into()));

        assert!(delivered.lock().is_empty());
    }

    #[test]
    fn test_completion_delivered_while_live() {
        let engine = Arc::new(FakeEngine::default());
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();
        let _session = RecognitionSession::create(
            engine.clone(),
            &RecognitionOptions::default(),
            move |outcome| sink.lock().push(outcome),
        )
        .unwrap();

        engine.complete(1, Ok("hello world".into()));

        assert_eq!(*delivered.lock(), vec![Ok("hello world".to_string())]);
    }

    #[test]
    fn test_failed_submit_releases_request() {
        let engine = Arc::new(FakeEngine {
            reject_submit: true,
            ..Default::default()
        });

        let err = RecognitionSession::create(engine.clone(), &RecognitionOptions::default(), |_| {})
            .unwrap_err();

        assert_eq!(err, RecognitionError::Engine("busy".into()));
        assert_eq!(engine.inner.lock().released, vec![1]);
    }
}

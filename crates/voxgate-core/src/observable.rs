//! Replay-latest observable values.
//!
//! An [`Observable`] holds one authoritative value. Subscribers get the
//! current value the moment they subscribe, then every later value in the
//! order it was published. Nothing is coalesced: two quick `set` calls reach
//! every subscriber as two deliveries.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

struct Inner<T> {
    value: T,
    subscribers: Vec<UnboundedSender<T>>,
}

pub struct Observable<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                value,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Replace the value and deliver it to every live subscriber.
    ///
    /// Delivery happens under the same lock that orders writers, so all
    /// subscribers observe the same sequence.
    pub fn set(&self, value: T) {
        let mut inner = self.inner.lock();
        inner.value = value;
        let Inner { value, subscribers } = &mut *inner;
        subscribers.retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// Subscribe to the value. The current value is queued immediately.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        // The receiver is alive, so this cannot fail.
        tx.send(inner.value.clone()).ok();
        inner.subscribers.push(tx);
        Subscription { rx }
    }

    /// Number of subscribers that have not been dropped yet.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Ordered feed of values from an [`Observable`].
pub struct Subscription<T> {
    rx: UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next value. Returns `None` once the observable is gone
    /// and every queued value has been read.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Next queued value, without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Every value queued so far, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

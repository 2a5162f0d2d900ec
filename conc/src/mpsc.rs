//! Multi-producer single-consumer queues.
//!
//! The global state needs a sender that can be used from any thread without being cloned into
//! it first, which `std::sync::mpsc` does not offer. This is a `Mutex<Vec<T>>` underneath; the
//! lock is held for a push or a swap only.

use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;

/// Create a connected sender/receiver pair.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let end = Arc::new(Mutex::new(Vec::new()));

    (Sender { inner: end.clone() }, Receiver { inner: end })
}

/// The sending end.
pub struct Sender<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T> Sender<T> {
    /// Queue an item.
    pub fn send(&self, item: T) {
        self.inner.lock().push(item);
    }
}

/// The receiving end.
pub struct Receiver<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T> Receiver<T> {
    /// Take every queued item, in sending order.
    pub fn recv_all(&self) -> Vec<T> {
        mem::take(&mut *self.inner.lock())
    }
}

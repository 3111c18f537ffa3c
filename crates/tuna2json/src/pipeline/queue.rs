//! Queue — bounded FIFO channels between pipeline stages.
//!
//! Both queues are `tokio::sync::mpsc` channels: a full queue suspends the
//! producer instead of dropping. The work queue has many consumers, so its
//! receiving half is shared behind an async mutex; a worker holds the lock
//! only while waiting for its next item.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Receiving half shared by every worker in the pool.
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> SharedReceiver<T> {
    /// Next item, or `None` once every sender is gone and the queue is empty.
    ///
    /// Dropping the returned future before it resolves releases the lock and
    /// loses no item.
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.inner.lock().await;
        rx.recv().await
    }
}

/// Single-producer/multi-consumer bounded queue.
pub fn bounded<T>(capacity: usize) -> (mpsc::Sender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, SharedReceiver { inner: Arc::new(Mutex::new(rx)) })
}

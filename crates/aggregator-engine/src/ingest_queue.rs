//! IngestQueue (C7). Spec.md §4.7.
//!
//! A bounded FIFO between one adapter and its Pipeline's worker pool, built
//! on `tokio::sync::mpsc`'s bounded channel (the teacher's async stack is
//! tokio throughout; this is the same "single execution context per event
//! from Normalize onward" idiom spec.md §9 calls for, with N workers for
//! parallelism across events).

use aggregator_common::types::RawEvent;
use tokio::sync::mpsc;
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// Queue at capacity — adapter must drop with `queue_full` (spec.md §4.7).
    Full,
    /// Producer side has been closed (shutdown in progress/complete).
    Closed,
}

pub struct IngestQueue {
    capacity: usize,
    sender: mpsc::Sender<RawEvent>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<RawEvent>>,
}

impl IngestQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        IngestQueue {
            capacity,
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Non-blocking enqueue; spec.md "adapters block only up to a trivial
    /// send-timeout, otherwise drop" — exposed here as `try_send` (no
    /// timeout) plus `send_with_timeout` for the bounded-block variant.
    pub fn try_send(&self, event: RawEvent) -> Result<(), EnqueueError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    pub async fn send_with_timeout(
        &self,
        event: RawEvent,
        timeout: Duration,
    ) -> Result<(), EnqueueError> {
        match tokio::time::timeout(timeout, self.sender.send(event)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(EnqueueError::Closed),
            Err(_) => Err(EnqueueError::Full),
        }
    }

    /// Pull the next event, used by a pipeline worker. Returns `None` once
    /// the queue is closed and drained.
    pub async fn recv(&self) -> Option<RawEvent> {
        self.receiver.lock().await.recv().await
    }

    pub fn current_depth_hint(&self) -> usize {
        self.capacity - self.sender.capacity()
    }
}

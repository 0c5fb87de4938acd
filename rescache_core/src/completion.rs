//! Load-completion queue.
//!
//! Payload loaders may finish on worker threads. They never touch resource
//! state directly: each outcome is queued here and applied by
//! [`CompletionQueue::drain`] on the thread driving the update cycle.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

/// A queued state transition.
pub(crate) type Completion = Box<dyn FnOnce() + Send>;

/// Sending half, cloned into every pending load.
#[derive(Clone)]
pub(crate) struct CompletionSender(mpsc::UnboundedSender<Completion>);

impl CompletionSender {
    pub(crate) fn send(&self, completion: Completion) {
        if self.0.send(completion).is_err() {
            debug!("Completion queue closed, dropping load notification");
        }
    }
}

/// Unbounded multi-producer queue consumed on the update thread.
pub(crate) struct CompletionQueue {
    sender: CompletionSender,
    receiver: Mutex<mpsc::UnboundedReceiver<Completion>>,
}

impl CompletionQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: CompletionSender(tx),
            receiver: Mutex::new(rx),
        }
    }

    pub(crate) fn sender(&self) -> CompletionSender {
        self.sender.clone()
    }

    /// Applies every completion queued so far. Completions queued while
    /// draining are left for the next call.
    pub(crate) fn drain(&self) -> usize {
        let batch: Vec<Completion> = {
            let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
            std::iter::from_fn(|| receiver.try_recv().ok()).collect()
        };
        let applied = batch.len();
        for completion in batch {
            completion();
        }
        applied
    }
}

//! The send queue.
//!
//! A single FIFO shared between producers (anything calling
//! [`SendQueue::enqueue`]) and the one scheduler that drains it. The
//! mutation lock is a plain `std::sync::Mutex`; the critical sections here
//! are `VecDeque` pushes/pops, never held across an `.await`. The sleep gate
//! is a `tokio::sync::Notify`, woken on every enqueue so a hibernating
//! scheduler wakes up as soon as there is something to look at.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::types::OutboundMessage;

/// FIFO of outbound messages awaiting the scheduler. Cloning a `SendQueue`
/// handle is not supported — callers share one behind an `Arc`.
#[derive(Default)]
pub struct SendQueue {
    inner: Mutex<VecDeque<OutboundMessage>>,
    notify: Notify,
}

impl SendQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` to the tail of the queue and wakes any scheduler
    /// currently hibernating.
    pub fn enqueue(&self, message: OutboundMessage) {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(message);
        self.notify.notify_one();
    }

    /// Removes and returns the message at the head of the queue, if any.
    pub fn pop_front(&self) -> Option<OutboundMessage> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
    }

    /// Looks at the head of the queue without removing it.
    pub fn peek_front(&self) -> Option<OutboundMessage> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .front()
            .cloned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Resolves once something has been enqueued since the last call (or
    /// immediately, if a notification is already pending). The scheduler
    /// calls this while hibernating with nothing to send.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

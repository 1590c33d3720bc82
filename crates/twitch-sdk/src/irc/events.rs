//! The subscriber-facing event interface.
//!
//! A trait with default no-op methods stands in for a multicast delegate:
//! subscribers implement only the handlers they care about. Dispatch is
//! synchronous and non-async by construction. `&dyn CoreEventHandler` cannot
//! block the pump on I/O, it can only touch memory or hand work off to
//! something else (a channel, a spawned task).

use crate::types::ChatMessage;
use std::collections::HashMap;

/// Subscriber interface for core-level IRC events. Implementors must not
/// block; if a handler needs to do real work it should forward the event to
/// a channel or spawn a task rather than perform it inline.
pub trait CoreEventHandler: Send + Sync {
    fn on_login(&self) {}

    fn on_join_channel(&self, _channel: &str) {}

    fn on_leave_channel(&self, _channel: &str) {}

    fn on_room_state_changed(&self, _channel: Option<&str>, _tags: &HashMap<String, String>) {}

    fn on_message_received(&self, _message: &ChatMessage) {}
}

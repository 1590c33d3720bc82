//! The rate-limit scheduler.
//!
//! One task drains the [`SendQueue`](crate::irc::queue::SendQueue),
//! alternating between `drain` (send everything the rate limit currently
//! allows) and `hibernate` (sleep until the window frees up, new work
//! arrives, or the shutdown token fires). The queue is a single global FIFO,
//! so a channel blocked on its own spacing delay blocks the whole scheduler
//! rather than letting other channels' messages jump ahead.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::queue::SendQueue;
use super::transport::Transport;
use crate::channel_registry::ChannelRegistry;

/// 32 s rather than Twitch's nominal 30 s: the extra 2 s absorbs clock and
/// network skew. Undercutting risks a 30-minute global send ban.
const WINDOW: Duration = Duration::from_secs(32);

/// Drains `queue` onto `transport` under the sliding-window + per-channel
/// spacing rules, until `cancel` fires. Owns all scheduler state itself —
/// nothing outside this loop ever reads or writes `send_timestamps` or
/// `last_send_per_channel`.
pub struct Scheduler {
    queue: std::sync::Arc<SendQueue>,
    transport: std::sync::Arc<dyn Transport>,
    channel_registry: std::sync::Arc<dyn ChannelRegistry>,
    cancel: CancellationToken,
    send_timestamps: VecDeque<Instant>,
    last_send_per_channel: HashMap<String, Instant>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        queue: std::sync::Arc<SendQueue>,
        transport: std::sync::Arc<dyn Transport>,
        channel_registry: std::sync::Arc<dyn ChannelRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            transport,
            channel_registry,
            cancel,
            send_timestamps: VecDeque::new(),
            last_send_per_channel: HashMap::new(),
        }
    }

    /// Runs the drain/hibernate loop until cancelled. Returns once `cancel`
    /// fires; any send already handed to the transport runs to completion or
    /// propagates its own error independently of this return.
    pub async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            self.drain().await;

            if self.cancel.is_cancelled() {
                return;
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                () = self.hibernate() => {}
            }
        }
    }

    /// Sends everything the queue currently allows, respecting the sliding
    /// window and per-channel spacing, until the queue empties or the
    /// window/spacing forces a stop.
    async fn drain(&mut self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            let Some(head) = self.queue.peek_front() else {
                return;
            };

            let class = self.channel_registry.rate_limit_class(&head.channel_id);
            self.trim_window();

            if self.send_timestamps.len() >= class.bound() {
                return;
            }

            let now = Instant::now();
            if let Some(&last) = self.last_send_per_channel.get(&head.channel_id) {
                let earliest = last + class.min_spacing();
                if earliest > now {
                    let shortfall = earliest - now;
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return,
                        () = tokio::time::sleep(shortfall) => {}
                    }
                }
            }

            let Some(message) = self.queue.pop_front() else {
                // Another consumer cannot exist (single scheduler), but the
                // queue could have been drained by a racing peek/pop pair in
                // a future multi-consumer design; treat as "nothing to do".
                return;
            };

            let now = Instant::now();
            debug!(">> sending: {}", message.wire_line);
            if let Err(e) = self.transport.send_instant(message.wire_line).await {
                warn!("dropped outbound message for {}: {:?}", message.channel_id, e);
                continue;
            }

            self.send_timestamps.push_back(now);
            self.last_send_per_channel.insert(message.channel_id, now);
        }
    }

    /// Waits until the window frees capacity, new work arrives, or shutdown
    /// fires — whichever comes first. If the queue is empty there is no
    /// window to wait on: block on the queue's notify alone.
    async fn hibernate(&mut self) {
        self.trim_window();

        let Some(head) = self.queue.peek_front() else {
            self.queue.notified().await;
            return;
        };

        let bound = self.channel_registry.rate_limit_class(&head.channel_id).bound();
        match self.ticks_till_reset(bound) {
            Some(delay) => {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = self.queue.notified() => {}
                }
            }
            // Below bound already — drain() will immediately re-check
            // spacing on the next loop rather than sleep here.
            None => {}
        }
    }

    /// Time until the oldest send still counted against `bound` falls
    /// outside the window, i.e. until capacity frees up — `None` if already
    /// below `bound`.
    fn ticks_till_reset(&self, bound: usize) -> Option<Duration> {
        if self.send_timestamps.len() < bound {
            return None;
        }
        let idx = self.send_timestamps.len() - bound;
        let oldest_in_play = self.send_timestamps[idx];
        let reset_at = oldest_in_play + WINDOW;
        let now = Instant::now();
        if reset_at > now {
            Some(reset_at - now)
        } else {
            None
        }
    }

    fn trim_window(&mut self) {
        let cutoff = Instant::now()
            .checked_sub(WINDOW)
            .unwrap_or_else(Instant::now);
        while matches!(self.send_timestamps.front(), Some(&t) if t < cutoff) {
            self.send_timestamps.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutboundMessage, RateLimitClass};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    struct AllNormalRegistry;

    #[async_trait]
    impl ChannelRegistry for AllNormalRegistry {
        fn get_all_active_login_names(&self) -> Vec<String> {
            vec![]
        }

        fn rate_limit_class(&self, _channel: &str) -> RateLimitClass {
            RateLimitClass::Normal
        }

        async fn next_update(&self) -> Option<crate::channel_registry::ChannelsUpdated> {
            None
        }
    }

    struct RecordingTransport {
        sent: StdMutex<Vec<String>>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn connect(&self, _url: &str) -> anyhow::Result<tokio::sync::mpsc::Receiver<String>> {
            unimplemented!("scheduler tests do not exercise connect")
        }

        async fn disconnect(&self, _reason: &str) {}

        fn send(&self, line: String) {
            self.sent.lock().unwrap().push(line);
        }

        async fn send_instant(&self, line: String) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(line);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_21_normal_sends_ships_20_then_waits_for_the_window() {
        let queue = Arc::new(SendQueue::new());
        for i in 0..21 {
            queue.enqueue(OutboundMessage::new("chan", format!("PRIVMSG #chan :{i}")));
        }

        let transport = Arc::new(RecordingTransport::new());
        let registry = Arc::new(AllNormalRegistry);
        let cancel = CancellationToken::new();

        let scheduler = Scheduler::new(
            queue.clone(),
            transport.clone() as Arc<dyn Transport>,
            registry as Arc<dyn ChannelRegistry>,
            cancel.clone(),
        );

        let handle = tokio::spawn(scheduler.run());

        // Advance past the per-channel spacing needed to ship the first 20
        // (19 gaps of 1.25s ≈ 23.75s) but short of the 32s window reset.
        tokio::time::advance(Duration::from_millis(23_800)).await;
        tokio::task::yield_now().await;
        assert_eq!(transport.sent.lock().unwrap().len(), 20);

        // Advance to the window boundary; the 21st should now ship.
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(transport.sent.lock().unwrap().len(), 21);

        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_is_respected_between_same_channel_sends() {
        let queue = Arc::new(SendQueue::new());
        queue.enqueue(OutboundMessage::new("chan", "PRIVMSG #chan :1".to_string()));
        queue.enqueue(OutboundMessage::new("chan", "PRIVMSG #chan :2".to_string()));

        let transport = Arc::new(RecordingTransport::new());
        let registry = Arc::new(AllNormalRegistry);
        let cancel = CancellationToken::new();

        let scheduler = Scheduler::new(
            queue,
            transport.clone() as Arc<dyn Transport>,
            registry as Arc<dyn ChannelRegistry>,
            cancel.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        tokio::task::yield_now().await;
        assert_eq!(transport.sent.lock().unwrap().len(), 1);

        tokio::time::advance(Duration::from_millis(1_249)).await;
        tokio::task::yield_now().await;
        assert_eq!(transport.sent.lock().unwrap().len(), 1);

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(transport.sent.lock().unwrap().len(), 2);

        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_without_further_sends() {
        let queue = Arc::new(SendQueue::new());
        let transport = Arc::new(RecordingTransport::new());
        let registry = Arc::new(AllNormalRegistry);
        let cancel = CancellationToken::new();

        let scheduler = Scheduler::new(
            queue.clone(),
            transport.clone() as Arc<dyn Transport>,
            registry as Arc<dyn ChannelRegistry>,
            cancel.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should exit promptly on cancellation")
            .unwrap();

        queue.enqueue(OutboundMessage::new("chan", "PRIVMSG #chan :late".to_string()));
        assert!(transport.sent.lock().unwrap().is_empty());
    }
}

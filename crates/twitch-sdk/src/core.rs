//! The service facade, `ChatCore`. Owns the wiring between the transport,
//! the auth provider, and the channel registry, and the lifecycle of the
//! receive pump and rate-limit scheduler.

use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::auth::AuthProvider;
use crate::channel_registry::ChannelRegistry;
use crate::error::CoreError;
use crate::irc::events::CoreEventHandler;
use crate::irc::pump;
use crate::irc::queue::SendQueue;
use crate::irc::scheduler::Scheduler;
use crate::irc::transport::Transport;
use crate::types::OutboundMessage;

/// Handshake constants; the exact capability list and ordering Twitch's IRC
/// gateway expects.
const TAGS_CAP: &str = "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership";

struct RunningScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct RunningRegistryWatch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns one IRC session's worth of state. Call [`ChatCore::start`] once;
/// [`ChatCore::stop`] tears everything — pump, scheduler, transport — down
/// and leaves the core ready to `start` again.
pub struct ChatCore {
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthProvider>,
    channel_registry: Arc<dyn ChannelRegistry>,
    subscribers: ArcSwap<Vec<Arc<dyn CoreEventHandler>>>,
    queue: Arc<SendQueue>,
    url: String,
    pump_handle: Mutex<Option<JoinHandle<()>>>,
    scheduler: Arc<Mutex<Option<RunningScheduler>>>,
    registry_watch: Arc<Mutex<Option<RunningRegistryWatch>>>,
    /// Cancelled by `stop` so a `start` racing a concurrent `stop` aborts
    /// instead of finishing a handshake into a session that is already
    /// being torn down. Replaced with a fresh token at the start of every
    /// `start` call.
    start_cancel: Mutex<CancellationToken>,
}

impl ChatCore {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthProvider>,
        channel_registry: Arc<dyn ChannelRegistry>,
    ) -> Self {
        Self {
            transport,
            auth,
            channel_registry,
            subscribers: ArcSwap::from_pointee(Vec::new()),
            queue: Arc::new(SendQueue::new()),
            url: crate::irc::transport::TWITCH_WS_URL.to_string(),
            pump_handle: Mutex::new(None),
            scheduler: Arc::new(Mutex::new(None)),
            registry_watch: Arc::new(Mutex::new(None)),
            start_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Registers an event subscriber. Subscribers can be added at any time;
    /// they take effect for events dispatched after this call returns.
    pub fn subscribe(&self, handler: Arc<dyn CoreEventHandler>) {
        self.subscribers.rcu(|current| {
            let mut next = (**current).clone();
            next.push(handler.clone());
            next
        });
    }

    /// Queues `wire_line` to be sent to `channel` under the rate limit. Does
    /// not require the scheduler to already be running — the message simply
    /// waits in the queue until one is.
    pub fn send_chat(&self, channel: impl Into<String>, wire_line: impl Into<String>) {
        self.queue
            .enqueue(OutboundMessage::new(channel, wire_line));
    }

    /// Validates tokens (refreshing if needed), connects the transport, and
    /// performs the Twitch handshake. The scheduler is not started here; it
    /// starts when the pump observes end-of-MOTD (`376`).
    pub async fn start(&self) -> std::result::Result<(), CoreError> {
        let cancel = CancellationToken::new();
        *self.start_cancel.lock().await = cancel.clone();

        if !self.auth.token_is_valid().await {
            self.auth
                .refresh_tokens()
                .await
                .map_err(|e| CoreError::Auth(e.to_string()))?;
        }

        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| CoreError::Auth(e.to_string()))?;
        let nick = self.auth.logged_in_user().unwrap_or_else(|| ".".to_string());

        let frames = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CoreError::Cancelled),
            result = self.transport.connect(&self.url) => {
                result.context("transport connect failed")?
            }
        };

        self.transport.send(TAGS_CAP.to_string());
        self.transport.send(format!("PASS {token}"));
        self.transport.send(format!("NICK {nick}"));

        let transport = self.transport.clone();
        let channel_registry = self.channel_registry.clone();
        let subscribers = self.subscribers.clone();
        let queue = self.queue.clone();
        let scheduler_slot = self.scheduler.clone();
        let registry_watch_slot = self.registry_watch.clone();

        let handle = tokio::spawn(async move {
            let subs: Vec<Arc<dyn CoreEventHandler>> = (**subscribers.load()).clone();
            let on_scheduler_start = {
                let transport = transport.clone();
                let channel_registry = channel_registry.clone();
                let queue = queue.clone();
                let scheduler_slot = scheduler_slot.clone();
                move || {
                    let transport = transport.clone();
                    let channel_registry = channel_registry.clone();
                    let queue = queue.clone();
                    let scheduler_slot = scheduler_slot.clone();
                    tokio::spawn(async move {
                        // A duplicate `376` must not leave the previous
                        // scheduler draining alongside a new one — two
                        // schedulers with independent `send_timestamps`
                        // would each allow up to `bound` sends, blowing
                        // past the per-window cap the spec guards against.
                        if let Some(previous) = scheduler_slot.lock().await.take() {
                            previous.cancel.cancel();
                        }

                        let cancel = CancellationToken::new();
                        let scheduler =
                            Scheduler::new(queue, transport, channel_registry, cancel.clone());
                        let handle = tokio::spawn(scheduler.run());
                        *scheduler_slot.lock().await = Some(RunningScheduler { cancel, handle });
                    });
                }
            };

            pump::run(
                frames,
                transport.as_ref(),
                channel_registry.as_ref(),
                &subs,
                &on_scheduler_start,
            )
            .await;

            info!("receive pump exited; disconnect observed, tearing down scheduler");

            // The transport frame channel closing means the connection
            // dropped out from under us — §4.6: "On disconnected: cancel
            // scheduler." Its state is discarded; a fresh scheduler starts
            // at the next end-of-MOTD if the caller reconnects and restarts.
            if let Some(running) = scheduler_slot.lock().await.take() {
                running.cancel.cancel();
            }
            if let Some(watch) = registry_watch_slot.lock().await.take() {
                watch.cancel.cancel();
            }
        });

        *self.pump_handle.lock().await = Some(handle);

        let registry_cancel = CancellationToken::new();
        let registry_handle = tokio::spawn(watch_channel_registry(
            self.channel_registry.clone(),
            self.transport.clone(),
            registry_cancel.clone(),
        ));
        *self.registry_watch.lock().await = Some(RunningRegistryWatch {
            cancel: registry_cancel,
            handle: registry_handle,
        });

        Ok(())
    }

    /// Cancels the running scheduler (if any) and disconnects the transport.
    /// Safe to call even if `start` failed partway through, and safe to call
    /// concurrently with an in-flight `start` — the in-flight call observes
    /// `start_cancel` and aborts with [`CoreError::Cancelled`] instead of
    /// completing a handshake into a session already being torn down.
    pub async fn stop(&self, reason: &str) {
        self.start_cancel.lock().await.cancel();

        if let Some(running) = self.scheduler.lock().await.take() {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                error!("scheduler task panicked: {e:?}");
            }
        }

        if let Some(watch) = self.registry_watch.lock().await.take() {
            watch.cancel.cancel();
            if let Err(e) = watch.handle.await {
                error!("channel-registry watch task panicked: {e:?}");
            }
        }

        self.transport.disconnect(reason).await;

        if let Some(handle) = self.pump_handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

/// Watches the channel registry for enabled/disabled changes while the core
/// is active and issues `JOIN`/`PART` lines directly to the transport.
/// These are control frames, not chat, so they bypass the rate-limit
/// scheduler entirely.
async fn watch_channel_registry(
    channel_registry: Arc<dyn ChannelRegistry>,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
) {
    loop {
        let update = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            update = channel_registry.next_update() => update,
        };

        let Some(update) = update else {
            info!("channel registry will not produce further updates; watch task exiting");
            return;
        };

        for channel in update.enabled {
            transport.send(format!("JOIN #{channel}"));
        }
        for channel in update.disabled {
            transport.send(format!("PART #{channel}"));
        }
    }
}

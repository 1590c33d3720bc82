//! The receive pump.
//!
//! Consumes raw frames from the transport, splits them at CR/LF, feeds each
//! non-empty line through the parser and dispatcher, and executes the
//! resulting [`DispatchOutcome`]: writes control lines back to the
//! transport, delivers events to subscribers synchronously, and tells the
//! facade when the scheduler should start. This is the one place parser
//! output and dispatcher decisions actually touch the outside world.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::dispatcher::dispatch;
use super::events::CoreEventHandler;
use super::transport::Transport;
use crate::channel_registry::ChannelRegistry;
use crate::types::CoreEvent;

/// Runs until `frames` closes. Returns `true` if it ever observed a
/// `376` (end-of-MOTD) line — the facade uses this to decide whether to
/// start the scheduler after the pump exits, for the (rare) case where the
/// connection drops mid-handshake before login ever completed.
pub async fn run(
    mut frames: mpsc::Receiver<String>,
    transport: &dyn Transport,
    channel_registry: &dyn ChannelRegistry,
    subscribers: &[Arc<dyn CoreEventHandler>],
    on_scheduler_start: &dyn Fn(),
) {
    while let Some(frame) = frames.recv().await {
        for line in frame.split(['\r', '\n']).filter(|l| !l.is_empty()) {
            handle_line(
                line,
                transport,
                channel_registry,
                subscribers,
                on_scheduler_start,
            );
        }
    }
    debug!("receive pump: frame channel closed");
}

fn handle_line(
    line: &str,
    transport: &dyn Transport,
    channel_registry: &dyn ChannelRegistry,
    subscribers: &[Arc<dyn CoreEventHandler>],
    on_scheduler_start: &dyn Fn(),
) {
    let parsed = match super::parser::parse_line(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("dropping unparseable line {line:?}: {e}");
            return;
        }
    };

    let outcome = dispatch(&parsed, channel_registry);

    for control_line in outcome.control_lines {
        transport.send(control_line);
    }

    for event in outcome.events {
        deliver(&event, subscribers);
    }

    if outcome.start_scheduler {
        on_scheduler_start();
    }
}

fn deliver(event: &CoreEvent, subscribers: &[Arc<dyn CoreEventHandler>]) {
    for subscriber in subscribers {
        match event {
            CoreEvent::Login => subscriber.on_login(),
            CoreEvent::JoinChannel { channel } => subscriber.on_join_channel(channel),
            CoreEvent::LeaveChannel { channel } => subscriber.on_leave_channel(channel),
            CoreEvent::RoomStateChanged { channel, tags } => {
                subscriber.on_room_state_changed(channel.as_deref(), tags);
            }
            CoreEvent::MessageReceived(message) => subscriber.on_message_received(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_registry::InMemoryChannelRegistry;
    use crate::types::RateLimitClass;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingTransport {
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn connect(&self, _url: &str) -> anyhow::Result<mpsc::Receiver<String>> {
            unimplemented!()
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

    #[derive(Default)]
    struct CountingHandler {
        logins: AtomicUsize,
        messages: AtomicUsize,
    }

    impl CoreEventHandler for CountingHandler {
        fn on_login(&self) {
            self.logins.fetch_add(1, Ordering::SeqCst);
        }
        fn on_message_received(&self, _message: &crate::types::ChatMessage) {
            self.messages.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn ping_gets_a_pong_written_back_through_transport() {
        let (tx, rx) = mpsc::channel(4);
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(vec![]),
        });
        let registry = Arc::new(InMemoryChannelRegistry::new(vec![]));
        let handler: Arc<dyn CoreEventHandler> = Arc::new(CountingHandler::default());
        let subscribers = vec![handler];

        tx.send("PING :tmi.twitch.tv\r\n".to_string()).await.unwrap();
        drop(tx);

        run(
            rx,
            transport.as_ref(),
            registry.as_ref(),
            &subscribers,
            &|| {},
        )
        .await;

        assert_eq!(*transport.sent.lock().unwrap(), vec!["PONG :tmi.twitch.tv"]);
    }

    #[tokio::test]
    async fn end_of_motd_fires_login_and_starts_scheduler() {
        let (tx, rx) = mpsc::channel(4);
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(vec![]),
        });
        let registry = Arc::new(InMemoryChannelRegistry::new(vec!["foo".to_string()]));
        let handler = Arc::new(CountingHandler::default());
        let subscribers: Vec<Arc<dyn CoreEventHandler>> = vec![handler.clone()];
        let scheduler_started = AtomicUsize::new(0);

        tx.send(":tmi.twitch.tv 376 bot :>".to_string())
            .await
            .unwrap();
        drop(tx);

        run(rx, transport.as_ref(), registry.as_ref(), &subscribers, &|| {
            scheduler_started.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert_eq!(handler.logins.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler_started.load(Ordering::SeqCst), 1);
        assert_eq!(*transport.sent.lock().unwrap(), vec!["JOIN #foo"]);
        let _ = RateLimitClass::Normal;
    }

    #[tokio::test]
    async fn one_frame_can_carry_multiple_lines() {
        let (tx, rx) = mpsc::channel(4);
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(vec![]),
        });
        let registry = Arc::new(InMemoryChannelRegistry::new(vec![]));
        let handler = Arc::new(CountingHandler::default());
        let subscribers: Vec<Arc<dyn CoreEventHandler>> = vec![handler.clone()];

        let raw = ":t!t@t.tmi.twitch.tv PRIVMSG #c :hi\r\n:t!t@t.tmi.twitch.tv PRIVMSG #c :again\r\n";
        tx.send(raw.to_string()).await.unwrap();
        drop(tx);

        run(
            rx,
            transport.as_ref(),
            registry.as_ref(),
            &subscribers,
            &|| {},
        )
        .await;

        assert_eq!(handler.messages.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unparseable_lines_are_skipped_without_panicking() {
        let (tx, rx) = mpsc::channel(4);
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(vec![]),
        });
        let registry = Arc::new(InMemoryChannelRegistry::new(vec![]));
        let subscribers: Vec<Arc<dyn CoreEventHandler>> = vec![];

        tx.send("\r\n".to_string()).await.unwrap();
        tx.send("PING :ok".to_string()).await.unwrap();
        drop(tx);

        run(
            rx,
            transport.as_ref(),
            registry.as_ref(),
            &subscribers,
            &|| {},
        )
        .await;

        assert_eq!(*transport.sent.lock().unwrap(), vec!["PONG :ok"]);
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    domain::{models::Event, models::EventKind, sender::Sender},
    infra::consumer::router::traits::Handler,
};

/// Dispatches chat commands (`EventKind::Command`) to their replies. Only
/// wired up for `Route::Command` events, so `event.kind` is always a
/// `Command` variant here in practice.
#[non_exhaustive]
pub struct CommandHandler {
    sender: Arc<dyn Sender>,
}

impl CommandHandler {
    pub fn new(sender: Arc<dyn Sender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Handler for CommandHandler {
    async fn handle(&self, event: Event) -> anyhow::Result<()> {
        let EventKind::Command { name, args } = &event.kind else {
            debug!("command handler received a non-command event, ignoring");
            return Ok(());
        };

        let Some(channel) = event.ctx.channel.as_deref() else {
            warn!("command !{name} had no channel to reply on");
            return Ok(());
        };

        match name.as_str() {
            "ping" => self.sender.send(channel, "pong").await,
            "so" | "shoutout" => match args.first() {
                Some(target) => {
                    self.sender
                        .send(channel, &format!("Go check out {target}!"))
                        .await
                }
                None => self.sender.send(channel, "usage: !so <user>").await,
            },
            other => {
                debug!("unknown command: !{other} {args:?}");
                Ok(())
            }
        }
    }
}

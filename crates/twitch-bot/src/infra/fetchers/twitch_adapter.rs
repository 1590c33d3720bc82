use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use twitch_sdk::{
    ChatCore, ChatMessage, CoreEventHandler, InMemoryChannelRegistry, TokenManager,
    WebSocketTransport,
};

use crate::domain::{
    fetcher::EventFetcher,
    models::{Event, EventContext, EventKind, Platform, Role, User},
    sender::Sender,
};
use crate::infra::Config;

/// Adapts [`ChatCore`] (the SDK's IRC runtime) to this bot's own
/// [`EventFetcher`]/[`Sender`] traits. Inbound chat is forwarded from the
/// core's subscriber callback onto an mpsc channel; outbound replies go back
/// through [`ChatCore::send_chat`].
#[non_exhaustive]
pub struct TwitchFetcher {
    core: Arc<ChatCore>,
    cancel_token: CancellationToken,
}

impl TwitchFetcher {
    pub async fn new(config: &Config) -> Result<Self> {
        Self::with_cancel_token(config, CancellationToken::new()).await
    }

    pub async fn with_cancel_token(
        config: &Config,
        cancel_token: CancellationToken,
    ) -> Result<Self> {
        let client_id = config.require("TWITCH_CLIENT_ID")?.to_string();
        let client_secret = config.require("TWITCH_CLIENT_SECRET")?.to_string();
        let refresh_token = config.require("TWITCH_REFRESH_TOKEN")?.to_string();
        let nick = config.require("TWITCH_NICK")?.to_string();
        let channels = config
            .require("TWITCH_CHANNELS")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let token_manager =
            Arc::new(TokenManager::new(client_id, client_secret, refresh_token).with_login(nick));
        let _bg_handle = token_manager.clone().start_background_loop();

        let core = Arc::new(ChatCore::new(
            Arc::new(WebSocketTransport::new()),
            token_manager,
            Arc::new(InMemoryChannelRegistry::new(channels)),
        ));

        Ok(Self { core, cancel_token })
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// A [`Sender`] that replies through this fetcher's underlying
    /// [`ChatCore`]. Hand this to whichever handlers need to talk back.
    #[must_use]
    pub fn sender(&self) -> Arc<dyn Sender> {
        Arc::new(TwitchSender {
            core: self.core.clone(),
        })
    }

    async fn shutdown(&self) {
        self.cancel_token.cancel();
        self.core.stop("shutting down").await;
    }
}

impl Drop for TwitchFetcher {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[async_trait]
impl EventFetcher for TwitchFetcher {
    async fn fetch(&self) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(100);
        self.core.subscribe(Arc::new(ForwardingHandler { tx }));

        if let Err(e) = self.core.start().await {
            debug!("twitch connect failed: {e:?}");
        }

        let cancel = self.cancel_token.clone();
        let core = self.core.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            core.stop("shutdown requested").await;
        });

        rx
    }
}

struct TwitchSender {
    core: Arc<ChatCore>,
}

#[async_trait]
impl Sender for TwitchSender {
    async fn send(&self, channel_id: &str, message: &str) -> Result<()> {
        self.core
            .send_chat(channel_id, format!("PRIVMSG #{channel_id} :{message}"));
        Ok(())
    }
}

/// Forwards core events onto the bot's own `Event` channel. Must not block —
/// `try_send` drops rather than stall the receive pump if the consumer falls
/// behind.
struct ForwardingHandler {
    tx: mpsc::Sender<Event>,
}

impl CoreEventHandler for ForwardingHandler {
    fn on_login(&self) {
        self.forward(system_event("logged in to twitch chat"));
    }

    fn on_join_channel(&self, channel: &str) {
        self.forward(system_event(&format!("joined #{channel}")));
    }

    fn on_leave_channel(&self, channel: &str) {
        self.forward(system_event(&format!("left #{channel}")));
    }

    fn on_message_received(&self, message: &ChatMessage) {
        self.forward(chat_event(message));
    }
}

impl ForwardingHandler {
    fn forward(&self, event: Event) {
        if let Err(e) = self.tx.try_send(event) {
            debug!("dropping core event, consumer is behind: {e}");
        }
    }
}

fn system_event(message: &str) -> Event {
    Event {
        ctx: EventContext {
            user: User::system(),
            channel: None,
        },
        kind: EventKind::System {
            message: message.to_string(),
        },
    }
}

fn chat_event(message: &ChatMessage) -> Event {
    let channel = message
        .channel
        .as_deref()
        .map(|c| c.trim_start_matches('#').to_string());
    let text = message.trailing.clone().unwrap_or_default();

    Event {
        ctx: EventContext {
            user: user_from_tags(message),
            channel,
        },
        kind: text.as_str().into(),
    }
}

fn user_from_tags(message: &ChatMessage) -> User {
    let display_name = message
        .tags
        .get("display-name")
        .cloned()
        .unwrap_or_else(|| display_name_from_prefix(message.prefix.as_deref()));

    User {
        id: message.tags.get("user-id").cloned().unwrap_or_default(),
        display_name,
        platform: Platform::Twitch,
        role: role_from_tags(message),
    }
}

fn display_name_from_prefix(prefix: Option<&str>) -> String {
    prefix
        .and_then(|p| p.split('!').next())
        .unwrap_or("unknown")
        .to_string()
}

/// Twitch encodes role via the `badges` tag (comma-separated `name/version`
/// pairs) and, redundantly, a boolean `mod` tag.
fn role_from_tags(message: &ChatMessage) -> Role {
    let badges = message.tags.get("badges").map(String::as_str).unwrap_or("");
    let is_mod = message.tags.get("mod").map(String::as_str) == Some("1");

    if badges.contains("broadcaster/") {
        Role::BROADCASTER
    } else if is_mod || badges.contains("moderator/") {
        Role::MODERATOR
    } else if badges.contains("vip/") {
        Role::VIP
    } else if badges.contains("subscriber/") || badges.contains("founder/") {
        Role::SUBSCRIBER
    } else {
        Role::PLEB
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tagged(tags: &[(&str, &str)]) -> ChatMessage {
        let tags = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        ChatMessage {
            channel: Some("#somechan".to_string()),
            prefix: Some("realeris!realeris@realeris.tmi.twitch.tv".to_string()),
            command: "PRIVMSG".to_string(),
            tags,
            trailing: Some("hello".to_string()),
        }
    }

    #[test]
    fn broadcaster_badge_outranks_moderator_tag() {
        let msg = tagged(&[("badges", "broadcaster/1"), ("mod", "0")]);
        assert_eq!(role_from_tags(&msg), Role::BROADCASTER);
    }

    #[test]
    fn mod_tag_is_honored_without_a_moderator_badge() {
        let msg = tagged(&[("mod", "1")]);
        assert_eq!(role_from_tags(&msg), Role::MODERATOR);
    }

    #[test]
    fn subscriber_badge_is_recognized() {
        let msg = tagged(&[("badges", "subscriber/12")]);
        assert_eq!(role_from_tags(&msg), Role::SUBSCRIBER);
    }

    #[test]
    fn no_badges_is_a_pleb() {
        let msg = tagged(&[]);
        assert_eq!(role_from_tags(&msg), Role::PLEB);
    }

    #[test]
    fn display_name_tag_wins_over_prefix() {
        let msg = tagged(&[("display-name", "RealEris")]);
        assert_eq!(user_from_tags(&msg).display_name, "RealEris");
    }

    #[test]
    fn prefix_nick_used_when_display_name_tag_absent() {
        let msg = tagged(&[]);
        assert_eq!(user_from_tags(&msg).display_name, "realeris");
    }

    #[test]
    fn chat_event_strips_leading_hash_from_channel() {
        let msg = tagged(&[]);
        let event = chat_event(&msg);
        assert_eq!(event.ctx.channel.as_deref(), Some("somechan"));
    }
}

use std::collections::HashMap;
use std::time::Duration;

/// IRCv3 message tags, keyed by tag name. Insertion order is not meaningful.
pub type Tags = HashMap<String, String>;

/// The output of the line parser. Produced per line, consumed
/// synchronously by the dispatcher, never retained past that call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub tags: Option<Tags>,
    pub prefix: Option<String>,
    pub command: String,
    pub channel: Option<String>,
    pub trailing: Option<String>,
}

/// A queued outbound line bound for a specific channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel_id: String,
    pub wire_line: String,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(channel_id: impl Into<String>, wire_line: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            wire_line: wire_line.into(),
        }
    }
}

/// Twitch's two send-rate classes. `Relaxed` applies when the sender is the
/// target channel's owner or a moderator in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitClass {
    Normal,
    Relaxed,
}

impl RateLimitClass {
    /// Sends allowed per rolling window for this class.
    #[must_use]
    pub fn bound(self) -> usize {
        match self {
            RateLimitClass::Normal => 20,
            RateLimitClass::Relaxed => 100,
        }
    }

    /// Minimum spacing between two sends to the same channel.
    #[must_use]
    pub fn min_spacing(self) -> Duration {
        match self {
            RateLimitClass::Normal => Duration::from_millis(1250),
            RateLimitClass::Relaxed => Duration::from_millis(50),
        }
    }
}

/// A single interpreted chat-ish line: `PRIVMSG`/`USERNOTICE` as delivered to
/// `CoreEventHandler::on_message_received`. Deliberately thin — tag
/// interpretation (roles, display names, badges) is a consumer concern, not
/// the core's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub channel: Option<String>,
    pub prefix: Option<String>,
    pub command: String,
    pub tags: Tags,
    pub trailing: Option<String>,
}

/// Events the core exposes to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    Login,
    JoinChannel { channel: String },
    LeaveChannel { channel: String },
    RoomStateChanged { channel: Option<String>, tags: Tags },
    MessageReceived(ChatMessage),
}

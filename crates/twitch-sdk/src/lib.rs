//! A Twitch-flavoured IRC client runtime: an IRCv3 line parser, a command
//! dispatcher, and a rate-limited outbound scheduler, wired together by
//! [`ChatCore`] (the service facade). The transport, auth, and channel
//! registry collaborators are consumed as traits (see [`irc::transport`],
//! [`auth`], [`channel_registry`]); each ships one concrete, swappable
//! implementation so the crate is usable out of the box.

pub mod auth;
pub mod channel_registry;
pub mod core;
pub mod error;
pub mod irc;
pub mod types;

pub use auth::{AuthProvider, TokenManager};
pub use channel_registry::{ChannelRegistry, ChannelsUpdated, InMemoryChannelRegistry};
pub use core::ChatCore;
pub use error::{CoreError, ParseError};
pub use irc::{dispatch, CoreEventHandler, DispatchOutcome, Transport, WebSocketTransport};
pub use types::{ChatMessage, CoreEvent, OutboundMessage, ParsedLine, RateLimitClass, Tags};

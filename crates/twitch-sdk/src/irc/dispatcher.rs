//! The dispatcher.
//!
//! `dispatch` is a pure function: given a parsed line and read-only access to
//! the channel registry, it decides what *should* happen and returns that
//! decision as a [`DispatchOutcome`] value. It never touches the network —
//! the receive pump is the one that sends `control_lines` and
//! invokes subscriber callbacks for `events`. This keeps the routing table
//! itself unit-testable without a transport in the loop, while still letting
//! the pump honor the "dispatcher reacts to `376` by joining channels"
//! requirement.

use crate::channel_registry::ChannelRegistry;
use crate::types::{ChatMessage, CoreEvent, ParsedLine};

/// What the receive pump should do in response to one parsed line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Raw IRC lines the pump should write back to the transport, in order.
    pub control_lines: Vec<String>,
    /// Events the pump should deliver to subscribers, in order.
    pub events: Vec<CoreEvent>,
    /// Whether the rate-limit scheduler should be started as a result of
    /// this line (true exactly once, on receipt of `376`).
    pub start_scheduler: bool,
}

impl DispatchOutcome {
    fn control(line: impl Into<String>) -> Self {
        Self {
            control_lines: vec![line.into()],
            ..Default::default()
        }
    }

    fn event(event: CoreEvent) -> Self {
        Self {
            events: vec![event],
            ..Default::default()
        }
    }

    fn noop() -> Self {
        Self::default()
    }
}

/// Routes one parsed line to the outcome it should produce. `channel_registry`
/// supplies the active login names joined on end-of-MOTD (`376`).
pub fn dispatch(line: &ParsedLine, channel_registry: &dyn ChannelRegistry) -> DispatchOutcome {
    match line.command.as_str() {
        "PING" => {
            let target = line.trailing.as_deref().unwrap_or("tmi.twitch.tv");
            DispatchOutcome::control(format!("PONG :{target}"))
        }

        "376" => {
            let joins = channel_registry
                .get_all_active_login_names()
                .into_iter()
                .map(|name| format!("JOIN #{name}"));
            DispatchOutcome {
                control_lines: joins.collect(),
                events: vec![CoreEvent::Login],
                start_scheduler: true,
            }
        }

        "JOIN" => match channel_name(line) {
            Some(channel) => DispatchOutcome::event(CoreEvent::JoinChannel { channel }),
            None => DispatchOutcome::noop(),
        },

        "PART" => match channel_name(line) {
            Some(channel) => DispatchOutcome::event(CoreEvent::LeaveChannel { channel }),
            None => DispatchOutcome::noop(),
        },

        "PRIVMSG" | "USERNOTICE" => DispatchOutcome::event(CoreEvent::MessageReceived(
            ChatMessage {
                channel: line.channel.clone(),
                prefix: line.prefix.clone(),
                command: line.command.clone(),
                tags: line.tags.clone().unwrap_or_default(),
                trailing: line.trailing.clone(),
            },
        )),

        "ROOMSTATE" | "USERSTATE" | "GLOBALUSERSTATE" => {
            DispatchOutcome::event(CoreEvent::RoomStateChanged {
                channel: line.channel.clone(),
                tags: line.tags.clone().unwrap_or_default(),
            })
        }

        // Acknowledged but not surfaced: the consumer has no use for these
        // without also wanting the full NOTICE-message taxonomy, which is
        // out of scope (see Non-goals).
        "NOTICE" | "CLEARCHAT" | "CLEARMSG" | "HOSTTARGET" | "RECONNECT" => DispatchOutcome::noop(),

        _ => DispatchOutcome::noop(),
    }
}

/// `JOIN`/`PART` carry the channel as the (only) param, with a leading `#`.
fn channel_name(line: &ParsedLine) -> Option<String> {
    line.channel
        .as_deref()
        .map(|c| c.strip_prefix('#').unwrap_or(c).to_string())
}

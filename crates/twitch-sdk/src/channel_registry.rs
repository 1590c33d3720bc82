//! The channel registry collaborator: enabled/disabled login names and
//! moderator/owner introspection. Out of scope as a system of its own (the
//! core only consumes the trait) but an in-memory implementation is bundled
//! so the crate is usable without a consumer supplying one.

use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::types::RateLimitClass;

/// A batch of channel-registry changes: newly enabled and newly disabled
/// channel login names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelsUpdated {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

/// The channel registry interface the core consumes. Implementations decide
/// which logins the bot should be joined to and which rate class applies to
/// each, based on whatever external source of truth they hold (a database, a
/// config file, a live moderator list, …).
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Every channel login the bot should currently be joined to.
    fn get_all_active_login_names(&self) -> Vec<String>;

    /// The rate class that applies to sends targeting `channel` — `Relaxed`
    /// iff the bot is that channel's owner or a moderator in it.
    fn rate_limit_class(&self, channel: &str) -> RateLimitClass;

    /// Awaits the next registry change. Returns `None` once the registry
    /// will never produce another update (e.g. it was dropped).
    async fn next_update(&self) -> Option<ChannelsUpdated>;
}

/// A simple in-memory `ChannelRegistry`, suitable for a single-process bot
/// that is told its channel list up front or via `set_moderator`/`enable`/
/// `disable` calls from elsewhere in the process.
#[non_exhaustive]
pub struct InMemoryChannelRegistry {
    state: StdMutex<RegistryState>,
    updates_tx: mpsc::UnboundedSender<ChannelsUpdated>,
    updates_rx: Mutex<mpsc::UnboundedReceiver<ChannelsUpdated>>,
}

struct RegistryState {
    active: Vec<String>,
    moderator_or_owner: Vec<String>,
}

impl InMemoryChannelRegistry {
    #[must_use]
    pub fn new(initial_channels: Vec<String>) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            state: StdMutex::new(RegistryState {
                active: initial_channels,
                moderator_or_owner: Vec::new(),
            }),
            updates_tx,
            updates_rx: Mutex::new(updates_rx),
        }
    }

    /// Marks `channel` as one the bot is a moderator or owner in, upgrading
    /// its rate class to `Relaxed`.
    pub async fn set_moderator(&self, channel: impl Into<String>) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let channel = channel.into();
        if !state.moderator_or_owner.contains(&channel) {
            state.moderator_or_owner.push(channel);
        }
    }

    pub async fn enable(&self, channel: impl Into<String>) {
        let channel = channel.into();
        {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if !state.active.contains(&channel) {
                state.active.push(channel.clone());
            }
        }
        let _ = self.updates_tx.send(ChannelsUpdated {
            enabled: vec![channel],
            disabled: Vec::new(),
        });
    }

    pub async fn disable(&self, channel: impl Into<String>) {
        let channel = channel.into();
        {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            state.active.retain(|c| c != &channel);
        }
        let _ = self.updates_tx.send(ChannelsUpdated {
            enabled: Vec::new(),
            disabled: vec![channel],
        });
    }
}

#[async_trait]
impl ChannelRegistry for InMemoryChannelRegistry {
    fn get_all_active_login_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .active
            .clone()
    }

    fn rate_limit_class(&self, channel: &str) -> RateLimitClass {
        if self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .moderator_or_owner
            .iter()
            .any(|c| c == channel)
        {
            RateLimitClass::Relaxed
        } else {
            RateLimitClass::Normal
        }
    }

    async fn next_update(&self) -> Option<ChannelsUpdated> {
        self.updates_rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_with_initial_channels_active() {
        let registry = InMemoryChannelRegistry::new(vec!["foo".into(), "bar".into()]);
        let mut names = registry.get_all_active_login_names();
        names.sort();
        assert_eq!(names, vec!["bar".to_string(), "foo".to_string()]);
    }

    #[tokio::test]
    async fn default_rate_class_is_normal() {
        let registry = InMemoryChannelRegistry::new(vec!["foo".into()]);
        assert_eq!(registry.rate_limit_class("foo"), RateLimitClass::Normal);
    }

    #[tokio::test]
    async fn moderator_upgrades_to_relaxed() {
        let registry = InMemoryChannelRegistry::new(vec!["foo".into()]);
        registry.set_moderator("foo").await;
        assert_eq!(registry.rate_limit_class("foo"), RateLimitClass::Relaxed);
    }

    #[tokio::test]
    async fn enable_disable_produce_updates() {
        let registry = InMemoryChannelRegistry::new(vec![]);
        registry.enable("foo").await;
        let update = registry.next_update().await.unwrap();
        assert_eq!(update.enabled, vec!["foo".to_string()]);

        registry.disable("foo").await;
        let update = registry.next_update().await.unwrap();
        assert_eq!(update.disabled, vec!["foo".to_string()]);

        assert!(registry.get_all_active_login_names().is_empty());
    }
}

//! Channels and the registry that owns them.
//!
//! Channels are created on first join and live for the rest of the process.
//! Each channel guards its own subscriber set, so traffic on one channel never
//! waits on the registry lock or on another channel.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::session::Session;

/// A named topic.
pub struct Channel {
    pub name: String,
    pub private: bool,
    pub require_auth: bool,
    pub created_at: DateTime<Utc>,
    /// Non-owning: sessions belong to the relay's session registry.
    subscribers: RwLock<HashMap<String, Weak<Session>>>,
}

impl Channel {
    fn new(name: &str, private: bool, require_auth: bool) -> Self {
        Self {
            name: name.to_string(),
            private,
            require_auth,
            created_at: Utc::now(),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `false` if the session was already subscribed.
    pub fn add_subscriber(&self, session: &Arc<Session>) -> bool {
        self.subscribers
            .write()
            .insert(session.id.clone(), Arc::downgrade(session))
            .is_none()
    }

    /// Returns `false` if the session was not subscribed.
    pub fn remove_subscriber(&self, session_id: &str) -> bool {
        self.subscribers.write().remove(session_id).is_some()
    }

    pub fn has_subscriber(&self, session_id: &str) -> bool {
        self.subscribers.read().contains_key(session_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Point-in-time copy of the live subscribers. The lock is released before
    /// the caller starts delivering.
    pub fn subscribers(&self) -> Vec<Arc<Session>> {
        self.subscribers
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

/// Channel name → channel.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
    auth_prefixes: Vec<String>,
}

impl ChannelRegistry {
    /// Channels whose name starts with one of `auth_prefixes` are created auth-required.
    pub fn new(auth_prefixes: Vec<String>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            auth_prefixes,
        }
    }

    /// Fetch a channel, creating it on first use.
    ///
    /// Visibility is decided by whoever creates the channel; later callers'
    /// `private` argument is ignored.
    pub fn get_or_create(&self, name: &str, private: bool) -> Arc<Channel> {
        if let Some(channel) = self.channels.read().get(name) {
            return channel.clone();
        }

        let mut channels = self.channels.write();
        channels
            .entry(name.to_string())
            .or_insert_with(|| {
                let require_auth = self.auth_prefixes.iter().any(|p| name.starts_with(p.as_str()));
                tracing::debug!(channel = %name, private, require_auth, "creating channel");
                Arc::new(Channel::new(name, private, require_auth))
            })
            .clone()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// All channels, sorted by name.
    pub fn list(&self) -> Vec<Arc<Channel>> {
        let mut channels: Vec<_> = self.channels.read().values().cloned().collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::gateway::testing::memory_session;

    #[test]
    fn visibility_fixed_at_creation() {
        let registry = ChannelRegistry::new(Vec::new());
        let first = registry.get_or_create("news", true);
        let second = registry.get_or_create("news", false);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.private);
        assert!(!second.require_auth);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn auth_prefix_marks_channel() {
        let registry = ChannelRegistry::new(vec!["private-".into()]);
        assert!(registry.get_or_create("private-ops", false).require_auth);
        assert!(!registry.get_or_create("lobby", true).require_auth);
    }

    #[test]
    fn lookup_unknown_is_none() {
        let registry = ChannelRegistry::new(Vec::new());
        assert!(registry.lookup("ghost").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn subscriber_edits_are_idempotent() {
        let registry = ChannelRegistry::new(Vec::new());
        let channel = registry.get_or_create("lobby", false);
        let (session, _peer) = memory_session(&RelayConfig::default());

        assert!(channel.add_subscriber(&session));
        assert!(!channel.add_subscriber(&session));
        assert_eq!(channel.subscriber_count(), 1);
        assert!(channel.has_subscriber(&session.id));

        assert!(channel.remove_subscriber(&session.id));
        assert!(!channel.remove_subscriber(&session.id));
        assert!(channel.subscribers().is_empty());
    }

    #[test]
    fn snapshot_skips_dropped_sessions() {
        let registry = ChannelRegistry::new(Vec::new());
        let channel = registry.get_or_create("lobby", false);
        let (alive, _p1) = memory_session(&RelayConfig::default());
        let (gone, _p2) = memory_session(&RelayConfig::default());
        channel.add_subscriber(&alive);
        channel.add_subscriber(&gone);
        drop(gone);

        let snapshot = channel.subscribers();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, alive.id);
    }

    #[test]
    fn concurrent_get_or_create_yields_one_channel() {
        let registry = Arc::new(ChannelRegistry::new(Vec::new()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_or_create("race", i % 2 == 0))
            })
            .collect();
        let channels: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(channels.iter().all(|c| Arc::ptr_eq(c, &channels[0])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn list_is_sorted() {
        let registry = ChannelRegistry::new(Vec::new());
        registry.get_or_create("b", false);
        registry.get_or_create("a", false);
        let names: Vec<_> = registry.list().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}

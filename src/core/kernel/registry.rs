use crate::core::types::Subscription;
use parking_lot::Mutex;
use std::sync::Arc;

/// Channels the caller currently wants, independent of any socket's lifecycle.
///
/// Cloning is cheap and every clone sees the same set. Sockets read it through
/// [`SubscriptionRegistry::snapshot`] each time they (re)connect, so an entry survives
/// any number of reconnects and is only dropped by [`SubscriptionRegistry::remove`].
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Arc<Mutex<Vec<Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription. Returns `false` (and changes nothing) if the channel id is
    /// already registered.
    pub fn add(&self, subscription: Subscription) -> bool {
        let mut entries = self.entries.lock();
        if entries
            .iter()
            .any(|s| s.channel_id == subscription.channel_id)
        {
            return false;
        }
        entries.push(subscription);
        true
    }

    /// Remove a subscription by channel id, returning it if it was present.
    pub fn remove(&self, channel_id: &str) -> Option<Subscription> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|s| s.channel_id == channel_id)?;
        Some(entries.remove(index))
    }

    pub fn contains(&self, channel_id: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|s| s.channel_id == channel_id)
    }

    pub fn get(&self, channel_id: &str) -> Option<Subscription> {
        self.entries
            .lock()
            .iter()
            .find(|s| s.channel_id == channel_id)
            .cloned()
    }

    /// All subscriptions in insertion order.
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

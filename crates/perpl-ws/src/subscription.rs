//! Subscription management.
//!
//! Tracks the set of named streams the caller has subscribed to and the
//! server-assigned subscription id for each. The full set is re-issued in a
//! single batched request after every reconnect.

use crate::message::{SubAck, SubscribeRequest};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Subscription registry for one socket.
#[derive(Default)]
pub struct SubscriptionManager {
    /// Stream name -> server-assigned sid (None until confirmed).
    streams: RwLock<HashMap<String, Option<u64>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register stream names and build the subscription request for them.
    pub fn subscribe(&self, names: Vec<String>) -> SubscribeRequest {
        let mut streams = self.streams.write();
        for name in &names {
            streams.entry(name.clone()).or_insert(None);
        }
        SubscribeRequest::subscribe(names)
    }

    /// Store server-assigned subscription ids.
    pub fn confirm(&self, acks: &[SubAck]) {
        let mut streams = self.streams.write();
        for ack in acks {
            debug!(stream = %ack.stream, sid = ack.sid, "Subscription confirmed");
            streams.insert(ack.stream.clone(), Some(ack.sid));
        }
    }

    /// Server-assigned id for a stream, once confirmed.
    pub fn sid(&self, stream: &str) -> Option<u64> {
        self.streams.read().get(stream).copied().flatten()
    }

    /// All previously named streams, for resubscription.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.streams.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop confirmation state (ids are stale after a reconnect).
    pub fn reset_confirmations(&self) {
        for sid in self.streams.write().values_mut() {
            *sid = None;
        }
    }

    /// One batched request re-issuing every previously named stream.
    ///
    /// Returns None when nothing was ever subscribed.
    pub fn resubscribe_all(&self) -> Option<SubscribeRequest> {
        let names = self.names();
        if names.is_empty() {
            return None;
        }
        Some(SubscribeRequest::subscribe(names))
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_confirm() {
        let manager = SubscriptionManager::new();
        manager.subscribe(vec!["order-book@16".to_string(), "trades@16".to_string()]);
        assert_eq!(manager.sid("order-book@16"), None);

        manager.confirm(&[SubAck {
            stream: "order-book@16".to_string(),
            sid: 42,
        }]);
        assert_eq!(manager.sid("order-book@16"), Some(42));
        assert_eq!(manager.sid("trades@16"), None);
    }

    #[test]
    fn test_resubscribe_carries_exactly_the_named_streams() {
        let manager = SubscriptionManager::new();
        manager.subscribe(vec!["order-book@16".to_string()]);
        manager.subscribe(vec!["trades@16".to_string(), "order-book@16".to_string()]);

        let request = manager.resubscribe_all().unwrap();
        let mut streams: Vec<&str> = request.subs.iter().map(|s| s.stream.as_str()).collect();
        streams.sort();
        assert_eq!(streams, vec!["order-book@16", "trades@16"]);
        assert!(request.subs.iter().all(|s| s.subscribe));
    }

    #[test]
    fn test_resubscribe_empty_is_none() {
        assert!(SubscriptionManager::new().resubscribe_all().is_none());
    }

    #[test]
    fn test_reset_confirmations() {
        let manager = SubscriptionManager::new();
        manager.subscribe(vec!["trades@16".to_string()]);
        manager.confirm(&[SubAck {
            stream: "trades@16".to_string(),
            sid: 7,
        }]);
        manager.reset_confirmations();
        assert_eq!(manager.sid("trades@16"), None);
        // The name survives for resubscription.
        assert_eq!(manager.names(), vec!["trades@16".to_string()]);
    }
}

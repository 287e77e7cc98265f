//! Subscription manager: who is watching one representation

use crate::event::{Payload, PayloadBroadcaster, PayloadStream};
use crate::model::RepresentationId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One client's interest in a representation.
///
/// A subscriber may hold several subscriptions (one per open editor, say);
/// each is identified by its own `subscription_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionDescription {
    pub subscriber_id: String,
    pub subscription_id: Uuid,
}

impl SubscriptionDescription {
    pub fn new(subscriber_id: impl Into<String>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            subscription_id: Uuid::new_v4(),
        }
    }
}

/// Public view of a subscriber, published with `SubscribersUpdated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub username: String,
}

pub struct SubscriptionManager {
    representation_id: RepresentationId,
    subscriptions: Mutex<Vec<SubscriptionDescription>>,
    broadcaster: PayloadBroadcaster,
}

impl SubscriptionManager {
    pub fn new(representation_id: RepresentationId, capacity: usize) -> Self {
        Self {
            representation_id,
            subscriptions: Mutex::new(Vec::new()),
            broadcaster: PayloadBroadcaster::new(capacity),
        }
    }

    /// Register a subscription. Adding the same subscription twice is a no-op.
    pub fn add(&self, subscription: SubscriptionDescription) {
        let subscribers = {
            let mut subscriptions = self.subscriptions.lock();
            if subscriptions.contains(&subscription) {
                return;
            }
            subscriptions.push(subscription);
            Self::subscribers_of(&subscriptions)
        };
        self.publish_subscribers(subscribers);
    }

    /// Remove a subscription; false when it was not registered here.
    pub fn remove(&self, subscription: &SubscriptionDescription) -> bool {
        let subscribers = {
            let mut subscriptions = self.subscriptions.lock();
            let before = subscriptions.len();
            subscriptions.retain(|s| s != subscription);
            if subscriptions.len() == before {
                return false;
            }
            Self::subscribers_of(&subscriptions)
        };
        self.publish_subscribers(subscribers);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn contains(&self, subscription: &SubscriptionDescription) -> bool {
        self.subscriptions.lock().contains(subscription)
    }

    /// Distinct subscribers in subscription order
    pub fn subscribers(&self) -> Vec<Subscriber> {
        Self::subscribers_of(&self.subscriptions.lock())
    }

    fn subscribers_of(subscriptions: &[SubscriptionDescription]) -> Vec<Subscriber> {
        let mut subscribers: Vec<Subscriber> = Vec::new();
        for subscription in subscriptions {
            if !subscribers
                .iter()
                .any(|s| s.username == subscription.subscriber_id)
            {
                subscribers.push(Subscriber {
                    username: subscription.subscriber_id.clone(),
                });
            }
        }
        subscribers
    }

    fn publish_subscribers(&self, subscribers: Vec<Subscriber>) {
        self.broadcaster.publish(Payload::SubscribersUpdated {
            representation_id: self.representation_id,
            subscribers,
        });
    }

    /// Membership-change notifications
    pub fn output_events(&self) -> PayloadStream {
        self.broadcaster.subscribe()
    }

    /// Drop every subscription and complete the notification stream
    pub fn dispose(&self) {
        self.subscriptions.lock().clear();
        self.broadcaster.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_track_membership() {
        let manager = SubscriptionManager::new(RepresentationId::new(), 8);
        let alice = SubscriptionDescription::new("alice");
        let bob = SubscriptionDescription::new("bob");

        manager.add(alice.clone());
        manager.add(alice.clone());
        manager.add(bob.clone());
        assert_eq!(manager.len(), 2);

        assert!(manager.remove(&alice));
        assert!(!manager.remove(&alice));
        assert!(!manager.is_empty());
        assert!(manager.remove(&bob));
        assert!(manager.is_empty());
    }

    #[test]
    fn subscribers_are_distinct_usernames() {
        let manager = SubscriptionManager::new(RepresentationId::new(), 8);
        manager.add(SubscriptionDescription::new("alice"));
        manager.add(SubscriptionDescription::new("alice"));
        manager.add(SubscriptionDescription::new("bob"));

        let names: Vec<String> = manager.subscribers().into_iter().map(|s| s.username).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn membership_changes_are_published() {
        let id = RepresentationId::new();
        let manager = SubscriptionManager::new(id, 8);
        let mut events = manager.output_events();

        let alice = SubscriptionDescription::new("alice");
        manager.add(alice.clone());
        manager.remove(&alice);
        manager.dispose();

        match events.next().await {
            Some(Payload::SubscribersUpdated {
                representation_id,
                subscribers,
            }) => {
                assert_eq!(representation_id, id);
                assert_eq!(subscribers.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        match events.next().await {
            Some(Payload::SubscribersUpdated { subscribers, .. }) => assert!(subscribers.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        assert!(events.next().await.is_none());
    }
}

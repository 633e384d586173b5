//! Synchronous publish/subscribe bus with owner-targeted delivery.
//!
//! Delivery is synchronous and ordered by subscription time. The subscriber
//! list is snapshotted before handlers run, so handlers may publish, subscribe
//! or unsubscribe without deadlocking; a subscription added during delivery
//! does not see the event being delivered.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};
use uuid::Uuid;

use super::event::{Event, EventType};

/// Handle returned by the subscribe calls, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    owner: Option<String>,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    topics: HashMap<EventType, Vec<Subscription>>,
}

/// Cloneable handle to a shared event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<BusInner>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventBus")
            .field("topics", &inner.topics.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event published on `topic`.
    pub fn subscribe<F>(&self, topic: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.insert(topic, None, false, Arc::new(handler))
    }

    /// Subscribe on behalf of `owner`; the handler also receives events sent
    /// to that owner with [`EventBus::send_to`].
    pub fn subscribe_as<F>(&self, owner: &str, topic: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.insert(topic, Some(owner.to_string()), false, Arc::new(handler))
    }

    /// Subscribe for a single delivery.
    pub fn subscribe_once<F>(
        &self,
        owner: Option<&str>,
        topic: EventType,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.insert(topic, owner.map(str::to_string), true, Arc::new(handler))
    }

    fn insert(
        &self,
        topic: EventType,
        owner: Option<String>,
        once: bool,
        handler: Handler,
    ) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        debug!(%topic, ?owner, once, %id, "Subscribing");
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.topics.entry(topic).or_default().push(Subscription {
            id,
            owner,
            once,
            handler,
        });
        id
    }

    /// Remove one subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for subs in inner.topics.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
        }
        inner.topics.retain(|_, subs| !subs.is_empty());
        removed
    }

    /// Remove every subscription held by `owner`.
    pub fn unsubscribe_owner(&self, owner: &str) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for subs in inner.topics.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.owner.as_deref() != Some(owner));
            removed += before - subs.len();
        }
        inner.topics.retain(|_, subs| !subs.is_empty());
        debug!(owner, removed, "Removed owner subscriptions");
        removed
    }

    pub fn subscriber_count(&self, topic: &EventType) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.topics.get(topic).map_or(0, Vec::len)
    }

    /// Deliver `event` to every subscriber of its topic.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: &Event) -> usize {
        self.deliver(event, None)
    }

    /// Deliver `event` only to subscribers of its topic owned by `owner`.
    pub fn send_to(&self, owner: &str, event: &Event) -> usize {
        self.deliver(event, Some(owner))
    }

    fn deliver(&self, event: &Event, target: Option<&str>) -> usize {
        let handlers = self.snapshot(&event.topic, target);
        trace!(
            event = %event.to_json(),
            ?target,
            handlers = handlers.len(),
            "Delivering event"
        );
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Collect matching handlers and drop one-shot subscriptions in the
    /// same critical section, so a one-shot handler runs at most once.
    fn snapshot(&self, topic: &EventType, target: Option<&str>) -> Vec<Handler> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(subs) = inner.topics.get_mut(topic) else {
            return Vec::new();
        };
        let matches =
            |s: &Subscription| target.is_none_or(|owner| s.owner.as_deref() == Some(owner));

        let handlers = subs
            .iter()
            .filter(|s| matches(s))
            .map(|s| Arc::clone(&s.handler))
            .collect();
        subs.retain(|s| !(s.once && matches(s)));
        if subs.is_empty() {
            inner.topics.remove(topic);
        }
        handlers
    }
}

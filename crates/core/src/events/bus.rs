//! Topic-keyed synchronous event bus.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{error, warn};
use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;

/// Subscriber callback. An `Err` or a panic is logged and isolated.
pub type Handler = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

struct Subscriber {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    topics: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl BusInner {
    /// Lock the topic table, recovering from poison if necessary.
    ///
    /// A poisoned table only means a subscribe/unsubscribe panicked midway;
    /// the map itself is still consistent.
    fn lock_topics(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscriber>>> {
        self.topics.lock().unwrap_or_else(|poisoned| {
            warn!("Event bus topic table mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn remove(&self, topic: &str, id: u64) {
        let mut topics = self.lock_topics();
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

/// Mapping of topic name to an ordered subscriber list.
///
/// `publish` runs every current subscriber of the topic on the caller's
/// thread, in subscription order. Cloning the bus is cheap and every clone
/// shares the same subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`. Keep the returned [`Subscription`] to
    /// unsubscribe later; dropping it leaves the handler registered.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock_topics()
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });

        Subscription {
            bus: Arc::downgrade(&self.inner),
            topic: topic.to_string(),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Deliver `payload` to every subscriber of `topic`.
    ///
    /// Publishing to a topic nobody listens on is a silent no-op.
    pub fn publish(&self, topic: &str, payload: Value) {
        // Snapshot so handlers may (un)subscribe re-entrantly.
        let handlers: Vec<Handler> = match self.inner.lock_topics().get(topic) {
            Some(subscribers) => subscribers.iter().map(|s| s.handler.clone()).collect(),
            None => return,
        };

        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Subscriber on '{}' failed: {}", topic, e),
                Err(_) => error!("Subscriber on '{}' panicked", topic),
            }
        }
    }

    /// Serialize `value` and publish it. Serialization failures are logged.
    pub fn publish_json<T: Serialize>(&self, topic: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(payload) => self.publish(topic, payload),
            Err(e) => error!("Failed to serialize payload for '{}': {}", topic, e),
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.lock_topics().get(topic).map_or(0, Vec::len)
    }
}

/// Handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    bus: Weak<BusInner>,
    topic: String,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Remove the handler from its topic. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(&self.topic, self.id);
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use serde_json::json;

    fn recorder(bus: &EventBus, topic: &str, log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Subscription {
        let log = log.clone();
        let tag = tag.to_string();
        bus.subscribe(topic, move |payload| {
            log.lock().unwrap().push(format!("{}:{}", tag, payload));
            Ok(())
        })
    }

    #[test]
    fn test_publish_in_subscription_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&bus, "T", &log, "a");
        let _b = recorder(&bus, "T", &log, "b");
        let _c = recorder(&bus, "T", &log, "c");

        bus.publish("T", json!(1));

        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish("NOBODY", json!({"x": 1}));
        assert_eq!(bus.subscriber_count("NOBODY"), 0);
    }

    #[test]
    fn test_failing_subscriber_is_isolated() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&bus, "T", &log, "a");
        let _err = bus.subscribe("T", |_| Err(Error::ParseError("boom".into())));
        let _panic = bus.subscribe("T", |_| panic!("subscriber exploded"));
        let _d = recorder(&bus, "T", &log, "d");

        bus.publish("T", json!("x"));

        assert_eq!(*log.lock().unwrap(), vec!["a:\"x\"", "d:\"x\""]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&bus, "T", &log, "a");
        let _b = recorder(&bus, "T", &log, "b");

        a.unsubscribe();
        a.unsubscribe();
        assert_eq!(bus.subscriber_count("T"), 1);

        bus.publish("T", json!(2));
        assert_eq!(*log.lock().unwrap(), vec!["b:2"]);
    }

    #[test]
    fn test_topics_are_independent() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&bus, "A", &log, "a");
        let _b = recorder(&bus, "B", &log, "b");

        bus.publish("B", json!(true));

        assert_eq!(*log.lock().unwrap(), vec!["b:true"]);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself_during_publish() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicU64::new(0));

        let slot_in = slot.clone();
        let hits_in = hits.clone();
        let sub = bus.subscribe("T", move |_| {
            hits_in.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = slot_in.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(sub);

        bus.publish("T", Value::Null);
        bus.publish("T", Value::Null);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count("T"), 0);
    }

    #[test]
    fn test_publish_json_serializes_payload() {
        #[derive(Serialize)]
        struct Ping {
            seq: u32,
        }

        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&bus, "T", &log, "a");

        bus.publish_json("T", &Ping { seq: 7 });

        assert_eq!(*log.lock().unwrap(), vec!["a:{\"seq\":7}"]);
    }
}

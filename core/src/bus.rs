//! The event bus: how extensions hear about the world.
//!
//! RULES:
//!   - Dispatch is synchronous, single-threaded, in subscription order.
//!   - A failing handler (error or panic) is logged with its owner and
//!     topic, then skipped. It never stops the remaining handlers.
//!   - Emitting on a topic nobody listens to is a successful no-op.
//!   - Handlers cannot re-enter the bus. Follow-up events go into the
//!     `Outbox` and are dispatched once the current topic is done.

use crate::{event::WorldEvent, types::OwnerId};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

/// What a handler hands back: an optional result value, or a failure.
pub type HandlerResult = anyhow::Result<Option<Value>>;

pub type Handler = Box<dyn FnMut(&Value, &mut Outbox) -> HandlerResult>;

/// Follow-up chains deeper than this are dropped.
pub const MAX_FOLLOW_UP_DEPTH: usize = 8;

/// Events a handler wants published after the current dispatch.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<(String, Value)>,
}

impl Outbox {
    pub fn emit(&mut self, topic: &str, payload: Value) {
        self.pending.push((topic.to_string(), payload));
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

struct Subscription {
    owner:   OwnerId,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    topics: BTreeMap<String, Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `topic` on behalf of `owner`.
    pub fn register<F>(&mut self, topic: &str, owner: &str, handler: F)
    where
        F: FnMut(&Value, &mut Outbox) -> HandlerResult + 'static,
    {
        self.topics.entry(topic.to_string()).or_default().push(Subscription {
            owner:   owner.to_string(),
            handler: Box::new(handler),
        });
    }

    /// Drop every subscription `owner` holds, on every topic.
    /// Returns how many were removed.
    pub fn unregister(&mut self, owner: &str) -> usize {
        let mut removed = 0;
        for subscriptions in self.topics.values_mut() {
            let before = subscriptions.len();
            subscriptions.retain(|s| s.owner != owner);
            removed += before - subscriptions.len();
        }
        self.topics.retain(|_, subscriptions| !subscriptions.is_empty());
        removed
    }

    /// Dispatch `payload` to every subscriber of `topic`, then any
    /// follow-ups they queued. Returns `(owner, value)` for each handler
    /// that produced a value.
    pub fn emit(&mut self, topic: &str, payload: &Value) -> Vec<(OwnerId, Value)> {
        self.emit_at_depth(topic, payload, 0)
    }

    /// Publish a domain event on its topic.
    pub fn publish(&mut self, event: &WorldEvent) -> Vec<(OwnerId, Value)> {
        if self.subscriber_count(event.topic()) == 0 {
            return Vec::new();
        }
        match event.payload() {
            Ok(payload) => self.emit(event.topic(), &payload),
            Err(e) => {
                log::error!("bus: cannot serialize {} payload: {e}", event.topic());
                Vec::new()
            }
        }
    }

    /// Topic → owners, for diagnostics.
    pub fn handlers(&self) -> BTreeMap<String, Vec<OwnerId>> {
        self.topics
            .iter()
            .map(|(topic, subs)| (topic.clone(), subs.iter().map(|s| s.owner.clone()).collect()))
            .collect()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, Vec::len)
    }

    fn emit_at_depth(&mut self, topic: &str, payload: &Value, depth: usize) -> Vec<(OwnerId, Value)> {
        let mut results = Vec::new();
        let mut outbox = Outbox::default();

        if let Some(subscriptions) = self.topics.get_mut(topic) {
            for sub in subscriptions.iter_mut() {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    (sub.handler)(payload, &mut outbox)
                }));
                match outcome {
                    Ok(Ok(Some(value))) => results.push((sub.owner.clone(), value)),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        log::warn!("bus: handler {} failed on {topic}: {e:#}", sub.owner);
                    }
                    Err(panic) => {
                        log::error!(
                            "bus: handler {} panicked on {topic}: {}",
                            sub.owner,
                            panic_message(panic.as_ref())
                        );
                    }
                }
            }
        }

        for (next_topic, next_payload) in outbox.pending {
            if depth + 1 > MAX_FOLLOW_UP_DEPTH {
                log::warn!("bus: dropping {next_topic} queued from {topic}; follow-up chain too deep");
                continue;
            }
            results.extend(self.emit_at_depth(&next_topic, &next_payload, depth + 1));
        }

        results
    }
}

/// Best-effort text of a caught panic.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

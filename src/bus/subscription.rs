use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::agent_bus::Inner;
use crate::domain::message::Message;

/// One topic event handed to a subscriber
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Reset generation the event was emitted in
    pub epoch: u64,
    pub topic: String,
    pub message: Message,
}

/// The whole log as it stood right after an emit or reset
///
/// Snapshots are immutable; a later emit never changes one that was already
/// handed out.
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    /// Reset generation the snapshot belongs to
    pub epoch: u64,
    pub messages: Arc<Vec<Message>>,
}

impl LogSnapshot {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Which registry a subscription lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Topic(String),
    Log,
}

/// Handle returned by `subscribe`/`subscribe_to_log`
///
/// Dropping the handle keeps the registration alive; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
#[must_use = "dropping a Subscription does not unsubscribe; keep it to be able to unsubscribe"]
pub struct Subscription {
    pub(crate) bus: Weak<Inner>,
    pub(crate) target: Target,
    pub(crate) id: u64,
    pub(crate) active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(bus: Weak<Inner>, target: Target, id: u64) -> Self {
        Self {
            bus,
            target,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// A handle that was never registered (the bus was already disposed)
    pub(crate) fn inert(target: Target) -> Self {
        Self {
            bus: Weak::new(),
            target,
            id: 0,
            active: AtomicBool::new(false),
        }
    }

    /// Removes exactly this registration
    ///
    /// Idempotent. Events emitted before the call may still be delivered;
    /// events emitted after it never are.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.target, self.id);
        }
    }

    /// False once unsubscribed, or once the bus was disposed or dropped
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
            && self.bus.upgrade().map_or(false, |bus| !bus.is_disposed())
    }

    /// Topic this subscription listens on, `None` for log subscriptions
    pub fn topic(&self) -> Option<&str> {
        match &self.target {
            Target::Topic(topic) => Some(topic),
            Target::Log => None,
        }
    }
}

/// Sending half of one subscriber's delivery queue
pub(crate) struct Mailbox<T> {
    pub(crate) id: u64,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Mailbox<T> {
    pub(crate) fn post(&self, item: T) {
        // A closed queue means the runtime is gone; nothing left to notify.
        let _ = self.tx.send(item);
    }
}

/// Starts the task that drains one subscriber's queue in order
///
/// Each callback invocation is isolated: a panic is logged and the worker
/// moves on to the next delivery.
pub(crate) fn spawn_mailbox<T, F>(runtime: &Handle, id: u64, label: String, mut callback: F) -> Mailbox<T>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<T>();

    runtime.spawn(async move {
        while let Some(item) = rx.recv().await {
            if catch_unwind(AssertUnwindSafe(|| callback(item))).is_err() {
                tracing::error!(subscription = id, target = %label, "Subscriber callback panicked");
            }
        }
        tracing::trace!(subscription = id, target = %label, "Subscriber worker finished");
    });

    Mailbox { id, tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inert_subscription_is_inactive() {
        let sub = Subscription::inert(Target::Topic("planReady".to_string()));

        assert!(!sub.is_active());
        assert_eq!(sub.topic(), Some("planReady"));
        sub.unsubscribe();
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = LogSnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.epoch, 0);
    }

    #[tokio::test]
    async fn mailbox_survives_panicking_callback() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let mailbox = spawn_mailbox(&Handle::current(), 1, "test".to_string(), move |n: u32| {
            if n == 1 {
                panic!("boom");
            }
            let _ = seen_tx.send(n);
        });

        mailbox.post(1);
        mailbox.post(2);

        assert_eq!(seen_rx.recv().await, Some(2));
    }
}

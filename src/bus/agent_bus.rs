use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::runtime::Handle;

use super::subscription::{spawn_mailbox, Delivery, LogSnapshot, Mailbox, Subscription, Target};
use crate::domain::message::Message;

/// Append-only, observable event log shared by the agents of one session
///
/// `AgentBus` is a handle; clones share the same log and registries. Pass it
/// to every agent driver and consumer that needs it.
///
/// # Delivery
/// Every subscriber owns a queue drained by its own Tokio task, so callbacks
/// never run inside [`AgentBus::emit`] and each subscriber sees events in
/// emission order, exactly once. Interleaving between different subscribers
/// is unspecified.
///
/// # Reset
/// [`AgentBus::reset`] truncates the log and bumps the epoch. Deliveries carry
/// the epoch they were emitted in; compare with [`AgentBus::is_current`] to
/// discard anything queued before the reset.
///
/// # Example
/// ```
/// use agent_bus::bus::AgentBus;
/// use agent_bus::domain::message::{Message, MessageKind};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = AgentBus::new();
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// let sub = bus.subscribe("planReady", move |delivery| {
///     let _ = tx.send(delivery.message);
/// });
///
/// bus.emit("planReady", Message::new("PlannerAgent", "ResearchAgent", MessageKind::Plan, "Outline"));
///
/// assert_eq!(rx.recv().await.unwrap().content, "Outline");
/// assert_eq!(bus.len(), 1);
/// sub.unsubscribe();
/// # }
/// ```
#[derive(Clone)]
pub struct AgentBus {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    runtime: Handle,
    log: RwLock<LogSnapshot>,
    topics: Mutex<HashMap<String, Vec<Mailbox<Delivery>>>>,
    log_listeners: Mutex<Vec<Mailbox<LogSnapshot>>>,
    active_agent: RwLock<Option<String>>,
    next_subscription: AtomicU64,
    disposed: AtomicBool,
}

impl AgentBus {
    /// Creates an empty bus whose subscribers run on the current Tokio runtime
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime; use
    /// [`AgentBus::with_runtime`] to pass a handle explicitly.
    pub fn new() -> Self {
        Self::with_runtime(Handle::current())
    }

    /// Creates an empty bus whose subscribers run on `runtime`
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                log: RwLock::new(LogSnapshot::default()),
                topics: Mutex::new(HashMap::new()),
                log_listeners: Mutex::new(Vec::new()),
                active_agent: RwLock::new(None),
                next_subscription: AtomicU64::new(1),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Appends `message` to the log and notifies subscribers
    ///
    /// Topic subscribers of `topic` receive the message; log subscribers
    /// receive the entire updated log. Never fails; after [`AgentBus::dispose`]
    /// the message is dropped with a warning.
    pub fn emit(&self, topic: &str, message: Message) {
        self.append(None, [(topic, message)]);
    }

    /// Like [`AgentBus::emit`], but only while the bus is still in `epoch`
    ///
    /// The epoch is compared under the log lock, so a concurrent
    /// [`AgentBus::reset`] either happens-before the append (and the message
    /// is dropped) or after it. Returns whether the message was appended.
    pub fn emit_in_epoch(&self, epoch: u64, topic: &str, message: Message) -> bool {
        self.append(Some(epoch), [(topic, message)])
    }

    /// Appends `batch` back to back while the bus is still in `epoch`
    ///
    /// No other emit can interleave with the batch; either all of it is
    /// appended or none of it. Returns whether the batch was appended.
    pub fn emit_all_in_epoch<'t, I>(&self, epoch: u64, batch: I) -> bool
    where
        I: IntoIterator<Item = (&'t str, Message)>,
    {
        self.append(Some(epoch), batch)
    }

    fn append<'t, I>(&self, expected_epoch: Option<u64>, batch: I) -> bool
    where
        I: IntoIterator<Item = (&'t str, Message)>,
    {
        // Held across notification so every queue receives events in log order.
        let mut log = write(&self.inner.log);

        // Checked under the write guard: dispose and reset both take it.
        if self.is_disposed() {
            tracing::warn!("Emit on disposed bus ignored");
            return false;
        }
        if let Some(expected) = expected_epoch {
            if expected != log.epoch {
                tracing::debug!(expected, epoch = log.epoch, "Emit from stale epoch dropped");
                return false;
            }
        }

        let epoch = log.epoch;
        let topics = lock(&self.inner.topics);
        let listeners = lock(&self.inner.log_listeners);

        for (topic, message) in batch {
            tracing::debug!(
                topic,
                epoch,
                sender = %message.sender,
                receiver = %message.receiver,
                kind = %message.kind,
                position = log.messages.len(),
                "Emitting message"
            );

            if let Some(mailboxes) = topics.get(topic) {
                for mailbox in mailboxes {
                    mailbox.post(Delivery {
                        epoch,
                        topic: topic.to_string(),
                        message: message.clone(),
                    });
                }
            }

            Arc::make_mut(&mut log.messages).push(message);

            if !listeners.is_empty() {
                let snapshot = log.clone();
                for listener in listeners.iter() {
                    listener.post(snapshot.clone());
                }
            }
        }

        true
    }

    /// Registers `callback` for every future emit on `topic`
    pub fn subscribe<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: FnMut(Delivery) + Send + 'static,
    {
        let topic = topic.into();
        if self.is_disposed() {
            tracing::warn!(topic = %topic, "Subscribe on disposed bus ignored");
            return Subscription::inert(Target::Topic(topic));
        }

        let id = self.next_id();
        let mailbox = spawn_mailbox(&self.inner.runtime, id, topic.clone(), callback);
        lock(&self.inner.topics)
            .entry(topic.clone())
            .or_default()
            .push(mailbox);

        tracing::debug!(subscription = id, topic = %topic, "Topic subscriber registered");
        Subscription::new(Arc::downgrade(&self.inner), Target::Topic(topic), id)
    }

    /// Registers `callback` to receive the full log after every emit and reset
    pub fn subscribe_to_log<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(LogSnapshot) + Send + 'static,
    {
        if self.is_disposed() {
            tracing::warn!("Log subscribe on disposed bus ignored");
            return Subscription::inert(Target::Log);
        }

        let id = self.next_id();
        let mailbox = spawn_mailbox(&self.inner.runtime, id, "log".to_string(), callback);
        lock(&self.inner.log_listeners).push(mailbox);

        tracing::debug!(subscription = id, "Log subscriber registered");
        Subscription::new(Arc::downgrade(&self.inner), Target::Log, id)
    }

    /// Truncates the log to empty and starts a new epoch
    ///
    /// Log subscribers receive the empty snapshot tagged with the new epoch.
    /// Returns the new epoch.
    pub fn reset(&self) -> u64 {
        let mut log = write(&self.inner.log);
        log.epoch += 1;
        log.messages = Arc::new(Vec::new());
        *write(&self.inner.active_agent) = None;

        for listener in lock(&self.inner.log_listeners).iter() {
            listener.post(log.clone());
        }

        tracing::info!(epoch = log.epoch, "Bus reset");
        log.epoch
    }

    /// Drops every subscription and empties the log
    ///
    /// The bus stays usable as a read-only empty log; further emits and
    /// subscriptions are ignored.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut log = write(&self.inner.log);
        log.messages = Arc::new(Vec::new());
        lock(&self.inner.topics).clear();
        lock(&self.inner.log_listeners).clear();
        *write(&self.inner.active_agent) = None;

        tracing::info!(epoch = log.epoch, "Bus disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Current log together with its epoch
    pub fn log(&self) -> LogSnapshot {
        read(&self.inner.log).clone()
    }

    /// Current log in emission order
    pub fn messages(&self) -> Arc<Vec<Message>> {
        Arc::clone(&read(&self.inner.log).messages)
    }

    pub fn len(&self) -> usize {
        read(&self.inner.log).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of resets performed so far
    pub fn epoch(&self) -> u64 {
        read(&self.inner.log).epoch
    }

    /// False for deliveries and snapshots that predate the latest reset
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    /// Agent that last declared itself busy, if any
    pub fn active_agent(&self) -> Option<String> {
        read(&self.inner.active_agent).clone()
    }

    pub fn set_active_agent(&self, agent: Option<&str>) {
        *write(&self.inner.active_agent) = agent.map(str::to_string);
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.inner.topics).get(topic).map_or(0, Vec::len)
    }

    pub fn log_subscriber_count(&self) -> usize {
        lock(&self.inner.log_listeners).len()
    }

    fn next_id(&self) -> u64 {
        self.inner.next_subscription.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for AgentBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AgentBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let log = read(&self.inner.log);
        f.debug_struct("AgentBus")
            .field("epoch", &log.epoch)
            .field("messages", &log.messages.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Inner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn remove(&self, target: &Target, id: u64) {
        match target {
            Target::Topic(topic) => {
                let mut topics = lock(&self.topics);
                if let Some(mailboxes) = topics.get_mut(topic) {
                    mailboxes.retain(|m| m.id != id);
                    if mailboxes.is_empty() {
                        topics.remove(topic);
                    }
                }
            }
            Target::Log => lock(&self.log_listeners).retain(|m| m.id != id),
        }
        tracing::debug!(subscription = id, "Subscriber removed");
    }
}

// A panicking subscriber never holds these locks, so poisoning only follows a
// bug inside the bus itself; keep serving the last consistent state.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

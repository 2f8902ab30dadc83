//! Subscriber registry: per-channel callback lists with last-value replay.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use sitewatch_types::{Alert, ConnectionState, Snapshot, Stats};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// The channels a subscriber can listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Live and stale snapshots.
    Snapshots,
    /// Connection state changes.
    Connection,
    /// The full alert list after every change.
    Alerts,
    /// Aggregate statistics.
    Stats,
}

impl ChannelKind {
    /// Name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Snapshots => "snapshots",
            ChannelKind::Connection => "connection",
            ChannelKind::Alerts => "alerts",
            ChannelKind::Stats => "stats",
        }
    }
}

struct Slots<T> {
    subscribers: Vec<(u64, Callback<T>)>,
    last: Option<T>,
}

struct Channel<T> {
    kind: ChannelKind,
    slots: Mutex<Slots<T>>,
    // Serializes deliveries on this channel. Re-entrant so a callback may
    // subscribe or trigger a publish on its own channel.
    delivery: ReentrantMutex<()>,
}

impl<T: Clone> Channel<T> {
    fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            slots: Mutex::new(Slots {
                subscribers: Vec::new(),
                last: None,
            }),
            delivery: ReentrantMutex::new(()),
        }
    }

    fn subscribe(&self, id: u64, callback: Callback<T>) {
        let _delivery = self.delivery.lock();
        let last = {
            let mut slots = self.slots.lock();
            slots.subscribers.push((id, callback.clone()));
            slots.last.clone()
        };
        if let Some(value) = last {
            deliver(self.kind, id, &callback, &value);
        }
    }

    fn unsubscribe(&self, id: u64) -> bool {
        let mut slots = self.slots.lock();
        let before = slots.subscribers.len();
        slots.subscribers.retain(|(sid, _)| *sid != id);
        slots.subscribers.len() != before
    }

    fn publish(&self, value: T) {
        let _delivery = self.delivery.lock();
        let subscribers = {
            let mut slots = self.slots.lock();
            slots.last = Some(value.clone());
            slots.subscribers.clone()
        };
        for (id, callback) in &subscribers {
            deliver(self.kind, *id, callback, &value);
        }
    }

    fn last(&self) -> Option<T> {
        self.slots.lock().last.clone()
    }

    fn clear_last(&self) {
        self.slots.lock().last = None;
    }

    fn len(&self) -> usize {
        self.slots.lock().subscribers.len()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("Channel")
            .field("kind", &self.kind)
            .field("subscribers", &slots.subscribers.len())
            .field("has_last", &slots.last.is_some())
            .finish()
    }
}

fn deliver<T>(kind: ChannelKind, id: u64, callback: &Callback<T>, value: &T) {
    if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
        tracing::warn!(channel = kind.as_str(), subscriber = id, "Subscriber panicked during delivery");
    }
}

/// Four independent observer channels.
///
/// Subscribers on one channel are called in registration order. A panicking
/// subscriber is logged and skipped; the others still receive the value.
/// Callbacks run on the publishing thread holding only that channel's
/// re-entrant delivery lock, so they may subscribe, unsubscribe or read
/// engine state from inside a callback.
#[derive(Debug)]
pub struct Registry {
    next_id: AtomicU64,
    snapshots: Channel<Snapshot>,
    connection: Channel<ConnectionState>,
    alerts: Channel<Arc<[Alert]>>,
    stats: Channel<Stats>,
}

impl Registry {
    /// Create a registry. The connection channel starts out `Disconnected`.
    pub fn new() -> Arc<Self> {
        let registry = Self {
            next_id: AtomicU64::new(1),
            snapshots: Channel::new(ChannelKind::Snapshots),
            connection: Channel::new(ChannelKind::Connection),
            alerts: Channel::new(ChannelKind::Alerts),
            stats: Channel::new(ChannelKind::Stats),
        };
        registry.connection.publish(ConnectionState::Disconnected);
        Arc::new(registry)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to snapshots. Replays the last snapshot, if any.
    pub fn subscribe_snapshots<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.snapshots.subscribe(id, Arc::new(callback));
        Subscription::new(self, ChannelKind::Snapshots, id)
    }

    /// Subscribe to connection state. Replays the current state.
    pub fn subscribe_connection<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.connection.subscribe(id, Arc::new(callback));
        Subscription::new(self, ChannelKind::Connection, id)
    }

    /// Subscribe to the alert list. Replays the last list, if any.
    pub fn subscribe_alerts<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&Arc<[Alert]>) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.alerts.subscribe(id, Arc::new(callback));
        Subscription::new(self, ChannelKind::Alerts, id)
    }

    /// Subscribe to statistics. Replays the last stats, if any.
    pub fn subscribe_stats<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&Stats) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.stats.subscribe(id, Arc::new(callback));
        Subscription::new(self, ChannelKind::Stats, id)
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, kind: ChannelKind, id: u64) -> bool {
        match kind {
            ChannelKind::Snapshots => self.snapshots.unsubscribe(id),
            ChannelKind::Connection => self.connection.unsubscribe(id),
            ChannelKind::Alerts => self.alerts.unsubscribe(id),
            ChannelKind::Stats => self.stats.unsubscribe(id),
        }
    }

    /// Number of subscribers on a channel.
    pub fn subscriber_count(&self, kind: ChannelKind) -> usize {
        match kind {
            ChannelKind::Snapshots => self.snapshots.len(),
            ChannelKind::Connection => self.connection.len(),
            ChannelKind::Alerts => self.alerts.len(),
            ChannelKind::Stats => self.stats.len(),
        }
    }

    /// Publish a snapshot.
    pub fn publish_snapshot(&self, snapshot: Snapshot) {
        self.snapshots.publish(snapshot);
    }

    /// Publish a connection state.
    pub fn publish_connection(&self, state: ConnectionState) {
        self.connection.publish(state);
    }

    /// Publish the alert list.
    pub fn publish_alerts(&self, alerts: Vec<Alert>) {
        self.alerts.publish(alerts.into());
    }

    /// Publish statistics.
    pub fn publish_stats(&self, stats: Stats) {
        self.stats.publish(stats);
    }

    /// Last published snapshot.
    pub fn last_snapshot(&self) -> Option<Snapshot> {
        self.snapshots.last()
    }

    /// Last published connection state.
    pub fn last_connection(&self) -> ConnectionState {
        self.connection.last().unwrap_or_default()
    }

    /// Last published statistics.
    pub fn last_stats(&self) -> Option<Stats> {
        self.stats.last()
    }

    /// Forget the replay values for snapshots and stats.
    pub(crate) fn clear_snapshot_state(&self) {
        self.snapshots.clear_last();
        self.stats.clear_last();
    }
}

/// Handle for one subscription.
///
/// Dropping the handle unsubscribes. Use [`detach`](Self::detach) to keep
/// the callback registered for the lifetime of the registry.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<Registry>,
    kind: ChannelKind,
    id: u64,
    active: bool,
}

impl Subscription {
    fn new(registry: &Arc<Registry>, kind: ChannelKind, id: u64) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            kind,
            id,
            active: true,
        }
    }

    /// The channel this subscription listens on.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Subscriber id, unique within the registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback now.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the callback registered and drop the handle.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.kind, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

//! The polling sync engine.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, ReentrantMutex};
use sitewatch_types::{Alert, ChangeEvent, ConnectionState, EventKind, RawRecord, Snapshot, Stats};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::alerts::AlertLog;
use crate::config::{clamp_interval, EngineConfig};
use crate::connection::{ConnectionMachine, Transition};
use crate::detect::{detect, detect_notable};
use crate::dispatch::{NoopDispatcher, NotificationDispatcher, NotificationPayload};
use crate::error::{CycleError, EngineError, FetchError};
use crate::history::History;
use crate::registry::{ChannelKind, Registry, Subscription};
use crate::source::RecordSource;
use crate::tracker::IdempotencyTracker;
use crate::transform::{transform, validate};

/// Result of one fetch-transform-detect-distribute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A fresh snapshot was published.
    Updated,
    /// Every attempt failed; the last snapshot, if any, was republished stale.
    Stale,
    /// Another cycle was in flight, or the engine was stopped meanwhile.
    Skipped,
}

/// Diagnostic summary of an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatus {
    /// Engine name.
    pub name: String,
    /// Source description.
    pub source: String,
    /// Whether the scheduler is running.
    pub running: bool,
    /// Current poll interval.
    pub interval: Duration,
    /// Current connection state.
    pub connection: ConnectionState,
    /// Failed attempts since the last success.
    pub consecutive_failures: u32,
    /// Successful cycles.
    pub cycles: u64,
    /// Failed fetch attempts.
    pub failed_attempts: u64,
    /// Retained alerts.
    pub alerts: usize,
    /// Unacknowledged alerts.
    pub open_alerts: usize,
    /// Identifiers held by the idempotency tracker.
    pub tracked_ids: usize,
    /// Snapshot subscribers.
    pub snapshot_subscribers: usize,
    /// Most recent failure, cleared on success.
    pub last_error: Option<String>,
    /// Capture time of the last live snapshot.
    pub last_success_ms: Option<u64>,
}

/// Polls a [`RecordSource`], turns records into snapshots, detects changes
/// and fans everything out to subscribers.
///
/// Cycles never overlap: a slow fetch delays the next one instead of
/// stacking requests. Every failure of the source, a subscriber or the
/// dispatcher is logged and absorbed.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use sitewatch_engine::{EngineConfig, RecordSource, SyncEngine};
///
/// # async fn run(source: Arc<dyn RecordSource>) {
/// let engine = SyncEngine::builder(source)
///     .name("garage")
///     .config(EngineConfig::default().with_poll_interval(Duration::from_secs(5)))
///     .build();
///
/// // The first snapshot subscriber starts polling.
/// let _sub = engine.subscribe_snapshots(|snapshot| {
///     println!("{} of {} free", snapshot.available, snapshot.total);
/// });
///
/// tokio::time::sleep(Duration::from_secs(30)).await;
/// engine.stop();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: String,
    source: Arc<dyn RecordSource>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: EngineConfig,
    interval: Mutex<Duration>,
    registry: Arc<Registry>,
    state: Mutex<EngineState>,
    scheduler: Mutex<Option<SchedulerHandle>>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    // Held while fanning out so a stop cannot interleave with a cycle's
    // publishes.
    publish: ReentrantMutex<()>,
}

#[derive(Debug)]
struct EngineState {
    /// Last live snapshot, the baseline for change detection.
    previous: Option<Snapshot>,
    /// Last published snapshot, live or stale.
    current: Option<Snapshot>,
    connection: ConnectionMachine,
    tracker: IdempotencyTracker,
    alerts: AlertLog,
    history: History,
    cycles: u64,
    failed_attempts: u64,
    notable_seen: u64,
    last_error: Option<String>,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            previous: None,
            current: None,
            connection: ConnectionMachine::new(config.max_consecutive_failures),
            tracker: IdempotencyTracker::new(config.max_retained_identifiers),
            alerts: AlertLog::new(config.max_retained_alerts),
            history: History::new(),
            cycles: 0,
            failed_attempts: 0,
            notable_seen: 0,
            last_error: None,
        }
    }

    fn stats_for(&self, snapshot: &Snapshot) -> Stats {
        Stats {
            notable_seen: self.notable_seen,
            open_alerts: self.alerts.open_count(),
            trend: self.history.trend(),
            rate_per_sec: self.history.rate_per_sec(),
            cycles: self.cycles,
            failed_attempts: self.failed_attempts,
            ..Stats::from_snapshot(snapshot)
        }
    }
}

#[derive(Debug)]
struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    interval_tx: watch::Sender<Duration>,
    task: JoinHandle<()>,
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Everything one commit wants to publish and dispatch.
#[derive(Debug, Default)]
struct Update {
    transition: Option<Transition>,
    snapshot: Option<Snapshot>,
    alerts: Option<Vec<Alert>>,
    stats: Option<Stats>,
    events: Vec<ChangeEvent>,
    error: Option<String>,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Aborts the wrapped task when dropped, e.g. after a fetch timeout.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl SyncEngine {
    /// Create a builder for an engine polling `source`.
    pub fn builder(source: Arc<dyn RecordSource>) -> SyncEngineBuilder {
        SyncEngineBuilder::new(source)
    }

    /// Engine name used in logs.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Start polling: one cycle now, then one per interval.
    ///
    /// Does nothing if already running. Fails only when called outside a
    /// tokio runtime.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut scheduler = self.inner.scheduler.lock();
        if scheduler.is_some() {
            tracing::debug!(engine = %self.inner.name, "Already running, start ignored");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let interval = *self.inner.interval.lock();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (interval_tx, interval_rx) = watch::channel(interval);
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let task = runtime.spawn(run_scheduler(
            Arc::downgrade(&self.inner),
            generation,
            stop_rx,
            interval_rx,
        ));

        *scheduler = Some(SchedulerHandle {
            stop_tx,
            interval_tx,
            task,
        });
        tracing::info!(
            engine = %self.inner.name,
            source = self.inner.source.description(),
            interval_ms = interval.as_millis() as u64,
            "Polling started"
        );
        Ok(())
    }

    /// Stop polling and move to `Disconnected`.
    ///
    /// Safe to call repeatedly, and from inside a subscriber callback. No
    /// cycle starts after this returns, and a cycle still in flight
    /// publishes nothing.
    pub fn stop(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let handle = self.inner.scheduler.lock().take();
        if let Some(handle) = handle {
            // The receiver is gone if the task already ended.
            let _ = handle.stop_tx.send(true);
            drop(handle);
            tracing::info!(engine = %self.inner.name, "Polling stopped");
        }

        let transition = self.inner.state.lock().connection.stop();
        if let Some(transition) = transition {
            let _publish = self.inner.publish.lock();
            self.inner.registry.publish_connection(transition.to);
        }
    }

    /// Whether the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.inner.scheduler.lock().is_some()
    }

    /// Change the poll interval (clamped to 1s..=60s).
    ///
    /// A running scheduler restarts its timer once any in-flight cycle is
    /// done; the next cycle is one full interval away.
    pub fn set_interval(&self, interval: Duration) {
        let interval = clamp_interval(interval);
        *self.inner.interval.lock() = interval;
        if let Some(handle) = self.inner.scheduler.lock().as_ref() {
            let _ = handle.interval_tx.send(interval);
        }
        tracing::debug!(
            engine = %self.inner.name,
            interval_ms = interval.as_millis() as u64,
            "Poll interval changed"
        );
    }

    /// Current poll interval.
    pub fn interval(&self) -> Duration {
        *self.inner.interval.lock()
    }

    /// Run one cycle now, e.g. for a manual refresh.
    ///
    /// Returns [`CycleOutcome::Skipped`] if a cycle is already in flight.
    pub async fn poll_now(&self) -> CycleOutcome {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.run_cycle(generation).await
    }

    /// Subscribe to snapshots. This is the primary channel: with
    /// `auto_start` enabled the first subscription starts polling.
    pub fn subscribe_snapshots<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let subscription = self.inner.registry.subscribe_snapshots(callback);
        if self.inner.config.auto_start && !self.is_running() {
            if let Err(e) = self.start() {
                tracing::debug!(engine = %self.inner.name, error = %e, "Auto-start skipped");
            }
        }
        subscription
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_connection<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe_connection(callback)
    }

    /// Subscribe to the alert list.
    pub fn subscribe_alerts<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Arc<[Alert]>) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe_alerts(callback)
    }

    /// Subscribe to aggregate statistics.
    pub fn subscribe_stats<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Stats) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe_stats(callback)
    }

    /// The last published snapshot, live or stale.
    pub fn current_snapshot(&self) -> Option<Snapshot> {
        self.inner.state.lock().current.clone()
    }

    /// The current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().connection.state()
    }

    /// All retained alerts, newest first.
    pub fn alerts(&self) -> Vec<Alert> {
        self.inner.state.lock().alerts.alerts()
    }

    /// The last published statistics.
    pub fn stats(&self) -> Option<Stats> {
        self.inner.registry.last_stats()
    }

    /// Acknowledge an alert and republish the alert list.
    pub fn acknowledge_alert(
        &self,
        id: u64,
        actor: &str,
        notes: Option<String>,
    ) -> Result<Alert, EngineError> {
        let (alert, alerts, stats) = {
            let mut state = self.inner.state.lock();
            let alert = state.alerts.acknowledge(id, actor, notes, now_ms())?;
            let stats = state.previous.as_ref().map(|s| state.stats_for(s));
            (alert, state.alerts.alerts(), stats)
        };

        tracing::info!(engine = %self.inner.name, alert = id, actor, "Alert acknowledged");
        let _publish = self.inner.publish.lock();
        self.inner.registry.publish_alerts(alerts);
        if let Some(stats) = stats {
            self.inner.registry.publish_stats(stats);
        }
        Ok(alert)
    }

    /// Diagnostic summary.
    pub fn status(&self) -> ServiceStatus {
        let running = self.is_running();
        let interval = self.interval();
        let state = self.inner.state.lock();
        ServiceStatus {
            name: self.inner.name.clone(),
            source: self.inner.source.description().to_string(),
            running,
            interval,
            connection: state.connection.state(),
            consecutive_failures: state.connection.consecutive_failures(),
            cycles: state.cycles,
            failed_attempts: state.failed_attempts,
            alerts: state.alerts.len(),
            open_alerts: state.alerts.open_count(),
            tracked_ids: state.tracker.len(),
            snapshot_subscribers: self.inner.registry.subscriber_count(ChannelKind::Snapshots),
            last_error: state.last_error.clone(),
            last_success_ms: state.previous.as_ref().map(|s| s.timestamp_ms),
        }
    }

    /// Forget the baseline snapshot, seen identifiers, alerts and counters.
    ///
    /// Used when switching to a different facility. Polling and the
    /// connection state are left as they are; the next cycle establishes a
    /// fresh baseline.
    pub fn reset(&self) {
        {
            let mut state = self.inner.state.lock();
            let connection = state.connection.clone();
            *state = EngineState::new(&self.inner.config);
            state.connection = connection;
        }
        self.inner.registry.clear_snapshot_state();
        let _publish = self.inner.publish.lock();
        self.inner.registry.publish_alerts(Vec::new());
        tracing::info!(engine = %self.inner.name, "Engine state reset");
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run_cycle(&self, generation: u64) -> CycleOutcome {
        let Some(_guard) = CycleGuard::acquire(&self.in_flight) else {
            tracing::debug!(engine = %self.name, "Cycle already in flight, skipping");
            return CycleOutcome::Skipped;
        };

        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            if !self.is_current(generation) {
                return CycleOutcome::Skipped;
            }

            let captured_at = now_ms();
            let result = self.fetch().await.and_then(|records| {
                validate(&records).map_err(CycleError::Transform)?;
                let snapshot = transform(&records, &self.config.transform, captured_at);
                Ok((records, snapshot))
            });

            match result {
                Ok((records, snapshot)) => {
                    let Some(update) = self.commit_success(generation, &records, snapshot) else {
                        return CycleOutcome::Skipped;
                    };
                    self.distribute(generation, update);
                    return CycleOutcome::Updated;
                }
                Err(err) => {
                    let Some(update) = self.commit_failure(generation, &err) else {
                        return CycleOutcome::Skipped;
                    };
                    self.distribute(generation, update);

                    if attempt >= retry.max_attempts {
                        tracing::debug!(
                            engine = %self.name,
                            attempts = attempt + 1,
                            "Retries exhausted, waiting for next tick"
                        );
                        return CycleOutcome::Stale;
                    }
                    let delay = retry.delay_for(attempt);
                    attempt += 1;
                    tracing::debug!(
                        engine = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Fetch in a separate task so a panicking source cannot take the
    /// scheduler down, bounded by the fetch timeout.
    async fn fetch(&self) -> Result<Vec<RawRecord>, CycleError> {
        let source = self.source.clone();
        let timeout = self.config.fetch_timeout;
        let mut task = AbortOnDrop(tokio::spawn(async move { source.fetch().await }));

        match tokio::time::timeout(timeout, &mut task.0).await {
            Err(_) => Err(FetchError::Timeout(timeout).into()),
            Ok(Err(join_error)) if join_error.is_panic() => {
                Err(FetchError::Other("record source panicked".to_string()).into())
            }
            Ok(Err(_)) => Err(FetchError::Other("fetch cancelled".to_string()).into()),
            Ok(Ok(result)) => Ok(result?),
        }
    }

    fn commit_success(&self, generation: u64, records: &[RawRecord], snapshot: Snapshot) -> Option<Update> {
        let mut state = self.state.lock();
        if !self.is_current(generation) {
            return None;
        }

        let mut events = detect(state.previous.as_ref(), &snapshot);
        let notable = detect_notable(
            records,
            &mut state.tracker,
            &self.config.notable,
            &self.config.transform,
        );

        let alerts = if notable.is_empty() {
            None
        } else {
            for event in &notable {
                let alert = state.alerts.raise(event.clone(), snapshot.timestamp_ms);
                tracing::info!(
                    engine = %self.name,
                    alert = alert.id,
                    record = event.record_id().unwrap_or_default(),
                    "Notable record"
                );
            }
            state.notable_seen += notable.len() as u64;
            Some(state.alerts.alerts())
        };
        events.extend(notable);

        let transition = state.connection.on_success();
        state.history.record(snapshot.timestamp_ms, snapshot.available);
        state.cycles += 1;
        state.last_error = None;
        let stats = state.stats_for(&snapshot);
        state.previous = Some(snapshot.clone());
        state.current = Some(snapshot.clone());

        tracing::debug!(
            engine = %self.name,
            total = snapshot.total,
            available = snapshot.available,
            categories = snapshot.len(),
            events = events.len(),
            "Cycle complete"
        );

        Some(Update {
            transition,
            snapshot: Some(snapshot),
            alerts,
            stats: Some(stats),
            events,
            error: None,
        })
    }

    fn commit_failure(&self, generation: u64, err: &CycleError) -> Option<Update> {
        let mut state = self.state.lock();
        if !self.is_current(generation) {
            return None;
        }

        let message = err.to_string();
        state.failed_attempts += 1;
        state.last_error = Some(message.clone());
        let transition = state.connection.on_failure();
        tracing::warn!(
            engine = %self.name,
            source = self.source.description(),
            failures = state.connection.consecutive_failures(),
            error = %message,
            "Fetch failed"
        );

        let stale = state.previous.as_ref().map(|s| s.as_stale(message.clone()));
        let stats = state.previous.as_ref().map(|s| state.stats_for(s));
        if let Some(stale) = &stale {
            state.current = Some(stale.clone());
        }

        Some(Update {
            transition,
            snapshot: stale,
            alerts: None,
            stats,
            events: Vec::new(),
            error: Some(message),
        })
    }

    /// Fan out to subscribers, then hand events to the dispatcher.
    fn distribute(&self, generation: u64, update: Update) {
        {
            let _publish = self.publish.lock();
            let registry = &self.registry;

            // A subscriber may stop the engine mid-way; check before each publish.
            if let Some(transition) = update.transition {
                if !self.is_current(generation) {
                    return;
                }
                tracing::info!(
                    engine = %self.name,
                    from = transition.from.label(),
                    to = transition.to.label(),
                    "Connection state changed"
                );
                registry.publish_connection(transition.to);
            }
            if let Some(snapshot) = &update.snapshot {
                if !self.is_current(generation) {
                    return;
                }
                registry.publish_snapshot(snapshot.clone());
            }
            if let Some(alerts) = &update.alerts {
                if !self.is_current(generation) {
                    return;
                }
                registry.publish_alerts(alerts.clone());
            }
            if let Some(stats) = &update.stats {
                if !self.is_current(generation) {
                    return;
                }
                registry.publish_stats(stats.clone());
            }
        }

        if !self.is_current(generation) {
            return;
        }
        self.notify(&update);
    }

    fn notify(&self, update: &Update) {
        let policy = &self.config.notifications;

        if let Some(transition) = update.transition {
            let kind = match transition.to {
                ConnectionState::Connected => Some(EventKind::ConnectionEstablished),
                ConnectionState::Error => Some(EventKind::ConnectionLost),
                ConnectionState::Disconnected => None,
            };
            if let Some(kind) = kind.filter(|k| policy.allows(*k)) {
                let payload = NotificationPayload::for_connection(
                    transition.to,
                    self.source.description(),
                    update.error.as_deref(),
                );
                self.dispatch(kind, &payload);
            }
        }

        for event in &update.events {
            let kind = event.kind();
            if policy.allows(kind) {
                self.dispatch(kind, &NotificationPayload::for_event(event, policy.vibrate));
            }
        }
    }

    fn dispatch(&self, kind: EventKind, payload: &NotificationPayload) {
        match catch_unwind(AssertUnwindSafe(|| self.dispatcher.dispatch(kind, payload))) {
            Ok(Ok(())) => {
                tracing::debug!(engine = %self.name, kind = kind.as_str(), "Notification dispatched");
            }
            Ok(Err(e)) => {
                tracing::warn!(engine = %self.name, kind = kind.as_str(), error = %e, "Notification failed");
            }
            Err(_) => {
                tracing::error!(engine = %self.name, kind = kind.as_str(), "Notification dispatcher panicked");
            }
        }
    }
}

async fn run_scheduler(
    inner: Weak<Inner>,
    generation: u64,
    mut stop_rx: watch::Receiver<bool>,
    mut interval_rx: watch::Receiver<Duration>,
) {
    let period = *interval_rx.borrow_and_update();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = stop_rx.changed() => break,
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let period = *interval_rx.borrow_and_update();
                ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.run_cycle(generation).await;
                if !inner.is_current(generation) {
                    break;
                }
            }
        }
    }
}

/// Builder for a [`SyncEngine`].
#[derive(Debug)]
pub struct SyncEngineBuilder {
    source: Arc<dyn RecordSource>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    name: Option<String>,
    config: EngineConfig,
}

impl SyncEngineBuilder {
    fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            dispatcher: Arc::new(NoopDispatcher),
            name: None,
            config: EngineConfig::default(),
        }
    }

    /// Name used in logs. Defaults to the source description.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Where notifications go. Defaults to [`NoopDispatcher`].
    pub fn dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine. Nothing runs until `start` or the first snapshot
    /// subscription.
    pub fn build(self) -> SyncEngine {
        let config = self.config.normalized();
        let name = self
            .name
            .unwrap_or_else(|| self.source.description().to_string());
        SyncEngine {
            inner: Arc::new(Inner {
                name,
                source: self.source,
                dispatcher: self.dispatcher,
                interval: Mutex::new(config.poll_interval),
                registry: Registry::new(),
                state: Mutex::new(EngineState::new(&config)),
                scheduler: Mutex::new(None),
                in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                publish: ReentrantMutex::new(()),
                config,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sitewatch_types::{CategoryKey, ScanOutcome};

    use super::*;
    use crate::config::{NotablePolicy, RetryPolicy};
    use crate::dispatch::testing::RecordingDispatcher;
    use crate::source::testing::ScriptedSource;

    fn level(n: u32, total: u32, free: u32) -> Vec<RawRecord> {
        (0..total)
            .map(|i| RawRecord::occupancy(format!("L{}-{}", n, i), i >= free).at(format!("Level {}", n)))
            .collect()
    }

    fn engine(source: Arc<ScriptedSource>, config: EngineConfig) -> (SyncEngine, Arc<RecordingDispatcher>) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let engine = SyncEngine::builder(source)
            .name("test")
            .dispatcher(dispatcher.clone())
            .config(config)
            .build();
        (engine, dispatcher)
    }

    fn collect<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |value: &T| sink.lock().push(value.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn five_timeouts_enter_error_once() {
        let mut script = vec![Ok(level(1, 10, 4))];
        script.extend((0..5).map(|_| Err(FetchError::Timeout(Duration::from_secs(10)))));
        let source = Arc::new(ScriptedSource::new(script));
        let config = EngineConfig::default()
            .with_poll_interval(Duration::from_secs(5))
            .with_max_consecutive_failures(5)
            .with_retry(RetryPolicy::none());
        let (engine, dispatcher) = engine(source.clone(), config);

        let (states, on_state) = collect::<ConnectionState>();
        let _conn = engine.subscribe_connection(on_state);
        let (snapshots, on_snapshot) = collect::<Snapshot>();
        let _snaps = engine.subscribe_snapshots(on_snapshot);
        assert!(engine.is_running());

        // Ticks at 0s (success) then 5, 10, 15, 20, 25 (failures).
        tokio::time::sleep(Duration::from_millis(27_500)).await;
        engine.stop();

        assert_eq!(source.calls(), 6);
        assert_eq!(
            *states.lock(),
            vec![
                ConnectionState::Disconnected,
                ConnectionState::Connected,
                ConnectionState::Error,
                ConnectionState::Disconnected,
            ]
        );

        let snapshots = snapshots.lock();
        assert_eq!(snapshots.len(), 6);
        assert!(snapshots[0].is_live);
        let stale: Vec<_> = snapshots.iter().filter(|s| !s.is_live).collect();
        assert_eq!(stale.len(), 5);
        assert!(stale.iter().all(|s| s.error.as_deref().is_some_and(|e| e.contains("timed out"))));
        assert!(stale.iter().all(|s| s.available == 4));

        assert_eq!(dispatcher.count(EventKind::ConnectionEstablished), 1);
        assert_eq!(dispatcher.count(EventKind::ConnectionLost), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_all_callbacks() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(level(1, 4, 2))]));
        let config = EngineConfig::default().with_poll_interval(Duration::from_secs(1));
        let (engine, _) = engine(source.clone(), config);

        let (snapshots, on_snapshot) = collect::<Snapshot>();
        let _snaps = engine.subscribe_snapshots(on_snapshot);
        let (stats, on_stats) = collect::<Stats>();
        let _stats = engine.subscribe_stats(on_stats);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        engine.stop();
        engine.stop();
        let delivered = snapshots.lock().len();
        let delivered_stats = stats.lock().len();
        let calls = source.calls();
        assert_eq!(delivered, 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(snapshots.lock().len(), delivered);
        assert_eq!(stats.lock().len(), delivered_stats);
        assert_eq!(source.calls(), calls);
        assert!(!engine.is_running());
        assert_eq!(engine.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_from_inside_a_callback() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(level(1, 4, 2))]));
        let config = EngineConfig::default().with_poll_interval(Duration::from_secs(1));
        let (engine, _) = engine(source.clone(), config);

        let stopper = engine.clone();
        let (stats, on_stats) = collect::<Stats>();
        let _stats = engine.subscribe_stats(on_stats);
        let _snaps = engine.subscribe_snapshots(move |_| stopper.stop());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls(), 1);
        assert!(!engine.is_running());
        // Stats come after snapshots in the same cycle and are dropped.
        assert!(stats.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn category_going_from_full_to_available() {
        let mut full = level(1, 10, 0);
        full.extend(level(2, 10, 5));
        let mut improved = level(1, 10, 3);
        improved.extend(level(2, 10, 5));
        let source = Arc::new(ScriptedSource::new(vec![Ok(full), Ok(improved)]));
        let (engine, dispatcher) = engine(source, EngineConfig::default().with_auto_start(false));

        assert_eq!(engine.poll_now().await, CycleOutcome::Updated);
        assert_eq!(dispatcher.kinds(), vec![EventKind::ConnectionEstablished]);

        assert_eq!(engine.poll_now().await, CycleOutcome::Updated);
        let sent = dispatcher.sent.lock();
        let improved: Vec<_> = sent
            .iter()
            .filter(|(kind, _)| *kind == EventKind::CategoryImproved)
            .collect();
        assert_eq!(improved.len(), 1);
        assert_eq!(improved[0].1.category.as_deref(), Some("Level 1"));
        assert_eq!(
            sent.iter().filter(|(kind, _)| *kind == EventKind::AvailabilityIncreased).count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_notable_record_alerts_once() {
        let window = || {
            vec![
                RawRecord::scan("evt-1", ScanOutcome::Threat).at("Gate A"),
                RawRecord::scan("evt-2", ScanOutcome::Clear).at("Gate A"),
            ]
        };
        let source = Arc::new(ScriptedSource::new(vec![Ok(window()), Ok(window())]));
        let config = EngineConfig::default()
            .with_auto_start(false)
            .with_notable(NotablePolicy::anomalous_scans());
        let (engine, dispatcher) = engine(source, config);

        let (lists, on_alerts) = collect::<Arc<[Alert]>>();
        let _alerts = engine.subscribe_alerts(on_alerts);

        engine.poll_now().await;
        engine.poll_now().await;

        assert_eq!(dispatcher.count(EventKind::NotableRecord), 1);
        assert_eq!(engine.alerts().len(), 1);
        assert_eq!(lists.lock().len(), 1);
        let alert = &engine.alerts()[0];
        assert_eq!(alert.event.category(), Some(&CategoryKey::from("Gate A")));
        assert_eq!(engine.stats().map(|s| s.notable_seen), Some(1));
        assert_eq!(engine.status().tracked_ids, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_back_off_within_a_cycle() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::Status(503)),
            Err(FetchError::Connection("refused".to_string())),
            Ok(level(1, 2, 1)),
        ]));
        let (engine, _) = engine(source.clone(), EngineConfig::default().with_auto_start(false));

        let started = Instant::now();
        assert_eq!(engine.poll_now().await, CycleOutcome::Updated);
        // 1s then 2s of backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(source.calls(), 3);
        assert_eq!(engine.status().failed_attempts, 2);
        assert_eq!(engine.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_give_up_after_max_attempts() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(level(1, 2, 1)),
            Err(FetchError::Status(500)),
        ]));
        let config = EngineConfig::default()
            .with_auto_start(false)
            .with_retry(RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            });
        let (engine, _) = engine(source.clone(), config);
        let (snapshots, on_snapshot) = collect::<Snapshot>();
        let _snaps = engine.subscribe_snapshots(on_snapshot);

        engine.poll_now().await;
        assert_eq!(engine.poll_now().await, CycleOutcome::Stale);
        assert_eq!(source.calls(), 4);
        // One live, then one stale per failed attempt.
        assert_eq!(snapshots.lock().iter().filter(|s| !s.is_live).count(), 3);
        assert_eq!(engine.status().consecutive_failures, 3);
        assert_eq!(engine.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycles_are_skipped() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(level(1, 2, 1))]).with_delay(Duration::from_secs(3)));
        let (engine, _) = engine(source.clone(), EngineConfig::default().with_auto_start(false));

        let (first, second) = tokio::join!(engine.poll_now(), engine.poll_now());
        assert_eq!(first, CycleOutcome::Updated);
        assert_eq!(second, CycleOutcome::Skipped);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_times_out() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(Vec::new())]).with_delay(Duration::from_secs(60)));
        let config = EngineConfig::default()
            .with_auto_start(false)
            .with_retry(RetryPolicy::none())
            .with_fetch_timeout(Duration::from_secs(10));
        let (engine, _) = engine(source, config);

        let started = Instant::now();
        assert_eq!(engine.poll_now().await, CycleOutcome::Stale);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        let status = engine.status();
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_error.is_some_and(|e| e.contains("timed out")));
        assert!(engine.current_snapshot().is_none());
    }

    #[derive(Debug)]
    struct PanickingSource;

    #[async_trait]
    impl RecordSource for PanickingSource {
        async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
            panic!("backend client bug");
        }

        fn description(&self) -> &str {
            "panicking"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_source_counts_as_failure() {
        let engine = SyncEngine::builder(Arc::new(PanickingSource))
            .config(EngineConfig::default().with_auto_start(false).with_retry(RetryPolicy::none()))
            .build();
        assert_eq!(engine.name(), "panicking");
        assert_eq!(engine.poll_now().await, CycleOutcome::Stale);
        assert_eq!(engine.status().failed_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_batch_is_a_failure() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![RawRecord::occupancy("", true)])]));
        let config = EngineConfig::default().with_auto_start(false).with_retry(RetryPolicy::none());
        let (engine, _) = engine(source, config);
        assert_eq!(engine.poll_now().await, CycleOutcome::Stale);
        assert!(engine.status().last_error.is_some_and(|e| e.contains("empty id")));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_dispatcher_does_not_fail_the_cycle() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(level(1, 2, 0)), Ok(level(1, 2, 2))]));
        let dispatcher = Arc::new(RecordingDispatcher::failing());
        let engine = SyncEngine::builder(source)
            .dispatcher(dispatcher.clone())
            .config(EngineConfig::default().with_auto_start(false))
            .build();

        assert_eq!(engine.poll_now().await, CycleOutcome::Updated);
        assert_eq!(engine.poll_now().await, CycleOutcome::Updated);
        assert_eq!(dispatcher.sent.lock().len(), 3);
    }

    #[derive(Debug, Default)]
    struct PanickingDispatcher {
        calls: AtomicU64,
    }

    impl NotificationDispatcher for PanickingDispatcher {
        fn dispatch(&self, _kind: EventKind, _payload: &NotificationPayload) -> Result<(), crate::DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("notification service bug");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_dispatcher_does_not_fail_the_cycle() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(level(1, 2, 0)), Ok(level(1, 2, 2))]));
        let dispatcher = Arc::new(PanickingDispatcher::default());
        let engine = SyncEngine::builder(source)
            .dispatcher(dispatcher.clone())
            .config(EngineConfig::default().with_auto_start(false))
            .build();
        let (snapshots, on_snapshot) = collect::<Snapshot>();
        let _snaps = engine.subscribe_snapshots(on_snapshot);

        assert_eq!(engine.poll_now().await, CycleOutcome::Updated);
        assert_eq!(engine.poll_now().await, CycleOutcome::Updated);

        // Connection established, then availability and category improvements.
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
        let snapshots = snapshots.lock();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].available, 2);
        assert_eq!(engine.connection_state(), ConnectionState::Connected);
        assert_eq!(engine.status().cycles, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn notification_policy_filters_dispatches() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(level(1, 2, 0)), Ok(level(1, 2, 2))]));
        let config = EngineConfig::default()
            .with_auto_start(false)
            .with_notifications(crate::config::NotificationPolicy::disabled());
        let (engine, dispatcher) = engine(source, config);
        engine.poll_now().await;
        engine.poll_now().await;
        assert!(dispatcher.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn late_subscribers_get_last_values() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(level(1, 5, 5))]));
        let (engine, _) = engine(source, EngineConfig::default().with_auto_start(false));
        engine.poll_now().await;

        let (stats, on_stats) = collect::<Stats>();
        let _sub = engine.subscribe_stats(on_stats);
        let stats = stats.lock();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].available, 5);
        assert_eq!(stats[0].cycles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_interval_restarts_timer() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(level(1, 2, 1))]));
        let config = EngineConfig::default().with_poll_interval(Duration::from_secs(10));
        let (engine, _) = engine(source.clone(), config);
        engine.start().unwrap();
        engine.start().unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        engine.set_interval(Duration::from_secs(2));
        assert_eq!(engine.interval(), Duration::from_secs(2));

        // Cycles at 0s, 2.5s and 4.5s.
        tokio::time::sleep(Duration::from_millis(4_600)).await;
        assert_eq!(source.calls(), 3);
        engine.stop();
    }

    #[test]
    fn start_requires_a_runtime() {
        let source = Arc::new(ScriptedSource::new(Vec::new()));
        let (engine, _) = engine(source, EngineConfig::default());
        let _sub = engine.subscribe_snapshots(|_| {});
        assert!(!engine.is_running());
        assert_eq!(engine.start(), Err(EngineError::NoRuntime));
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledge_and_reset() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(vec![
            RawRecord::scan("evt-1", ScanOutcome::Suspicious),
            RawRecord::scan("evt-2", ScanOutcome::Threat),
        ])]));
        let config = EngineConfig::default()
            .with_auto_start(false)
            .with_notable(NotablePolicy::anomalous_scans());
        let (engine, _) = engine(source, config);
        engine.poll_now().await;

        let newest = engine.alerts()[0].id;
        let acked = engine.acknowledge_alert(newest, "ops", None).unwrap();
        assert!(acked.acknowledged);
        assert_eq!(engine.stats().map(|s| s.open_alerts), Some(1));
        assert_eq!(
            engine.acknowledge_alert(999, "ops", None),
            Err(EngineError::AlertNotFound(999))
        );

        engine.reset();
        assert!(engine.alerts().is_empty());
        assert!(engine.current_snapshot().is_none());
        assert!(engine.stats().is_none());
        assert_eq!(engine.status().tracked_ids, 0);
        assert_eq!(engine.connection_state(), ConnectionState::Connected);
    }
}

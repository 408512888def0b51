//! Reconnecting duplex progress channel
//!
//! One [`ProgressChannel`] owns one long-lived connection to a counterparty,
//! carrying newline-delimited JSON [`WireMessage`]s both ways. The handle is
//! explicitly constructed and cloneable; there is no ambient process-wide
//! channel. Subscribe/unsubscribe calls are mirrored to the counterparty as
//! control messages so its fan-out tracks local listener state.
//!
//! On unexpected closure the channel reconnects with linearly increasing
//! delay (attempt N waits `base_delay * N`) up to a fixed attempt budget.
//! Exhausting the budget surfaces a [`SeqscopeError::Connection`] to every
//! registered error observer and stops; the analysis runs themselves are
//! unaffected and continue without live progress. Prior subscriptions are
//! not replayed after a reconnect unless
//! [`ChannelConfig::resubscribe_on_reconnect`] is set.

use crate::error::{Result, SeqscopeError};
use crate::progress::event::{ProgressEvent, WireMessage};
use crate::progress::ProgressSink;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Callback invoked with each progress event for a subscribed job
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Callback invoked when the channel gives up reconnecting
pub type ErrorCallback = Arc<dyn Fn(&SeqscopeError) + Send + Sync>;

/// Reconnect and replay behavior of a [`ProgressChannel`]
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base reconnect delay; attempt N waits `base_delay * N`
    pub base_delay: Duration,
    /// Reconnect attempts before giving up and notifying error observers
    pub max_reconnect_attempts: u32,
    /// Re-send `subscribe` control messages for live jobs after a reconnect
    pub resubscribe_on_reconnect: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_reconnect_attempts: 5,
            resubscribe_on_reconnect: false,
        }
    }
}

struct ChannelInner {
    addr: String,
    config: ChannelConfig,
    listeners: Mutex<HashMap<String, Vec<(u64, ProgressCallback)>>>,
    error_observers: Mutex<Vec<(u64, ErrorCallback)>>,
    next_id: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<WireMessage>>>,
    connected: AtomicBool,
    shutdown: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one duplex progress connection
///
/// Cheap to clone (shared inner state). All methods are safe to call
/// concurrently from multiple logical callers. Events for a single job id
/// are dispatched to that job's callbacks in registration order, FIFO with
/// respect to publication; no ordering holds across different job ids.
#[derive(Clone)]
pub struct ProgressChannel {
    inner: Arc<ChannelInner>,
}

impl ProgressChannel {
    /// Connect to a counterparty
    ///
    /// # Errors
    ///
    /// [`SeqscopeError::Connection`] when the initial handshake fails; the
    /// reconnect budget only applies to later unexpected closures.
    pub async fn connect(addr: impl Into<String>, config: ChannelConfig) -> Result<Self> {
        let addr = addr.into();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|err| SeqscopeError::Connection(format!("connect to {addr} failed: {err}")))?;
        info!(%addr, "progress channel connected");

        // The sender is installed before the io task spawns so a subscribe
        // or send issued right after connect() cannot find it missing.
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ChannelInner {
            addr,
            config,
            listeners: Mutex::new(HashMap::new()),
            error_observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            outbound: Mutex::new(Some(tx)),
            connected: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
        });
        tokio::spawn(io_loop(Arc::clone(&inner), stream, rx));
        Ok(Self { inner })
    }

    /// Whether the underlying connection is currently up
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Register a callback for one job's progress events
    ///
    /// A `subscribe` control message is mirrored to the counterparty. The
    /// returned [`Subscription`] must be unsubscribed explicitly; dropping
    /// it leaves the callback registered.
    pub fn subscribe<F>(&self, job_id: &str, callback: F) -> Subscription
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let callback_id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.listeners)
            .entry(job_id.to_string())
            .or_default()
            .push((callback_id, Arc::new(callback)));
        self.send_wire(WireMessage::Subscribe { job_id: job_id.to_string() });
        Subscription {
            inner: Arc::clone(&self.inner),
            job_id: job_id.to_string(),
            callback_id,
        }
    }

    /// Register an observer for terminal connection errors
    pub fn on_error<F>(&self, callback: F) -> ErrorObserver
    where
        F: Fn(&SeqscopeError) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.error_observers).push((id, Arc::new(callback)));
        ErrorObserver { inner: Arc::clone(&self.inner), id }
    }

    /// Publish a progress event to the counterparty
    ///
    /// Returns `false` (with a warning) when the channel is not connected;
    /// the event is dropped, not queued.
    pub fn send(&self, event: &ProgressEvent) -> bool {
        let sent = self.send_wire(WireMessage::AnalysisProgress(event.clone()));
        if !sent {
            warn!(job_id = %event.job_id, "progress channel is not connected, dropping event");
        }
        sent
    }

    /// Close the connection and clear all listeners and error observers
    ///
    /// Suppresses any further reconnect attempts.
    pub fn disconnect(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.connected.store(false, Ordering::SeqCst);
        // Dropping the sender ends the writer side and unwinds the io task
        lock(&self.inner.outbound).take();
        lock(&self.inner.listeners).clear();
        lock(&self.inner.error_observers).clear();
    }

    fn send_wire(&self, msg: WireMessage) -> bool {
        match &*lock(&self.inner.outbound) {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }
}

impl ProgressSink for ProgressChannel {
    fn publish(&self, event: ProgressEvent) {
        self.send(&event);
    }
}

/// Registration of one progress callback for one job
///
/// Explicit [`unsubscribe`](Subscription::unsubscribe) is the only removal
/// path; there is no automatic expiry and `Drop` does nothing.
pub struct Subscription {
    inner: Arc<ChannelInner>,
    job_id: String,
    callback_id: u64,
}

impl Subscription {
    /// Job id this subscription is registered for
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Remove the callback; further events for the job no longer reach it
    ///
    /// When the job's callback list becomes empty, the job entry is removed
    /// and an `unsubscribe` control message is mirrored to the counterparty.
    pub fn unsubscribe(self) {
        let mut listeners = lock(&self.inner.listeners);
        let now_empty = match listeners.get_mut(&self.job_id) {
            Some(list) => {
                list.retain(|(id, _)| *id != self.callback_id);
                list.is_empty()
            }
            None => false,
        };
        if now_empty {
            listeners.remove(&self.job_id);
            drop(listeners);
            if let Some(tx) = &*lock(&self.inner.outbound) {
                let _ = tx.send(WireMessage::Unsubscribe { job_id: self.job_id.clone() });
            }
        }
    }
}

/// Registration of one connection-error observer
pub struct ErrorObserver {
    inner: Arc<ChannelInner>,
    id: u64,
}

impl ErrorObserver {
    /// Remove the observer
    pub fn remove(self) {
        lock(&self.inner.error_observers).retain(|(id, _)| *id != self.id);
    }
}

async fn io_loop(
    inner: Arc<ChannelInner>,
    mut stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<WireMessage>,
) {
    loop {
        run_connection(&inner, stream, outbound).await;

        inner.connected.store(false, Ordering::SeqCst);
        lock(&inner.outbound).take();
        if inner.shutdown.load(Ordering::SeqCst) {
            return;
        }

        match reconnect(&inner).await {
            Some(next) => {
                stream = next;
                let (tx, rx) = mpsc::unbounded_channel();
                if inner.config.resubscribe_on_reconnect {
                    for job_id in lock(&inner.listeners).keys() {
                        let _ = tx.send(WireMessage::Subscribe { job_id: job_id.clone() });
                    }
                }
                *lock(&inner.outbound) = Some(tx);
                inner.connected.store(true, Ordering::SeqCst);
                outbound = rx;
            }
            None => {
                if !inner.shutdown.load(Ordering::SeqCst) {
                    let err = SeqscopeError::Connection(format!(
                        "gave up after {} reconnect attempts",
                        inner.config.max_reconnect_attempts
                    ));
                    notify_error(&inner, &err);
                }
                return;
            }
        }
    }
}

/// Drive one live connection until it closes or `disconnect` drops the sender
async fn run_connection(
    inner: &Arc<ChannelInner>,
    stream: TcpStream,
    mut outbound: mpsc::UnboundedReceiver<WireMessage>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(inner, &line),
                Ok(None) => {
                    debug!("connection closed by peer");
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "connection read failed");
                    return;
                }
            },
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let mut payload = match serde_json::to_string(&msg) {
                        Ok(payload) => payload,
                        Err(err) => {
                            warn!(error = %err, "dropping unserializable wire message");
                            continue;
                        }
                    };
                    payload.push('\n');
                    if let Err(err) = write_half.write_all(payload.as_bytes()).await {
                        warn!(error = %err, "connection write failed");
                        return;
                    }
                }
                None => return,
            },
        }
    }
}

fn handle_line(inner: &ChannelInner, line: &str) {
    match serde_json::from_str::<WireMessage>(line) {
        Ok(WireMessage::AnalysisProgress(event)) => dispatch_event(inner, &event),
        Ok(other) => debug!(?other, "ignoring inbound control message"),
        Err(err) => warn!(error = %err, "failed to parse inbound message"),
    }
}

/// Fan one event out to the job's callbacks in registration order
///
/// Each callback is re-checked against the listener table before invocation
/// so an unsubscribe racing this dispatch stops delivery. A panicking
/// callback must not prevent delivery to the remaining callbacks.
fn dispatch_event(inner: &ChannelInner, event: &ProgressEvent) {
    let snapshot: Vec<(u64, ProgressCallback)> = match lock(&inner.listeners).get(&event.job_id) {
        Some(list) => list.clone(),
        None => return,
    };
    for (id, callback) in snapshot {
        let still_registered = lock(&inner.listeners)
            .get(&event.job_id)
            .is_some_and(|list| list.iter().any(|(entry_id, _)| *entry_id == id));
        if !still_registered {
            continue;
        }
        if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
            warn!(job_id = %event.job_id, "progress callback panicked");
        }
    }
}

fn notify_error(inner: &ChannelInner, err: &SeqscopeError) {
    let observers: Vec<(u64, ErrorCallback)> = lock(&inner.error_observers).clone();
    for (_, observer) in observers {
        if catch_unwind(AssertUnwindSafe(|| observer(err))).is_err() {
            warn!("error observer panicked");
        }
    }
}

/// Attempt to re-establish the connection within the configured budget
async fn reconnect(inner: &ChannelInner) -> Option<TcpStream> {
    for attempt in 1..=inner.config.max_reconnect_attempts {
        tokio::time::sleep(inner.config.base_delay * attempt).await;
        if inner.shutdown.load(Ordering::SeqCst) {
            return None;
        }
        info!(attempt, max = inner.config.max_reconnect_attempts, "reconnecting");
        match TcpStream::connect(&inner.addr).await {
            Ok(stream) => {
                info!(addr = %inner.addr, "progress channel reconnected");
                return Some(stream);
            }
            Err(err) => {
                warn!(attempt, error = %err, "reconnect attempt failed");
            }
        }
    }
    None
}

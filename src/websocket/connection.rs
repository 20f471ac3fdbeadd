use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::{Error, Result};
use crate::types::{ClientIdentity, Envelope};

use super::backoff::{ExponentialBackoff, ReconnectConfig};
use super::client::{EnvelopeSink, EnvelopeStream, PollWsClient};
use super::dispatch::{EventDispatcher, Subscription};

/// Lifecycle of a live connection.
///
/// Transitions are owned by the connection task, so two pending
/// reconnects cannot exist: a reconnect timer only runs while the state
/// is `Reconnecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection requested yet
    Idle,
    /// Transport handshake in progress
    Connecting,
    /// Transport open and authenticated
    Connected,
    /// Waiting out the backoff delay before attempt `n`
    Reconnecting(u32),
    /// Disconnected with no pending reconnect
    Closed,
}

/// Function that opens an authenticated transport for an identity.
///
/// The production connector is [`PollWsClient::connect`]; tests inject a
/// fake transport through [`LiveConnection::with_connector`].
pub type Connector = Box<
    dyn Fn(ClientIdentity) -> BoxFuture<'static, Result<(EnvelopeSink, EnvelopeStream)>>
        + Send
        + Sync,
>;

struct Shared {
    connector: Connector,
    config: ReconnectConfig,
    identity: RwLock<Option<ClientIdentity>>,
    state: RwLock<ConnectionState>,
    /// Write half of the current transport; `Some` only while connected
    sink: Mutex<Option<EnvelopeSink>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Guard against overlapping connection tasks
    active: AtomicBool,
}

impl Shared {
    async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
        tracing::trace!(?state, "connection state changed");
    }
}

/// Manager for one logical realtime connection.
///
/// Owns at most one live transport, re-establishes it on drop with
/// exponential backoff, re-sends the authentication handshake on every
/// reconnect, and delivers inbound events to subscribed listeners.
/// Construct one per UI surface and inject it where events are consumed;
/// it is not a global.
///
/// # Example
///
/// ```no_run
/// use livepoll_rs::types::{ClientIdentity, DepartmentId, SubjectId, UserId, POLL_VOTE};
/// use livepoll_rs::websocket::{LiveConnection, PollWsClient, ReconnectConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let client = PollWsClient::new("wss://learn.example.edu/ws/live");
///     let connection = LiveConnection::new(client, ReconnectConfig::default());
///
///     let _votes = connection.subscribe(POLL_VOTE, |data| {
///         println!("poll update: {data}");
///     });
///
///     let identity = ClientIdentity::new(
///         UserId::new(42),
///         DepartmentId::new(3),
///         vec![SubjectId::new(11)],
///     );
///     connection.initialize(identity).await;
///
///     tokio::signal::ctrl_c().await.ok();
///     connection.disconnect().await;
/// }
/// ```
pub struct LiveConnection {
    shared: Arc<Shared>,
    dispatcher: EventDispatcher,
}

impl LiveConnection {
    /// Create a manager that connects through the given client
    pub fn new(client: PollWsClient, config: ReconnectConfig) -> Self {
        let connector: Connector = Box::new(move |identity| {
            let client = client.clone();
            let fut: BoxFuture<'static, Result<(EnvelopeSink, EnvelopeStream)>> =
                Box::pin(async move { client.connect(&identity).await });
            fut
        });
        Self::with_connector(connector, config)
    }

    /// Create a manager over a custom transport connector
    pub fn with_connector(connector: Connector, config: ReconnectConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                identity: RwLock::new(None),
                state: RwLock::new(ConnectionState::Idle),
                sink: Mutex::new(None),
                stop: Mutex::new(None),
                task: Mutex::new(None),
                active: AtomicBool::new(false),
            }),
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Store the identity and open the connection.
    ///
    /// Idempotent: calling again while a connection is active only
    /// refreshes the stored identity, which takes effect on the next
    /// reconnect. Calling after the retry budget was exhausted starts a
    /// fresh connection.
    pub async fn initialize(&self, identity: ClientIdentity) {
        *self.shared.identity.write().await = Some(identity);
        self.connect().await;
    }

    /// Open the connection if no attempt is already active.
    ///
    /// A no-op while connecting, connected, or waiting to reconnect.
    pub async fn connect(&self) {
        if self.shared.identity.read().await.is_none() {
            tracing::warn!("connect called before initialize, ignoring");
            return;
        }
        if self.shared.active.swap(true, Ordering::SeqCst) {
            tracing::debug!("connection attempt already active, ignoring connect");
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.shared.stop.lock().await = Some(stop_tx);

        let shared = Arc::clone(&self.shared);
        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(run(shared, dispatcher, stop_rx));
        *self.shared.task.lock().await = Some(handle);
    }

    /// Send a `{type, data}` envelope to the server.
    ///
    /// Returns `false` without performing any I/O when the connection is
    /// not currently open; callers are expected to check the result.
    pub async fn send(&self, kind: &str, data: Value) -> bool {
        let mut sink = self.shared.sink.lock().await;
        match sink.as_mut() {
            Some(sink) => match sink.send(Envelope::new(kind, data)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(kind, error = %e, "send failed");
                    false
                }
            },
            None => {
                tracing::debug!(kind, "send ignored, not connected");
                false
            }
        }
    }

    /// Register a listener for an event kind; see [`EventDispatcher::subscribe`]
    pub fn subscribe(
        &self,
        kind: impl Into<String>,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.dispatcher.subscribe(kind, handler)
    }

    /// Cancel any pending reconnect and close the transport cleanly
    pub async fn disconnect(&self) {
        let stop = self.shared.stop.lock().await.take();
        if let Some(tx) = stop {
            let _ = tx.send(());
        }
        let task = self.shared.task.lock().await.take();
        if let Some(handle) = task {
            let _ = handle.await;
        }
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        *self.shared.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        // Best effort: stop the background task if nobody called disconnect
        if let Ok(mut stop) = self.shared.stop.try_lock() {
            if let Some(tx) = stop.take() {
                let _ = tx.send(());
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Exit {
    Stopped,
    Dropped,
}

/// Connection task: connect, pump events, reconnect with backoff.
async fn run(shared: Arc<Shared>, dispatcher: EventDispatcher, mut stop_rx: oneshot::Receiver<()>) {
    let mut backoff = ExponentialBackoff::from_config(&shared.config);
    let mut attempt: u32 = 0;

    loop {
        let Some(identity) = shared.identity.read().await.clone() else {
            break;
        };

        shared.set_state(ConnectionState::Connecting).await;
        let outcome = tokio::select! {
            result = (shared.connector)(identity) => Some(result),
            _ = &mut stop_rx => None,
        };

        match outcome {
            None => {
                shared.set_state(ConnectionState::Closed).await;
                break;
            }
            Some(Ok((sink, stream))) => {
                attempt = 0;
                backoff.reset();
                *shared.sink.lock().await = Some(sink);
                shared.set_state(ConnectionState::Connected).await;
                tracing::info!("live connection established");

                let exit = drive(&shared, stream, &dispatcher, &mut stop_rx).await;
                *shared.sink.lock().await = None;
                if exit == Exit::Stopped {
                    shared.set_state(ConnectionState::Closed).await;
                    break;
                }
                tracing::warn!("live connection dropped");
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "connect failed");
            }
        }

        attempt += 1;
        if let Some(max) = shared.config.max_attempts {
            if attempt > max {
                tracing::warn!(attempts = max, "reconnect attempts exhausted, giving up");
                shared.set_state(ConnectionState::Closed).await;
                break;
            }
        }

        let delay = backoff.next_delay();
        shared.set_state(ConnectionState::Reconnecting(attempt)).await;
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        tokio::select! {
            _ = sleep(delay) => {}
            _ = &mut stop_rx => {
                shared.set_state(ConnectionState::Closed).await;
                break;
            }
        }
    }

    shared.active.store(false, Ordering::SeqCst);
}

/// Pump one open transport until it drops or a stop is requested.
async fn drive(
    shared: &Shared,
    mut stream: EnvelopeStream,
    dispatcher: &EventDispatcher,
    stop_rx: &mut oneshot::Receiver<()>,
) -> Exit {
    loop {
        tokio::select! {
            _ = &mut *stop_rx => {
                if let Some(mut sink) = shared.sink.lock().await.take() {
                    let _ = sink.close().await;
                }
                return Exit::Stopped;
            }
            item = stream.next() => match item {
                Some(Ok(envelope)) => dispatcher.dispatch(&envelope),
                Some(Err(Error::ConnectionClosed)) => {
                    tracing::info!("server closed connection");
                    return Exit::Dropped;
                }
                // Malformed payloads are per-message: log and keep reading
                Some(Err(Error::Json(e))) => {
                    tracing::warn!(error = %e, "discarding malformed message");
                }
                // Transport errors precede the close; the stream ends next
                Some(Err(e)) => {
                    tracing::error!(error = %e, "transport error");
                }
                None => {
                    tracing::info!("connection stream ended");
                    return Exit::Dropped;
                }
            }
        }
    }
}

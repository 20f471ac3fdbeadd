use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::time::{sleep, Sleep};

use crate::error::{Error, Result};

use super::backoff::{ExponentialBackoff, ReconnectConfig};

/// State of the reconnecting stream
enum StreamState<S, Fut> {
    /// Currently connected and streaming
    Connected(S),
    /// Waiting out the backoff delay before attempt `attempt`
    Backoff { attempt: u32 },
    /// Connection attempt in progress
    Connecting {
        attempt: u32,
        future: Option<Pin<Box<Fut>>>,
    },
    /// Stream has been terminated
    Terminated,
}

/// A stream wrapper that automatically reconnects on disconnection
///
/// This wrapper provides resilient streaming by:
/// - Automatically reconnecting when the connection is lost
/// - Using exponential backoff between reconnection attempts
/// - Giving up silently once the attempt budget is spent (the stream
///   simply ends; consumers observe no more events rather than an error)
///
/// Because the connect function re-sends the authentication handshake,
/// every reconnect re-authenticates. Per-message decode errors pass
/// through to the consumer without tearing the stream down.
///
/// # Example
///
/// ```no_run
/// use livepoll_rs::types::{ClientIdentity, DepartmentId, SubjectId, UserId};
/// use livepoll_rs::websocket::{PollWsClient, ReconnectConfig, ReconnectingStream};
/// use futures_util::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = PollWsClient::new("wss://learn.example.edu/ws/live");
///     let identity = ClientIdentity::new(
///         UserId::new(42),
///         DepartmentId::new(3),
///         vec![SubjectId::new(11)],
///     );
///
///     let config = ReconnectConfig::default();
///     let mut stream = ReconnectingStream::new(config, move || {
///         let client = client.clone();
///         let identity = identity.clone();
///         async move { client.subscribe(&identity).await }
///     });
///
///     while let Some(envelope) = stream.next().await {
///         println!("Event: {:?}", envelope?);
///     }
///
///     Ok(())
/// }
/// ```
pub struct ReconnectingStream<T, S, F, Fut>
where
    S: Stream<Item = Result<T>> + Unpin,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    /// Function to create a new stream connection
    connect_fn: F,
    /// Current state of the stream
    state: StreamState<S, Fut>,
    /// Reconnection configuration
    config: ReconnectConfig,
    /// Exponential backoff calculator
    backoff: ExponentialBackoff,
    /// Sleep future for the backoff delay
    sleep_future: Option<Pin<Box<Sleep>>>,
}

impl<T, S, F, Fut> ReconnectingStream<T, S, F, Fut>
where
    S: Stream<Item = Result<T>> + Unpin,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    /// Create a new reconnecting stream
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration for reconnection behavior
    /// * `connect_fn` - Function that creates a new stream connection
    pub fn new(config: ReconnectConfig, connect_fn: F) -> Self {
        let backoff = ExponentialBackoff::from_config(&config);

        Self {
            connect_fn,
            state: StreamState::Connecting {
                attempt: 0,
                future: None,
            },
            config,
            backoff,
            sleep_future: None,
        }
    }

    /// Schedule reconnect attempt `attempt`, or terminate past the cap.
    ///
    /// Returns `false` when the stream terminated instead of scheduling.
    fn begin_backoff(&mut self, attempt: u32) -> bool {
        if let Some(max) = self.config.max_attempts {
            if attempt > max {
                tracing::warn!(attempts = max, "reconnect attempts exhausted, ending stream");
                self.state = StreamState::Terminated;
                return false;
            }
        }

        let delay = self.backoff.next_delay();
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        self.state = StreamState::Backoff { attempt };
        self.sleep_future = Some(Box::pin(sleep(delay)));
        true
    }
}

impl<T, S, F, Fut> Stream for ReconnectingStream<T, S, F, Fut>
where
    S: Stream<Item = Result<T>> + Unpin,
    F: Fn() -> Fut + Unpin,
    Fut: Future<Output = Result<S>>,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                StreamState::Connected(stream) => match Pin::new(stream).poll_next(cx) {
                    Poll::Ready(Some(Ok(item))) => {
                        return Poll::Ready(Some(Ok(item)));
                    }
                    Poll::Ready(Some(Err(Error::ConnectionClosed))) | Poll::Ready(None) => {
                        // Connection dropped: schedule the first reconnect
                        tracing::info!("stream disconnected, reconnecting");
                        if !this.begin_backoff(1) {
                            return Poll::Ready(None);
                        }
                    }
                    Poll::Ready(Some(Err(e))) => {
                        // Per-message errors pass through; a fatal
                        // transport error is followed by the stream ending
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => {
                        return Poll::Pending;
                    }
                },
                StreamState::Backoff { attempt } => {
                    let attempt = *attempt;
                    match this.sleep_future.as_mut() {
                        Some(sleep_fut) => match sleep_fut.as_mut().poll(cx) {
                            Poll::Ready(()) => {
                                this.sleep_future = None;
                                this.state = StreamState::Connecting {
                                    attempt,
                                    future: None,
                                };
                            }
                            Poll::Pending => {
                                return Poll::Pending;
                            }
                        },
                        None => {
                            this.state = StreamState::Connecting {
                                attempt,
                                future: None,
                            };
                        }
                    }
                }
                StreamState::Connecting { attempt, future } => {
                    let attempt = *attempt;
                    // Get or create the connection future
                    let mut connect_future = match future.take() {
                        Some(fut) => fut,
                        None => Box::pin((this.connect_fn)()),
                    };

                    match connect_future.as_mut().poll(cx) {
                        Poll::Ready(Ok(stream)) => {
                            this.backoff.reset();
                            this.state = StreamState::Connected(stream);
                        }
                        Poll::Ready(Err(e)) => {
                            tracing::warn!(error = %e, attempt, "connect failed");
                            if !this.begin_backoff(attempt + 1) {
                                return Poll::Ready(None);
                            }
                        }
                        Poll::Pending => {
                            // Store the future for the next poll
                            this.state = StreamState::Connecting {
                                attempt,
                                future: Some(connect_future),
                            };
                            return Poll::Pending;
                        }
                    }
                }
                StreamState::Terminated => {
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Envelope;
    use futures_util::{stream, StreamExt};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn fast_config(max_attempts: Option<u32>) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(50),
            multiplier: 1.5,
            max_attempts,
        }
    }

    fn envelope(kind: &str) -> Envelope {
        Envelope::new(kind, json!({}))
    }

    type ScriptedItems = Vec<Result<Envelope>>;

    /// Connect function that pops one scripted stream per call and
    /// refuses to connect once the script runs out.
    fn scripted_connect(
        scripts: Vec<ScriptedItems>,
    ) -> (
        impl Fn() -> std::future::Ready<Result<stream::Iter<std::vec::IntoIter<Result<Envelope>>>>>,
        Arc<AtomicUsize>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_fn = Arc::clone(&calls);
        let scripts = Arc::new(Mutex::new(VecDeque::from(scripts)));

        let connect_fn = move || {
            calls_in_fn.fetch_add(1, Ordering::SeqCst);
            let next = scripts.lock().unwrap().pop_front();
            std::future::ready(match next {
                Some(items) => Ok(stream::iter(items)),
                None => Err(Error::WebSocket("connection refused".to_string())),
            })
        };

        (connect_fn, calls)
    }

    #[tokio::test]
    async fn test_resumes_across_connection_drops() {
        let (connect_fn, calls) = scripted_connect(vec![
            vec![
                Ok(envelope("poll:vote")),
                Ok(envelope("poll:vote")),
                Err(Error::ConnectionClosed),
            ],
            vec![Ok(envelope("poll:closed"))],
        ]);

        let mut stream = ReconnectingStream::new(fast_config(Some(3)), connect_fn);

        let mut kinds = Vec::new();
        while let Some(item) = stream.next().await {
            kinds.push(item.unwrap().kind);
        }

        // Both connections were consumed, then three refused reconnects
        assert_eq!(kinds, vec!["poll:vote", "poll:vote", "poll:closed"]);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_ends_silently_after_attempt_budget() {
        let (connect_fn, calls) = scripted_connect(vec![]);

        let mut stream = ReconnectingStream::new(fast_config(Some(2)), connect_fn);

        assert!(stream.next().await.is_none());
        // Initial attempt plus two reconnects
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_decode_errors_pass_through_without_reconnect() {
        let bad = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let (connect_fn, calls) = scripted_connect(vec![vec![
            Err(Error::Json(bad)),
            Ok(envelope("poll:vote")),
            Err(Error::ConnectionClosed),
        ]]);

        let mut stream = ReconnectingStream::new(fast_config(Some(0)), connect_fn);

        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(Error::Json(_))));

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.kind, "poll:vote");

        // The decode error did not burn a connection; only the close does
        assert!(stream.next().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

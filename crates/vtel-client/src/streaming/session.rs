//! Stream client and session implementation

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::parser::LineParser;
use super::types::{StreamError, StreamEvent, StreamResult, StreamState, STREAM_COLUMNS};
use crate::types::VehicleHandle;

/// Body of the streaming response
type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Owns the streaming tokens of one vehicle and opens sessions with them
///
/// Each [`connect`](Self::connect) consumes one token. Reconnecting after a
/// session ends is up to the caller.
///
/// # Example
///
/// ```ignore
/// let mut stream = client.stream(&mut vehicle);
/// let mut session = stream.connect().await?;
///
/// while let Some(item) = session.next().await {
///     match item {
///         Ok(event) => println!("speed={:?}", event.speed),
///         Err(e) if e.is_terminal() => break,
///         Err(e) => eprintln!("{}", e),
///     }
/// }
/// ```
pub struct StreamClient {
    http: Client,
    streaming_url: Url,
    handle: VehicleHandle,
    channel_capacity: usize,
    state: Arc<watch::Sender<StreamState>>,
    /// Bumped on every connect; only the matching session may publish state
    generation: Arc<AtomicU64>,
}

impl StreamClient {
    pub(crate) fn new(
        http: Client,
        streaming_url: Url,
        handle: VehicleHandle,
        channel_capacity: usize,
    ) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        Self {
            http,
            streaming_url,
            handle,
            channel_capacity: channel_capacity.max(1),
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn vehicle_id(&self) -> u64 {
        self.handle.vehicle_id()
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub fn remaining_tokens(&self) -> usize {
        self.handle.remaining_tokens()
    }

    /// URL of the streaming endpoint for this vehicle
    pub fn stream_url(&self) -> StreamResult<Url> {
        let mut url = self.streaming_url.clone();
        url.path_segments_mut()
            .map_err(|_| StreamError::InvalidUrl(self.streaming_url.to_string()))?
            .pop_if_empty()
            .push(&self.handle.vehicle_id().to_string())
            .push("");
        url.query_pairs_mut()
            .append_pair("values", &STREAM_COLUMNS.join(","));
        Ok(url)
    }

    /// Open a session with the next unused token
    pub async fn connect(&mut self) -> StreamResult<StreamSession> {
        if self.state() == StreamState::Streaming {
            return Err(StreamError::SessionActive);
        }

        // Retire any earlier session before touching the state
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(token) = self.handle.next_token() else {
            warn!(vehicle_id = self.vehicle_id(), "Streaming tokens exhausted");
            self.state.send_replace(StreamState::Exhausted);
            return Err(StreamError::TokensExhausted);
        };
        self.state.send_replace(StreamState::Connecting);

        match self.open(&token).await {
            Ok(body) => {
                self.state.send_replace(StreamState::Streaming);
                let publisher = StatePublisher {
                    state: self.state.clone(),
                    current: self.generation.clone(),
                    generation,
                };
                let session = StreamSession::spawn(body, self.channel_capacity, publisher);
                info!(
                    vehicle_id = self.vehicle_id(),
                    remaining_tokens = self.remaining_tokens(),
                    "Stream connected"
                );
                Ok(session)
            }
            Err(e) => {
                self.state.send_replace(StreamState::Disconnected);
                Err(e)
            }
        }
    }

    async fn open(&self, token: &str) -> StreamResult<ByteStream> {
        let url = self.stream_url()?;
        debug!("Connecting to telemetry stream: {}", url);

        let response = self
            .http
            .get(url)
            .basic_auth(self.handle.vehicle_id(), Some(token))
            .header(ACCEPT, "text/plain")
            .send()
            .await
            .map_err(StreamError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(StreamError::Server { status, message });
        }

        Ok(Box::pin(response.bytes_stream()))
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("vehicle_id", &self.handle.vehicle_id())
            .field("remaining_tokens", &self.handle.remaining_tokens())
            .field("state", &self.state())
            .finish()
    }
}

/// State writer owned by one session
///
/// Writes are dropped once a newer `connect()` has started, so a stale
/// session cannot overwrite the state of its successor.
#[derive(Clone, Debug)]
struct StatePublisher {
    state: Arc<watch::Sender<StreamState>>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl StatePublisher {
    fn publish(&self, next: StreamState) {
        self.state.send_if_modified(|state| {
            if self.current.load(Ordering::SeqCst) != self.generation || *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

/// An open telemetry stream
///
/// Decoded events and errors arrive on two independent channels. Malformed
/// lines produce [`StreamError::BadMessage`] and the session continues; the
/// end of the connection produces exactly one terminal error, after which
/// both channels close.
#[derive(Debug)]
pub struct StreamSession {
    events: mpsc::Receiver<StreamEvent>,
    errors: mpsc::Receiver<StreamError>,
    reader: JoinHandle<()>,
    state: StatePublisher,
}

impl StreamSession {
    fn spawn<S>(body: S, capacity: usize, state: StatePublisher) -> Self
    where
        S: Stream<Item = reqwest::Result<Bytes>> + Send + Unpin + 'static,
    {
        let (event_tx, events) = mpsc::channel(capacity);
        let (error_tx, errors) = mpsc::channel(capacity);
        let reader = tokio::spawn(read_body(body, event_tx, error_tx, state.clone()));

        Self {
            events,
            errors,
            reader,
            state,
        }
    }

    /// Channel of decoded events
    pub fn events(&mut self) -> &mut mpsc::Receiver<StreamEvent> {
        &mut self.events
    }

    /// Channel of recoverable and terminal errors
    pub fn errors(&mut self) -> &mut mpsc::Receiver<StreamError> {
        &mut self.errors
    }

    /// Both channels at once, for selecting over them
    pub fn channels(
        &mut self,
    ) -> (
        &mut mpsc::Receiver<StreamEvent>,
        &mut mpsc::Receiver<StreamError>,
    ) {
        (&mut self.events, &mut self.errors)
    }

    /// Wait for the next item on either channel
    ///
    /// Pending events are returned before errors, so no event is observed
    /// after the terminal error. Returns `None` once both channels are closed.
    pub async fn next(&mut self) -> Option<StreamResult<StreamEvent>> {
        tokio::select! {
            biased;
            Some(event) = self.events.recv() => Some(Ok(event)),
            Some(err) = self.errors.recv() => Some(Err(err)),
            else => None,
        }
    }

    /// Stop reading and drop the connection
    pub fn close(self) {}
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if !self.reader.is_finished() {
            self.reader.abort();
            self.state.publish(StreamState::Disconnected);
        }
    }
}

/// Background reader: one per session
async fn read_body<S>(
    mut body: S,
    event_tx: mpsc::Sender<StreamEvent>,
    error_tx: mpsc::Sender<StreamError>,
    state: StatePublisher,
) where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    let mut parser = LineParser::new();

    let terminal = loop {
        match body.next().await {
            Some(Ok(bytes)) => {
                for item in parser.feed(bytes) {
                    if !deliver(item, &event_tx, &error_tx).await {
                        debug!("Stream session dropped by consumer");
                        state.publish(StreamState::Disconnected);
                        return;
                    }
                }
            }
            Some(Err(e)) if e.is_timeout() => break StreamError::Timeout,
            Some(Err(e)) => {
                // Remote close without a clean end of body
                debug!("Stream body error: {}", e);
                break StreamError::Closed;
            }
            None => {
                if let Some(item) = parser.finish() {
                    deliver(item, &event_tx, &error_tx).await;
                }
                break StreamError::Closed;
            }
        }
    };

    debug!("Stream ended: {}", terminal);
    let _ = error_tx.send(terminal).await;
    state.publish(StreamState::Disconnected);
}

/// Route one parsed line to its channel; false once the consumer is gone
async fn deliver(
    item: StreamResult<StreamEvent>,
    event_tx: &mpsc::Sender<StreamEvent>,
    error_tx: &mpsc::Sender<StreamError>,
) -> bool {
    match item {
        Ok(event) => event_tx.send(event).await.is_ok(),
        Err(err) => {
            warn!("{}", err);
            error_tx.send(err).await.is_ok()
        }
    }
}

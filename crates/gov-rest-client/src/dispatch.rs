//! Event classification and dispatch

use futures::{Stream, StreamExt};
use gov_api_contract::{EventKind, StreamEvent};
use gov_client_api::ClientApiError;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::RestClientError;
use crate::sse::Frame;

/// Text handed to the error callback when a stream fails
pub trait AbortReason {
    fn abort_message(&self) -> String;
}

impl AbortReason for RestClientError {
    fn abort_message(&self) -> String {
        match self {
            RestClientError::StreamAborted(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl AbortReason for ClientApiError {
    fn abort_message(&self) -> String {
        match self {
            ClientApiError::Stream(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl AbortReason for String {
    fn abort_message(&self) -> String {
        self.clone()
    }
}

/// A frame whose payload is not valid JSON
#[derive(Debug, Error)]
#[error("malformed frame {data:?}: {source}")]
pub struct MalformedFrame {
    pub data: String,
    #[source]
    pub source: serde_json::Error,
}

/// Classify a frame by its `type` field.
///
/// `Ok(None)` means the frame is well formed but carries no known kind; the
/// backend may add kinds this client does not understand yet.
pub fn classify(frame: &Frame) -> Result<Option<StreamEvent>, MalformedFrame> {
    let payload: serde_json::Value =
        serde_json::from_str(&frame.data).map_err(|source| MalformedFrame {
            data: frame.data.clone(),
            source,
        })?;

    let Some(kind_name) = payload.get("type").and_then(|t| t.as_str()) else {
        debug!("Ignoring frame without a type field");
        return Ok(None);
    };
    match kind_name.parse::<EventKind>() {
        Ok(kind) => Ok(Some(StreamEvent::new(kind, payload))),
        Err(_) => {
            debug!("Ignoring frame of unknown type {}", kind_name);
            Ok(None)
        }
    }
}

pub type EventCallback = Box<dyn FnMut(&StreamEvent) + Send>;

/// Dispatch table: at most one callback per event kind
#[derive(Default)]
pub struct EventHandlers {
    table: HashMap<EventKind, EventCallback>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback for `kind`, replacing any previous one
    pub fn on<F>(mut self, kind: EventKind, callback: F) -> Self
    where
        F: FnMut(&StreamEvent) + Send + 'static,
    {
        self.table.insert(kind, Box::new(callback));
        self
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

/// Lifecycle of one stream as seen by its dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    /// `done` was dispatched
    Completed,
    /// `error` was dispatched, or the connection failed
    Failed,
    /// The caller abandoned the stream
    Cancelled,
}

impl StreamState {
    pub fn is_closed(&self) -> bool {
        !matches!(self, StreamState::Open)
    }
}

/// Routes events to their callbacks, synchronously and in arrival order.
///
/// Once a terminal event has been dispatched, or the stream was aborted or
/// cancelled, every later event is dropped without invoking anything.
#[derive(Debug)]
pub struct EventDispatcher {
    handlers: EventHandlers,
    state: StreamState,
    dispatched: usize,
}

impl EventDispatcher {
    pub fn new(handlers: EventHandlers) -> Self {
        Self {
            handlers,
            state: StreamState::Open,
            dispatched: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of events handed to the dispatch table
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn dispatch(&mut self, event: &StreamEvent) -> StreamState {
        if self.state.is_closed() {
            trace!("Stream closed, dropping {} event", event.kind);
            return self.state;
        }
        self.dispatched += 1;
        if let Some(callback) = self.handlers.table.get_mut(&event.kind) {
            callback(event);
        }
        match event.kind {
            EventKind::Done => self.state = StreamState::Completed,
            EventKind::Error => self.state = StreamState::Failed,
            _ => {}
        }
        self.state
    }

    /// Classify and dispatch a raw frame; malformed frames are logged and skipped
    pub fn dispatch_frame(&mut self, frame: &Frame) -> StreamState {
        match classify(frame) {
            Ok(Some(event)) => self.dispatch(&event),
            Ok(None) => self.state,
            Err(e) => {
                warn!("Skipping {}", e);
                self.state
            }
        }
    }

    /// Close the stream with a locally raised error, notifying the error callback once
    pub fn abort(&mut self, message: impl Into<String>) -> StreamState {
        if self.state.is_closed() {
            return self.state;
        }
        let message = message.into();
        error!("Stream aborted: {}", message);
        self.dispatch(&StreamEvent::error(message))
    }

    /// Stop dispatching without notifying anyone
    pub fn cancel(&mut self) -> StreamState {
        if !self.state.is_closed() {
            debug!("Stream cancelled after {} events", self.dispatched);
            self.state = StreamState::Cancelled;
        }
        self.state
    }
}

enum Step<T> {
    Cancelled,
    Next(Option<T>),
}

/// Pump `events` into `dispatcher` until the stream closes or `cancel` fires.
///
/// `observe` sees each event just before it is dispatched. A stream that
/// fails or ends before a terminal event is reported through the error
/// callback.
pub async fn drive_events<S, E, O>(
    events: S,
    dispatcher: &mut EventDispatcher,
    cancel: &CancellationToken,
    mut observe: O,
) -> StreamState
where
    S: Stream<Item = Result<StreamEvent, E>>,
    E: AbortReason,
    O: FnMut(&StreamEvent),
{
    futures::pin_mut!(events);
    loop {
        if cancel.is_cancelled() {
            return dispatcher.cancel();
        }
        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => Step::Cancelled,
            next = events.next() => Step::Next(next),
        };
        match step {
            Step::Cancelled => return dispatcher.cancel(),
            Step::Next(Some(Ok(event))) => {
                if cancel.is_cancelled() {
                    return dispatcher.cancel();
                }
                observe(&event);
                if dispatcher.dispatch(&event).is_closed() {
                    return dispatcher.state();
                }
            }
            Step::Next(Some(Err(e))) => return dispatcher.abort(e.abort_message()),
            Step::Next(None) => {
                if cancel.is_cancelled() {
                    return dispatcher.cancel();
                }
                return dispatcher.abort("stream ended before a terminal event");
            }
        }
    }
}

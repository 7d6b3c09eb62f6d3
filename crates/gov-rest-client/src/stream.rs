//! Handle for one streaming query

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use gov_api_contract::StreamEvent;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dispatch::{classify, drive_events, EventDispatcher, StreamState};
use crate::error::{RestClientError, RestClientResult};
use crate::sse::{Frame, FrameDecoder};

/// Raw response body, chunk by chunk
pub type ByteStream = BoxStream<'static, RestClientResult<Bytes>>;

enum Step {
    Cancelled,
    Chunk(Option<RestClientResult<Bytes>>),
}

/// An open query stream.
///
/// Reads the body incrementally, reassembles frames and yields classified
/// events. The stream closes after the first terminal event; dropping it or
/// cancelling its token releases the connection.
pub struct QueryStream {
    body: Option<ByteStream>,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    cancel: CancellationToken,
    closed: bool,
}

impl QueryStream {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body: Some(body),
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            cancel: CancellationToken::new(),
            closed: false,
        }
    }

    pub fn from_response(response: reqwest::Response) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(RestClientError::from_transport))
            .boxed();
        Self::new(body)
    }

    /// Tie this stream to a caller-owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that abandons this stream when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn release(&mut self) {
        self.closed = true;
        self.pending.clear();
        if self.body.take().is_some() {
            debug!("Released query stream connection");
        }
    }

    /// Next event in arrival order.
    ///
    /// Returns `None` once the stream is closed or cancelled. A connection
    /// failure, or a body that ends before `done`/`error`, is reported once
    /// as [`RestClientError::StreamAborted`].
    pub async fn next_event(&mut self) -> Option<RestClientResult<StreamEvent>> {
        loop {
            if self.closed {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.release();
                return None;
            }

            while let Some(frame) = self.pending.pop_front() {
                match classify(&frame) {
                    Ok(Some(event)) => {
                        if event.is_terminal() {
                            self.release();
                        }
                        return Some(Ok(event));
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Skipping {}", e),
                }
            }

            let Some(body) = self.body.as_mut() else {
                self.release();
                return Some(Err(RestClientError::StreamAborted(
                    "stream ended before a terminal event".to_string(),
                )));
            };

            let cancel = &self.cancel;
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                chunk = body.next() => Step::Chunk(chunk),
            };

            match step {
                Step::Cancelled => {
                    self.release();
                    return None;
                }
                Step::Chunk(Some(Ok(bytes))) => {
                    self.pending.extend(self.decoder.feed(&bytes));
                }
                Step::Chunk(Some(Err(e))) => {
                    self.release();
                    let e = match e {
                        RestClientError::StreamAborted(_) => e,
                        other => RestClientError::StreamAborted(other.to_string()),
                    };
                    return Some(Err(e));
                }
                Step::Chunk(None) => {
                    self.pending.extend(self.decoder.finish());
                    self.body = None;
                }
            }
        }
    }

    /// Adapt into a `Stream` of events
    pub fn into_events(self) -> impl Stream<Item = RestClientResult<StreamEvent>> + Send + 'static {
        stream::unfold(self, |mut query| async move {
            query.next_event().await.map(|item| (item, query))
        })
    }

    /// Drive the stream to completion through `dispatcher`
    pub async fn run(self, dispatcher: &mut EventDispatcher) -> StreamState {
        let cancel = self.cancellation_token();
        drive_events(self.into_events(), dispatcher, &cancel, |_| {}).await
    }
}

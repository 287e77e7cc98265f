//! Broadcast streams of payloads
//!
//! One producer, any number of consumers. Each consumer owns a bounded
//! ring buffer (`tokio::sync::broadcast`). Publishing never waits: when a
//! consumer falls more than `capacity` payloads behind, the oldest buffered
//! payloads are dropped for that consumer only, and it resumes with the
//! oldest one still retained. Publishing with no consumer is a no-op.
//! Completing the broadcaster closes every stream once it has drained.

use super::payload::Payload;
use futures::future::{self, FutureExt};
use futures::stream::{self, BoxStream, Fuse, FusedStream, Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

/// Default per-consumer buffer size
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Producer side of a payload stream.
pub struct PayloadBroadcaster {
    sender: Mutex<Option<broadcast::Sender<Payload>>>,
    capacity: usize,
}

impl PayloadBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
            capacity: capacity.max(1),
        }
    }

    /// Publish to every current consumer; returns how many received it.
    pub fn publish(&self, payload: Payload) -> usize {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribe to payloads published from now on.
    ///
    /// Subscribing to a completed broadcaster yields a stream that is
    /// already terminated.
    pub fn subscribe(&self) -> PayloadStream {
        match self.sender.lock().as_ref() {
            Some(sender) => PayloadStream::receiving(sender.subscribe()),
            None => PayloadStream::terminated(),
        }
    }

    /// Close the stream for all consumers. Returns false if already completed.
    pub fn complete(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.sender.lock().is_none()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map_or(0, |s| s.receiver_count())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PayloadBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Consumer side: payloads from one or more merged broadcasters.
///
/// Implements `Stream`, so it composes with `futures::StreamExt` and
/// `tokio_stream::StreamExt`. The inherent `next()` returns `None` once
/// every source has completed and drained.
pub struct PayloadStream {
    inner: Fuse<BoxStream<'static, Payload>>,
}

impl PayloadStream {
    fn from_stream(stream: impl Stream<Item = Payload> + Send + 'static) -> Self {
        Self {
            inner: stream.boxed().fuse(),
        }
    }

    fn receiving(receiver: broadcast::Receiver<Payload>) -> Self {
        Self::from_stream(BroadcastStream::new(receiver).filter_map(|received| {
            future::ready(match received {
                Ok(payload) => Some(payload),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "slow subscriber dropped oldest payloads");
                    None
                }
            })
        }))
    }

    /// A stream that yields nothing
    pub fn terminated() -> Self {
        Self::from_stream(stream::empty())
    }

    /// Interleave two streams; the result ends when both have ended.
    pub fn merge(self, other: PayloadStream) -> Self {
        Self::from_stream(stream::select(self, other))
    }

    /// Yield `payload` before anything published to the sources
    pub fn starting_with(self, payload: Payload) -> Self {
        Self::from_stream(stream::once(future::ready(payload)).chain(self))
    }

    /// Wait for the next payload.
    pub async fn next(&mut self) -> Option<Payload> {
        self.inner.next().await
    }

    /// Take the next payload if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<Payload> {
        self.inner.next().now_or_never().flatten()
    }

    /// Everything currently buffered, in arrival order per source
    pub fn drain(&mut self) -> Vec<Payload> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// True once every source has been seen to complete and nothing is
    /// buffered
    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl Stream for PayloadStream {
    type Item = Payload;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Payload>> {
        self.inner.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl FusedStream for PayloadStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Live stream of a map's events.

use crate::record::MapEventRecord;
use crate::source::RecordSubscription;
use futures::stream::{BoxStream, FusedStream};
use futures::task::AtomicWaker;
use futures::{Stream, StreamExt};
use mapev_config::MapName;
use mapev_engine::SubscriptionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

/// Why an event stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The consumer fell behind and its subscription was evicted.
    Overflow,
    /// The stream was cancelled through its [`StreamCanceller`].
    Cancelled,
    /// The map was closed.
    MapClosed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CloseReason::Overflow => "overflow",
            CloseReason::Cancelled => "cancelled",
            CloseReason::MapClosed => "map_closed",
        })
    }
}

/// Item of an [`EventStream`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStreamItem {
    /// Events in recording order. The first item is the snapshot when one was
    /// requested; each later item holds the events of one map operation.
    Events(Vec<MapEventRecord>),
    /// Last item of the stream.
    Closed(CloseReason),
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

/// Cancels an [`EventStream`] from anywhere. Cloneable.
#[derive(Clone)]
pub struct StreamCanceller {
    state: Arc<CancelState>,
}

impl StreamCanceller {
    /// Ends the stream with [`CloseReason::Cancelled`] at its next poll.
    /// Idempotent.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
        self.state.waker.wake();
    }
}

impl fmt::Debug for StreamCanceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCanceller")
            .field("cancelled", &self.state.cancelled.load(Ordering::Acquire))
            .finish()
    }
}

/// Stream of [`EventStreamItem`]s for one map.
///
/// Yields the optional snapshot, then one item per map operation, then
/// exactly one [`EventStreamItem::Closed`]. Dropping the stream ends the
/// underlying subscription.
pub struct EventStream {
    map: MapName,
    snapshot: Option<Vec<MapEventRecord>>,
    // `None` once the closing item was yielded.
    live: Option<BoxStream<'static, Result<Vec<MapEventRecord>, SubscriptionError>>>,
    cancel: Arc<CancelState>,
}

impl EventStream {
    pub(crate) fn new(map: MapName, subscription: RecordSubscription, dump: bool) -> Self {
        Self {
            map,
            snapshot: dump.then_some(subscription.snapshot),
            live: Some(subscription.live),
            cancel: Arc::new(CancelState::default()),
        }
    }

    /// Name of the streamed map.
    #[must_use]
    pub fn map_name(&self) -> &MapName {
        &self.map
    }

    /// Returns a handle that cancels this stream.
    #[must_use]
    pub fn canceller(&self) -> StreamCanceller {
        StreamCanceller {
            state: Arc::clone(&self.cancel),
        }
    }

    fn finish(&mut self, reason: CloseReason) -> Poll<Option<EventStreamItem>> {
        self.live = None;
        self.snapshot = None;
        match reason {
            CloseReason::Overflow => {
                tracing::warn!(map = %self.map, "map events stream closed, subscriber overflowed");
            }
            CloseReason::Cancelled | CloseReason::MapClosed => {
                tracing::debug!(map = %self.map, %reason, "map events stream closed");
            }
        }
        Poll::Ready(Some(EventStreamItem::Closed(reason)))
    }
}

impl Stream for EventStream {
    type Item = EventStreamItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.live.is_none() {
            return Poll::Ready(None);
        }

        this.cancel.waker.register(cx.waker());
        if this.cancel.cancelled.load(Ordering::Acquire) {
            return this.finish(CloseReason::Cancelled);
        }
        if let Some(snapshot) = this.snapshot.take() {
            return Poll::Ready(Some(EventStreamItem::Events(snapshot)));
        }

        let Some(live) = this.live.as_mut() else {
            return Poll::Ready(None);
        };
        match live.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(records))) => Poll::Ready(Some(EventStreamItem::Events(records))),
            Poll::Ready(Some(Err(SubscriptionError::Overflow))) => this.finish(CloseReason::Overflow),
            Poll::Ready(Some(Err(SubscriptionError::Closed)) | None) => {
                this.finish(CloseReason::MapClosed)
            }
        }
    }
}

impl FusedStream for EventStream {
    fn is_terminated(&self) -> bool {
        self.live.is_none()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("map", &self.map)
            .field("terminated", &self.live.is_none())
            .finish_non_exhaustive()
    }
}

// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Consumer side of a subscription.

use crate::error::SubscriptionError;
use futures::Stream;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

const OPEN: u8 = 0;
const CLOSED: u8 = 1;
const EVICTED: u8 = 2;

/// Lifecycle state of a [`Handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// Receiving batches.
    Open,
    /// Closed by its consumer, by dropping the handle, or by the map.
    Closed,
    /// Evicted by the publisher because its queue was full.
    Evicted,
}

/// State shared between a [`Handle`] and its registry entry.
///
/// Transitions only leave `OPEN`, by compare-and-swap, so exactly one of
/// close and eviction wins.
#[derive(Debug)]
pub(super) struct HandleShared {
    id: u64,
    status: AtomicU8,
}

impl HandleShared {
    pub(super) fn new(id: u64) -> Self {
        Self {
            id,
            status: AtomicU8::new(OPEN),
        }
    }

    pub(super) fn id(&self) -> u64 {
        self.id
    }

    pub(super) fn status(&self) -> HandleStatus {
        match self.status.load(Ordering::Acquire) {
            OPEN => HandleStatus::Open,
            EVICTED => HandleStatus::Evicted,
            _ => HandleStatus::Closed,
        }
    }

    pub(super) fn is_open(&self) -> bool {
        self.status.load(Ordering::Acquire) == OPEN
    }

    /// Returns `true` if this call performed the transition.
    pub(super) fn close(&self) -> bool {
        self.transition(CLOSED)
    }

    /// Returns `true` if this call performed the transition.
    pub(super) fn evict(&self) -> bool {
        self.transition(EVICTED)
    }

    fn transition(&self, to: u8) -> bool {
        self.status
            .compare_exchange(OPEN, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A subscriber's live view of a stream of batches.
///
/// Batches arrive in publish order. When the subscription ends, receive calls
/// first return whatever was already queued, then the terminal error:
/// [`SubscriptionError::Overflow`] after an eviction, otherwise
/// [`SubscriptionError::Closed`]. Dropping the handle closes it.
pub struct Handle<T> {
    shared: Arc<HandleShared>,
    receiver: flume::Receiver<T>,
    capacity: usize,
}

impl<T> Handle<T> {
    pub(super) fn new(shared: Arc<HandleShared>, receiver: flume::Receiver<T>, capacity: usize) -> Self {
        Self {
            shared,
            receiver,
            capacity,
        }
    }

    /// Registry-assigned identifier, unique within one registry.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id()
    }

    /// Current lifecycle state. A handle whose registry was closed reports
    /// [`HandleStatus::Closed`].
    #[must_use]
    pub fn status(&self) -> HandleStatus {
        match self.shared.status() {
            HandleStatus::Open if self.receiver.is_disconnected() => HandleStatus::Closed,
            status => status,
        }
    }

    /// Whether the handle still receives new batches.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status() == HandleStatus::Open
    }

    /// Maximum number of undelivered batches before eviction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of batches waiting to be received.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Terminal error of an ended subscription, `None` while open.
    #[must_use]
    pub fn error(&self) -> Option<SubscriptionError> {
        match self.status() {
            HandleStatus::Open => None,
            HandleStatus::Closed => Some(SubscriptionError::Closed),
            HandleStatus::Evicted => Some(SubscriptionError::Overflow),
        }
    }

    /// Stops the subscription and discards queued batches.
    ///
    /// Idempotent. Returns `true` for the call that closed the handle, `false`
    /// if it was already closed or evicted. A consumer close is never reported
    /// as an overflow.
    pub fn close(&self) -> bool {
        let closed = self.shared.close();
        if closed {
            _ = self.receiver.drain();
        }
        closed
    }

    /// Waits for the next batch.
    pub async fn recv(&self) -> Result<T, SubscriptionError> {
        if self.shared.status() == HandleStatus::Closed {
            return Err(SubscriptionError::Closed);
        }
        self.receiver
            .recv_async()
            .await
            .map_err(|_| self.terminal_error())
    }

    /// Blocks the current thread until the next batch.
    pub fn recv_blocking(&self) -> Result<T, SubscriptionError> {
        if self.shared.status() == HandleStatus::Closed {
            return Err(SubscriptionError::Closed);
        }
        self.receiver.recv().map_err(|_| self.terminal_error())
    }

    /// Blocks for at most `timeout`. `Ok(None)` means nothing arrived in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, SubscriptionError> {
        if self.shared.status() == HandleStatus::Closed {
            return Err(SubscriptionError::Closed);
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(batch) => Ok(Some(batch)),
            Err(flume::RecvTimeoutError::Timeout) => Ok(None),
            Err(flume::RecvTimeoutError::Disconnected) => Err(self.terminal_error()),
        }
    }

    /// Returns the next queued batch without waiting. `Ok(None)` means the
    /// queue is empty and the subscription is still open.
    pub fn try_recv(&self) -> Result<Option<T>, SubscriptionError> {
        if self.shared.status() == HandleStatus::Closed {
            return Err(SubscriptionError::Closed);
        }
        match self.receiver.try_recv() {
            Ok(batch) => Ok(Some(batch)),
            Err(flume::TryRecvError::Empty) => Ok(None),
            Err(flume::TryRecvError::Disconnected) => Err(self.terminal_error()),
        }
    }

    /// Turns the handle into a stream of batches ending with one terminal error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, SubscriptionError>> + Send + 'static
    where
        T: Send + 'static,
    {
        futures::stream::unfold(Some(self), |state| async move {
            let handle = state?;
            match handle.recv().await {
                Ok(batch) => Some((Ok(batch), Some(handle))),
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    // The sender side is gone: either evicted, closed by the map, or closed
    // by this handle.
    fn terminal_error(&self) -> SubscriptionError {
        match self.shared.status() {
            HandleStatus::Evicted => SubscriptionError::Overflow,
            HandleStatus::Open | HandleStatus::Closed => SubscriptionError::Closed,
        }
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        _ = self.shared.close();
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.shared.id())
            .field("status", &self.status())
            .field("capacity", &self.capacity)
            .field("pending", &self.receiver.len())
            .finish()
    }
}

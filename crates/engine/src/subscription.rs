// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Non-blocking fan-out of event batches to independent subscribers.
//!
//! Every subscriber owns a bounded queue. Publishing never waits: a subscriber
//! whose queue is full at publish time is evicted, its handle moves to
//! [`HandleStatus::Evicted`] and its consumer observes
//! [`SubscriptionError::Overflow`](crate::SubscriptionError::Overflow) once the
//! batches already queued have been drained. Other subscribers are unaffected.
//!
//! The registry keeps the set of live subscribers behind a mutex and publishes
//! against an `ArcSwap` snapshot rebuilt on subscribe and removal, so the
//! publish path takes no lock unless it has something to remove.

mod handle;
mod registry;

pub use handle::{Handle, HandleStatus};
pub use registry::{PublishReport, SubscriptionRegistry};

#[cfg(test)]
mod tests;

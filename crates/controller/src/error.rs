// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the controller manager.

/// Errors returned when registering controllers.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No tokio runtime is available to run controllers on.
    #[error("no tokio runtime available: {details}")]
    NoRuntime {
        /// Runtime lookup failure.
        details: String,
    },

    /// A controller was registered with a zero run interval.
    #[error("controller `{name}` must have a non-zero run interval")]
    InvalidInterval {
        /// Controller name.
        name: String,
    },
}

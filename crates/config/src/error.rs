// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors produced while loading or validating a configuration document.

use std::path::PathBuf;

/// Errors produced by the configuration layer.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configuration is syntactically valid but semantically rejected.
    #[error("invalid user configuration: {error}")]
    InvalidUserConfig {
        /// Validation error details.
        error: String,
    },
    /// The configuration file could not be read.
    #[error("failed to read configuration file `{}`: {details}", path.display())]
    FileReadError {
        /// Path of the file that failed to load.
        path: PathBuf,
        /// Underlying I/O error message.
        details: String,
    },
    /// The configuration could not be deserialized.
    #[error("failed to deserialize {format} configuration: {details}")]
    DeserializationError {
        /// Format the document was parsed as (`yaml` or `json`).
        format: &'static str,
        /// Parser error message.
        details: String,
    },
    /// The configuration file extension is not one of `.json`, `.yaml`, `.yml`.
    #[error("unsupported configuration file format for `{}`", path.display())]
    UnsupportedFileFormat {
        /// Path of the rejected file.
        path: PathBuf,
    },
}

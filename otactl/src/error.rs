//! Error types for otactl.

use std::io;
use thiserror::Error;

/// Result type for otactl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for otactl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port read/write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error (open failed, device absent, busy, permission denied).
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The device response did not contain the expected marker phrase.
    ///
    /// Carries the raw response text so the operator can diagnose what the
    /// device actually said. Responses may be truncated by the fixed drain
    /// budget; an empty response here usually means the device never spoke.
    #[error("{operation}: expected marker not found in device response")]
    UnexpectedResponse {
        /// The operation that was attempted.
        operation: &'static str,
        /// The raw (possibly truncated, possibly empty) response text.
        response: String,
    },

    /// The OTA polling window elapsed without a success marker.
    ///
    /// The device's actual state is unknown: it may have finished after the
    /// window closed, or it may still be updating.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The requested release tag is not in the release table.
    ///
    /// This is a configuration error and aborts a batch before any device
    /// is touched.
    #[error("Unknown release tag: {0}")]
    UnknownRelease(String),

    /// The operation was cancelled via the registered interrupt checker.
    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    /// The raw device response attached to this error, if any.
    pub fn response(&self) -> Option<&str> {
        match self {
            Self::UnexpectedResponse { response, .. } => Some(response),
            _ => None,
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner application

use std::fmt;

/// Failure modes of the single outbound relay request.
///
/// `Cancelled` is the explicit "the user aborted this request" signal; it is
/// produced by the abort handle, never inferred from an error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The user cancelled the in-flight request
    Cancelled,
    /// The request never reached the server, or the transport failed mid-flight
    Connect(String),
    /// The server answered with a non-success status
    Status { code: u16, message: String },
    /// The response body was not the expected JSON reply
    InvalidReply(String),
}

impl RelayError {
    /// Whether this failure was an explicit caller cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RelayError::Cancelled)
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Cancelled => write!(f, "Request cancelled"),
            RelayError::Connect(msg) => write!(f, "{}", msg),
            RelayError::Status { code, message } => {
                write!(f, "Server responded with status {}: {}", code, message)
            }
            RelayError::InvalidReply(msg) => write!(f, "Invalid server reply: {}", msg),
        }
    }
}

/// Camera capture errors
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// No usable camera device found
    NoCameraFound,
    /// Opening or configuring the device failed
    Open(String),
    /// The negotiated format is not one we can convert
    Format(String),
    /// Streaming failed after the device was opened
    Stream(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoCameraFound => write!(f, "No camera devices found"),
            CaptureError::Open(msg) => write!(f, "Failed to open camera: {}", msg),
            CaptureError::Format(msg) => write!(f, "Unsupported camera format: {}", msg),
            CaptureError::Stream(msg) => write!(f, "Camera stream error: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}
impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Stream(err.to_string())
    }
}

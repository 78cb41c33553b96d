// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture and QR decoding
//!
//! The capture boundary of the application: a scan session owns the camera
//! for its lifetime, frames flow out through a channel, and the first QR
//! code decoded during a session ends it.
//!
//! - [`ScanSession`]: session state machine (active/torch, one-shot decode)
//! - [`camera`]: V4L2 frame worker with scoped device acquisition
//! - [`decoder`]: QR decoding of captured frames

pub mod camera;
pub mod decoder;

use std::sync::Arc;
use std::time::Instant;

use crate::errors::CaptureError;

/// A single RGBA frame delivered by the capture worker
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Tightly packed RGBA pixel data (width * height * 4 bytes)
    pub data: Arc<[u8]>,
    /// When the frame left the driver
    pub captured_at: Instant,
}

/// Events produced by the capture worker
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A new frame is available
    Frame(Arc<CameraFrame>),
    /// The worker stopped on an error; the device has been released
    Failed(CaptureError),
}

/// Scan session state machine.
///
/// Tracks whether the camera is active and whether the torch flag is set.
/// A session forwards exactly one decoded payload: `accept_decode` ends the
/// session, and any decode event arriving while inactive is discarded.
#[derive(Debug, Default)]
pub struct ScanSession {
    active: bool,
    torch_on: bool,
}

impl ScanSession {
    /// Whether the camera is currently held by this session
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the torch flag is set
    ///
    /// The flag survives across sessions (matching the torch button keeping
    /// its state), but hardware is only driven while the session is active.
    pub fn torch_on(&self) -> bool {
        self.torch_on
    }

    /// Activate the capture surface
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Deactivate the capture surface
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Flip the torch flag, effective only while the session is active.
    ///
    /// Returns the new flag value, or `None` if the toggle was ignored.
    pub fn toggle_torch(&mut self) -> Option<bool> {
        if !self.active {
            return None;
        }
        self.torch_on = !self.torch_on;
        Some(self.torch_on)
    }

    /// Accept a decode event.
    ///
    /// The first non-empty decode of an active session is returned and the
    /// session transitions to inactive. Everything else is a no-op.
    pub fn accept_decode(&mut self, text: String) -> Option<String> {
        if !self.active || text.is_empty() {
            return None;
        }
        self.active = false;
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_decode_ends_session() {
        let mut session = ScanSession::default();
        session.start();
        assert!(session.is_active());

        let accepted = session.accept_decode("ABC123".to_string());
        assert_eq!(accepted.as_deref(), Some("ABC123"));
        assert!(!session.is_active(), "decode must deactivate the session");
    }

    #[test]
    fn test_decode_while_inactive_is_ignored() {
        let mut session = ScanSession::default();
        session.start();
        assert!(session.accept_decode("first".to_string()).is_some());

        // Any number of further decode events leaves the state unchanged
        for _ in 0..3 {
            assert!(session.accept_decode("second".to_string()).is_none());
            assert!(!session.is_active());
        }
    }

    #[test]
    fn test_empty_decode_is_ignored() {
        let mut session = ScanSession::default();
        session.start();
        assert!(session.accept_decode(String::new()).is_none());
        assert!(session.is_active(), "empty decode must not end the session");
    }

    #[test]
    fn test_torch_toggle_requires_active_session() {
        let mut session = ScanSession::default();
        assert_eq!(session.toggle_torch(), None);
        assert!(!session.torch_on());

        session.start();
        assert_eq!(session.toggle_torch(), Some(true));
        assert_eq!(session.toggle_torch(), Some(false));

        // Flag value survives stopping the session
        session.toggle_torch();
        session.stop();
        assert!(session.torch_on());
        assert_eq!(session.toggle_torch(), None);
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Application state management

use std::sync::Arc;
use std::time::Instant;

use cosmic::cosmic_config;
use cosmic::widget::about::About;

use crate::capture::{CameraFrame, ScanSession};
use crate::config::Config;
use crate::errors::RelayError;
use crate::relay::{Relay, RequestId};
use crate::torch::TorchDevice;

/// Which page the context drawer shows
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ContextPage {
    #[default]
    About,
    Settings,
}

/// A surfaced request outcome awaiting user acknowledgment.
///
/// This is the modal confirmation gate: while a notice is shown, no new
/// scan/send cycle can begin, and acknowledging a success or failure is
/// what clears the pending payload.
#[derive(Debug, Clone)]
pub enum Notice {
    /// The server accepted the payload and replied
    Success { payload: String, reply: String },
    /// The request failed for any reason other than cancellation
    Failure { payload: String, message: String },
    /// The user cancelled the in-flight request
    Cancelled,
}

impl Notice {
    /// Classify a settled request outcome into the notice to surface.
    ///
    /// Both outcomes carry the payload the request was issued with, so the
    /// acknowledgment always shows what was sent. Cancellation returns
    /// `None`: the cancel action already surfaced its own notice, and the
    /// aborted task's settlement stays silent.
    pub fn from_settlement(payload: String, result: Result<String, RelayError>) -> Option<Self> {
        match result {
            Ok(reply) => Some(Notice::Success { payload, reply }),
            Err(e) if e.is_cancelled() => None,
            Err(e) => Some(Notice::Failure {
                payload,
                message: e.to_string(),
            }),
        }
    }
}

/// Flags passed from the command line into `init`
#[derive(Debug, Default, Clone)]
pub struct Flags {
    /// One-run endpoint override (`--endpoint`), not persisted
    pub endpoint_override: Option<String>,
}

/// Main application state
pub struct AppModel {
    /// COSMIC runtime core
    pub core: cosmic::Core,
    /// Current context drawer page
    pub context_page: ContextPage,
    /// About widget state
    pub about: About,
    /// User configuration
    pub config: Config,
    /// Configuration write handle
    pub config_handler: Option<cosmic_config::Config>,
    /// CLI endpoint override, wins over config when set
    pub endpoint_override: Option<String>,

    /// Scan session state (camera active, torch flag)
    pub session: ScanSession,
    /// Last decoded payload, awaiting send or a new scan
    pub payload: Option<String>,
    /// Request lifecycle manager
    pub relay: Relay,
    /// Surfaced request outcome awaiting acknowledgment
    pub notice: Option<Notice>,

    /// Most recent preview frame from the capture worker
    pub current_frame: Option<Arc<CameraFrame>>,
    /// When the last decode attempt was started (rate limiting)
    pub last_decode_attempt: Option<Instant>,
    /// Non-modal capture failure line, cleared on the next start
    pub capture_error: Option<String>,
    /// Resolved capture device path
    pub camera_path: Option<String>,
    /// Torch LEDs we can drive
    pub torch_devices: Vec<TorchDevice>,

    /// Shared HTTP client for relay requests
    pub http: reqwest::Client,
    /// Theme dropdown labels
    pub theme_options: Vec<String>,
    /// Capture devices found at startup (paths)
    pub camera_devices: Vec<String>,
    /// Camera dropdown labels ("Automatic" followed by device paths)
    pub camera_labels: Vec<String>,
}

impl AppModel {
    /// The endpoint requests are sent to (CLI override, then config)
    pub fn endpoint(&self) -> &str {
        self.endpoint_override
            .as_deref()
            .unwrap_or(&self.config.endpoint_url)
    }

    /// Whether a request is in flight (drives the spinner and cancel button)
    pub fn is_sending(&self) -> bool {
        self.relay.is_sending()
    }
}

/// Messages emitted by the application and its widgets.
#[derive(Debug, Clone)]
pub enum Message {
    // ===== UI Navigation =====
    /// Open external URL (repository, etc.)
    LaunchUrl(String),
    /// Toggle context drawer page (About, Settings)
    ToggleContextPage(ContextPage),

    // ===== Scan session =====
    /// Activate the capture surface
    StartScanning,
    /// Deactivate the capture surface
    StopScanning,
    /// Flip the torch flag (effective only while scanning)
    ToggleTorch,
    /// New preview frame from the capture worker
    CameraFrame(Arc<CameraFrame>),
    /// The capture worker stopped on an error
    CaptureFailed(String),
    /// A decode attempt finished (None = no code in the sampled frame)
    DecodeAttempted(Option<String>),

    // ===== Request lifecycle =====
    /// Submit the pending payload to the endpoint
    SendRequest,
    /// Cancel the in-flight request
    CancelRequest,
    /// The request task settled (tagged with its request id)
    RequestSettled(RequestId, Result<String, RelayError>),
    /// The user acknowledged the current notice
    DismissNotice,

    // ===== Settings =====
    /// Configuration changed on disk
    UpdateConfig(Config),
    /// Theme selected from the dropdown
    SetAppTheme(usize),
    /// Endpoint URL edited in settings
    SetEndpointUrl(String),
    /// Camera selected from the dropdown (0 = automatic)
    SetCameraDevice(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_notice_carries_payload_and_reply() {
        let notice = Notice::from_settlement("ABC123".to_string(), Ok("ok".to_string()));
        match notice {
            Some(Notice::Success { payload, reply }) => {
                assert_eq!(payload, "ABC123");
                assert_eq!(reply, "ok");
            }
            other => panic!("Expected success notice, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_notice_carries_payload_and_message() {
        let notice = Notice::from_settlement(
            "XYZ".to_string(),
            Err(RelayError::Connect("network down".to_string())),
        );
        match notice {
            Some(Notice::Failure { payload, message }) => {
                assert_eq!(payload, "XYZ");
                assert_eq!(message, "network down");
            }
            other => panic!("Expected failure notice, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_settlement_is_suppressed() {
        let notice = Notice::from_settlement("ABC123".to_string(), Err(RelayError::Cancelled));
        assert!(notice.is_none(), "cancellation must not surface a notice");
    }
}

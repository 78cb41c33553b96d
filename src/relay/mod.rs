// SPDX-License-Identifier: GPL-3.0-only

//! Request lifecycle manager
//!
//! Owns the single outbound request the application is allowed to have in
//! flight. [`Relay`] is the state machine: `Idle → Sending → Idle`, where
//! the transition back to idle happens on success, error, or cancellation.
//!
//! Every request is tagged with a monotonically increasing [`RequestId`].
//! Cancellation clears the handle synchronously and aborts the task; when
//! the aborted task's settlement eventually arrives, its id no longer
//! matches and [`Relay::settle`] rejects it. That id check — not error
//! message inspection — is how stale callbacks are discarded.

use std::time::Instant;

use futures::future::{AbortHandle, AbortRegistration};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::RelayError;

/// Identifier of one outbound request attempt
pub type RequestId = u64;

/// Request lifecycle state machine.
///
/// Either idle or holding the one live request handle.
#[derive(Debug, Default)]
pub enum RelayState {
    /// No request in flight
    #[default]
    Idle,
    /// One request in flight
    Sending {
        /// Tag carried by this request's settlement message
        id: RequestId,
        /// Handle that aborts the underlying task
        abort: AbortHandle,
        /// When the request was issued
        started: Instant,
        /// The payload as it was when the request was issued
        payload: String,
    },
}

/// The request lifecycle manager.
///
/// At most one request handle exists at any time; `begin` refuses to start
/// a second one, and `settle`/`cancel` are the only ways back to idle.
#[derive(Debug, Default)]
pub struct Relay {
    state: RelayState,
    next_id: RequestId,
}

impl Relay {
    /// Whether a request is currently in flight (the UI's loading flag)
    pub fn is_sending(&self) -> bool {
        matches!(self.state, RelayState::Sending { .. })
    }

    /// Claim the single request slot.
    ///
    /// Returns the id for the new request and the abort registration to
    /// wrap its task in, or `None` when the payload is empty or a request
    /// is already in flight (both are no-ops by contract).
    pub fn begin(&mut self, payload: &str) -> Option<(RequestId, AbortRegistration)> {
        if payload.is_empty() {
            debug!("Ignoring send with empty payload");
            return None;
        }
        if self.is_sending() {
            debug!("Ignoring send while a request is in flight");
            return None;
        }

        self.next_id += 1;
        let id = self.next_id;
        let (abort, registration) = AbortHandle::new_pair();
        self.state = RelayState::Sending {
            id,
            abort,
            started: Instant::now(),
            payload: payload.to_string(),
        };

        info!(id, len = payload.len(), "Request issued");
        Some((id, registration))
    }

    /// Cancel the in-flight request, if any.
    ///
    /// Signals the abort handle and clears the handle synchronously; the
    /// underlying task's own settlement will arrive later and be rejected
    /// as stale. Returns whether there was a request to cancel.
    pub fn cancel(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            RelayState::Idle => false,
            RelayState::Sending {
                id, abort, started, ..
            } => {
                abort.abort();
                info!(
                    id,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Request cancelled by user"
                );
                true
            }
        }
    }

    /// Accept a settlement for request `id`.
    ///
    /// When `id` matches the current request, clears the handle and returns
    /// the payload the request carried. Returns `None` for stale
    /// settlements (handle already cancelled or superseded), which the
    /// caller must ignore entirely.
    pub fn settle(&mut self, id: RequestId) -> Option<String> {
        match std::mem::take(&mut self.state) {
            RelayState::Sending {
                id: current,
                started,
                payload,
                ..
            } if current == id => {
                debug!(
                    id,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Request settled"
                );
                Some(payload)
            }
            other => {
                self.state = other;
                debug!(id, "Stale settlement ignored");
                None
            }
        }
    }
}

/// Request body: the decoded QR text
#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    #[serde(rename = "scannedText")]
    scanned_text: &'a str,
}

/// Expected success reply: a free-form display string
#[derive(Debug, Deserialize)]
struct ScanReply {
    data: String,
}

/// Submit one payload to the endpoint and return the server's reply string.
///
/// One attempt, no retries: any transport failure, non-success status, or
/// malformed reply is terminal for this request.
pub async fn submit(
    client: &reqwest::Client,
    endpoint: &str,
    payload: &str,
) -> Result<String, RelayError> {
    let response = client
        .post(endpoint)
        .json(&ScanReport {
            scanned_text: payload,
        })
        .send()
        .await
        .map_err(|e| RelayError::Connect(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(RelayError::Status {
            code: status.as_u16(),
            message,
        });
    }

    let reply: ScanReply = response
        .json()
        .await
        .map_err(|e| RelayError::InvalidReply(e.to_string()))?;

    Ok(reply.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_rejects_empty_payload() {
        let mut relay = Relay::default();
        assert!(relay.begin("").is_none());
        assert!(!relay.is_sending());
    }

    #[test]
    fn test_single_request_in_flight() {
        let mut relay = Relay::default();
        let first = relay.begin("ABC123");
        assert!(first.is_some());
        assert!(relay.is_sending());

        // Second send while in flight is rejected, state unchanged
        assert!(relay.begin("ABC123").is_none());
        assert!(relay.is_sending());
    }

    #[test]
    fn test_settle_clears_handle_once() {
        let mut relay = Relay::default();
        let (id, _reg) = relay.begin("ABC123").unwrap();

        assert_eq!(relay.settle(id).as_deref(), Some("ABC123"));
        assert!(!relay.is_sending());

        // A duplicate settlement for the same id is stale
        assert!(relay.settle(id).is_none());
    }

    #[test]
    fn test_cancel_clears_handle_synchronously() {
        let mut relay = Relay::default();
        let (id, registration) = relay.begin("ABC123").unwrap();

        assert!(relay.cancel());
        assert!(!relay.is_sending(), "cancel must not wait for settlement");

        // The aborted task's own settlement arrives later and must be a no-op
        assert!(relay.settle(id).is_none());
        assert!(!relay.is_sending());
        drop(registration);
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let mut relay = Relay::default();
        assert!(!relay.cancel());
    }

    #[test]
    fn test_ids_are_monotonic_across_attempts() {
        let mut relay = Relay::default();
        let (first, _r1) = relay.begin("a").unwrap();
        relay.cancel();
        let (second, _r2) = relay.begin("b").unwrap();
        assert!(second > first);

        // A settlement for the cancelled id never matches the new handle
        assert!(relay.settle(first).is_none());
        assert!(relay.is_sending());
        assert_eq!(relay.settle(second).as_deref(), Some("b"));
    }
}

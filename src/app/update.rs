// SPDX-License-Identifier: GPL-3.0-only

//! Message update handling
//!
//! All state transitions happen here, in response to discrete events (user
//! presses, decode events, request settlements). Each arm runs to
//! completion before the next message is processed, so the scan/send state
//! machine never sees concurrent mutation.

use cosmic::Task;
use cosmic::cosmic_config::CosmicConfigEntry;
use futures::future::{Abortable, Aborted};
use tracing::{debug, error, info, warn};

use crate::app::state::{AppModel, ContextPage, Message, Notice};
use crate::config::AppTheme;
use crate::errors::RelayError;
use crate::{capture, relay, torch};

impl AppModel {
    /// Main message handler.
    pub fn update(&mut self, message: Message) -> Task<cosmic::Action<Message>> {
        match message {
            // ===== UI Navigation =====
            Message::LaunchUrl(url) => {
                match open::that_detached(&url) {
                    Ok(()) => {}
                    Err(err) => {
                        error!(url = %url, error = %err, "Failed to open URL");
                    }
                }
                Task::none()
            }
            Message::ToggleContextPage(page) => {
                if self.context_page == page {
                    self.core.window.show_context = !self.core.window.show_context;
                } else {
                    self.context_page = page;
                    self.core.window.show_context = true;
                }
                Task::none()
            }

            // ===== Scan session =====
            Message::StartScanning => self.handle_start_scanning(),
            Message::StopScanning => self.handle_stop_scanning(),
            Message::ToggleTorch => self.handle_toggle_torch(),
            Message::CameraFrame(frame) => {
                if self.session.is_active() {
                    self.current_frame = Some(frame);
                }
                Task::none()
            }
            Message::CaptureFailed(message) => self.handle_capture_failed(message),
            Message::DecodeAttempted(decoded) => self.handle_decode_attempted(decoded),

            // ===== Request lifecycle =====
            Message::SendRequest => self.handle_send_request(),
            Message::CancelRequest => self.handle_cancel_request(),
            Message::RequestSettled(id, result) => self.handle_request_settled(id, result),
            Message::DismissNotice => self.handle_dismiss_notice(),

            // ===== Settings =====
            Message::UpdateConfig(config) => {
                self.config = config;
                self.camera_path = self
                    .config
                    .camera_path
                    .clone()
                    .or_else(capture::camera::find_default_device);
                Task::none()
            }
            Message::SetAppTheme(index) => self.handle_set_app_theme(index),
            Message::SetEndpointUrl(url) => self.handle_set_endpoint_url(url),
            Message::SetCameraDevice(index) => self.handle_set_camera_device(index),
        }
    }

    fn handle_start_scanning(&mut self) -> Task<cosmic::Action<Message>> {
        if self.notice.is_some() {
            // The acknowledgment gate is up; nothing starts until it clears
            return Task::none();
        }

        self.capture_error = None;
        self.current_frame = None;
        self.last_decode_attempt = None;
        self.session.start();
        info!("Scan session started");

        if self.session.torch_on() {
            torch::apply(&self.torch_devices, true);
        }
        Task::none()
    }

    fn handle_stop_scanning(&mut self) -> Task<cosmic::Action<Message>> {
        self.session.stop();
        self.current_frame = None;
        torch::apply(&self.torch_devices, false);
        info!("Scan session stopped");
        Task::none()
    }

    fn handle_toggle_torch(&mut self) -> Task<cosmic::Action<Message>> {
        if let Some(on) = self.session.toggle_torch() {
            info!(on, "Torch toggled");
            torch::apply(&self.torch_devices, on);
        }
        Task::none()
    }

    fn handle_capture_failed(&mut self, message: String) -> Task<cosmic::Action<Message>> {
        warn!(error = %message, "Capture failed, ending scan session");
        self.session.stop();
        self.current_frame = None;
        self.capture_error = Some(message);
        torch::apply(&self.torch_devices, false);
        Task::none()
    }

    fn handle_decode_attempted(
        &mut self,
        decoded: Option<String>,
    ) -> Task<cosmic::Action<Message>> {
        self.last_decode_attempt = Some(std::time::Instant::now());

        let Some(text) = decoded else {
            return Task::none();
        };

        // One-shot: the session refuses the decode unless it is active,
        // and accepting it deactivates the session (releasing the camera
        // through the subscription teardown).
        if let Some(payload) = self.session.accept_decode(text) {
            info!(len = payload.len(), "QR code decoded, scan session ended");
            self.payload = Some(payload);
            self.current_frame = None;
            torch::apply(&self.torch_devices, false);
        }
        Task::none()
    }

    fn handle_send_request(&mut self) -> Task<cosmic::Action<Message>> {
        let Some(payload) = self.payload.clone() else {
            return Task::none();
        };

        // begin() enforces the gating: empty payload or in-flight request
        let Some((id, registration)) = self.relay.begin(&payload) else {
            return Task::none();
        };

        let client = self.http.clone();
        let endpoint = self.endpoint().to_string();

        let request =
            Abortable::new(
                async move { relay::submit(&client, &endpoint, &payload).await },
                registration,
            );

        Task::perform(request, move |outcome| {
            let result = match outcome {
                Ok(settled) => settled,
                Err(Aborted) => Err(RelayError::Cancelled),
            };
            cosmic::Action::App(Message::RequestSettled(id, result))
        })
    }

    fn handle_cancel_request(&mut self) -> Task<cosmic::Action<Message>> {
        // Finalizes local state immediately; the aborted task's settlement
        // arrives later and is rejected by the id check.
        if self.relay.cancel() {
            self.notice = Some(Notice::Cancelled);
        }
        Task::none()
    }

    fn handle_request_settled(
        &mut self,
        id: crate::relay::RequestId,
        result: Result<String, RelayError>,
    ) -> Task<cosmic::Action<Message>> {
        // Stale settlements (cancelled or superseded handles) are no-ops
        let Some(payload) = self.relay.settle(id) else {
            return Task::none();
        };

        match Notice::from_settlement(payload, result) {
            Some(notice) => {
                match &notice {
                    Notice::Success { reply, .. } => {
                        info!(id, len = reply.len(), "Request succeeded");
                    }
                    Notice::Failure { message, .. } => {
                        warn!(id, error = %message, "Request failed");
                    }
                    Notice::Cancelled => {}
                }
                self.notice = Some(notice);
            }
            None => {
                // Suppressed from the user: diagnostic log only
                debug!(id, "Cancelled request settled");
            }
        }
        Task::none()
    }

    fn handle_dismiss_notice(&mut self) -> Task<cosmic::Action<Message>> {
        match self.notice.take() {
            Some(Notice::Success { .. }) | Some(Notice::Failure { .. }) => {
                // Acknowledging a settled outcome clears the payload and
                // opens the next scan/send cycle
                self.payload = None;
            }
            Some(Notice::Cancelled) | None => {
                // A cancelled request keeps its payload so it can be resent
            }
        }
        Task::none()
    }

    fn handle_set_app_theme(&mut self, index: usize) -> Task<cosmic::Action<Message>> {
        let app_theme = match index {
            0 => AppTheme::System,
            1 => AppTheme::Dark,
            2 => AppTheme::Light,
            _ => return Task::none(),
        };

        info!(?app_theme, "Setting application theme");
        self.config.app_theme = app_theme;

        if let Some(handler) = self.config_handler.as_ref()
            && let Err(err) = self.config.write_entry(handler)
        {
            error!(?err, "Failed to save app theme setting");
        }

        cosmic::command::set_theme(app_theme.theme())
    }

    fn handle_set_endpoint_url(&mut self, url: String) -> Task<cosmic::Action<Message>> {
        self.config.endpoint_url = url;

        if let Some(handler) = self.config_handler.as_ref()
            && let Err(err) = self.config.write_entry(handler)
        {
            error!(?err, "Failed to save endpoint setting");
        }
        Task::none()
    }

    fn handle_set_camera_device(&mut self, index: usize) -> Task<cosmic::Action<Message>> {
        // Index 0 is automatic selection; the rest map to discovered devices
        self.config.camera_path = index
            .checked_sub(1)
            .and_then(|i| self.camera_devices.get(i).cloned());

        info!(path = ?self.config.camera_path, "Camera device selected");

        if let Some(handler) = self.config_handler.as_ref()
            && let Err(err) = self.config.write_entry(handler)
        {
            error!(?err, "Failed to save camera setting");
        }

        // An active session restarts on the new device through the
        // path-keyed capture subscription
        self.camera_path = self
            .config
            .camera_path
            .clone()
            .or_else(capture::camera::find_default_device);
        Task::none()
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Main application module
//!
//! # Architecture
//!
//! - `state`: Application state types (AppModel, Message, Notice)
//! - `update`: Message handling (the scan/send state machine transitions)
//! - `view`: UI rendering
//!
//! The camera is acquired through a subscription that exists only while the
//! scan session is active: when the session ends (user stop, decode, or
//! capture failure), the subscription is torn down and the worker guard
//! releases the device.

mod state;
mod update;
mod view;

use std::sync::Arc;
use std::time::Duration;

use cosmic::app::context_drawer;
use cosmic::cosmic_config::{self, CosmicConfigEntry};
use cosmic::iced::Subscription;
use cosmic::widget::{self, about::About};
use cosmic::{Element, Task};
use tracing::{error, info};

use crate::capture::camera::{self, CameraWorker};
use crate::capture::decoder::QrDecoder;
use crate::capture::CaptureEvent;
use crate::config::Config;
use crate::errors::CaptureError;
use crate::fl;
use crate::relay::Relay;
use crate::torch::TorchDevice;

pub use state::{AppModel, ContextPage, Flags, Message, Notice};

const REPOSITORY: &str = "https://github.com/cosmic-utils/qr-relay";
const APP_ICON: &[u8] =
    include_bytes!("../../resources/icons/hicolor/scalable/apps/io.github.cosmic-utils.qr-relay.svg");

/// Minimum time between QR decode attempts on preview frames
const DECODE_INTERVAL: Duration = Duration::from_millis(250);

impl cosmic::Application for AppModel {
    /// The async executor that will be used to run your application's commands.
    type Executor = cosmic::executor::Default;

    /// Data that your application receives to its init method.
    type Flags = Flags;

    /// Messages which the application and its widgets will emit.
    type Message = Message;

    /// Unique identifier in RDNN (reverse domain name notation) format.
    const APP_ID: &'static str = "io.github.cosmic-utils.qr-relay";

    fn core(&self) -> &cosmic::Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut cosmic::Core {
        &mut self.core
    }

    /// Initializes the application with any given flags and startup commands.
    fn init(
        core: cosmic::Core,
        flags: Self::Flags,
    ) -> (Self, Task<cosmic::Action<Self::Message>>) {
        // Create the about widget
        let about = About::default()
            .name(fl!("app-title"))
            .icon(widget::icon::from_svg_bytes(APP_ICON))
            .version(env!("GIT_VERSION"))
            .links([(fl!("repository"), REPOSITORY)])
            .license(env!("CARGO_PKG_LICENSE"));

        // Load configuration
        let (config_handler, config) =
            match cosmic_config::Config::new(Self::APP_ID, Config::VERSION) {
                Ok(handler) => {
                    let config = match Config::get_entry(&handler) {
                        Ok(config) => config,
                        Err((errors, config)) => {
                            error!(?errors, "Errors loading config");
                            config
                        }
                    };
                    (Some(handler), config)
                }
                Err(err) => {
                    error!(%err, "Failed to create config handler");
                    (None, Config::default())
                }
            };

        if let Some(endpoint) = &flags.endpoint_override {
            info!(endpoint = %endpoint, "Endpoint overridden for this run");
        }

        // Resolve the capture device and torch hardware up front; the
        // device is re-resolved when the configuration changes
        let camera_devices = camera::list_devices();
        let camera_labels = std::iter::once(fl!("camera-auto"))
            .chain(camera_devices.iter().cloned())
            .collect();
        let camera_path = config
            .camera_path
            .clone()
            .or_else(|| camera_devices.first().cloned());
        let torch_devices = TorchDevice::discover();

        let app = AppModel {
            core,
            context_page: ContextPage::default(),
            about,
            config,
            config_handler,
            endpoint_override: flags.endpoint_override,
            session: Default::default(),
            payload: None,
            relay: Relay::default(),
            notice: None,
            current_frame: None,
            last_decode_attempt: None,
            capture_error: None,
            camera_path,
            torch_devices,
            http: reqwest::Client::new(),
            theme_options: vec![
                fl!("theme-system"),
                fl!("theme-dark"),
                fl!("theme-light"),
            ],
            camera_devices,
            camera_labels,
        };

        (app, Task::none())
    }

    /// Elements to pack at the end of the header bar.
    fn header_end(&self) -> Vec<Element<'_, Self::Message>> {
        vec![
            widget::button::icon(widget::icon::from_name("help-about-symbolic"))
                .on_press(Message::ToggleContextPage(ContextPage::About))
                .into(),
            widget::button::icon(widget::icon::from_name("preferences-system-symbolic"))
                .on_press(Message::ToggleContextPage(ContextPage::Settings))
                .into(),
        ]
    }

    /// Display a context drawer if the context page is requested.
    fn context_drawer(&self) -> Option<context_drawer::ContextDrawer<'_, Self::Message>> {
        if !self.core.window.show_context {
            return None;
        }

        Some(match self.context_page {
            ContextPage::About => context_drawer::about(
                &self.about,
                |url| Message::LaunchUrl(url.to_string()),
                Message::ToggleContextPage(ContextPage::About),
            ),
            ContextPage::Settings => self.settings_view(),
        })
    }

    /// Describes the interface based on the current state of the application model.
    fn view(&self) -> Element<'_, Self::Message> {
        self.view()
    }

    /// Register subscriptions for this application.
    fn subscription(&self) -> Subscription<Self::Message> {
        use cosmic::iced::futures::{SinkExt, StreamExt};

        let config_sub = self
            .core()
            .watch_config::<Config>(Self::APP_ID)
            .map(|update| Message::UpdateConfig(update.config));

        // Camera acquisition is scoped to the active session: the
        // subscription only exists while scanning, and tearing it down
        // drops the worker guard, which stops the capture thread and
        // releases the device.
        let capture_sub = match (self.session.is_active(), &self.camera_path) {
            (true, Some(path)) => {
                let path = path.clone();
                Subscription::run_with_id(
                    ("capture", path.clone()),
                    cosmic::iced::stream::channel(16, move |mut output| async move {
                        info!(path = %path, "Capture subscription started");

                        let (frame_tx, mut frame_rx) = futures::channel::mpsc::channel(8);
                        let worker = CameraWorker::spawn(path, frame_tx);

                        while let Some(event) = frame_rx.next().await {
                            let message = match event {
                                CaptureEvent::Frame(frame) => Message::CameraFrame(frame),
                                CaptureEvent::Failed(e) => Message::CaptureFailed(e.to_string()),
                            };
                            if output.send(message).await.is_err() {
                                break;
                            }
                        }

                        drop(worker);
                        info!("Capture subscription ended, camera released");
                    }),
                )
            }
            (true, None) => Subscription::run_with_id(
                "capture-missing",
                cosmic::iced::stream::channel(1, move |mut output| async move {
                    let _ = output
                        .send(Message::CaptureFailed(
                            CaptureError::NoCameraFound.to_string(),
                        ))
                        .await;
                    // Stay alive so the failure is reported exactly once
                    futures::future::pending::<()>().await;
                }),
            ),
            _ => Subscription::none(),
        };

        // Sampled QR decoding of preview frames
        let should_decode = self.session.is_active()
            && self
                .last_decode_attempt
                .map(|t| t.elapsed() >= DECODE_INTERVAL)
                .unwrap_or(true);

        let decode_sub = match (should_decode, &self.current_frame) {
            (true, Some(frame)) => {
                let frame = Arc::clone(frame);
                Subscription::run_with_id(
                    ("qr_decode", frame.captured_at),
                    cosmic::iced::stream::channel(1, move |mut output| async move {
                        let decoder = QrDecoder::new();
                        let decoded = decoder.decode(frame).await;
                        let _ = output.send(Message::DecodeAttempted(decoded)).await;
                    }),
                )
            }
            _ => Subscription::none(),
        };

        Subscription::batch([config_sub, capture_sub, decode_sub])
    }

    /// Handles messages emitted by the application and its widgets.
    fn update(&mut self, message: Self::Message) -> Task<cosmic::Action<Self::Message>> {
        self.update(message)
    }
}

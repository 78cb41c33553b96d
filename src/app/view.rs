// SPDX-License-Identifier: GPL-3.0-only

//! Main application view
//!
//! The view is a pure function of
//! `(session active, torch flag, pending payload, loading, notice)`:
//!
//! - inactive, no payload: the start button
//! - active: live preview, stop button, torch toggle
//! - payload pending: payload text plus send, or sending indicator plus cancel
//! - notice present: modal overlay that must be acknowledged

use cosmic::Element;
use cosmic::app::context_drawer;
use cosmic::iced::{Alignment, Background, Color, Length};
use cosmic::widget;

use crate::app::state::{AppModel, ContextPage, Message, Notice};
use crate::fl;

/// Preview surface size (capture frames are 4:3)
const PREVIEW_WIDTH: f32 = 480.0;
const PREVIEW_HEIGHT: f32 = 360.0;

impl AppModel {
    /// Build the main application view
    pub fn view(&self) -> Element<'_, Message> {
        let spacing = cosmic::theme::spacing();

        let mut content = widget::column()
            .spacing(spacing.space_m)
            .align_x(Alignment::Center)
            .push(widget::text::title3(fl!("scan-a-qr-code")));

        if self.session.is_active() {
            content = content
                .push(self.build_preview())
                .push(widget::text::body(fl!("point-your-camera")));
        }

        if let Some(message) = &self.capture_error {
            content = content.push(widget::text::body(fl!(
                "camera-error",
                message = message.as_str()
            )));
        }

        if let Some(payload) = &self.payload {
            content = content.push(self.build_payload_panel(payload));
        }

        content = content.push(self.build_session_controls());

        let screen: Element<'_, Message> = widget::container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into();

        match &self.notice {
            Some(notice) => cosmic::iced::widget::stack![screen, self.build_notice_overlay(notice)]
                .width(Length::Fill)
                .height(Length::Fill)
                .into(),
            None => screen,
        }
    }

    /// Live camera preview, or a dark placeholder until the first frame
    fn build_preview(&self) -> Element<'_, Message> {
        match &self.current_frame {
            Some(frame) => widget::image(widget::image::Handle::from_rgba(
                frame.width,
                frame.height,
                frame.data.to_vec(),
            ))
            .width(Length::Fixed(PREVIEW_WIDTH))
            .into(),
            None => widget::container(widget::Space::new(
                Length::Fixed(PREVIEW_WIDTH),
                Length::Fixed(PREVIEW_HEIGHT),
            ))
            .style(|_theme| widget::container::Style {
                background: Some(Background::Color(Color::BLACK)),
                ..Default::default()
            })
            .into(),
        }
    }

    /// Pending payload with its send/cancel controls
    fn build_payload_panel(&self, payload: &str) -> Element<'_, Message> {
        let spacing = cosmic::theme::spacing();

        let mut panel = widget::column()
            .spacing(spacing.space_s)
            .align_x(Alignment::Center)
            .push(widget::text::body(fl!("scanned-data", payload = payload)));

        if self.is_sending() {
            panel = panel.push(widget::text::body(fl!("sending"))).push(
                widget::button::destructive(fl!("cancel-request"))
                    .on_press(Message::CancelRequest),
            );
        } else {
            panel = panel.push(
                widget::button::suggested(fl!("send-request")).on_press(Message::SendRequest),
            );
        }

        panel.into()
    }

    /// Start/stop/torch controls for the scan session
    fn build_session_controls(&self) -> Element<'_, Message> {
        let spacing = cosmic::theme::spacing();
        let mut controls = widget::row().spacing(spacing.space_s);

        if self.session.is_active() {
            controls = controls
                .push(
                    widget::button::destructive(fl!("stop-scanning"))
                        .on_press(Message::StopScanning),
                )
                .push(
                    widget::button::standard(if self.session.torch_on() {
                        fl!("torch-off")
                    } else {
                        fl!("torch-on")
                    })
                    .on_press(Message::ToggleTorch),
                );
        } else {
            controls = controls.push(
                widget::button::suggested(fl!("start-scanning")).on_press(Message::StartScanning),
            );
        }

        controls.into()
    }

    /// Modal notice overlay (the acknowledgment gate)
    fn build_notice_overlay(&self, notice: &Notice) -> Element<'_, Message> {
        let spacing = cosmic::theme::spacing();

        let (title, body) = match notice {
            Notice::Success { payload, reply } => (
                fl!("qr-code-scanned"),
                format!(
                    "{}\n{}",
                    fl!("scanned-data", payload = payload.as_str()),
                    fl!("server-response", reply = reply.as_str())
                ),
            ),
            Notice::Failure { payload, message } => (
                fl!("error-occurred"),
                format!(
                    "{}\n{}",
                    fl!("scanned-data", payload = payload.as_str()),
                    fl!("error-detail", message = message.as_str())
                ),
            ),
            Notice::Cancelled => (fl!("request-canceled"), fl!("request-canceled-body")),
        };

        let card = widget::container(
            widget::column()
                .spacing(spacing.space_s)
                .align_x(Alignment::Center)
                .push(widget::text::title4(title))
                .push(widget::text::body(body))
                .push(widget::button::suggested(fl!("ok")).on_press(Message::DismissNotice)),
        )
        .padding(spacing.space_l)
        .max_width(420.0)
        .class(cosmic::theme::Container::Card);

        widget::container(card)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .style(|_theme| widget::container::Style {
                background: Some(Background::Color(Color::from_rgba(0.0, 0.0, 0.0, 0.5))),
                ..Default::default()
            })
            .into()
    }

    /// Create the settings view for the context drawer
    pub fn settings_view(&self) -> context_drawer::ContextDrawer<'_, Message> {
        let spacing = cosmic::theme::spacing();

        let theme_index = match self.config.app_theme {
            crate::config::AppTheme::System => 0,
            crate::config::AppTheme::Dark => 1,
            crate::config::AppTheme::Light => 2,
        };
        let theme_dropdown =
            widget::dropdown(&self.theme_options, Some(theme_index), Message::SetAppTheme);

        let endpoint_input =
            widget::text_input(crate::config::DEFAULT_ENDPOINT, &self.config.endpoint_url)
                .on_input(Message::SetEndpointUrl);

        // Index 0 is automatic; a pinned path that vanished falls back to it
        let camera_index = self
            .config
            .camera_path
            .as_ref()
            .and_then(|path| self.camera_devices.iter().position(|d| d == path))
            .map(|i| i + 1)
            .unwrap_or(0);
        let camera_dropdown = widget::dropdown(
            &self.camera_labels,
            Some(camera_index),
            Message::SetCameraDevice,
        );

        let settings_column: Element<'_, Message> = widget::column()
            .push(
                widget::text(fl!("appearance"))
                    .size(16)
                    .font(cosmic::font::bold()),
            )
            .push(widget::vertical_space().height(spacing.space_xxs))
            .push(theme_dropdown)
            .push(widget::vertical_space().height(spacing.space_l))
            .push(widget::divider::horizontal::default())
            .push(widget::vertical_space().height(spacing.space_s))
            .push(
                widget::text(fl!("endpoint"))
                    .size(16)
                    .font(cosmic::font::bold()),
            )
            .push(widget::text(fl!("endpoint-description")).size(12))
            .push(widget::vertical_space().height(spacing.space_xxs))
            .push(endpoint_input)
            .push(widget::vertical_space().height(spacing.space_l))
            .push(widget::divider::horizontal::default())
            .push(widget::vertical_space().height(spacing.space_s))
            .push(
                widget::text(fl!("camera"))
                    .size(16)
                    .font(cosmic::font::bold()),
            )
            .push(widget::vertical_space().height(spacing.space_xxs))
            .push(camera_dropdown)
            .spacing(0)
            .into();

        context_drawer::context_drawer(
            settings_column,
            Message::ToggleContextPage(ContextPage::Settings),
        )
        .title(fl!("settings"))
    }
}

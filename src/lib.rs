// SPDX-License-Identifier: GPL-3.0-only

//! QR Relay - scan a QR code and relay it over HTTP
//!
//! This library backs a single-screen COSMIC application: the camera is
//! activated on demand, the first QR code decoded during a session is held
//! as the pending payload, and the user may submit it as JSON to a
//! configured HTTP endpoint or cancel the request while it is in flight.
//!
//! # Architecture
//!
//! - [`app`]: Application state, message handling, and UI
//! - [`capture`]: Camera acquisition, frame production, and QR decoding
//! - [`relay`]: The request lifecycle manager (send/cancel state machine)
//! - [`torch`]: Camera torch LED control
//! - [`config`]: User configuration handling

pub mod app;
pub mod capture;
pub mod config;
pub mod errors;
pub mod i18n;
pub mod relay;
pub mod torch;

// Re-export commonly used types
pub use app::{AppModel, Flags, Message};
pub use config::Config;
pub use relay::{Relay, RequestId};

// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;
use qr_relay::app::{AppModel, Flags};
use qr_relay::i18n;

#[derive(Parser)]
#[command(name = "qr-relay")]
#[command(about = "QR code scanner for the COSMIC desktop that relays scans over HTTP")]
#[command(version)]
struct Cli {
    /// Override the configured endpoint for this run (not persisted)
    #[arg(long)]
    endpoint: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qr_relay=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    // Get the system's preferred languages.
    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();

    // Enable localizations to be applied.
    i18n::init(&requested_languages);

    // Settings for configuring the application window and iced runtime.
    let settings = cosmic::app::Settings::default().size_limits(
        cosmic::iced::Limits::NONE
            .min_width(360.0)
            .min_height(400.0),
    );

    let flags = Flags {
        endpoint_override: cli.endpoint,
    };

    cosmic::app::run::<AppModel>(settings, flags)?;

    Ok(())
}

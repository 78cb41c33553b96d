// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use qr_relay::Config;
use qr_relay::config::AppTheme;

#[test]
fn test_config_default_endpoint() {
    let config = Config::default();
    assert!(
        !config.endpoint_url.is_empty(),
        "Default endpoint should not be empty"
    );
    assert!(
        config.endpoint_url.starts_with("http"),
        "Default endpoint should be an http(s) URL"
    );
}

#[test]
fn test_config_default_theme() {
    let config = Config::default();
    assert_eq!(config.app_theme, AppTheme::System);
}

#[test]
fn test_config_default_camera() {
    // No camera pinned by default; the device is auto-discovered at runtime
    let config = Config::default();
    assert!(config.camera_path.is_none());
}

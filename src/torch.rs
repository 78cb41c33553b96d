// SPDX-License-Identifier: GPL-3.0-only

//! Camera torch LED control via Linux sysfs
//!
//! Discovers torch-capable flash LEDs exposed at `/sys/class/leds/*:flash`
//! and drives them through the `brightness` file, which is group-writable by
//! `feedbackd`, avoiding the root-only `flash_strobe` interface.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A torch LED device discovered via sysfs
#[derive(Debug, Clone)]
pub struct TorchDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness` file)
    max_brightness: u32,
    /// Human-readable name (directory basename)
    name: String,
}

impl TorchDevice {
    /// Scan `/sys/class/leds/` for entries matching `*:flash` and return
    /// all devices that we can write to.
    pub fn discover() -> Vec<TorchDevice> {
        let leds_dir = Path::new("/sys/class/leds");
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            warn!("Cannot read /sys/class/leds — torch discovery skipped");
            return Vec::new();
        };

        let mut devices = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };

            // Match entries like "white:flash", "yellow:flash"
            if !name_str.ends_with(":flash") {
                continue;
            }

            let led_path = entry.path();
            let brightness_path = led_path.join("brightness");
            let max_brightness_path = led_path.join("max_brightness");

            let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
                Ok(s) => match s.trim().parse::<u32>() {
                    Ok(v) if v > 0 => v,
                    _ => {
                        warn!(
                            path = %max_brightness_path.display(),
                            "Invalid max_brightness value"
                        );
                        continue;
                    }
                },
                Err(e) => {
                    warn!(
                        path = %max_brightness_path.display(),
                        error = %e,
                        "Cannot read max_brightness"
                    );
                    continue;
                }
            };

            // Verify we can write to brightness
            match std::fs::OpenOptions::new()
                .write(true)
                .open(&brightness_path)
            {
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        path = %brightness_path.display(),
                        error = %e,
                        "Cannot write brightness — user may need to be in 'feedbackd' group"
                    );
                    continue;
                }
            }

            info!(name = name_str, max_brightness, "Discovered torch LED");

            devices.push(TorchDevice {
                path: led_path,
                max_brightness,
                name: name_str.to_string(),
            });
        }

        // Sort by name for deterministic ordering (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    /// Get the device name (e.g. "white:flash")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Turn the torch on at full brightness or off
    pub fn set_on(&self, on: bool) -> io::Result<()> {
        let value = if on { self.max_brightness } else { 0 };
        std::fs::write(self.path.join("brightness"), value.to_string())
    }
}

/// Apply a torch state to every discovered device, logging failures.
///
/// Torch state is best effort: a device that stops accepting writes (e.g.
/// permission change mid-session) must not take down the scan session.
pub fn apply(devices: &[TorchDevice], on: bool) {
    for device in devices {
        if let Err(e) = device.set_on(on) {
            warn!(name = device.name(), error = %e, "Failed to set torch state");
        }
    }
}

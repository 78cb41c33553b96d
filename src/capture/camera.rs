// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture worker
//!
//! Owns the camera device for the duration of a scan session. The worker
//! runs on a dedicated thread (V4L2 streaming is blocking I/O), converts
//! frames to RGBA, and hands them off through a bounded channel. Dropping
//! the [`CameraWorker`] guard signals the thread to stop and joins it, so
//! the device is released deterministically when the session ends.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use futures::channel::mpsc;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use super::{CameraFrame, CaptureEvent};
use crate::errors::CaptureError;

/// Capture resolution requested from the driver
const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;

/// Number of mmap buffers for the capture queue
const BUFFER_COUNT: u32 = 4;

/// Enumerate usable capture devices under `/dev`, in name order.
///
/// Scans `/dev/video*` and keeps the nodes that open and report the
/// video-capture capability.
pub fn list_devices() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut candidates: Vec<String> = entries
        .flatten()
        .filter_map(|e| {
            let name = e.file_name();
            let name = name.to_str()?;
            name.starts_with("video").then(|| e.path().to_string_lossy().to_string())
        })
        .collect();
    candidates.sort();

    let mut devices = Vec::new();
    for path in candidates {
        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        match dev.query_caps() {
            Ok(caps) if caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) => {
                debug!(path = %path, card = %caps.card, "Found capture device");
                devices.push(path);
            }
            Ok(_) => debug!(path = %path, "Device has no capture capability"),
            Err(e) => debug!(path = %path, error = %e, "Capability query failed"),
        }
    }

    devices
}

/// First usable capture device, if any.
pub fn find_default_device() -> Option<String> {
    let path = list_devices().into_iter().next()?;
    info!(path = %path, "Selected capture device");
    Some(path)
}

/// Scoped camera acquisition guard.
///
/// The device is held by the worker thread between `spawn` and drop. Drop
/// sets the stop flag and joins the thread, which closes the stream and the
/// device before returning.
pub struct CameraWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CameraWorker {
    /// Start capturing from `path`, delivering events into `events`.
    pub fn spawn(path: String, events: mpsc::Sender<CaptureEvent>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                let mut events = events;
                if let Err(e) = capture_loop(&path, &stop_flag, &mut events) {
                    warn!(path = %path, error = %e, "Capture worker stopped on error");
                    deliver_failure(&mut events, e);
                }
                info!(path = %path, "Capture worker exited, device released");
            })
            .ok();

        if handle.is_none() {
            warn!("Failed to spawn capture thread");
        }

        Self {
            stop,
            handle,
        }
    }
}

impl Drop for CameraWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Deliver the terminal failure event, waiting out a full frame buffer.
///
/// The worker thread exits right after, so blocking here is safe; the send
/// only fails once the receiving subscription is gone, and then nobody is
/// left to tell.
fn deliver_failure(events: &mut mpsc::Sender<CaptureEvent>, err: CaptureError) {
    use futures::SinkExt;

    if futures::executor::block_on(events.send(CaptureEvent::Failed(err))).is_err() {
        debug!("Frame channel closed before failure delivery");
    }
}

fn capture_loop(
    path: &str,
    stop: &AtomicBool,
    events: &mut mpsc::Sender<CaptureEvent>,
) -> Result<(), CaptureError> {
    let dev = Device::with_path(path).map_err(|e| CaptureError::Open(e.to_string()))?;
    let format = negotiate_format(&dev)?;
    let fourcc = format.fourcc;

    info!(
        path,
        width = format.width,
        height = format.height,
        fourcc = %fourcc,
        "Camera stream starting"
    );

    let mut stream = Stream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
        .map_err(|e| CaptureError::Open(e.to_string()))?;

    while !stop.load(Ordering::Acquire) {
        let (buf, meta) = stream
            .next()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        // MJPG buffers are only partially filled; bytesused is authoritative
        let used = meta.bytesused as usize;
        let data = if used > 0 && used <= buf.len() {
            &buf[..used]
        } else {
            buf
        };

        let frame = match convert_frame(data, &format, fourcc) {
            Ok(frame) => frame,
            Err(e) => {
                // A single bad frame (truncated MJPG, mid-stream glitch) is
                // not fatal; skip it and keep streaming.
                debug!(error = %e, "Skipping unconvertible frame");
                continue;
            }
        };

        match events.try_send(CaptureEvent::Frame(Arc::new(frame))) {
            Ok(()) => {}
            Err(e) if e.is_disconnected() => {
                debug!("Frame channel closed, stopping capture");
                break;
            }
            Err(_) => {
                // Channel full: the UI is behind, drop the frame
            }
        }
    }

    Ok(())
}

/// Formats we can convert, in preference order (uncompressed first)
fn wanted_formats() -> [FourCC; 2] {
    [FourCC::new(b"YUYV"), FourCC::new(b"MJPG")]
}

/// Negotiate a format we can convert, preferring uncompressed YUYV.
fn negotiate_format(dev: &Device) -> Result<Format, CaptureError> {
    let selected = select_format(|fourcc| {
        let requested = Format::new(CAPTURE_WIDTH, CAPTURE_HEIGHT, fourcc);
        match dev.set_format(&requested) {
            Ok(actual) => Some(actual),
            Err(e) => {
                debug!(%fourcc, error = %e, "Driver rejected format");
                None
            }
        }
    });
    if let Some(format) = selected {
        return Ok(format);
    }

    // The driver insisted on something else; accept it if convertible
    let actual = dev
        .format()
        .map_err(|e| CaptureError::Open(e.to_string()))?;
    if wanted_formats().contains(&actual.fourcc) {
        Ok(actual)
    } else {
        Err(CaptureError::Format(format!(
            "driver offers only {}",
            actual.fourcc
        )))
    }
}

/// Run the negotiation order against a driver `set` call.
///
/// A rejected or substituted candidate moves negotiation to the next wanted
/// fourcc; only a candidate the driver accepts exactly wins.
fn select_format(mut set: impl FnMut(FourCC) -> Option<Format>) -> Option<Format> {
    wanted_formats().into_iter().find_map(|fourcc| {
        let actual = set(fourcc)?;
        (actual.fourcc == fourcc).then_some(actual)
    })
}

fn convert_frame(data: &[u8], format: &Format, fourcc: FourCC) -> Result<CameraFrame, CaptureError> {
    let captured_at = Instant::now();

    if fourcc == FourCC::new(b"YUYV") {
        let rgba = yuyv_to_rgba(data, format.width, format.height)?;
        Ok(CameraFrame {
            width: format.width,
            height: format.height,
            data: Arc::from(rgba),
            captured_at,
        })
    } else if fourcc == FourCC::new(b"MJPG") {
        let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
            .map_err(|e| CaptureError::Format(e.to_string()))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(CameraFrame {
            width,
            height,
            data: Arc::from(rgba.into_raw()),
            captured_at,
        })
    } else {
        Err(CaptureError::Format(format!("unsupported fourcc {}", fourcc)))
    }
}

/// Convert packed YUYV 4:2:2 to RGBA using BT.601 integer math.
fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CaptureError> {
    let expected = (width as usize) * (height as usize) * 2;
    if data.len() < expected {
        return Err(CaptureError::Format(format!(
            "YUYV buffer too short: {} < {}",
            data.len(),
            expected
        )));
    }

    let mut rgba = Vec::with_capacity((width as usize) * (height as usize) * 4);

    for chunk in data[..expected].chunks_exact(4) {
        let y0 = chunk[0] as i32;
        let u = chunk[1] as i32;
        let y1 = chunk[2] as i32;
        let v = chunk[3] as i32;

        push_pixel(&mut rgba, y0, u, v);
        push_pixel(&mut rgba, y1, u, v);
    }

    Ok(rgba)
}

fn push_pixel(rgba: &mut Vec<u8>, y: i32, u: i32, v: i32) {
    let c = y - 16;
    let d = u - 128;
    let e = v - 128;

    let r = clamp_u8((298 * c + 409 * e + 128) >> 8);
    let g = clamp_u8((298 * c - 100 * d - 208 * e + 128) >> 8);
    let b = clamp_u8((298 * c + 516 * d + 128) >> 8);

    rgba.extend_from_slice(&[r, g, b, 255]);
}

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgba_black_and_white() {
        // One YUYV macropixel pair: full-range black then white, neutral chroma
        let data = [16u8, 128, 235, 128];
        let rgba = yuyv_to_rgba(&data, 2, 1).unwrap();
        assert_eq!(rgba.len(), 8);

        // Black pixel
        assert!(rgba[0] < 5 && rgba[1] < 5 && rgba[2] < 5);
        assert_eq!(rgba[3], 255);

        // White pixel
        assert!(rgba[4] > 250 && rgba[5] > 250 && rgba[6] > 250);
        assert_eq!(rgba[7], 255);
    }

    #[test]
    fn test_yuyv_to_rgba_red_lean() {
        // High V pushes red up for both pixels of the pair
        let data = [128u8, 128, 128, 255];
        let rgba = yuyv_to_rgba(&data, 2, 1).unwrap();
        assert!(rgba[0] > rgba[2], "V excursion should raise red above blue");
    }

    #[test]
    fn test_yuyv_rejects_short_buffer() {
        let data = [0u8; 8];
        assert!(yuyv_to_rgba(&data, 4, 2).is_err());
    }

    #[test]
    fn test_clamp_u8() {
        assert_eq!(clamp_u8(-10), 0);
        assert_eq!(clamp_u8(0), 0);
        assert_eq!(clamp_u8(128), 128);
        assert_eq!(clamp_u8(300), 255);
    }

    #[test]
    fn test_select_format_falls_through_on_rejection() {
        // Driver errors on YUYV but accepts MJPG
        let mjpg = FourCC::new(b"MJPG");
        let selected = select_format(|fourcc| {
            (fourcc == mjpg).then(|| Format::new(CAPTURE_WIDTH, CAPTURE_HEIGHT, mjpg))
        });
        assert_eq!(selected.map(|f| f.fourcc), Some(mjpg));
    }

    #[test]
    fn test_select_format_skips_substituted_fourcc() {
        // Driver answers every request with a fourcc we cannot convert
        let selected = select_format(|_| {
            Some(Format::new(
                CAPTURE_WIDTH,
                CAPTURE_HEIGHT,
                FourCC::new(b"NV12"),
            ))
        });
        assert!(selected.is_none());
    }

    #[test]
    fn test_select_format_none_when_all_rejected() {
        assert!(select_format(|_| None).is_none());
    }

    #[test]
    fn test_failure_delivered_through_full_channel() {
        use futures::StreamExt;

        let (mut tx, mut rx) = mpsc::channel(1);

        // Fill the channel so try_send would fail
        let frame = Arc::new(CameraFrame {
            width: 1,
            height: 1,
            data: Arc::from(vec![0u8; 4]),
            captured_at: Instant::now(),
        });
        while tx.try_send(CaptureEvent::Frame(Arc::clone(&frame))).is_ok() {}

        let worker = std::thread::spawn(move || {
            deliver_failure(&mut tx, CaptureError::NoCameraFound);
        });

        // Drain the backlog; the failure must arrive before the stream ends
        let failure =
            std::iter::from_fn(|| futures::executor::block_on(rx.next()))
                .find(|event| matches!(event, CaptureEvent::Failed(_)));
        assert!(failure.is_some(), "terminal failure must not be dropped");
        worker.join().unwrap();
    }
}

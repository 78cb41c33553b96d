// SPDX-License-Identifier: GPL-3.0-only

//! QR code decoding of captured frames
//!
//! Converts RGBA frames to grayscale, downscales large frames, and runs the
//! rqrr detector. Decoding is CPU-bound and runs in a blocking task so the
//! UI thread stays responsive.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::CameraFrame;

/// QR code decoder
///
/// Returns the content of the first decodable QR code in a frame, if any.
pub struct QrDecoder {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    /// Create a decoder with default settings
    pub fn new() -> Self {
        Self {
            // 640px is plenty for codes held up to a camera and keeps
            // per-frame detection well under a frame period
            max_dimension: 640,
        }
    }

    /// Decode a QR code from a camera frame, if one is present.
    pub async fn decode(&self, frame: Arc<CameraFrame>) -> Option<String> {
        let max_dim = self.max_dimension;

        tokio::task::spawn_blocking(move || decode_sync(&frame, max_dim))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "QR decode task panicked");
                None
            })
    }
}

/// Synchronous decode (runs in a blocking task)
fn decode_sync(frame: &CameraFrame, max_dimension: u32) -> Option<String> {
    let start = std::time::Instant::now();

    let luma = rgba_to_luma(&frame.data, frame.width, frame.height)?;
    let (luma, width, height) = if frame.width > max_dimension || frame.height > max_dimension {
        downscale_luma(&luma, frame.width, frame.height, max_dimension)
    } else {
        (luma, frame.width, frame.height)
    };

    let image = image::GrayImage::from_raw(width, height, luma)?;
    let mut prepared = rqrr::PreparedImage::prepare(image);
    let grids = prepared.detect_grids();

    trace!(
        count = grids.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "QR grid detection complete"
    );

    for grid in grids {
        match grid.decode() {
            Ok((meta, content)) => {
                debug!(
                    ecc_level = meta.ecc_level,
                    len = content.len(),
                    "Decoded QR code"
                );
                return Some(content);
            }
            Err(e) => {
                debug!(error = %e, "Failed to decode detected QR grid");
            }
        }
    }

    None
}

/// Convert tightly packed RGBA to 8-bit luma (BT.601 weights).
fn rgba_to_luma(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = (width as usize) * (height as usize);
    if data.len() < pixels * 4 {
        warn!(
            len = data.len(),
            pixels, "RGBA buffer shorter than frame dimensions"
        );
        return None;
    }

    let mut luma = Vec::with_capacity(pixels);
    for px in data[..pixels * 4].chunks_exact(4) {
        let r = px[0] as u32;
        let g = px[1] as u32;
        let b = px[2] as u32;
        luma.push(((77 * r + 150 * g + 29 * b) >> 8) as u8);
    }

    Some(luma)
}

/// Nearest-neighbor downscale of a luma plane so the longest side fits
/// `max_dimension`. Returns the plane and its new dimensions.
fn downscale_luma(luma: &[u8], width: u32, height: u32, max_dimension: u32) -> (Vec<u8>, u32, u32) {
    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let dst_width = ((width as f32 / scale) as u32).max(1);
    let dst_height = ((height as f32 / scale) as u32).max(1);

    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);
    for y in 0..dst_height {
        let src_y = ((y as f32 * scale) as u32).min(height - 1) as usize;
        for x in 0..dst_width {
            let src_x = ((x as f32 * scale) as u32).min(width - 1) as usize;
            result.push(luma[src_y * width as usize + src_x]);
        }
    }

    (result, dst_width, dst_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> CameraFrame {
        let data: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        CameraFrame {
            width,
            height,
            data: Arc::from(data),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_rgba_to_luma_weights() {
        // Pure green carries the most luma weight, blue the least
        let green = rgba_to_luma(&[0, 255, 0, 255], 1, 1).unwrap();
        let blue = rgba_to_luma(&[0, 0, 255, 255], 1, 1).unwrap();
        let red = rgba_to_luma(&[255, 0, 0, 255], 1, 1).unwrap();
        assert!(green[0] > red[0]);
        assert!(red[0] > blue[0]);
    }

    #[test]
    fn test_rgba_to_luma_short_buffer() {
        assert!(rgba_to_luma(&[0u8; 7], 2, 1).is_none());
    }

    #[test]
    fn test_downscale_luma_dimensions() {
        let luma = vec![0u8; 1280 * 720];
        let (scaled, w, h) = downscale_luma(&luma, 1280, 720, 640);
        assert_eq!(w, 640);
        assert_eq!(h, 360);
        assert_eq!(scaled.len(), (w * h) as usize);
    }

    #[test]
    fn test_blank_frame_has_no_code() {
        let frame = solid_frame(64, 64, [255, 255, 255, 255]);
        assert_eq!(decode_sync(&frame, 640), None);
    }
}

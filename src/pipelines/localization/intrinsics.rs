// SPDX-License-Identifier: GPL-3.0-only

//! Query image preparation
//!
//! Rotates the sensor buffer upright, resamples it to the canonical query
//! resolution and remaps the pinhole intrinsics to match the image that is
//! actually sent:
//!
//! ```text
//! raw sensor (W x H) → orient (portrait: quarter turn clockwise) → resize (960x720 / 720x960) → JPEG
//! ```
//!
//! In portrait the upright image is `H x W`. A raw pixel `(u, v)` lands at
//! `(H - v, u)`, so the focal lengths swap and the principal point becomes
//! `(H - cy, cx)` before scaling.

use crate::constants::{JpegQuality, query_resolution};
use crate::errors::EncodingError;
use crate::frame::{CameraFrame, CameraIntrinsics, DeviceOrientation};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

/// Query image plus the intrinsics that describe it
#[derive(Debug, Clone, PartialEq)]
pub struct ResizedQuery {
    /// JPEG bytes at `width x height`
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Intrinsics of the oriented, resized image (`cx`/`cy` are px/py)
    pub intrinsics: CameraIntrinsics,
}

/// Target resolution for an orientation
pub fn target_size(orientation: DeviceOrientation) -> (u32, u32) {
    if orientation.is_portrait() {
        (
            query_resolution::PORTRAIT_WIDTH,
            query_resolution::PORTRAIT_HEIGHT,
        )
    } else {
        (
            query_resolution::LANDSCAPE_WIDTH,
            query_resolution::LANDSCAPE_HEIGHT,
        )
    }
}

/// Rotate the raw sensor image upright for the given orientation
pub fn orient(image: DynamicImage, orientation: DeviceOrientation) -> DynamicImage {
    if orientation.is_portrait() {
        image.rotate90()
    } else {
        image
    }
}

/// Remap raw-buffer intrinsics onto the oriented image scaled by `scale_x`/`scale_y`
///
/// `raw_height` is the height of the unrotated sensor buffer.
pub fn remap_intrinsics(
    raw: &CameraIntrinsics,
    raw_height: u32,
    scale_x: f32,
    scale_y: f32,
    orientation: DeviceOrientation,
) -> CameraIntrinsics {
    match orientation {
        DeviceOrientation::Portrait => CameraIntrinsics {
            fx: raw.fy * scale_x,
            fy: raw.fx * scale_y,
            cx: (raw_height as f32 - raw.cy) * scale_x,
            cy: raw.cx * scale_y,
        },
        DeviceOrientation::Landscape => CameraIntrinsics {
            fx: raw.fx * scale_x,
            fy: raw.fy * scale_y,
            cx: raw.cx * scale_x,
            cy: raw.cy * scale_y,
        },
    }
}

/// Resizes frames to the query resolution and adjusts their intrinsics
#[derive(Debug, Clone)]
pub struct IntrinsicsAdjuster {
    quality: JpegQuality,
    filter: FilterType,
}

impl IntrinsicsAdjuster {
    /// Create an adjuster with high JPEG quality and bilinear resampling
    pub fn new() -> Self {
        Self {
            quality: JpegQuality::High,
            filter: FilterType::Triangle,
        }
    }

    pub fn with_quality(quality: JpegQuality) -> Self {
        Self {
            quality,
            ..Self::new()
        }
    }

    pub fn quality(&self) -> JpegQuality {
        self.quality
    }

    /// Produce the query image and adjusted intrinsics for `frame`
    ///
    /// CPU-bound; async callers should run it on a blocking thread.
    pub fn adjust(&self, frame: &CameraFrame) -> Result<ResizedQuery, EncodingError> {
        info!(
            width = frame.width,
            height = frame.height,
            orientation = %frame.orientation,
            "Preparing query image"
        );

        let image = frame.to_image()?;
        let oriented = orient(image, frame.orientation);
        let (oriented_width, oriented_height) = (oriented.width(), oriented.height());

        let (target_width, target_height) = target_size(frame.orientation);
        let scale_x = target_width as f32 / oriented_width as f32;
        let scale_y = target_height as f32 / oriented_height as f32;
        debug!(scale_x, scale_y, target_width, target_height, "Query scale factors");

        let resized = oriented.resize_exact(target_width, target_height, self.filter);
        if resized.width() != target_width || resized.height() != target_height {
            return Err(EncodingError::Resize(format!(
                "expected {}x{}, got {}x{}",
                target_width,
                target_height,
                resized.width(),
                resized.height()
            )));
        }

        let image_data = encode_jpeg(resized.into_rgb8(), self.quality)?;
        let intrinsics = remap_intrinsics(
            &frame.intrinsics,
            frame.height,
            scale_x,
            scale_y,
            frame.orientation,
        );

        debug!(
            size = image_data.len(),
            fx = intrinsics.fx,
            fy = intrinsics.fy,
            px = intrinsics.cx,
            py = intrinsics.cy,
            "Query image ready"
        );

        Ok(ResizedQuery {
            image_data,
            width: target_width,
            height: target_height,
            intrinsics,
        })
    }
}

impl Default for IntrinsicsAdjuster {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode image as JPEG
fn encode_jpeg(image: RgbImage, quality: JpegQuality) -> Result<Vec<u8>, EncodingError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.value());

    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| EncodingError::Compress(e.to_string()))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PixelFormat, TrackingState};
    use image::{GenericImageView, Rgb};
    use nalgebra::Matrix4;
    use std::sync::Arc;
    use std::time::Instant;

    const TOLERANCE: f32 = 1e-4;

    fn frame(width: u32, height: u32, orientation: DeviceOrientation) -> CameraFrame {
        CameraFrame {
            width,
            height,
            data: Arc::from(vec![128u8; (width * height * 3) as usize]),
            format: PixelFormat::Rgb8,
            intrinsics: CameraIntrinsics::new(1510.0, 1490.0, 955.0, 725.0),
            orientation,
            camera_transform: Matrix4::identity(),
            tracking_state: TrackingState::Normal,
            captured_at: Instant::now(),
        }
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "{} != {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_landscape_intrinsics_scale_independently() {
        let raw = CameraIntrinsics::new(1510.0, 1490.0, 955.0, 725.0);
        let (w, h) = (1920u32, 1080u32);
        let adjusted = remap_intrinsics(
            &raw,
            h,
            960.0 / w as f32,
            720.0 / h as f32,
            DeviceOrientation::Landscape,
        );

        assert_close(adjusted.fx, 1510.0 * (960.0 / 1920.0));
        assert_close(adjusted.fy, 1490.0 * (720.0 / 1080.0));
        assert_close(adjusted.cx, 955.0 * (960.0 / 1920.0));
        assert_close(adjusted.cy, 725.0 * (720.0 / 1080.0));
    }

    #[test]
    fn test_portrait_swaps_focal_lengths_and_flips_principal_point() {
        let raw = CameraIntrinsics::new(1510.0, 1490.0, 955.0, 725.0);
        // Raw 1920x1440 becomes 1440x1920 upright, scaled to 720x960
        let adjusted = remap_intrinsics(&raw, 1440, 0.5, 0.5, DeviceOrientation::Portrait);

        assert_close(adjusted.fx, 1490.0 * 0.5);
        assert_close(adjusted.fy, 1510.0 * 0.5);
        assert_close(adjusted.cx, (1440.0 - 725.0) * 0.5);
        assert_close(adjusted.cy, 955.0 * 0.5);
    }

    #[test]
    fn test_target_sizes() {
        assert_eq!(target_size(DeviceOrientation::Landscape), (960, 720));
        assert_eq!(target_size(DeviceOrientation::Portrait), (720, 960));
    }

    #[test]
    fn test_portrait_rotation_matches_principal_point_remap() {
        // Marker at raw (u, v) = (1, 0) in a 4x3 buffer
        let mut raw = RgbImage::new(4, 3);
        raw.put_pixel(1, 0, Rgb([255, 0, 0]));

        let upright = orient(DynamicImage::ImageRgb8(raw), DeviceOrientation::Portrait);
        assert_eq!((upright.width(), upright.height()), (3, 4));

        // (H - 1 - v, u) in pixel indices, i.e. (H - v, u) in continuous coordinates
        assert_eq!(upright.get_pixel(2, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_adjust_landscape_frame() {
        let adjuster = IntrinsicsAdjuster::new();
        let query = adjuster
            .adjust(&frame(64, 48, DeviceOrientation::Landscape))
            .unwrap();

        assert_eq!((query.width, query.height), (960, 720));
        assert_close(query.intrinsics.fx, 1510.0 * 15.0);
        assert_close(query.intrinsics.fy, 1490.0 * 15.0);

        let decoded = image::load_from_memory(&query.image_data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (960, 720));
    }

    #[test]
    fn test_adjust_portrait_frame() {
        let adjuster = IntrinsicsAdjuster::with_quality(JpegQuality::Low);
        let query = adjuster
            .adjust(&frame(64, 48, DeviceOrientation::Portrait))
            .unwrap();

        assert_eq!((query.width, query.height), (720, 960));
        // Upright image is 48x64: scale 15 on both axes
        assert_close(query.intrinsics.fx, 1490.0 * 15.0);
        assert_close(query.intrinsics.fy, 1510.0 * 15.0);
        assert_close(query.intrinsics.cx, (48.0 - 725.0) * 15.0);
        assert_close(query.intrinsics.cy, 955.0 * 15.0);

        let decoded = image::load_from_memory(&query.image_data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (720, 960));
    }

    #[test]
    fn test_adjust_portrait_frame_with_unequal_scales() {
        let mut raw = frame(32, 18, DeviceOrientation::Portrait);
        raw.intrinsics = CameraIntrinsics::new(10.0, 20.0, 16.0, 9.0);

        let query = IntrinsicsAdjuster::new().adjust(&raw).unwrap();

        // Upright image is 18x32: scale 40 across, 30 down
        assert_eq!((query.width, query.height), (720, 960));
        assert_close(query.intrinsics.fx, 20.0 * 40.0);
        assert_close(query.intrinsics.fy, 10.0 * 30.0);
        assert_close(query.intrinsics.cx, (18.0 - 9.0) * 40.0);
        assert_close(query.intrinsics.cy, 16.0 * 30.0);
    }

    #[test]
    fn test_portrait_remap_pairs_each_axis_with_its_own_scale() {
        let raw = CameraIntrinsics::new(10.0, 20.0, 16.0, 9.0);
        let adjusted = remap_intrinsics(&raw, 18, 40.0, 30.0, DeviceOrientation::Portrait);

        assert_eq!(adjusted, CameraIntrinsics::new(800.0, 300.0, 360.0, 480.0));
    }

    #[test]
    fn test_adjust_rejects_short_buffer() {
        let mut bad = frame(64, 48, DeviceOrientation::Landscape);
        bad.data = Arc::from(vec![0u8; 10]);
        assert!(matches!(
            IntrinsicsAdjuster::new().adjust(&bad),
            Err(EncodingError::InvalidBuffer(_))
        ));
    }
}

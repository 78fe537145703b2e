// SPDX-License-Identifier: GPL-3.0-only

//! Captured frame and tracking snapshot types
//!
//! A [`CameraFrame`] is produced by the tracking subsystem once per capture
//! request. The matching [`CapturePose`] must come from the same frame: the
//! pose resolver runs after a network round trip, by which time live
//! tracking has moved on.

use crate::constants::MIN_CAPTURE_POSITION_MAGNITUDE;
use crate::errors::{EncodingError, PoseError};
use crate::geometry::{self, Pose};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Pixel layout of [`CameraFrame::data`] (tightly packed rows)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit grayscale
    Gray8,
    /// 8-bit RGB
    Rgb8,
    /// 8-bit RGBA
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Interface orientation at capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceOrientation {
    /// Sensor buffer is upright as captured
    #[default]
    Landscape,
    /// Sensor buffer must be rotated a quarter turn to be upright
    Portrait,
}

impl DeviceOrientation {
    pub fn is_portrait(&self) -> bool {
        matches!(self, DeviceOrientation::Portrait)
    }
}

impl fmt::Display for DeviceOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceOrientation::Landscape => write!(f, "landscape"),
            DeviceOrientation::Portrait => write!(f, "portrait"),
        }
    }
}

impl FromStr for DeviceOrientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landscape" => Ok(DeviceOrientation::Landscape),
            "portrait" => Ok(DeviceOrientation::Portrait),
            other => Err(format!(
                "unknown orientation '{}', expected 'landscape' or 'portrait'",
                other
            )),
        }
    }
}

/// Why tracking quality is limited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedReason {
    ExcessiveMotion,
    Initializing,
    InsufficientFeatures,
    Relocalizing,
}

/// Tracking quality reported by the AR session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    NotAvailable,
    Normal,
    Limited(LimitedReason),
}

impl TrackingState {
    pub fn is_normal(&self) -> bool {
        matches!(self, TrackingState::Normal)
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrackingState::NotAvailable => "Not Available",
            TrackingState::Normal => "Tracking Normal",
            TrackingState::Limited(LimitedReason::ExcessiveMotion) => "Excessive Motion",
            TrackingState::Limited(LimitedReason::Initializing) => "Tracking Initializing",
            TrackingState::Limited(LimitedReason::InsufficientFeatures) => {
                "Insufficient Features"
            }
            TrackingState::Limited(LimitedReason::Relocalizing) => "Unknown",
        };
        write!(f, "{}", label)
    }
}

/// Pinhole camera intrinsics in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Read `K = [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`
    pub fn from_matrix(k: &Matrix3<f32>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    pub fn to_matrix(&self) -> Matrix3<f32> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }
}

/// Immutable snapshot of one captured frame
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Intrinsics of the raw sensor buffer
    pub intrinsics: CameraIntrinsics,
    pub orientation: DeviceOrientation,
    /// Camera-to-world transform in tracking space at capture
    pub camera_transform: Matrix4<f32>,
    pub tracking_state: TrackingState,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap a decoded image as a frame with normal tracking
    pub fn from_image(
        image: DynamicImage,
        intrinsics: CameraIntrinsics,
        orientation: DeviceOrientation,
        camera_transform: Matrix4<f32>,
    ) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();

        Self {
            width,
            height,
            data: Arc::from(rgb.into_raw()),
            format: PixelFormat::Rgb8,
            intrinsics,
            orientation,
            camera_transform,
            tracking_state: TrackingState::Normal,
            captured_at: Instant::now(),
        }
    }

    /// Expected buffer size for the declared dimensions and format
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// View the pixel buffer as an image
    pub fn to_image(&self) -> Result<DynamicImage, EncodingError> {
        let expected = self.expected_len();
        if self.width == 0 || self.height == 0 {
            return Err(EncodingError::InvalidBuffer(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        if self.data.len() < expected {
            return Err(EncodingError::InvalidBuffer(format!(
                "buffer too small: expected {}, got {}",
                expected,
                self.data.len()
            )));
        }

        let raw = self.data[..expected].to_vec();
        let image = match self.format {
            PixelFormat::Gray8 => {
                GrayImage::from_raw(self.width, self.height, raw).map(DynamicImage::ImageLuma8)
            }
            PixelFormat::Rgb8 => {
                RgbImage::from_raw(self.width, self.height, raw).map(DynamicImage::ImageRgb8)
            }
            PixelFormat::Rgba8 => {
                RgbaImage::from_raw(self.width, self.height, raw).map(DynamicImage::ImageRgba8)
            }
        };

        image.ok_or_else(|| {
            EncodingError::InvalidBuffer("failed to create image from frame data".to_string())
        })
    }
}

/// Tracking-space camera pose recorded when the query frame was captured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturePose {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
}

impl CapturePose {
    pub fn new(position: Vector3<f32>, rotation: Quaternion<f32>) -> Self {
        Self { position, rotation }
    }

    /// Snapshot the pose that belongs to `frame`
    ///
    /// Fails when tracking was not normal or the camera still sits at the
    /// tracking origin. In portrait the rotation is post-multiplied by a
    /// +90 degree turn about Z so it is expressed relative to the landscape
    /// sensor, which is what the service expects.
    pub fn from_frame(frame: &CameraFrame) -> Result<Self, PoseError> {
        if !frame.tracking_state.is_normal() {
            return Err(PoseError::NotTracking(frame.tracking_state));
        }

        let position = geometry::translation_of(&frame.camera_transform);
        let mut rotation = geometry::quaternion_from_matrix(&frame.camera_transform).into_inner();

        if frame.orientation.is_portrait() {
            let correction =
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2);
            rotation = rotation * correction.into_inner();
        }

        let pose = Self { position, rotation };
        pose.validate()?;
        Ok(pose)
    }

    /// Reject positions too close to the tracking origin
    pub fn validate(&self) -> Result<(), PoseError> {
        let finite = self.position.iter().all(|v| v.is_finite());
        if !finite || self.position.norm() < MIN_CAPTURE_POSITION_MAGNITUDE {
            return Err(PoseError::DegeneratePose);
        }
        Ok(())
    }

    /// `translate(position) * rotate(rotation)`
    pub fn to_matrix(&self) -> Matrix4<f32> {
        geometry::pose_matrix(&self.position, &self.rotation)
    }
}

impl From<CapturePose> for Pose {
    fn from(capture: CapturePose) -> Self {
        Pose::new(capture.position, capture.rotation)
    }
}

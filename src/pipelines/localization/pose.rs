// SPDX-License-Identifier: GPL-3.0-only

//! Corrective transform from a localization result
//!
//! With `M` the camera pose the service found in map space and `T` the
//! camera pose in local tracking space at the same capture instant:
//!
//! ```text
//! C = T · M⁻¹
//! ```
//!
//! `M⁻¹` takes map space into the camera frame at capture, `T` takes that
//! frame into tracking space, so `C` maps map-space points into tracking
//! space. Applying `C` to the session origin or to an anchor lines the map
//! up with live tracking.

use super::client::LocalizationResult;
use crate::errors::PoseError;
use crate::frame::CapturePose;
use crate::geometry::{self, Pose};
use nalgebra::{Matrix4, Point3, Quaternion, UnitQuaternion, Vector3};
use tracing::{debug, info};

/// Quaternions shorter than this carry no usable orientation
const MIN_QUATERNION_NORM_SQUARED: f32 = 1e-6;

/// Map-to-tracking transform for one successful localization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectiveTransform {
    /// Full homogeneous matrix, column-major
    pub matrix: Matrix4<f32>,
    /// Translation component
    pub position: Vector3<f32>,
    /// Rotation component
    pub rotation: UnitQuaternion<f32>,
}

impl CorrectiveTransform {
    /// Wrap a matrix and extract its translation and rotation
    pub fn from_matrix(matrix: Matrix4<f32>) -> Self {
        Self {
            matrix,
            position: geometry::translation_of(&matrix),
            rotation: geometry::quaternion_from_matrix(&matrix),
        }
    }

    /// Map a map-space point into tracking space
    ///
    /// `None` when the homogeneous weight comes out zero.
    pub fn transform_point(&self, point: &Point3<f32>) -> Option<Point3<f32>> {
        Point3::from_homogeneous(self.matrix * point.to_homogeneous())
    }

    /// Translation and rotation as a [`Pose`]
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation.into_inner())
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite()) && self.pose().is_finite()
    }
}

/// Computes corrective transforms
pub struct PoseResolver;

impl PoseResolver {
    /// Resolve the corrective transform for a found pose
    ///
    /// `capture` must be the pose recorded with the query frame, not a
    /// later sample. A result without a pose fails with `PoseNotFound`.
    pub fn resolve(
        result: &LocalizationResult,
        capture: &CapturePose,
    ) -> Result<CorrectiveTransform, PoseError> {
        capture.validate()?;

        let map_pose = result.map_pose().ok_or(PoseError::PoseNotFound)?;
        let matrix = Self::corrective_matrix(&map_pose, &capture.to_matrix())?;
        let transform = CorrectiveTransform::from_matrix(matrix);

        info!(
            position = ?transform.position,
            rotation = ?transform.rotation.coords,
            confidence = result.confidence,
            "Resolved corrective transform"
        );

        Ok(transform)
    }

    /// `C = T · M⁻¹` without validating the capture pose
    ///
    /// Fails when the map pose is degenerate: non-finite, a near-zero
    /// quaternion, or a singular matrix.
    pub fn corrective_matrix(
        map_pose: &Pose,
        tracker_matrix: &Matrix4<f32>,
    ) -> Result<Matrix4<f32>, PoseError> {
        if !map_pose.is_finite() || !has_orientation(&map_pose.rotation) {
            return Err(PoseError::SingularPose);
        }

        let map_matrix = map_pose.to_matrix();
        let map_inverse = geometry::invert(&map_matrix).ok_or(PoseError::SingularPose)?;
        debug!(map_matrix = %map_matrix, "Map pose matrix");

        Ok(tracker_matrix * map_inverse)
    }
}

fn has_orientation(q: &Quaternion<f32>) -> bool {
    q.norm_squared() >= MIN_QUATERNION_NORM_SQUARED
}

// SPDX-License-Identifier: GPL-3.0-only

//! Rigid transform helpers
//!
//! Conventions used throughout the crate:
//! - Right-handed coordinates.
//! - 4x4 homogeneous matrices are column-major with the translation in the
//!   fourth column and `1` in the bottom-right element (nalgebra's layout).
//! - Quaternions are stored as `(x, y, z, w)` on the wire and as
//!   [`nalgebra::Quaternion`] in memory. Service quaternions are not assumed
//!   to be normalized; [`rotation_matrix`] uses them as given so degenerate
//!   data surfaces as a singular matrix instead of being silently fixed.

use crate::constants::SINGULAR_DETERMINANT_EPSILON;
use nalgebra::{Matrix3, Matrix4, Quaternion, Rotation3, UnitQuaternion, Vector3};

/// Position plus orientation in some coordinate frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
}

impl Pose {
    pub fn new(position: Vector3<f32>, rotation: Quaternion<f32>) -> Self {
        Self { position, rotation }
    }

    /// Pose at the origin with no rotation
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Quaternion::identity(),
        }
    }

    /// Homogeneous matrix `translate(position) * rotate(rotation)`
    pub fn to_matrix(&self) -> Matrix4<f32> {
        pose_matrix(&self.position, &self.rotation)
    }

    /// Split a rigid transform into translation and rotation
    pub fn from_matrix(matrix: &Matrix4<f32>) -> Self {
        Self {
            position: translation_of(matrix),
            rotation: quaternion_from_matrix(matrix).into_inner(),
        }
    }

    /// All components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Build a quaternion from wire order `(x, y, z, w)`
pub fn quaternion_xyzw(x: f32, y: f32, z: f32, w: f32) -> Quaternion<f32> {
    Quaternion::new(w, x, y, z)
}

/// Pure translation matrix
pub fn translation_matrix(translation: &Vector3<f32>) -> Matrix4<f32> {
    let mut matrix = Matrix4::identity();
    matrix[(0, 3)] = translation.x;
    matrix[(1, 3)] = translation.y;
    matrix[(2, 3)] = translation.z;
    matrix
}

/// Rotation matrix from a quaternion, used exactly as given
pub fn rotation_matrix(q: &Quaternion<f32>) -> Matrix4<f32> {
    let (x, y, z, w) = (q.i, q.j, q.k, q.w);

    // Matrix4::new takes its arguments row by row
    Matrix4::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - z * w),
        2.0 * (x * z + y * w),
        0.0,
        2.0 * (x * y + z * w),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - x * w),
        0.0,
        2.0 * (x * z - y * w),
        2.0 * (y * z + x * w),
        1.0 - 2.0 * (x * x + y * y),
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}

/// `translate(position) * rotate(rotation)`
pub fn pose_matrix(position: &Vector3<f32>, rotation: &Quaternion<f32>) -> Matrix4<f32> {
    let mut matrix = rotation_matrix(rotation);
    matrix[(0, 3)] = position.x;
    matrix[(1, 3)] = position.y;
    matrix[(2, 3)] = position.z;
    matrix
}

/// Translation column of a homogeneous matrix
pub fn translation_of(matrix: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
}

/// Inverse of a homogeneous matrix, or `None` when it is singular
///
/// Non-finite input and determinants below
/// [`SINGULAR_DETERMINANT_EPSILON`] both count as singular.
pub fn invert(matrix: &Matrix4<f32>) -> Option<Matrix4<f32>> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let determinant = matrix.determinant();
    if !determinant.is_finite() || determinant.abs() < SINGULAR_DETERMINANT_EPSILON {
        return None;
    }

    matrix.try_inverse()
}

/// Rotation of the upper-left 3x3 block as a unit quaternion
///
/// nalgebra's extraction branches on the largest diagonal term, so it stays
/// finite near the identity and near 180 degree rotations.
pub fn quaternion_from_matrix(matrix: &Matrix4<f32>) -> UnitQuaternion<f32> {
    let block: Matrix3<f32> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;
    use std::f32::consts::{FRAC_PI_2, PI};

    const TOLERANCE: f32 = 1e-4;

    fn assert_matrix_close(a: &Matrix4<f32>, b: &Matrix4<f32>) {
        for (lhs, rhs) in a.iter().zip(b.iter()) {
            assert!((lhs - rhs).abs() < TOLERANCE, "{} != {}\n{}\n{}", lhs, rhs, a, b);
        }
    }

    /// q and -q describe the same rotation
    fn assert_same_rotation(a: &Quaternion<f32>, b: &Quaternion<f32>) {
        let dot = a.coords.dot(&b.coords).abs();
        assert!((dot - 1.0).abs() < TOLERANCE, "{:?} vs {:?}", a, b);
    }

    #[test]
    fn test_rotation_about_z_maps_x_to_y() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2).into_inner();
        let rotated = rotation_matrix(&q) * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!((rotated.x).abs() < TOLERANCE);
        assert!((rotated.y - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_translation_in_fourth_column() {
        let m = pose_matrix(&Vector3::new(1.0, 2.0, 3.0), &Quaternion::identity());
        assert_eq!(m.column(3).into_owned(), Vector4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(m[(3, 3)], 1.0);
        assert_eq!(
            m,
            translation_matrix(&Vector3::new(1.0, 2.0, 3.0))
                * rotation_matrix(&Quaternion::identity())
        );
    }

    #[test]
    fn test_double_inverse_round_trip() {
        let q = UnitQuaternion::from_euler_angles(0.3, -1.1, 2.4).into_inner();
        let m = pose_matrix(&Vector3::new(4.0, -2.5, 0.75), &q);
        let inverse = invert(&m).unwrap();
        let back = invert(&inverse).unwrap();
        assert_matrix_close(&back, &m);
        assert_matrix_close(&(m * inverse), &Matrix4::identity());
    }

    #[test]
    fn test_invert_rejects_singular_and_non_finite() {
        // |q|^2 = 0.5 along x collapses the y and z rows
        let q = quaternion_xyzw(std::f32::consts::FRAC_1_SQRT_2, 0.0, 0.0, 0.0);
        assert!(invert(&rotation_matrix(&q)).is_none());

        let mut m = Matrix4::identity();
        m[(0, 3)] = f32::NAN;
        assert!(invert(&m).is_none());
    }

    #[test]
    fn test_quaternion_extraction_near_identity() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 1e-4).into_inner();
        let extracted = quaternion_from_matrix(&rotation_matrix(&q));
        assert_same_rotation(extracted.quaternion(), &q);
    }

    #[test]
    fn test_quaternion_extraction_near_half_turn() {
        for axis in [Vector3::x_axis(), Vector3::y_axis(), Vector3::z_axis()] {
            for angle in [PI, PI - 1e-3] {
                let q = UnitQuaternion::from_axis_angle(&axis, angle).into_inner();
                let extracted = quaternion_from_matrix(&rotation_matrix(&q));
                assert!(extracted.coords.iter().all(|v| v.is_finite()));
                assert_same_rotation(extracted.quaternion(), &q);
            }
        }
    }

    #[test]
    fn test_quaternion_extraction_ignores_translation() {
        let q = UnitQuaternion::from_euler_angles(-0.6, 0.9, 2.5).into_inner();
        let pose = Pose::new(Vector3::new(40.0, -7.0, 3.0), q);
        let extracted = quaternion_from_matrix(&pose.to_matrix());
        assert_same_rotation(extracted.quaternion(), &q);
    }

    #[test]
    fn test_pose_decompose_round_trip() {
        let pose = Pose::new(
            Vector3::new(-1.0, 0.5, 2.0),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3).into_inner(),
        );
        let decomposed = Pose::from_matrix(&pose.to_matrix());
        assert!((decomposed.position - pose.position).norm() < TOLERANCE);
        assert_same_rotation(&decomposed.rotation, &pose.rotation);
    }
}

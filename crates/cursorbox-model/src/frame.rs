// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reference frame (cursor pose)
//!
//! A position plus a right-handed orthonormal rotation. The rotation is kept
//! canonically as a [`Rotation3`]; [`RotationMode`] only records which
//! representation the caller last worked in, so reading back Euler angles,
//! a quaternion or an axis-angle pair is always a lossless conversion.

use crate::{ModelError, Result};
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Orthonormality tolerance for externally supplied matrices
const ORTHO_TOLERANCE: f64 = 1e-6;

/// Representation the frame's rotation was last expressed in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationMode {
    /// Euler angles applied X, then Y, then Z
    #[default]
    EulerXyz,
    Quaternion,
    AxisAngle,
}

/// Position and orientation defining a local coordinate system
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    position: Point3<f64>,
    rotation: Rotation3<f64>,
    mode: RotationMode,
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl ReferenceFrame {
    /// World origin, no rotation
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: Rotation3::identity(),
            mode: RotationMode::EulerXyz,
        }
    }

    pub fn new(position: Point3<f64>, rotation: Rotation3<f64>) -> Self {
        Self {
            position,
            rotation,
            mode: RotationMode::EulerXyz,
        }
    }

    /// Frame at `position` with world-aligned axes
    pub fn at(position: Point3<f64>) -> Self {
        Self::new(position, Rotation3::identity())
    }

    /// Euler XYZ angles in radians (rotation = Rz · Ry · Rx)
    pub fn from_euler_xyz(position: Point3<f64>, x: f64, y: f64, z: f64) -> Self {
        Self {
            position,
            rotation: Rotation3::from_euler_angles(x, y, z),
            mode: RotationMode::EulerXyz,
        }
    }

    pub fn from_quaternion(position: Point3<f64>, quaternion: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            rotation: quaternion.to_rotation_matrix(),
            mode: RotationMode::Quaternion,
        }
    }

    /// Rotation of `angle` radians about `axis`
    ///
    /// A zero axis is accepted only together with a zero angle.
    pub fn from_axis_angle(position: Point3<f64>, axis: Vector3<f64>, angle: f64) -> Result<Self> {
        let rotation = match Unit::try_new(axis, f64::EPSILON) {
            Some(axis) => Rotation3::from_axis_angle(&axis, angle),
            None if angle.abs() < f64::EPSILON => Rotation3::identity(),
            None => return Err(ModelError::frame("axis-angle rotation with zero axis")),
        };
        Ok(Self {
            position,
            rotation,
            mode: RotationMode::AxisAngle,
        })
    }

    /// Build from a Z axis and an approximate X axis
    ///
    /// X is made perpendicular to Z, Y completes a right-handed basis.
    pub fn from_axes(position: Point3<f64>, x_hint: Vector3<f64>, z: Vector3<f64>) -> Result<Self> {
        let z = z
            .try_normalize(1e-12)
            .ok_or_else(|| ModelError::frame("zero-length Z axis"))?;
        let x = (x_hint - z * x_hint.dot(&z))
            .try_normalize(1e-12)
            .ok_or_else(|| ModelError::frame("X axis parallel to Z axis"))?;
        let y = z.cross(&x);
        let matrix = Matrix3::from_columns(&[x, y, z]);
        Ok(Self::new(position, Rotation3::from_matrix_unchecked(matrix)))
    }

    /// Build from a 3×3 matrix whose columns are the frame axes
    pub fn from_matrix(position: Point3<f64>, matrix: Matrix3<f64>) -> Result<Self> {
        let should_be_identity = matrix.transpose() * matrix;
        if !should_be_identity.relative_eq(&Matrix3::identity(), ORTHO_TOLERANCE, ORTHO_TOLERANCE) {
            return Err(ModelError::frame("matrix is not orthonormal"));
        }
        if matrix.determinant() <= 0.0 {
            return Err(ModelError::frame("matrix is not right-handed"));
        }
        Ok(Self::new(position, Rotation3::from_matrix_unchecked(matrix)))
    }

    #[inline]
    pub fn position(&self) -> Point3<f64> {
        self.position
    }

    pub fn set_position(&mut self, position: Point3<f64>) {
        self.position = position;
    }

    #[inline]
    pub fn rotation(&self) -> &Rotation3<f64> {
        &self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Rotation3<f64>) {
        self.rotation = rotation;
    }

    #[inline]
    pub fn mode(&self) -> RotationMode {
        self.mode
    }

    /// Switch the tracked representation; the rotation itself is unchanged
    pub fn set_mode(&mut self, mode: RotationMode) {
        self.mode = mode;
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        *self.rotation.matrix()
    }

    /// Euler XYZ angles `(x, y, z)` in radians
    pub fn to_euler_xyz(&self) -> (f64, f64, f64) {
        self.rotation.euler_angles()
    }

    pub fn to_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&self.rotation)
    }

    /// Axis and angle in radians; identity yields `(+Z, 0)`
    pub fn to_axis_angle(&self) -> (Vector3<f64>, f64) {
        match self.rotation.axis_angle() {
            Some((axis, angle)) => (axis.into_inner(), angle),
            None => (Vector3::z(), 0.0),
        }
    }

    #[inline]
    pub fn axis_x(&self) -> Vector3<f64> {
        self.rotation.matrix().column(0).into_owned()
    }

    #[inline]
    pub fn axis_y(&self) -> Vector3<f64> {
        self.rotation.matrix().column(1).into_owned()
    }

    #[inline]
    pub fn axis_z(&self) -> Vector3<f64> {
        self.rotation.matrix().column(2).into_owned()
    }

    /// Express a world point in this frame
    #[inline]
    pub fn to_local(&self, world: &Point3<f64>) -> Point3<f64> {
        self.rotation.inverse_transform_point(&(world - self.position.coords))
    }

    /// Express a frame-local point in world space
    #[inline]
    pub fn to_world(&self, local: &Point3<f64>) -> Point3<f64> {
        self.rotation.transform_point(local) + self.position.coords
    }

    /// 4×4 affine matrix (translation · rotation)
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        Translation3::from(self.position.coords).to_homogeneous() * self.rotation.to_homogeneous()
    }

    /// Orthonormal with positive determinant, within tolerance
    pub fn is_right_handed(&self) -> bool {
        let m = self.rotation.matrix();
        (m.transpose() * m).relative_eq(&Matrix3::identity(), ORTHO_TOLERANCE, ORTHO_TOLERANCE)
            && m.determinant() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_relative_eq, assert_abs_diff_eq};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn samples() -> Vec<ReferenceFrame> {
        let p = Point3::new(1.0, -2.0, 3.0);
        vec![
            ReferenceFrame::identity(),
            ReferenceFrame::from_euler_xyz(p, FRAC_PI_2, 0.0, 0.0),
            ReferenceFrame::from_euler_xyz(p, 0.0, 0.0, FRAC_PI_4),
            ReferenceFrame::from_euler_xyz(p, 0.3, -0.7, 1.9),
        ]
    }

    #[test]
    fn test_euler_quaternion_round_trip() {
        for frame in samples() {
            let q = frame.to_quaternion();
            let back = ReferenceFrame::from_quaternion(frame.position(), q);
            let (x, y, z) = back.to_euler_xyz();
            let again = ReferenceFrame::from_euler_xyz(frame.position(), x, y, z);
            assert_abs_diff_eq!(again.rotation_matrix(), frame.rotation_matrix(), epsilon = 1e-9);
            assert_eq!(back.mode(), RotationMode::Quaternion);
        }
    }

    #[test]
    fn test_axis_angle_round_trip() {
        for frame in samples() {
            let (axis, angle) = frame.to_axis_angle();
            let back = ReferenceFrame::from_axis_angle(frame.position(), axis, angle).unwrap();
            assert_abs_diff_eq!(back.rotation_matrix(), frame.rotation_matrix(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_axis_rejected() {
        assert!(ReferenceFrame::from_axis_angle(Point3::origin(), Vector3::zeros(), 1.0).is_err());
        let frame = ReferenceFrame::from_axis_angle(Point3::origin(), Vector3::zeros(), 0.0).unwrap();
        assert_relative_eq!(frame.rotation_matrix(), Matrix3::identity());
    }

    #[test]
    fn test_from_axes_is_right_handed() {
        let frame = ReferenceFrame::from_axes(
            Point3::origin(),
            Vector3::new(1.0, 0.2, 0.1),
            Vector3::new(0.0, 0.0, 2.0),
        )
        .unwrap();
        assert!(frame.is_right_handed());
        assert_abs_diff_eq!(frame.axis_z(), Vector3::z(), epsilon = 1e-12);
        assert_abs_diff_eq!(frame.axis_x().dot(&frame.axis_z()), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(frame.axis_x().cross(&frame.axis_y()), frame.axis_z(), epsilon = 1e-12);
    }

    #[test]
    fn test_from_matrix_rejects_reflection() {
        let mirror = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        assert!(ReferenceFrame::from_matrix(Point3::origin(), mirror).is_err());
        let skew = Matrix3::new(1.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(ReferenceFrame::from_matrix(Point3::origin(), skew).is_err());
    }

    #[test]
    fn test_local_world_inverse() {
        let frame = ReferenceFrame::from_euler_xyz(Point3::new(4.0, 5.0, 6.0), 0.1, 0.2, 0.3);
        let p = Point3::new(-1.0, 2.5, 0.25);
        assert_relative_eq!(frame.to_world(&frame.to_local(&p)), p, epsilon = 1e-12);
        assert_relative_eq!(
            frame.to_homogeneous().transform_point(&p),
            frame.to_world(&p),
            epsilon = 1e-12
        );
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Oriented bounding box
//!
//! The box is axis-aligned in the cursor frame: points are moved into frame
//! space, bounded per axis, pushed, floored and moved back.

use crate::cache::{content_hash, BoundedCache, CacheStats};
use crate::{Error, Result};
use cursorbox_model::{MeshData, ReferenceFrame};
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Vector3};

/// Dimension floor for live previews
pub const PREVIEW_EPSILON: f64 = 1e-4;

/// Dimension floor for created objects
pub const OBJECT_EPSILON: f64 = 1e-6;

/// Entries kept by [`BoxCache`]
pub const BOX_CACHE_CAPACITY: usize = 50;

/// Corner pairs forming the 12 box edges (indices into [`OrientedBox::corners`])
pub const BOX_EDGES: [[usize; 2]; 12] = [
    [0, 1], [1, 3], [3, 2], [2, 0],
    [4, 5], [5, 7], [7, 6], [6, 4],
    [0, 4], [1, 5], [2, 6], [3, 7],
];

/// Outward-wound triangles of the 6 box faces
pub const BOX_TRIANGLES: [[usize; 3]; 12] = [
    [0, 2, 3], [0, 3, 1],
    [4, 5, 7], [4, 7, 6],
    [0, 1, 5], [0, 5, 4],
    [1, 3, 7], [1, 7, 5],
    [3, 2, 6], [3, 6, 7],
    [2, 0, 4], [2, 4, 6],
];

/// Box bounding a point set in some frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    /// World-space center
    pub center: Point3<f64>,
    /// Half the size along each frame axis
    pub half_extents: Vector3<f64>,
    pub rotation: Rotation3<f64>,
    /// Push actually applied after clamping
    pub applied_push: f64,
    /// A negative push had to be reduced to keep the box valid
    pub push_clamped: bool,
}

impl OrientedBox {
    pub fn dimensions(&self) -> Vector3<f64> {
        self.half_extents * 2.0
    }

    pub fn volume(&self) -> f64 {
        let d = self.dimensions();
        d.x * d.y * d.z
    }

    /// Frame centered on the box with the box's rotation
    pub fn frame(&self) -> ReferenceFrame {
        ReferenceFrame::new(self.center, self.rotation)
    }

    /// World-space corners, local x varying fastest
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let h = self.half_extents;
        let mut corners = [Point3::origin(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let local = Vector3::new(
                if i & 1 == 0 { -h.x } else { h.x },
                if i & 2 == 0 { -h.y } else { h.y },
                if i & 4 == 0 { -h.z } else { h.z },
            );
            *corner = self.center + self.rotation * local;
        }
        corners
    }

    /// Whether a world point lies inside, with tolerance `tol` per axis
    pub fn contains(&self, point: &Point3<f64>, tol: f64) -> bool {
        let local = self.rotation.inverse() * (point - self.center);
        (0..3).all(|i| local[i].abs() <= self.half_extents[i] + tol)
    }

    /// Closed mesh with one quad per side
    pub fn to_mesh(&self) -> MeshData {
        let faces = vec![
            vec![0, 2, 3, 1],
            vec![4, 5, 7, 6],
            vec![0, 1, 5, 4],
            vec![1, 3, 7, 5],
            vec![3, 2, 6, 7],
            vec![2, 0, 4, 6],
        ];
        MeshData {
            vertices: self.corners().to_vec(),
            faces,
        }
    }
}

/// Compute the box bounding `points` in `frame`
///
/// # Arguments
/// * `points` - World-space points
/// * `frame` - Box orientation and reference position
/// * `push` - Signed offset applied to every face
/// * `epsilon` - Minimum dimension ([`PREVIEW_EPSILON`] or [`OBJECT_EPSILON`])
pub fn compute_oriented_box(
    points: &[Point3<f64>],
    frame: &ReferenceFrame,
    push: f64,
    epsilon: f64,
) -> Result<OrientedBox> {
    let mut iter = points.iter().map(|p| frame.to_local(p));
    let first = iter.next().ok_or(Error::EmptyInput)?;
    let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p)));

    let local_center = nalgebra::center(&min, &max);
    let mut dims = (max - min).map(|d| d.max(epsilon));

    let (applied_push, push_clamped) = clamp_push(push, dims.min());
    if push_clamped {
        log::warn!(
            "push {:.4} would invert the box (smallest dimension {:.4}), clamped to {:.4}",
            push,
            dims.min(),
            applied_push
        );
    }
    dims = dims.map(|d| (d + 2.0 * applied_push).max(epsilon));

    Ok(OrientedBox {
        center: frame.to_world(&local_center),
        half_extents: dims / 2.0,
        rotation: *frame.rotation(),
        applied_push,
        push_clamped,
    })
}

/// Limit a negative push so no dimension reaches zero
///
/// # Returns
/// `(push to apply, whether it was reduced)`
pub fn clamp_push(push: f64, min_dimension: f64) -> (f64, bool) {
    let floor = -(min_dimension / 2.0) * 0.999;
    if push < floor {
        (floor, true)
    } else {
        (push, false)
    }
}

/// Box aligned with the world axes, positioned at `position`
pub fn world_oriented_box(
    points: &[Point3<f64>],
    position: Point3<f64>,
    push: f64,
    epsilon: f64,
) -> Result<OrientedBox> {
    compute_oriented_box(points, &ReferenceFrame::at(position), push, epsilon)
}

/// Box aligned with an object's own axes
///
/// Scale and shear are removed from the object transform so only its
/// rotation orients the box.
pub fn local_oriented_box(
    points: &[Point3<f64>],
    object_transform: &Matrix4<f64>,
    push: f64,
    epsilon: f64,
) -> Result<OrientedBox> {
    let linear: Matrix3<f64> = object_transform.fixed_view::<3, 3>(0, 0).into_owned();
    let rotation = Rotation3::from_matrix_eps(&linear, 1e-12, 64, Rotation3::identity());
    let position = Point3::from(object_transform.fixed_view::<3, 1>(0, 3).into_owned());
    compute_oriented_box(points, &ReferenceFrame::new(position, rotation), push, epsilon)
}

/// [`compute_oriented_box`] behind a [`BoundedCache`]
#[derive(Debug)]
pub struct BoxCache {
    cache: BoundedCache<OrientedBox>,
}

impl Default for BoxCache {
    fn default() -> Self {
        Self::new(BOX_CACHE_CAPACITY)
    }
}

impl BoxCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: BoundedCache::new(capacity),
        }
    }

    pub fn compute(
        &mut self,
        points: &[Point3<f64>],
        frame: &ReferenceFrame,
        push: f64,
        epsilon: f64,
    ) -> Result<OrientedBox> {
        let key = content_hash(points, Some(frame), &[push, epsilon]);
        self.cache
            .get_or_try_insert(key, || compute_oriented_box(points, frame, push, epsilon))
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn scenario_points() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 2.0),
            Point3::new(2.0, 2.0, 2.0),
        ]
    }

    fn scattered() -> Vec<Point3<f64>> {
        (0..40)
            .map(|i| {
                let t = i as f64;
                Point3::new((t * 1.7).sin() * 3.0, (t * 0.9).cos() * 2.0, (t * 0.37).sin() + t * 0.05)
            })
            .collect()
    }

    #[test]
    fn test_identity_frame_scenario() {
        let b = compute_oriented_box(&scenario_points(), &ReferenceFrame::identity(), 0.0, OBJECT_EPSILON)
            .unwrap();
        assert_relative_eq!(b.center, Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(b.dimensions(), Vector3::new(2.0, 2.0, 2.0));
        assert!(!b.push_clamped);
    }

    #[test]
    fn test_contains_every_point_in_any_frame() {
        let points = scattered();
        let frames = [
            ReferenceFrame::identity(),
            ReferenceFrame::from_euler_xyz(Point3::new(5.0, -1.0, 2.0), 0.4, 1.1, -0.3),
            ReferenceFrame::from_euler_xyz(Point3::origin(), std::f64::consts::FRAC_PI_4, 0.0, 0.0),
        ];
        for frame in &frames {
            let b = compute_oriented_box(&points, frame, 0.0, OBJECT_EPSILON).unwrap();
            for p in &points {
                assert!(b.contains(p, 1e-9), "{:?} outside box", p);
            }
        }
    }

    #[test]
    fn test_negative_push_clamped() {
        let unit = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)];
        let b = compute_oriented_box(&unit, &ReferenceFrame::identity(), -0.6, OBJECT_EPSILON).unwrap();
        assert!(b.push_clamped);
        assert_abs_diff_eq!(b.applied_push, -0.4995, epsilon = 1e-12);
        let min_dim = b.dimensions().min();
        assert!(min_dim > 0.0);
        assert_abs_diff_eq!(min_dim, 0.001, epsilon = 1e-9);
    }

    #[test]
    fn test_push_monotonic() {
        let points = scattered();
        let frame = ReferenceFrame::from_euler_xyz(Point3::origin(), 0.2, 0.1, 0.7);
        let mut previous: Option<Vector3<f64>> = None;
        for step in -20..=20 {
            let push = step as f64 * 0.1;
            let dims = compute_oriented_box(&points, &frame, push, PREVIEW_EPSILON)
                .unwrap()
                .dimensions();
            if let Some(prev) = previous {
                for i in 0..3 {
                    assert!(dims[i] >= prev[i], "axis {} shrank at push {}", i, push);
                }
            }
            previous = Some(dims);
        }
    }

    #[test]
    fn test_single_point_floored() {
        let b = compute_oriented_box(&[Point3::new(1.0, 2.0, 3.0)], &ReferenceFrame::identity(), 0.0, PREVIEW_EPSILON)
            .unwrap();
        assert_relative_eq!(b.dimensions(), Vector3::repeat(PREVIEW_EPSILON));
        assert!(b.volume() > 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            compute_oriented_box(&[], &ReferenceFrame::identity(), 0.0, OBJECT_EPSILON),
            Err(Error::EmptyInput)
        );
    }

    #[test]
    fn test_rotated_frame_center_in_world() {
        // Frame rotated 90° about Z: local extents swap but the center does not move
        let frame = ReferenceFrame::from_euler_xyz(Point3::new(10.0, 0.0, 0.0), 0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 2.0, 1.0)];
        let b = compute_oriented_box(&points, &frame, 0.0, OBJECT_EPSILON).unwrap();
        assert_relative_eq!(b.center, Point3::new(2.0, 1.0, 0.5), epsilon = 1e-12);
        assert_relative_eq!(b.dimensions(), Vector3::new(2.0, 4.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_corners_and_mesh() {
        let b = compute_oriented_box(&scenario_points(), &ReferenceFrame::identity(), 0.0, OBJECT_EPSILON)
            .unwrap();
        let corners = b.corners();
        assert_relative_eq!(corners[0], Point3::origin());
        assert_relative_eq!(corners[7], Point3::new(2.0, 2.0, 2.0));
        let mesh = b.to_mesh();
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.edges().len(), BOX_EDGES.len());
        // Outward winding: every triangle faces away from the center
        for tri in BOX_TRIANGLES {
            let [a, b2, c] = tri.map(|i| corners[i]);
            let n = (b2 - a).cross(&(c - a));
            assert!(n.dot(&(a - b.center)) > 0.0);
        }
    }

    #[test]
    fn test_local_oriented_box_ignores_scale() {
        let rotation = Rotation3::from_euler_angles(0.0, 0.0, 0.5);
        let transform = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0))
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 3.0, 4.0));
        let b = local_oriented_box(&scattered(), &transform, 0.0, OBJECT_EPSILON).unwrap();
        assert_abs_diff_eq!(b.rotation.matrix(), rotation.matrix(), epsilon = 1e-9);
    }

    #[test]
    fn test_cache_reuses_results() {
        let mut cache = BoxCache::default();
        let frame = ReferenceFrame::identity();
        let points = scenario_points();
        let a = cache.compute(&points, &frame, 0.01, PREVIEW_EPSILON).unwrap();
        let b = cache.compute(&points, &frame, 0.01, PREVIEW_EPSILON).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.stats().hits, 1);
        cache.compute(&points, &frame, 0.02, PREVIEW_EPSILON).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}

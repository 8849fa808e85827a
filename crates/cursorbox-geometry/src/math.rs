// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry math library
//!
//! Stateless helpers shared by the bounding-volume engine and the resolver:
//! frame transforms, plane fitting and intersection, ray tests.

use cursorbox_model::{Aabb, Ray, ReferenceFrame};
use nalgebra::{Matrix3, Point3, Vector3};

/// Power iterations used by [`best_fit_plane`]
const PLANE_FIT_ITERATIONS: usize = 20;

/// Express a world point in frame-local coordinates
#[inline]
pub fn transform_to_frame(point: &Point3<f64>, frame: &ReferenceFrame) -> Point3<f64> {
    frame.to_local(point)
}

/// Express a frame-local point in world coordinates
#[inline]
pub fn transform_from_frame(local: &Point3<f64>, frame: &ReferenceFrame) -> Point3<f64> {
    frame.to_world(local)
}

/// Centroid of a non-empty point set
pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Least-squares plane through a point set
///
/// The normal is the covariance eigenvector with the smallest eigenvalue,
/// found as the dominant eigenvector of `trace·I − C`.
///
/// # Returns
/// `(origin, unit normal)`, or `None` for fewer than 3 points, a vanishing
/// covariance, or collinear input
pub fn best_fit_plane(points: &[Point3<f64>]) -> Option<(Point3<f64>, Vector3<f64>)> {
    if points.len() < 3 {
        return None;
    }
    let origin = centroid(points)?;

    let mut covariance = Matrix3::zeros();
    for p in points {
        let d = p - origin;
        covariance += d * d.transpose();
    }
    covariance /= points.len() as f64;

    let trace = covariance.trace();
    if trace < 1e-12 {
        return None;
    }

    // All spread along a single direction leaves the normal undefined
    let (far, _) = points
        .iter()
        .map(|p| (p, (p - origin).norm_squared()))
        .fold((origin, 0.0), |best, (p, d)| if d > best.1 { (*p, d) } else { best });
    let line = (far - origin).normalize();
    let off_line = points
        .iter()
        .map(|p| (p - origin).cross(&line).norm_squared())
        .fold(0.0f64, f64::max);
    if off_line < 1e-12 * trace {
        return None;
    }

    let shifted = Matrix3::identity() * trace - covariance;

    // Start from the strongest column so the seed is not orthogonal to the answer
    let mut normal = (0..3)
        .map(|i| shifted.column(i).into_owned())
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    for _ in 0..PLANE_FIT_ITERATIONS {
        let next = shifted * normal;
        normal = next.try_normalize(1e-300)?;
    }

    Some((origin, normal))
}

/// Cursor frame lying in the best-fit plane of `points`
///
/// Z follows the plane normal, flipped toward `+Z` when the plane is not
/// vertical; X follows world X projected into the plane (world Y when the
/// normal is along X).
pub fn fit_frame_to_points(points: &[Point3<f64>]) -> Option<ReferenceFrame> {
    let (origin, mut normal) = best_fit_plane(points)?;
    if normal.z < 0.0 {
        normal = -normal;
    }
    let hint = if normal.x.abs() > 0.9 {
        Vector3::y()
    } else {
        Vector3::x()
    };
    ReferenceFrame::from_axes(origin, hint, normal).ok()
}

/// Intersections of edge segments with a plane
///
/// Edges parallel to the plane are skipped.
pub fn plane_edge_intersections(
    edges: &[(Point3<f64>, Point3<f64>)],
    plane_origin: &Point3<f64>,
    plane_normal: &Vector3<f64>,
) -> Vec<Point3<f64>> {
    let d = plane_origin.coords.dot(plane_normal);
    edges
        .iter()
        .filter_map(|(v1, v2)| {
            let denom = (v2 - v1).dot(plane_normal);
            if denom.abs() <= 1e-6 {
                return None;
            }
            let t = (d - v1.coords.dot(plane_normal)) / denom;
            (0.0..=1.0).contains(&t).then(|| v1 + (v2 - v1) * t)
        })
        .collect()
}

/// Project a point onto the intersection line of two planes
///
/// # Returns
/// The orthogonal projection, or `None` when the planes are parallel
pub fn project_point_onto_plane_intersection_line(
    point: &Point3<f64>,
    plane1_normal: &Vector3<f64>,
    plane1_point: &Point3<f64>,
    plane2_origin: &Point3<f64>,
    plane2_normal: &Vector3<f64>,
) -> Option<Point3<f64>> {
    let direction = plane1_normal.cross(plane2_normal);
    let len_sq = direction.norm_squared();
    if len_sq < 1e-6 {
        return None;
    }

    // Point on both planes: p = (d1 (n2 × dir) + d2 (dir × n1)) / |dir|²
    let d1 = plane1_normal.dot(&plane1_point.coords);
    let d2 = plane2_normal.dot(&plane2_origin.coords);
    let on_line = (plane2_normal.cross(&direction) * d1 + direction.cross(plane1_normal) * d2)
        / len_sq;

    let unit = direction / len_sq.sqrt();
    let t = (point.coords - on_line).dot(&unit);
    Some(Point3::from(on_line + unit * t))
}

/// Slab test of a ray against a box grown by `margin`
///
/// Nearly axis-parallel directions require the origin to lie inside that
/// axis' slab. Boxes entirely behind the origin are rejected.
pub fn ray_aabb_hits(ray: &Ray, bounds: &Aabb, margin: f64) -> bool {
    let b = bounds.expanded(margin);
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;

    for axis in 0..3 {
        let o = ray.origin[axis];
        let d = ray.direction[axis];
        if d.abs() < 1e-4 {
            if o < b.min[axis] || o > b.max[axis] {
                return false;
            }
            continue;
        }
        let t1 = (b.min[axis] - o) / d;
        let t2 = (b.max[axis] - o) / d;
        t_near = t_near.max(t1.min(t2));
        t_far = t_far.min(t1.max(t2));
    }

    t_near <= t_far && t_far >= 0.0
}

/// Möller–Trumbore ray/triangle test, both faces
///
/// # Returns
/// Ray parameter `t > 0` of the hit
#[inline]
pub fn ray_triangle(ray: &Ray, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<f64> {
    let e1 = b - a;
    let e2 = c - a;
    let p = ray.direction.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = ray.direction.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&q) * inv;
    (t > 1e-9).then_some(t)
}

/// Angle between two vectors in degrees
#[inline]
pub fn angle_degrees(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.angle(b).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_transform_to_frame_inverts_pose() {
        let frame = ReferenceFrame::from_euler_xyz(Point3::new(1.0, 2.0, 3.0), 0.0, 0.0, std::f64::consts::FRAC_PI_2);
        // Local +X of this frame is world +Y
        let world = Point3::new(1.0, 3.0, 3.0);
        let local = transform_to_frame(&world, &frame);
        assert_relative_eq!(local, Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(transform_from_frame(&local, &frame), world, epsilon = 1e-12);
    }

    #[test]
    fn test_best_fit_plane_tilted() {
        let normal = Vector3::new(1.0, 1.0, 1.0).normalize();
        let u = Vector3::new(1.0, -1.0, 0.0).normalize();
        let v = normal.cross(&u);
        let center = Point3::new(2.0, -1.0, 0.5);
        let points: Vec<_> = [(0.0, 0.0), (1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)]
            .iter()
            .map(|&(a, b)| center + u * a + v * b)
            .collect();

        let (_, fitted) = best_fit_plane(&points).unwrap();
        assert_abs_diff_eq!(fitted.dot(&normal).abs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_best_fit_plane_degenerate() {
        assert!(best_fit_plane(&[Point3::origin(), Point3::new(1.0, 0.0, 0.0)]).is_none());
        assert!(best_fit_plane(&[Point3::origin(); 4]).is_none());
        let line: Vec<_> = (0..5).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        assert!(best_fit_plane(&line).is_none());
    }

    #[test]
    fn test_fit_frame_to_points() {
        let points: Vec<_> = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]
            .iter()
            .map(|&(x, y)| Point3::new(x, y, 3.0))
            .collect();
        let frame = fit_frame_to_points(&points).unwrap();
        assert_relative_eq!(frame.position(), Point3::new(1.0, 1.0, 3.0), epsilon = 1e-12);
        assert_abs_diff_eq!(frame.axis_z().dot(&Vector3::z()), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(frame.axis_x().dot(&Vector3::x()), 1.0, epsilon = 1e-9);
        assert!(fit_frame_to_points(&points[..2]).is_none());
    }

    #[test]
    fn test_plane_edge_intersections() {
        let edges = vec![
            (Point3::new(0.0, 0.0, -1.0), Point3::new(0.0, 0.0, 1.0)),
            (Point3::new(1.0, 0.0, 0.5), Point3::new(1.0, 0.0, 2.0)),
            (Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)),
        ];
        let hits = plane_edge_intersections(&edges, &Point3::origin(), &Vector3::z());
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0], Point3::origin());
    }

    #[test]
    fn test_project_onto_plane_line() {
        // XY plane and XZ plane meet along the X axis
        let p = project_point_onto_plane_intersection_line(
            &Point3::new(3.0, 4.0, 5.0),
            &Vector3::z(),
            &Point3::origin(),
            &Point3::origin(),
            &Vector3::y(),
        )
        .unwrap();
        assert_relative_eq!(p, Point3::new(3.0, 0.0, 0.0), epsilon = 1e-12);

        let offset = project_point_onto_plane_intersection_line(
            &Point3::new(0.0, 0.0, 0.0),
            &Vector3::z(),
            &Point3::new(0.0, 0.0, 2.0),
            &Point3::new(0.0, 1.0, 0.0),
            &Vector3::y(),
        )
        .unwrap();
        assert_relative_eq!(offset, Point3::new(0.0, 1.0, 2.0), epsilon = 1e-12);

        assert!(project_point_onto_plane_intersection_line(
            &Point3::origin(),
            &Vector3::z(),
            &Point3::origin(),
            &Point3::new(0.0, 0.0, 1.0),
            &Vector3::z(),
        )
        .is_none());
    }

    #[test]
    fn test_ray_aabb() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let down = Ray::new(Point3::new(0.0, 0.0, 5.0), -Vector3::z());
        assert!(ray_aabb_hits(&down, &bounds, 0.1));
        let beside = Ray::new(Point3::new(3.0, 0.0, 5.0), -Vector3::z());
        assert!(!ray_aabb_hits(&beside, &bounds, 0.1));
        let away = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::z());
        assert!(!ray_aabb_hits(&away, &bounds, 0.1));
        let grazing = Ray::new(Point3::new(1.05, 0.0, 5.0), -Vector3::z());
        assert!(ray_aabb_hits(&grazing, &bounds, 0.1));
    }

    #[test]
    fn test_ray_triangle() {
        let ray = Ray::new(Point3::new(0.25, 0.25, 1.0), -Vector3::z());
        let t = ray_triangle(
            &ray,
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        assert_relative_eq!(t.unwrap(), 1.0);

        let miss = Ray::new(Point3::new(0.75, 0.75, 1.0), -Vector3::z());
        assert!(ray_triangle(
            &miss,
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0)
        )
        .is_none());
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation
//!
//! Faces of host meshes and dissolved hull polygons are planar loops in 3D.
//! They are flattened onto their own plane and triangulated with earcutr,
//! with fan fast paths for the small convex loops that dominate in practice.

use crate::{Error, Result};
use nalgebra::{Point2, Point3, Vector3};

/// All turns of the loop go the same way
#[inline]
fn is_convex(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }

    let mut turn = 0.0f64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        let cross = (b - a).perp(&(c - b));
        if cross.abs() <= 1e-10 {
            continue;
        }
        if turn == 0.0 {
            turn = cross.signum();
        } else if cross.signum() != turn {
            return false;
        }
    }
    true
}

#[inline]
fn fan(n: usize) -> Vec<[usize; 3]> {
    (1..n - 1).map(|i| [0, i, i + 1]).collect()
}

/// Triangulate a simple 2D polygon
///
/// # Returns
/// Triangles as index triples into `points`
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<[usize; 3]>> {
    let n = points.len();
    if n < 3 {
        return Err(Error::triangulation(format!(
            "polygon with {} points cannot be triangulated",
            n
        )));
    }

    // FAST PATH: triangles and convex loops
    if n == 3 || (n <= 8 && is_convex(points)) {
        return Ok(fan(n));
    }

    let flat: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y]).collect();
    let indices =
        earcutr::earcut(&flat, &[], 2).map_err(|e| Error::triangulation(format!("{:?}", e)))?;

    if indices.len() < 3 {
        return Err(Error::triangulation("polygon has no area"));
    }

    Ok(indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect())
}

/// Flatten 3D points onto the plane through the first point with `normal`
///
/// The in-plane basis `(u, v)` satisfies `u × v = normal`, so a loop wound
/// counter-clockwise about `normal` stays counter-clockwise in 2D.
pub fn project_to_2d(points: &[Point3<f64>], normal: &Vector3<f64>) -> Vec<Point2<f64>> {
    let Some(origin) = points.first() else {
        return Vec::new();
    };

    // Reference axis least aligned with the normal
    let a = normal.abs();
    let reference = if a.x <= a.y && a.x <= a.z {
        Vector3::x()
    } else if a.y <= a.z {
        Vector3::y()
    } else {
        Vector3::z()
    };

    let v_axis = normal.cross(&reference).normalize();
    let u_axis = v_axis.cross(normal).normalize();

    points
        .iter()
        .map(|p| {
            let d = p - origin;
            Point2::new(d.dot(&u_axis), d.dot(&v_axis))
        })
        .collect()
}

/// Unit normal of a planar loop by Newell's method
///
/// Returns `None` for loops with (numerically) zero area.
pub fn calculate_polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    if points.len() < 3 {
        return None;
    }

    // FAST PATH: a triangle's cross product is already exact
    if points.len() == 3 {
        return (points[1] - points[0])
            .cross(&(points[2] - points[0]))
            .try_normalize(1e-12);
    }

    let mut normal = Vector3::<f64>::zeros();
    for (i, current) in points.iter().enumerate() {
        let next = &points[(i + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal.try_normalize(1e-12)
}

/// Triangulate a planar 3D face
///
/// Triangles keep the winding of the input loop. A face with zero area is
/// rejected rather than producing slivers.
pub fn triangulate_face(points: &[Point3<f64>]) -> Result<Vec<[usize; 3]>> {
    let normal = calculate_polygon_normal(points)
        .ok_or_else(|| Error::triangulation("face has zero area"))?;
    let flat = project_to_2d(points, &normal);
    let mut triangles = triangulate_polygon(&flat)?;

    // The loop is counter-clockwise in the projected plane; earcut output may not be
    for tri in &mut triangles {
        let [a, b, c] = (*tri).map(|i| flat[i]);
        if (b - a).perp(&(c - a)) < 0.0 {
            tri.swap(1, 2);
        }
    }
    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_triangulate_square() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert_eq!(triangulate_polygon(&points).unwrap().len(), 2);
    }

    #[test]
    fn test_triangulate_concave_uses_earcut() {
        // L shape
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert!(!is_convex(&points));
        assert_eq!(triangulate_polygon(&points).unwrap().len(), 4);
    }

    #[test]
    fn test_too_few_points() {
        assert!(triangulate_polygon(&[Point2::origin(), Point2::new(1.0, 0.0)]).is_err());
    }

    #[test]
    fn test_polygon_normal() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert_relative_eq!(calculate_polygon_normal(&points).unwrap(), Vector3::z());
        let reversed: Vec<_> = points.iter().rev().copied().collect();
        assert_relative_eq!(calculate_polygon_normal(&reversed).unwrap(), -Vector3::z());
    }

    #[test]
    fn test_collinear_face_rejected() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert!(calculate_polygon_normal(&points).is_none());
        assert!(triangulate_face(&points).is_err());
    }

    #[test]
    fn test_projection_preserves_winding() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let normal = calculate_polygon_normal(&points).unwrap();
        let flat = project_to_2d(&points, &normal);
        let area: f64 = (0..flat.len())
            .map(|i| {
                let a = flat[i];
                let b = flat[(i + 1) % flat.len()];
                a.x * b.y - b.x * a.y
            })
            .sum();
        assert!(area > 0.0);
    }
}

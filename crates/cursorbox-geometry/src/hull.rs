// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Convex hull with planar-face dissolve and push
//!
//! Construction is incremental: start from a tetrahedron, then for each
//! remaining point remove the faces it can see and stitch the horizon to it.
//! Nearly coplanar neighbouring triangles are then merged into polygons and
//! the result is optionally inflated or deflated along vertex normals.

use crate::triangulation::{calculate_polygon_normal, triangulate_face};
use crate::{Error, Result};
use nalgebra::{Point3, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Default merge angle for coplanar hull faces, in degrees
pub const DEFAULT_DISSOLVE_ANGLE: f64 = 5.0;

/// Pushes smaller than this are ignored
const PUSH_EPSILON: f64 = 1e-4;

/// Convex hull mesh in world space
#[derive(Clone, Debug, PartialEq)]
pub struct HullMesh {
    pub vertices: Vec<Point3<f64>>,
    /// Outward-wound polygons after dissolve
    pub polygons: Vec<Vec<u32>>,
    /// Triangulation of `polygons`
    pub triangles: Vec<[u32; 3]>,
    /// Unique edges of `polygons`
    pub edges: Vec<[u32; 2]>,
    pub applied_push: f64,
}

impl HullMesh {
    /// Enclosed volume (divergence theorem over the triangles)
    pub fn volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| self.vertices[i as usize].coords);
                a.dot(&b.cross(&c))
            })
            .sum::<f64>()
            / 6.0
    }

    pub fn polygon_normals(&self) -> Vec<Vector3<f64>> {
        self.polygons
            .iter()
            .map(|poly| {
                let pts: Vec<_> = poly.iter().map(|&i| self.vertices[i as usize]).collect();
                calculate_polygon_normal(&pts).unwrap_or_else(Vector3::z)
            })
            .collect()
    }

    /// Whether `point` is behind the supporting plane of every polygon
    /// normal, within `tol`
    ///
    /// Dissolved polygons need not be planar, so each plane is placed at the
    /// hull's outermost vertex along the normal rather than through one corner.
    pub fn contains(&self, point: &Point3<f64>, tol: f64) -> bool {
        self.polygon_normals().iter().all(|n| {
            let support = self
                .vertices
                .iter()
                .map(|v| n.dot(&v.coords))
                .fold(f64::NEG_INFINITY, f64::max);
            n.dot(&point.coords) - support <= tol
        })
    }

    pub fn to_mesh(&self) -> cursorbox_model::MeshData {
        cursorbox_model::MeshData {
            vertices: self.vertices.clone(),
            faces: self.polygons.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct Face {
    v: [usize; 3],
    normal: Vector3<f64>,
    offset: f64,
    alive: bool,
}

impl Face {
    fn new(points: &[Point3<f64>], v: [usize; 3]) -> Self {
        let [a, b, c] = v.map(|i| points[i]);
        let normal = (b - a).cross(&(c - a)).try_normalize(1e-300).unwrap_or_else(Vector3::zeros);
        Self {
            v,
            normal,
            offset: normal.dot(&a.coords),
            alive: true,
        }
    }

    #[inline]
    fn distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }
}

/// Compute the convex hull of a point cloud
///
/// # Arguments
/// * `points` - World-space points (non-finite entries are skipped)
/// * `push` - Signed offset along vertex normals
/// * `dissolve_angle_degrees` - Merge adjacent faces whose normals differ by
///   less than this; `0` keeps the raw triangles
///
/// # Returns
/// The hull, or `Error::Degenerate` when the points span no volume
pub fn compute_convex_hull(
    points: &[Point3<f64>],
    push: f64,
    dissolve_angle_degrees: f64,
) -> Result<HullMesh> {
    let finite: Vec<Point3<f64>> = points
        .iter()
        .filter(|p| p.coords.iter().all(|c| c.is_finite()))
        .copied()
        .collect();
    if finite.is_empty() {
        return Err(Error::EmptyInput);
    }

    let (vertices, triangles) = build_hull(&finite)?;

    let (vertices, polygons) = if dissolve_angle_degrees > 0.0 {
        dissolve(&vertices, &triangles, dissolve_angle_degrees)
    } else {
        (
            vertices,
            triangles.iter().map(|t| t.to_vec()).collect::<Vec<_>>(),
        )
    };

    let mut hull = HullMesh {
        vertices,
        triangles: Vec::new(),
        edges: polygon_edges(&polygons),
        polygons,
        applied_push: 0.0,
    };

    if push.abs() > PUSH_EPSILON {
        apply_push(&mut hull, push);
    }

    hull.triangles = triangulate_polygons(&hull.vertices, &hull.polygons);
    Ok(hull)
}

/// Incremental hull: compacted vertices and outward triangles
fn build_hull(points: &[Point3<f64>]) -> Result<(Vec<Point3<f64>>, Vec<[u32; 3]>)> {
    let [a, b, c, d] = initial_simplex(points)?;
    let scale = extent(points);
    let eps = scale * 1e-10;

    let inside = Point3::from((points[a].coords + points[b].coords + points[c].coords + points[d].coords) / 4.0);
    let mut faces: Vec<Face> = [[a, b, c], [a, b, d], [a, c, d], [b, c, d]]
        .into_iter()
        .map(|v| {
            let face = Face::new(points, v);
            if face.distance(&inside) > 0.0 {
                Face::new(points, [v[0], v[2], v[1]])
            } else {
                face
            }
        })
        .collect();

    for (i, p) in points.iter().enumerate() {
        if i == a || i == b || i == c || i == d {
            continue;
        }

        let visible: Vec<usize> = faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.alive && f.distance(p) > eps)
            .map(|(fi, _)| fi)
            .collect();
        if visible.is_empty() {
            continue;
        }

        let mut directed: FxHashSet<(usize, usize)> = FxHashSet::default();
        for &fi in &visible {
            let [x, y, z] = faces[fi].v;
            directed.extend([(x, y), (y, z), (z, x)]);
            faces[fi].alive = false;
        }

        // Horizon edges keep the visible face's direction so new faces stay outward
        let horizon: Vec<(usize, usize)> = directed
            .iter()
            .filter(|(x, y)| !directed.contains(&(*y, *x)))
            .copied()
            .collect();
        for (x, y) in horizon {
            faces.push(Face::new(points, [x, y, i]));
        }
    }

    let mut remap: FxHashMap<usize, u32> = FxHashMap::default();
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();
    for face in faces.iter().filter(|f| f.alive) {
        let tri = face.v.map(|vi| {
            *remap.entry(vi).or_insert_with(|| {
                vertices.push(points[vi]);
                (vertices.len() - 1) as u32
            })
        });
        triangles.push(tri);
    }

    Ok((vertices, triangles))
}

fn extent(points: &[Point3<f64>]) -> f64 {
    let mut lo = points[0];
    let mut hi = points[0];
    for p in points {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    (hi - lo).max().max(f64::MIN_POSITIVE)
}

/// Four points spanning a non-degenerate tetrahedron
fn initial_simplex(points: &[Point3<f64>]) -> Result<[usize; 4]> {
    let eps = extent(points) * 1e-9;

    let a = (0..points.len())
        .min_by(|&i, &j| points[i].x.total_cmp(&points[j].x))
        .ok_or(Error::EmptyInput)?;

    let farthest = |score: &dyn Fn(&Point3<f64>) -> f64| {
        (0..points.len())
            .map(|i| (i, score(&points[i])))
            .max_by(|x, y| x.1.total_cmp(&y.1))
            .unwrap_or((a, 0.0))
    };

    let (b, dist_ab) = farthest(&|p| (p - points[a]).norm());
    if dist_ab <= eps {
        return Err(Error::degenerate("all hull input points coincide"));
    }

    let axis = (points[b] - points[a]) / dist_ab;
    let (c, dist_line) = farthest(&|p| (p - points[a]).cross(&axis).norm());
    if dist_line <= eps {
        return Err(Error::degenerate("hull input points are collinear"));
    }

    let normal = axis.cross(&(points[c] - points[a])).normalize();
    let (d, dist_plane) = farthest(&|p| normal.dot(&(p - points[a])).abs());
    if dist_plane <= eps {
        return Err(Error::degenerate("hull input points are coplanar"));
    }

    Ok([a, b, c, d])
}

/// Merge triangle regions whose normals stay within `angle_degrees` of the
/// region's first triangle
fn dissolve(
    vertices: &[Point3<f64>],
    triangles: &[[u32; 3]],
    angle_degrees: f64,
) -> (Vec<Point3<f64>>, Vec<Vec<u32>>) {
    let limit = angle_degrees.to_radians();
    let normals: Vec<Vector3<f64>> = triangles
        .iter()
        .map(|t| {
            let pts = t.map(|i| vertices[i as usize]);
            calculate_polygon_normal(&pts).unwrap_or_else(Vector3::zeros)
        })
        .collect();

    let mut by_edge: FxHashMap<(u32, u32), usize> = FxHashMap::default();
    for (ti, t) in triangles.iter().enumerate() {
        for k in 0..3 {
            by_edge.insert((t[k], t[(k + 1) % 3]), ti);
        }
    }

    let mut region_of = vec![usize::MAX; triangles.len()];
    let mut polygons = Vec::new();

    for seed in 0..triangles.len() {
        if region_of[seed] != usize::MAX {
            continue;
        }
        let mut members = vec![seed];
        region_of[seed] = seed;
        let mut queue = VecDeque::from([seed]);

        while let Some(ti) = queue.pop_front() {
            let t = triangles[ti];
            for k in 0..3 {
                let Some(&nb) = by_edge.get(&(t[(k + 1) % 3], t[k])) else {
                    continue;
                };
                if region_of[nb] != usize::MAX {
                    continue;
                }
                if normals[seed].angle(&normals[nb]) < limit {
                    region_of[nb] = seed;
                    members.push(nb);
                    queue.push_back(nb);
                }
            }
        }

        match boundary_loop(triangles, &members) {
            Some(poly) => polygons.push(poly),
            None => polygons.extend(members.iter().map(|&ti| triangles[ti].to_vec())),
        }
    }

    compact(vertices, polygons)
}

/// Single boundary loop of a triangle region, `None` if it is not a disc
fn boundary_loop(triangles: &[[u32; 3]], members: &[usize]) -> Option<Vec<u32>> {
    if members.len() == 1 {
        return Some(triangles[members[0]].to_vec());
    }

    let inner: FxHashSet<(u32, u32)> = members
        .iter()
        .flat_map(|&ti| {
            let t = triangles[ti];
            [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])]
        })
        .collect();

    let mut next: FxHashMap<u32, u32> = FxHashMap::default();
    for &(a, b) in &inner {
        if inner.contains(&(b, a)) {
            continue;
        }
        // Two outgoing boundary edges from one vertex: pinched region
        if next.insert(a, b).is_some() {
            return None;
        }
    }

    let (&start, _) = next.iter().min_by_key(|(&a, _)| a)?;
    let mut poly = vec![start];
    let mut current = *next.get(&start)?;
    while current != start {
        if poly.len() > next.len() {
            return None;
        }
        poly.push(current);
        current = *next.get(&current)?;
    }

    (poly.len() == next.len() && poly.len() >= 3).then_some(poly)
}

/// Drop unreferenced vertices and renumber polygons
fn compact(vertices: &[Point3<f64>], polygons: Vec<Vec<u32>>) -> (Vec<Point3<f64>>, Vec<Vec<u32>>) {
    let mut remap: FxHashMap<u32, u32> = FxHashMap::default();
    let mut out = Vec::new();
    let polygons = polygons
        .into_iter()
        .map(|poly| {
            poly.into_iter()
                .map(|i| {
                    *remap.entry(i).or_insert_with(|| {
                        out.push(vertices[i as usize]);
                        (out.len() - 1) as u32
                    })
                })
                .collect()
        })
        .collect();
    (out, polygons)
}

fn polygon_edges(polygons: &[Vec<u32>]) -> Vec<[u32; 2]> {
    let mut seen = FxHashSet::default();
    let mut edges = Vec::new();
    for poly in polygons {
        for (k, &a) in poly.iter().enumerate() {
            let b = poly[(k + 1) % poly.len()];
            let key = if a < b { [a, b] } else { [b, a] };
            if seen.insert(key) {
                edges.push(key);
            }
        }
    }
    edges
}

fn triangulate_polygons(vertices: &[Point3<f64>], polygons: &[Vec<u32>]) -> Vec<[u32; 3]> {
    let mut triangles = Vec::new();
    for poly in polygons {
        let pts: Vec<_> = poly.iter().map(|&i| vertices[i as usize]).collect();
        let local = triangulate_face(&pts)
            .unwrap_or_else(|_| (1..poly.len() - 1).map(|k| [0, k, k + 1]).collect());
        triangles.extend(local.into_iter().map(|t| t.map(|k| poly[k])));
    }
    triangles
}

/// Move vertices along averaged polygon normals
fn apply_push(hull: &mut HullMesh, push: f64) {
    let normals = hull.polygon_normals();

    let mut push = push;
    if push < 0.0 {
        let center = Point3::from(
            hull.vertices.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords)
                / hull.vertices.len() as f64,
        );
        let inradius = hull
            .polygons
            .iter()
            .zip(&normals)
            .map(|(poly, n)| n.dot(&(hull.vertices[poly[0] as usize] - center)))
            .fold(f64::INFINITY, f64::min);
        if -push >= inradius {
            let clamped = -inradius * 0.999;
            log::warn!(
                "hull push {:.4} would invert the hull (inradius {:.4}), clamped to {:.4}",
                push,
                inradius,
                clamped
            );
            push = clamped;
        }
    }

    let mut vertex_normals = vec![Vector3::zeros(); hull.vertices.len()];
    for (poly, n) in hull.polygons.iter().zip(&normals) {
        for &i in poly {
            vertex_normals[i as usize] += n;
        }
    }
    for (v, n) in hull.vertices.iter_mut().zip(vertex_normals) {
        if let Some(n) = n.try_normalize(1e-12) {
            *v += n * push;
        }
    }
    hull.applied_push = push;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube_corners(half: f64) -> Vec<Point3<f64>> {
        let mut pts = Vec::new();
        for &x in &[-half, half] {
            for &y in &[-half, half] {
                for &z in &[-half, half] {
                    pts.push(Point3::new(x, y, z));
                }
            }
        }
        pts
    }

    fn cloud() -> Vec<Point3<f64>> {
        (0..200)
            .map(|i| {
                let t = i as f64;
                Point3::new(
                    (t * 12.9898).sin() * 2.0,
                    (t * 78.233).sin() * 1.5,
                    (t * 37.719).cos(),
                )
            })
            .collect()
    }

    #[test]
    fn test_cube_hull_dissolves_to_quads() {
        let mut pts = cube_corners(1.0);
        pts.push(Point3::new(0.1, 0.2, -0.3)); // interior
        let hull = compute_convex_hull(&pts, 0.0, DEFAULT_DISSOLVE_ANGLE).unwrap();
        assert_eq!(hull.vertices.len(), 8);
        assert_eq!(hull.polygons.len(), 6);
        assert!(hull.polygons.iter().all(|p| p.len() == 4));
        assert_eq!(hull.edges.len(), 12);
        assert_eq!(hull.triangles.len(), 12);
        assert_relative_eq!(hull.volume(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_dissolve_keeps_triangles() {
        let hull = compute_convex_hull(&cube_corners(1.0), 0.0, 0.0).unwrap();
        assert_eq!(hull.polygons.len(), 12);
        assert_eq!(hull.edges.len(), 18);
    }

    #[test]
    fn test_outward_normals() {
        let hull = compute_convex_hull(&cloud(), 0.0, DEFAULT_DISSOLVE_ANGLE).unwrap();
        let center = Point3::from(
            hull.vertices.iter().fold(Vector3::zeros(), |a, p| a + p.coords) / hull.vertices.len() as f64,
        );
        for (poly, n) in hull.polygons.iter().zip(hull.polygon_normals()) {
            assert!(n.dot(&(hull.vertices[poly[0] as usize] - center)) > 0.0);
        }
        assert!(hull.volume() > 0.0);
    }

    #[test]
    fn test_contains_all_input() {
        let pts = cloud();
        let hull = compute_convex_hull(&pts, 0.0, 0.0).unwrap();
        for p in &pts {
            assert!(hull.contains(p, 1e-7));
        }
    }

    #[test]
    fn test_dissolved_curved_hull_contains_input() {
        let sphere = crate::sphere::uv_sphere(32, 16);
        let hull = compute_convex_hull(&sphere.vertices, 0.0, DEFAULT_DISSOLVE_ANGLE).unwrap();
        let raw = compute_convex_hull(&sphere.vertices, 0.0, 0.0).unwrap();
        assert!(hull.polygons.len() < raw.polygons.len());
        for p in &sphere.vertices {
            assert!(hull.contains(p, 1e-9), "{:?} outside", p);
        }
        assert!(!hull.contains(&Point3::new(0.0, 0.0, 1.1), 1e-9));
    }

    #[test]
    fn test_idempotent() {
        let first = compute_convex_hull(&cloud(), 0.0, 0.0).unwrap();
        let second = compute_convex_hull(&first.vertices, 0.0, 0.0).unwrap();
        assert_eq!(first.vertices.len(), second.vertices.len());
        assert_relative_eq!(first.volume(), second.volume(), epsilon = 1e-9);
    }

    #[test]
    fn test_push_increases_volume() {
        let pts = cloud();
        let volumes: Vec<f64> = [-0.05, 0.0, 0.05, 0.2]
            .iter()
            .map(|&push| compute_convex_hull(&pts, push, DEFAULT_DISSOLVE_ANGLE).unwrap().volume())
            .collect();
        for pair in volumes.windows(2) {
            assert!(pair[1] > pair[0], "{:?}", volumes);
        }
    }

    #[test]
    fn test_negative_push_never_inverts() {
        let hull = compute_convex_hull(&cube_corners(0.5), -2.0, DEFAULT_DISSOLVE_ANGLE).unwrap();
        assert!(hull.applied_push > -0.5);
        assert!(hull.volume() > 0.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(compute_convex_hull(&[], 0.0, 5.0), Err(Error::EmptyInput));
        let same = vec![Point3::new(1.0, 1.0, 1.0); 5];
        assert!(matches!(compute_convex_hull(&same, 0.0, 5.0), Err(Error::Degenerate(_))));
        let line: Vec<_> = (0..6).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        assert!(matches!(compute_convex_hull(&line, 0.0, 5.0), Err(Error::Degenerate(_))));
        let plane: Vec<_> = (0..9).map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0)).collect();
        assert!(matches!(compute_convex_hull(&plane, 0.0, 5.0), Err(Error::Degenerate(_))));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapping to mesh elements in screen space
//!
//! Candidates are gathered in world space, projected through the viewport and
//! compared against the pointer in pixels.

use crate::math::{plane_edge_intersections, project_point_onto_plane_intersection_line};
use crate::raycast::FaceHit;
use cursorbox_model::{SceneQuery, Viewport};
use nalgebra::{Point2, Point3, Vector3};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default snap radius in pixels
pub const DEFAULT_SNAP_THRESHOLD: f64 = 50.0;

/// Snap radius change per keypress, also its minimum
pub const SNAP_THRESHOLD_STEP: f64 = 10.0;

/// Element kinds a snap may be restricted to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapMode {
    #[default]
    All,
    Vertex,
    Edge,
    Face,
}

/// Kind of element a snap landed on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapKind {
    Vertex,
    Edge,
    Face,
    /// Crossing of a face edge with the limitation plane
    Intersection,
}

impl SnapMode {
    fn allows(self, kind: SnapKind) -> bool {
        match (self, kind) {
            (SnapMode::All, _) => true,
            (SnapMode::Vertex, SnapKind::Vertex | SnapKind::Intersection) => true,
            (SnapMode::Edge, SnapKind::Edge) => true,
            (SnapMode::Face, SnapKind::Face) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapResult {
    pub location: Point3<f64>,
    pub kind: SnapKind,
    /// Pointer distance in pixels
    pub screen_distance: f64,
}

#[derive(Error, Clone, Debug, PartialEq)]
pub enum SnapFailure {
    #[error("Nothing to snap to")]
    NoCandidates,

    #[error("No snap target within {threshold:.0}px (nearest {nearest:.0}px)")]
    OutOfRange { nearest: f64, threshold: f64 },
}

/// Where snap candidates come from
#[derive(Clone, Copy)]
pub enum SnapSource<'a> {
    /// Elements of the face under the pointer
    Face(&'a FaceHit),
    /// Sampled elements of every scene object
    Scene(&'a dyn SceneQuery),
}

/// Plane limiting point placement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimitPlane {
    pub origin: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl LimitPlane {
    /// Points where the hit face's edges cross this plane
    pub fn face_intersections(&self, hit: &FaceHit) -> Vec<Point3<f64>> {
        let edges: Vec<_> = hit.edges.iter().map(|e| (e.start, e.end)).collect();
        plane_edge_intersections(&edges, &self.origin, &self.normal)
    }
}

/// Location for a new marked point from a face hit
///
/// With a limitation plane the hit is moved onto the line where the face
/// plane meets the limitation plane.
pub fn resolve_point_location(
    hit: &FaceHit,
    limit: Option<&LimitPlane>,
) -> Result<Point3<f64>, &'static str> {
    match limit {
        None => Ok(hit.location),
        Some(plane) => project_point_onto_plane_intersection_line(
            &hit.location,
            &hit.normal,
            &hit.location,
            &plane.origin,
            &plane.normal,
        )
        .ok_or("Face is parallel to the limitation plane"),
    }
}

/// Grow or shrink the snap radius by one step, never below one step
pub fn adjust_snap_threshold(current: f64, increase: bool) -> f64 {
    if increase {
        current + SNAP_THRESHOLD_STEP
    } else {
        (current - SNAP_THRESHOLD_STEP).max(SNAP_THRESHOLD_STEP)
    }
}

struct Candidate {
    location: Point3<f64>,
    kind: SnapKind,
    distance: f64,
}

/// Snap the pointer to the nearest allowed element
///
/// # Arguments
/// * `source` - Face hit or whole scene to draw candidates from
/// * `screen_point` - Pointer position in region pixels
/// * `mode` - Restricts candidate kinds
/// * `threshold_px` - Largest accepted distance (inclusive)
/// * `viewport` - Projection used to measure distances
/// * `intersections` - Cached limitation-plane crossings
pub fn snap_to_nearest_element(
    source: SnapSource<'_>,
    screen_point: Point2<f64>,
    mode: SnapMode,
    threshold_px: f64,
    viewport: &dyn Viewport,
    intersections: &[Point3<f64>],
) -> Result<SnapResult, SnapFailure> {
    let mut best: Option<Candidate> = None;
    let mut consider = |location: Point3<f64>, kind: SnapKind, screen: Option<Point2<f64>>| {
        if !mode.allows(kind) {
            return;
        }
        let Some(screen) = screen else {
            return;
        };
        let distance = (screen - screen_point).norm();
        if best.as_ref().map(|b| distance < b.distance).unwrap_or(true) {
            best = Some(Candidate {
                location,
                kind,
                distance,
            });
        }
    };

    match source {
        SnapSource::Face(hit) => {
            for v in &hit.vertices {
                consider(*v, SnapKind::Vertex, viewport.project(v));
            }
            for e in &hit.edges {
                if let Some((location, screen)) = nearest_on_segment(&e.start, &e.end, &screen_point, viewport) {
                    consider(location, SnapKind::Edge, Some(screen));
                }
            }
            consider(hit.center, SnapKind::Face, viewport.project(&hit.center));
        }
        SnapSource::Scene(scene) => {
            for id in scene.object_ids() {
                let Some(mesh) = scene.object(id) else {
                    continue;
                };
                let transform = mesh.world_transform();
                let verts: Vec<Point3<f64>> = mesh
                    .vertices()
                    .iter()
                    .map(|p| transform.transform_point(p))
                    .collect();

                for v in verts.iter().step_by(sample_step(verts.len(), 100)) {
                    consider(*v, SnapKind::Vertex, viewport.project(v));
                }

                let edges = unique_edges(mesh.faces());
                for (a, b) in edges.iter().step_by(sample_step(edges.len(), 50)) {
                    let (Some(a), Some(b)) = (verts.get(*a as usize), verts.get(*b as usize)) else {
                        continue;
                    };
                    let mid = nalgebra::center(a, b);
                    consider(mid, SnapKind::Edge, viewport.project(&mid));
                }

                let faces = mesh.faces();
                for face in faces.iter().step_by(sample_step(faces.len(), 25)) {
                    let pts: Vec<_> = face.iter().filter_map(|&i| verts.get(i as usize)).collect();
                    if pts.is_empty() {
                        continue;
                    }
                    let c = Point3::from(
                        pts.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / pts.len() as f64,
                    );
                    consider(c, SnapKind::Face, viewport.project(&c));
                }
            }
        }
    }

    for p in intersections {
        consider(*p, SnapKind::Intersection, viewport.project(p));
    }

    let best = best.ok_or(SnapFailure::NoCandidates)?;
    if best.distance <= threshold_px {
        Ok(SnapResult {
            location: best.location,
            kind: best.kind,
            screen_distance: best.distance,
        })
    } else {
        Err(SnapFailure::OutOfRange {
            nearest: best.distance,
            threshold: threshold_px,
        })
    }
}

fn unique_edges(faces: &[Vec<u32>]) -> Vec<(u32, u32)> {
    let mut seen = FxHashSet::default();
    let mut edges = Vec::new();
    for face in faces {
        for (i, &a) in face.iter().enumerate() {
            let b = face[(i + 1) % face.len()];
            let key = if a < b { (a, b) } else { (b, a) };
            if seen.insert(key) {
                edges.push(key);
            }
        }
    }
    edges
}

#[inline]
fn sample_step(count: usize, target: usize) -> usize {
    (count / target).max(1)
}

/// Point on a world segment whose projection is nearest the pointer
fn nearest_on_segment(
    start: &Point3<f64>,
    end: &Point3<f64>,
    pointer: &Point2<f64>,
    viewport: &dyn Viewport,
) -> Option<(Point3<f64>, Point2<f64>)> {
    let a = viewport.project(start)?;
    let b = viewport.project(end)?;
    let ab = b - a;
    let len_sq = ab.norm_squared();
    let t = if len_sq > 1e-12 {
        ((*pointer - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.5
    };
    Some((*start + (*end - *start) * t, a + ab * t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshScene;
    use crate::raycast::{resolve_face_hit, FaceEdge};
    use cursorbox_model::{MeshData, ObjectId, Ray};
    use nalgebra::Matrix4;

    /// Top-down orthographic view, 100 px per unit
    struct TopView;

    impl Viewport for TopView {
        fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>> {
            Some(Point2::new(point.x * 100.0, point.y * 100.0))
        }
    }

    fn square_hit() -> FaceHit {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let edges = (0..4)
            .map(|i| FaceEdge::new(vertices[i], vertices[(i + 1) % 4]))
            .collect();
        FaceHit {
            object: ObjectId(1),
            face_index: 0,
            location: Point3::new(0.5, 0.5, 0.0),
            normal: Vector3::z(),
            distance: 1.0,
            center: Point3::new(0.5, 0.5, 0.0),
            vertices,
            edges,
        }
    }

    #[test]
    fn test_snaps_to_vertex() {
        let hit = square_hit();
        let snap = snap_to_nearest_element(
            SnapSource::Face(&hit),
            Point2::new(95.0, 3.0),
            SnapMode::Vertex,
            50.0,
            &TopView,
            &[],
        )
        .unwrap();
        assert_eq!(snap.kind, SnapKind::Vertex);
        assert_eq!(snap.location, Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_edge_snap_slides_along_segment() {
        let hit = square_hit();
        let snap = snap_to_nearest_element(
            SnapSource::Face(&hit),
            Point2::new(30.0, -4.0),
            SnapMode::Edge,
            50.0,
            &TopView,
            &[],
        )
        .unwrap();
        assert_eq!(snap.kind, SnapKind::Edge);
        assert!((snap.location.x - 0.3).abs() < 1e-12);
        assert!((snap.screen_distance - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let hit = square_hit();
        // Face center at (50, 50); pointer 10 px to the side
        let at = |x: f64| {
            snap_to_nearest_element(
                SnapSource::Face(&hit),
                Point2::new(x, 50.0),
                SnapMode::Face,
                10.0,
                &TopView,
                &[],
            )
        };
        assert!(at(60.0).is_ok());
        assert!(matches!(at(60.0 + 1e-9), Err(SnapFailure::OutOfRange { .. })));
    }

    #[test]
    fn test_all_mode_picks_nearest_kind() {
        let hit = square_hit();
        let snap = snap_to_nearest_element(
            SnapSource::Face(&hit),
            Point2::new(52.0, 49.0),
            SnapMode::All,
            50.0,
            &TopView,
            &[],
        )
        .unwrap();
        assert_eq!(snap.kind, SnapKind::Face);
    }

    #[test]
    fn test_intersections_are_candidates() {
        let hit = square_hit();
        let plane = LimitPlane {
            origin: Point3::new(0.25, 0.0, 0.0),
            normal: Vector3::x(),
        };
        let crossings = plane.face_intersections(&hit);
        assert_eq!(crossings.len(), 2);
        let snap = snap_to_nearest_element(
            SnapSource::Face(&hit),
            Point2::new(25.0, 1.0),
            SnapMode::Vertex,
            50.0,
            &TopView,
            &crossings,
        )
        .unwrap();
        assert_eq!(snap.kind, SnapKind::Intersection);
    }

    #[test]
    fn test_scene_source() {
        let mut scene = MeshScene::new();
        scene.add(
            "Cube",
            MeshData::cuboid(Point3::new(5.0, 5.0, 0.0), Vector3::repeat(0.5)),
            Matrix4::identity(),
        );
        let snap = snap_to_nearest_element(
            SnapSource::Scene(&scene),
            Point2::new(551.0, 548.0),
            SnapMode::Vertex,
            20.0,
            &TopView,
            &[],
        )
        .unwrap();
        assert_eq!((snap.location.x, snap.location.y), (5.5, 5.5));
    }

    #[test]
    fn test_point_location_on_limit_line() {
        let mut scene = MeshScene::new();
        let id = scene.add("Cube", MeshData::cuboid(Point3::origin(), Vector3::repeat(0.5)), Matrix4::identity());
        let hit = resolve_face_hit(&Ray::new(Point3::new(0.3, 0.2, 5.0), -Vector3::z()), &scene, &[id]).unwrap();

        assert_eq!(resolve_point_location(&hit, None), Ok(hit.location));

        let plane = LimitPlane {
            origin: Point3::origin(),
            normal: Vector3::x(),
        };
        let p = resolve_point_location(&hit, Some(&plane)).unwrap();
        assert!((p - Point3::new(0.0, 0.2, 0.5)).norm() < 1e-12);

        let parallel = LimitPlane {
            origin: Point3::origin(),
            normal: Vector3::z(),
        };
        assert!(resolve_point_location(&hit, Some(&parallel)).is_err());
    }

    #[test]
    fn test_threshold_adjustment() {
        assert_eq!(adjust_snap_threshold(50.0, true), 60.0);
        assert_eq!(adjust_snap_threshold(20.0, false), 10.0);
        assert_eq!(adjust_snap_threshold(10.0, false), 10.0);
    }
}

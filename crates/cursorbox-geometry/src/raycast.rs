// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ray picking against scene meshes
//!
//! Each candidate object is first tested against its world bounding box
//! (grown by a margin); only survivors get the exact per-triangle test in
//! object space. The closest hit wins. Results are kept briefly per mouse
//! position so redraws while the pointer rests skip the scene walk.

use crate::cache::CacheStats;
use crate::math::ray_aabb_hits;
use cursorbox_model::{MeshQuery, ObjectId, Ray, ReferenceFrame, SceneQuery};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Margin added to object bounds before the cheap rejection test
pub const BOUNDS_MARGIN: f64 = 0.1;

/// Hits closer than this end the search immediately
pub const IMMEDIATE_HIT_DISTANCE: f64 = 0.001;

/// One boundary edge of a hit face, in world space
#[derive(Clone, Debug, PartialEq)]
pub struct FaceEdge {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    pub center: Point3<f64>,
    /// Unit direction from `start` to `end`
    pub direction: Vector3<f64>,
    pub length: f64,
}

impl FaceEdge {
    pub fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        let delta = end - start;
        let length = delta.norm();
        Self {
            start,
            end,
            center: nalgebra::center(&start, &end),
            direction: if length > 0.0 { delta / length } else { Vector3::zeros() },
            length,
        }
    }
}

/// Resolved face under the pointer, all in world space
#[derive(Clone, Debug, PartialEq)]
pub struct FaceHit {
    pub object: ObjectId,
    pub face_index: usize,
    pub location: Point3<f64>,
    pub normal: Vector3<f64>,
    /// Distance from the ray origin
    pub distance: f64,
    pub vertices: Vec<Point3<f64>>,
    /// Vertex average of the face
    pub center: Point3<f64>,
    /// Consecutive vertex pairs, closing back to the first vertex
    pub edges: Vec<FaceEdge>,
}

impl FaceHit {
    /// Build face data for a face of `mesh`
    ///
    /// Returns `None` (with a warning) if the face index is out of range or
    /// the object transform is singular.
    pub fn from_mesh(
        mesh: &dyn MeshQuery,
        face_index: usize,
        location: Point3<f64>,
        local_normal: Vector3<f64>,
        distance: f64,
    ) -> Option<Self> {
        let Some(local) = mesh.vertices_of(face_index) else {
            log::warn!(
                "face {} out of range for object {} ({} faces)",
                face_index,
                mesh.id(),
                mesh.face_count()
            );
            return None;
        };

        let transform = mesh.world_transform();
        let linear: Matrix3<f64> = transform.fixed_view::<3, 3>(0, 0).into_owned();
        let normal_matrix = linear.try_inverse()?.transpose();
        let normal = (normal_matrix * local_normal).try_normalize(1e-12)?;

        let vertices: Vec<Point3<f64>> = local.iter().map(|p| transform.transform_point(p)).collect();
        let center = Point3::from(
            vertices.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / vertices.len() as f64,
        );
        let edges = vertices
            .iter()
            .zip(vertices.iter().cycle().skip(1))
            .map(|(a, b)| FaceEdge::new(*a, *b))
            .collect();

        Some(Self {
            object: mesh.id(),
            face_index,
            location,
            normal,
            distance,
            vertices,
            center,
            edges,
        })
    }

    /// Edge at `index`, clamped into range
    pub fn edge(&self, index: usize) -> Option<&FaceEdge> {
        self.edges.get(index.min(self.edges.len().saturating_sub(1)))
    }
}

/// Closest face hit along `ray` among `candidates`
///
/// Missing ids are skipped. Nothing hit is `None`, not an error.
pub fn resolve_face_hit(ray: &Ray, scene: &dyn SceneQuery, candidates: &[ObjectId]) -> Option<FaceHit> {
    let mut closest: Option<(f64, &dyn MeshQuery, usize, Point3<f64>, Vector3<f64>)> = None;

    for &id in candidates {
        let Some(mesh) = scene.object(id) else {
            continue;
        };
        let Some(bounds) = mesh.world_bounds() else {
            continue;
        };
        if !ray_aabb_hits(ray, &bounds, BOUNDS_MARGIN) {
            continue;
        }

        let transform = mesh.world_transform();
        let Some(inverse) = transform.try_inverse() else {
            log::debug!("skipping object {} with singular transform", id);
            continue;
        };
        let Some(hit) = mesh.ray_intersect(&ray.transformed(&inverse)) else {
            continue;
        };

        let location = transform.transform_point(&hit.location);
        let distance = (location - ray.origin).norm();
        if closest.map(|(best, ..)| distance < best).unwrap_or(true) {
            closest = Some((distance, mesh, hit.face_index, location, hit.normal));
        }
        if distance < IMMEDIATE_HIT_DISTANCE {
            break;
        }
    }

    let (distance, mesh, face_index, location, normal) = closest?;
    FaceHit::from_mesh(mesh, face_index, location, normal, distance)
}

/// Cursor rotation for a face hit
///
/// Z follows the face normal, X the selected edge (index clamped), and Y
/// completes a right-handed basis.
pub fn orient_frame_to_face(hit: &FaceHit, edge_index: usize) -> Rotation3<f64> {
    let z = hit.normal.try_normalize(1e-12).unwrap_or_else(Vector3::z);

    let along = hit
        .edge(edge_index)
        .map(|e| e.direction)
        .unwrap_or_else(Vector3::zeros);
    let x = (along - z * along.dot(&z))
        .try_normalize(1e-12)
        .unwrap_or_else(|| any_perpendicular(&z));

    let mut y = z.cross(&x);
    if x.dot(&y.cross(&z)) < 0.0 {
        y = -y;
    }

    Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]))
}

/// Cursor frame at the hit location
pub fn place_cursor(hit: &FaceHit, edge_index: usize) -> ReferenceFrame {
    ReferenceFrame::new(hit.location, orient_frame_to_face(hit, edge_index))
}

fn any_perpendicular(z: &Vector3<f64>) -> Vector3<f64> {
    let helper = if z.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    (helper - z * helper.dot(z)).normalize()
}

/// Next edge index when cycling with the scroll wheel
#[inline]
pub fn cycle_edge(index: usize, count: usize, forward: bool) -> usize {
    if count == 0 {
        return 0;
    }
    let step: i64 = if forward { 1 } else { -1 };
    (index as i64 + step).rem_euclid(count as i64) as usize
}

/// Parameters of [`RaycastCache`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastCacheConfig {
    /// Entries kept
    pub capacity: usize,
    /// Pointer movement, in pixels, below which a cached result is reused
    pub mouse_threshold: f64,
    /// Age below which a cached result is reused
    pub time_window: Duration,
}

impl Default for RaycastCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            mouse_threshold: 5.0,
            time_window: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Debug)]
struct CachedRay {
    mouse: Point2<f64>,
    at: Instant,
    hit: Option<FaceHit>,
}

/// Short-lived raycast results keyed by pointer position
#[derive(Debug)]
pub struct RaycastCache {
    config: RaycastCacheConfig,
    entries: VecDeque<CachedRay>,
    stats: CacheStats,
}

impl Default for RaycastCache {
    fn default() -> Self {
        Self::new(RaycastCacheConfig::default())
    }
}

impl RaycastCache {
    pub fn new(config: RaycastCacheConfig) -> Self {
        Self {
            config,
            entries: VecDeque::with_capacity(config.capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &RaycastCacheConfig {
        &self.config
    }

    /// Cached result for a pointer position, if fresh and still valid
    ///
    /// The outer `Option` is the cache hit; the inner one is the cached
    /// raycast result. Hits referencing deleted objects or faces are dropped.
    pub fn lookup(
        &mut self,
        mouse: Point2<f64>,
        now: Instant,
        scene: &dyn SceneQuery,
    ) -> Option<Option<FaceHit>> {
        let threshold = self.config.mouse_threshold;
        let window = self.config.time_window;

        let position = self.entries.iter().rposition(|e| {
            (e.mouse.x - mouse.x).abs() < threshold
                && (e.mouse.y - mouse.y).abs() < threshold
                && now.saturating_duration_since(e.at) < window
        });

        let Some(position) = position else {
            self.stats.misses += 1;
            return None;
        };

        let stale = self.entries[position].hit.as_ref().is_some_and(|hit| {
            scene
                .object(hit.object)
                .map(|mesh| hit.face_index >= mesh.face_count())
                .unwrap_or(true)
        });
        if stale {
            log::debug!("discarding stale cached raycast hit");
            self.entries.remove(position);
            self.stats.misses += 1;
            return None;
        }

        self.stats.hits += 1;
        Some(self.entries[position].hit.clone())
    }

    pub fn store(&mut self, mouse: Point2<f64>, now: Instant, hit: Option<FaceHit>) {
        if self.entries.len() >= self.config.capacity.max(1) {
            self.entries.pop_front();
        }
        self.entries.push_back(CachedRay { mouse, at: now, hit });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Face picking with result caching
#[derive(Debug, Default)]
pub struct RaycastResolver {
    cache: RaycastCache,
}

impl RaycastResolver {
    pub fn new(config: RaycastCacheConfig) -> Self {
        Self {
            cache: RaycastCache::new(config),
        }
    }

    /// Face under the pointer, reusing a fresh cached result when possible
    pub fn resolve(
        &mut self,
        ray: &Ray,
        mouse: Point2<f64>,
        now: Instant,
        scene: &dyn SceneQuery,
    ) -> Option<FaceHit> {
        if let Some(cached) = self.cache.lookup(mouse, now, scene) {
            return cached;
        }
        let hit = resolve_face_hit(ray, scene, &scene.object_ids());
        self.cache.store(mouse, now, hit.clone());
        hit
    }

    pub fn cache(&self) -> &RaycastCache {
        &self.cache
    }

    /// Drop every cached result
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine context
//!
//! Everything one interactive session owns: settings, marks, the cursor
//! frame, the optional limitation plane and the result caches. Hosts create
//! one per session and pass it to the controller explicitly.

use crate::cache::{content_hash, BoundedCache, CacheStats};
use crate::hull::{compute_convex_hull, HullMesh};
use crate::marking::MarkingState;
use crate::math::fit_frame_to_points;
use crate::oriented_box::{BoxCache, OrientedBox, OBJECT_EPSILON, PREVIEW_EPSILON};
use crate::raycast::{FaceHit, RaycastResolver};
use crate::settings::{EngineSettings, VolumeNames};
use crate::snap::LimitPlane;
use crate::sphere::{compute_oriented_sphere, BoundingSphere};
use crate::{Error, Result};
use cursorbox_model::{MeshData, ReferenceFrame, SceneQuery};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Kind of bounding volume to build
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeKind {
    Box,
    ConvexHull,
    Sphere,
}

/// A computed bounding volume
#[derive(Clone, Debug, PartialEq)]
pub enum BoundingVolume {
    Box(OrientedBox),
    ConvexHull(HullMesh),
    Sphere(BoundingSphere),
}

impl BoundingVolume {
    pub fn kind(&self) -> VolumeKind {
        match self {
            BoundingVolume::Box(_) => VolumeKind::Box,
            BoundingVolume::ConvexHull(_) => VolumeKind::ConvexHull,
            BoundingVolume::Sphere(_) => VolumeKind::Sphere,
        }
    }

    /// World-space mesh of the volume
    pub fn to_mesh(&self, settings: &EngineSettings) -> MeshData {
        match self {
            BoundingVolume::Box(b) => b.to_mesh(),
            BoundingVolume::ConvexHull(h) => h.to_mesh(),
            BoundingVolume::Sphere(s) => s.to_mesh(settings.sphere_segments, settings.sphere_rings),
        }
    }

    /// Name for the object created from this volume
    pub fn object_name<'a>(&self, names: &'a VolumeNames) -> &'a str {
        match self.kind() {
            VolumeKind::Box => &names.bounding_box,
            VolumeKind::ConvexHull => &names.convex_hull,
            VolumeKind::Sphere => &names.sphere,
        }
    }
}

/// Per-session engine state
#[derive(Debug)]
pub struct EngineContext {
    pub settings: EngineSettings,
    pub marking: MarkingState,
    /// Current cursor pose
    pub frame: ReferenceFrame,
    pub limit_plane: Option<LimitPlane>,
    /// Clicks add points instead of marking faces
    pub point_mode: bool,
    /// Clicks toggle coplanar face groups
    pub coplanar_mode: bool,
    /// Volume shown while marking, if any
    pub preview_kind: Option<VolumeKind>,
    resolver: RaycastResolver,
    box_cache: BoxCache,
    hull_cache: BoundedCache<HullMesh>,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl EngineContext {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            resolver: RaycastResolver::new(settings.raycast_config()),
            box_cache: BoxCache::new(settings.box_cache_capacity),
            hull_cache: BoundedCache::new(settings.box_cache_capacity),
            settings,
            marking: MarkingState::new(),
            frame: ReferenceFrame::identity(),
            limit_plane: None,
            point_mode: false,
            coplanar_mode: false,
            preview_kind: None,
        }
    }

    pub fn resolver(&self) -> &RaycastResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut RaycastResolver {
        &mut self.resolver
    }

    /// Volume for an interactive preview (coarser dimension floor)
    pub fn preview_volume(&mut self, kind: VolumeKind, scene: &dyn SceneQuery) -> Result<BoundingVolume> {
        self.compute_volume(kind, scene, PREVIEW_EPSILON)
    }

    /// Volume for a created object
    pub fn final_volume(&mut self, kind: VolumeKind, scene: &dyn SceneQuery) -> Result<BoundingVolume> {
        self.compute_volume(kind, scene, OBJECT_EPSILON)
    }

    /// Bound everything currently marked
    ///
    /// Boxes and spheres follow the cursor frame; hulls are frame independent.
    pub fn compute_volume(
        &mut self,
        kind: VolumeKind,
        scene: &dyn SceneQuery,
        epsilon: f64,
    ) -> Result<BoundingVolume> {
        let points = self.marking.collect_points(scene);
        if points.is_empty() {
            return Err(Error::EmptyInput);
        }
        let push = self.settings.push;

        match kind {
            VolumeKind::Box => self
                .box_cache
                .compute(&points, &self.frame, push, epsilon)
                .map(BoundingVolume::Box),
            VolumeKind::ConvexHull => {
                let dissolve = self.settings.dissolve_angle;
                let key = content_hash(&points, None, &[push, dissolve]);
                self.hull_cache
                    .get_or_try_insert(key, || compute_convex_hull(&points, push, dissolve))
                    .map(BoundingVolume::ConvexHull)
            }
            VolumeKind::Sphere => {
                compute_oriented_sphere(&points, &self.frame, push).map(BoundingVolume::Sphere)
            }
        }
    }

    /// Align the cursor with the best-fit plane of the marked geometry
    pub fn fit_cursor_to_marked(&mut self, scene: &dyn SceneQuery) -> Result<ReferenceFrame> {
        let points = self.marking.collect_points(scene);
        let frame = fit_frame_to_points(&points)
            .ok_or_else(|| Error::degenerate("marked geometry does not span a plane"))?;
        self.frame = frame;
        Ok(frame)
    }

    /// Use the cursor's XY plane as the limitation plane, or clear it
    pub fn toggle_limit_plane(&mut self) -> Option<LimitPlane> {
        self.limit_plane = match self.limit_plane {
            Some(_) => None,
            None => Some(LimitPlane {
                origin: self.frame.position(),
                normal: self.frame.axis_z(),
            }),
        };
        self.limit_plane
    }

    /// Limitation-plane crossings of the hit face's edges
    pub fn limit_intersections(&self, hit: &FaceHit) -> Vec<Point3<f64>> {
        self.limit_plane
            .map(|plane| plane.face_intersections(hit))
            .unwrap_or_default()
    }

    /// Drop every cached result
    pub fn clear_caches(&mut self) {
        self.resolver.invalidate();
        self.box_cache.clear();
        self.hull_cache.clear();
    }

    pub fn box_cache_stats(&self) -> CacheStats {
        self.box_cache.stats()
    }

    pub fn hull_cache_stats(&self) -> CacheStats {
        self.hull_cache.stats()
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CursorBox Geometry
//!
//! Cursor-oriented bounding volumes and the picking machinery around them.
//! Scene access goes through the `MeshQuery`, `SceneQuery` and `Viewport`
//! traits from `cursorbox-model`, so the engine runs against any host.
//!
//! ## Overview
//!
//! - **Bounding Volumes**: oriented boxes, convex hulls with coplanar face
//!   dissolve, frame-oriented spheres, all with a signed push offset
//! - **Picking**: cached face raycasts, edge-aligned cursor placement,
//!   screen-space snapping to vertices, edges, face centers and plane
//!   crossings
//! - **Marking**: per-object face sets, point lists, coplanar face groups
//! - **Interaction**: a pure controller turning input events into effects
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cursorbox_geometry::{compute_oriented_box, OBJECT_EPSILON};
//! use cursorbox_model::ReferenceFrame;
//! use nalgebra::Point3;
//!
//! let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)];
//! let bbox = compute_oriented_box(&points, &ReferenceFrame::identity(), 0.0, OBJECT_EPSILON)?;
//!
//! println!("box of {:?} around {}", bbox.dimensions(), bbox.center);
//! ```

pub mod cache;
pub mod context;
pub mod controller;
pub mod coplanar;
pub mod error;
pub mod hull;
pub mod marking;
pub mod math;
pub mod mesh;
pub mod oriented_box;
pub mod raycast;
pub mod settings;
pub mod snap;
pub mod sphere;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Rotation3, Vector3};

// Re-export main types
pub use cache::{content_hash, BoundedCache, CacheStats};
pub use context::{BoundingVolume, EngineContext, VolumeKind};
pub use controller::{handle_event, Effect, Event, InteractionState, ReportLevel};
pub use coplanar::{adjust_angle, angle_preset, grow_coplanar_region, ANGLE_PRESETS};
pub use error::{Error, Result};
pub use hull::{compute_convex_hull, HullMesh, DEFAULT_DISSOLVE_ANGLE};
pub use marking::{Invalidation, MarkingState};
pub use math::{
    best_fit_plane, fit_frame_to_points, plane_edge_intersections,
    project_point_onto_plane_intersection_line, transform_from_frame, transform_to_frame,
};
pub use mesh::{face_adjacency, MeshObject, MeshScene};
pub use oriented_box::{
    compute_oriented_box, local_oriented_box, world_oriented_box, BoxCache, OrientedBox,
    BOX_EDGES, BOX_TRIANGLES, OBJECT_EPSILON, PREVIEW_EPSILON,
};
pub use raycast::{
    cycle_edge, orient_frame_to_face, place_cursor, resolve_face_hit, FaceEdge, FaceHit,
    RaycastCache, RaycastCacheConfig, RaycastResolver,
};
pub use settings::{EngineSettings, VolumeNames};
pub use snap::{
    resolve_point_location, snap_to_nearest_element, LimitPlane, SnapFailure, SnapKind, SnapMode,
    SnapResult, SnapSource,
};
pub use sphere::{compute_oriented_sphere, uv_sphere, BoundingSphere};
pub use triangulation::{calculate_polygon_normal, project_to_2d, triangulate_face, triangulate_polygon};

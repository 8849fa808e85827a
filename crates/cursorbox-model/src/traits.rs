// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host capability traits
//!
//! The engine never touches a concrete scene. Hosts expose their meshes,
//! object lookup and viewport projection through these traits, which keeps
//! raycasting, snapping and bounding-volume computation independent of any
//! particular application.

use crate::{Aabb, LocalHit, ObjectId, Ray};
use nalgebra::{Matrix4, Point2, Point3, Vector3};

/// Read access to one mesh object
///
/// All geometry is in object-local space; [`MeshQuery::world_transform`]
/// maps it into the world.
///
/// # Example
///
/// ```ignore
/// use cursorbox_model::MeshQuery;
///
/// fn corner_count(mesh: &dyn MeshQuery) -> usize {
///     (0..mesh.face_count())
///         .filter_map(|f| mesh.vertices_of(f))
///         .map(|pts| pts.len())
///         .sum()
/// }
/// ```
pub trait MeshQuery {
    /// Stable identity of the object
    fn id(&self) -> ObjectId;

    /// Display name, used for naming created objects
    fn name(&self) -> &str;

    /// Vertex positions in local space
    fn vertices(&self) -> &[Point3<f64>];

    /// Faces as vertex index loops
    fn faces(&self) -> &[Vec<u32>];

    /// Object-to-world transform (modifiers and deformation already applied)
    fn world_transform(&self) -> Matrix4<f64>;

    /// Intersect a ray given in local space
    ///
    /// # Returns
    /// The closest hit in front of the ray origin, or `None`
    fn ray_intersect(&self, ray: &Ray) -> Option<LocalHit>;

    #[inline]
    fn face_count(&self) -> usize {
        self.faces().len()
    }

    /// Local-space vertex positions of a face
    fn vertices_of(&self, face: usize) -> Option<Vec<Point3<f64>>> {
        let verts = self.vertices();
        self.faces()
            .get(face)?
            .iter()
            .map(|&i| verts.get(i as usize).copied())
            .collect()
    }

    /// Local-space face normal (Newell), `None` for a degenerate face
    fn face_normal(&self, face: usize) -> Option<Vector3<f64>> {
        let pts = self.vertices_of(face)?;
        let mut normal = Vector3::zeros();
        for (i, current) in pts.iter().enumerate() {
            let next = &pts[(i + 1) % pts.len()];
            normal.x += (current.y - next.y) * (current.z + next.z);
            normal.y += (current.z - next.z) * (current.x + next.x);
            normal.z += (current.x - next.x) * (current.y + next.y);
        }
        normal.try_normalize(1e-12)
    }

    fn local_bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices())
    }

    fn world_bounds(&self) -> Option<Aabb> {
        self.local_bounds()
            .map(|b| b.transformed(&self.world_transform()))
    }
}

/// Lookup of live scene objects
pub trait SceneQuery {
    /// Ids of every mesh object that may be raycast or snapped to
    fn object_ids(&self) -> Vec<ObjectId>;

    /// Resolve an id; `None` once the object has been deleted
    fn object(&self, id: ObjectId) -> Option<&dyn MeshQuery>;

    fn contains(&self, id: ObjectId) -> bool {
        self.object(id).is_some()
    }
}

/// World to screen projection of the active viewport
pub trait Viewport {
    /// Region pixel coordinates of a world point, `None` when behind the view
    fn project(&self, point: &Point3<f64>) -> Option<Point2<f64>>;
}

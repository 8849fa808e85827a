// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types shared by the geometry engine and the decomposition pipeline
//!
//! Everything here is plain data: object identities, rays, axis-aligned boxes
//! and polygonal mesh buffers. Coordinates are `f64` throughout.

use crate::{ModelError, Result};
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Type-safe scene object identifier
///
/// Hosts hand out stable ids; the engine never interprets the value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Default)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        ObjectId(id)
    }
}

impl From<ObjectId> for u64 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// Half-line with a unit direction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Create a ray, normalizing `direction`
    ///
    /// A zero direction falls back to looking down -Z.
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        let direction = direction
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(|| -Vector3::z());
        Self { origin, direction }
    }

    /// Point at parameter `t`
    #[inline]
    pub fn at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// Transform the ray by an affine matrix (direction renormalized)
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        let origin = matrix.transform_point(&self.origin);
        let direction = matrix.transform_vector(&self.direction);
        Ray::new(origin, direction)
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing all points, `None` for an empty slice
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Aabb::new(first, first);
        for p in iter {
            bounds.include(p);
        }
        Some(bounds)
    }

    /// Grow the box to include `point`
    #[inline]
    pub fn include(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Full extent per axis (max - min)
    pub fn dimensions(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Box grown by `margin` on every side
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Aabb::new(self.min - m, self.max + m)
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    /// The 8 corners, x varying fastest
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Axis-aligned box around this box's corners after `matrix`
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        let corners = self.corners().map(|c| matrix.transform_point(&c));
        // corners is never empty
        let mut bounds = Aabb::new(corners[0], corners[0]);
        for c in &corners[1..] {
            bounds.include(c);
        }
        bounds
    }
}

/// Hit reported by a mesh in its own local space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalHit {
    /// Hit location in object-local coordinates
    pub location: Point3<f64>,
    /// Face normal in object-local coordinates
    pub normal: Vector3<f64>,
    /// Index of the polygon that was hit
    pub face_index: usize,
    /// Ray parameter of the hit
    pub t: f64,
}

/// Polygonal mesh buffer
///
/// Faces are vertex index loops of three or more entries, wound
/// counter-clockwise when viewed from outside.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<Vec<u32>>,
}

impl MeshData {
    /// Create mesh data, validating face indices
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<Vec<u32>>) -> Result<Self> {
        let mesh = Self { vertices, faces };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Axis-aligned cuboid with outward quads
    pub fn cuboid(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        let h = half_extents;
        let vertices = [
            (-1.0, -1.0, -1.0),
            (1.0, -1.0, -1.0),
            (1.0, 1.0, -1.0),
            (-1.0, 1.0, -1.0),
            (-1.0, -1.0, 1.0),
            (1.0, -1.0, 1.0),
            (1.0, 1.0, 1.0),
            (-1.0, 1.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| center + Vector3::new(x * h.x, y * h.y, z * h.z))
        .collect();
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![1, 2, 6, 5],
            vec![2, 3, 7, 6],
            vec![3, 0, 4, 7],
        ];
        Self { vertices, faces }
    }

    /// Check that every face has at least 3 in-range indices
    pub fn validate(&self) -> Result<()> {
        let count = self.vertices.len();
        for (i, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(ModelError::mesh(format!(
                    "face {} has {} vertices",
                    i,
                    face.len()
                )));
            }
            if let Some(bad) = face.iter().find(|&&v| v as usize >= count) {
                return Err(ModelError::mesh(format!(
                    "face {} references vertex {} of {}",
                    i, bad, count
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Triangles a fan triangulation of every face would produce
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().map(|f| f.len().saturating_sub(2)).sum()
    }

    /// Vertex positions of a face, `None` if the index is out of range
    pub fn face_points(&self, face: usize) -> Option<Vec<Point3<f64>>> {
        let indices = self.faces.get(face)?;
        indices
            .iter()
            .map(|&i| self.vertices.get(i as usize).copied())
            .collect()
    }

    /// Unique undirected edges, each stored with the smaller index first
    pub fn edges(&self) -> Vec<[u32; 2]> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for face in &self.faces {
            for (i, &a) in face.iter().enumerate() {
                let b = face[(i + 1) % face.len()];
                let key = if a < b { [a, b] } else { [b, a] };
                if seen.insert(key) {
                    edges.push(key);
                }
            }
        }
        edges
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices)
    }

    /// Append another mesh, offsetting its indices
    pub fn merge(&mut self, other: &MeshData) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| f.iter().map(|&i| i + offset).collect()),
        );
    }

    /// Copy with every vertex transformed by `matrix`
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> MeshData {
        MeshData {
            vertices: self
                .vertices
                .iter()
                .map(|p| matrix.transform_point(p))
                .collect(),
            faces: self.faces.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId(42).to_string(), "#42");
    }

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, -5.0));
        assert_relative_eq!(ray.direction.norm(), 1.0);
        assert_relative_eq!(ray.at(2.0), Point3::new(0.0, 0.0, -2.0));
    }

    #[test]
    fn test_cuboid_topology() {
        let cube = MeshData::cuboid(Point3::origin(), Vector3::repeat(0.5));
        assert!(cube.validate().is_ok());
        assert_eq!(cube.face_count(), 6);
        assert_eq!(cube.edges().len(), 12);
        assert_eq!(cube.triangle_count(), 12);

        let bounds = cube.bounds().unwrap();
        assert_relative_eq!(bounds.dimensions(), Vector3::repeat(1.0));
        assert_relative_eq!(bounds.center(), Point3::origin());
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let result = MeshData::new(vec![Point3::origin(); 3], vec![vec![0, 1, 5]]);
        assert!(matches!(result, Err(ModelError::InvalidMesh(_))));
    }

    #[test]
    fn test_aabb_transformed() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let shifted = bounds.transformed(&Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0)));
        assert_relative_eq!(shifted.center(), Point3::new(5.0, 0.0, 0.0));
        assert!(shifted.expanded(0.1).contains(&Point3::new(6.05, 0.0, 0.0)));
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = MeshData::cuboid(Point3::origin(), Vector3::repeat(1.0));
        let b = a.clone();
        a.merge(&b);
        assert_eq!(a.vertex_count(), 16);
        assert_eq!(a.faces[6][0], 8);
    }
}

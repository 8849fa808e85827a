// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reference mesh objects and scene
//!
//! [`MeshObject`] implements [`MeshQuery`] on plain [`MeshData`] with its own
//! ray intersection, so the engine can run without a host application.
//! [`MeshScene`] is the matching [`SceneQuery`].

use crate::math::ray_triangle;
use crate::triangulation::{calculate_polygon_normal, triangulate_face};
use cursorbox_model::{LocalHit, MeshData, MeshQuery, ObjectId, Ray, SceneQuery};
use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::FxHashMap;

/// One triangle of a triangulated face
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceTriangle {
    pub face: usize,
    pub indices: [u32; 3],
}

/// Triangulate every face of a mesh, fanning faces earcut rejects
pub fn triangulate_mesh(data: &MeshData) -> Vec<FaceTriangle> {
    let mut triangles = Vec::with_capacity(data.triangle_count());
    for (face, loop_indices) in data.faces.iter().enumerate() {
        let local = match data
            .face_points(face)
            .map(|pts| triangulate_face(&pts))
        {
            Some(Ok(tris)) => tris,
            _ => (1..loop_indices.len().saturating_sub(1))
                .map(|i| [0, i, i + 1])
                .collect(),
        };
        triangles.extend(local.into_iter().map(|[a, b, c]| FaceTriangle {
            face,
            indices: [loop_indices[a], loop_indices[b], loop_indices[c]],
        }));
    }
    triangles
}

/// Mesh object owned by the engine
#[derive(Clone, Debug)]
pub struct MeshObject {
    id: ObjectId,
    name: String,
    data: MeshData,
    transform: Matrix4<f64>,
    triangles: Vec<FaceTriangle>,
}

impl MeshObject {
    pub fn new(id: ObjectId, name: impl Into<String>, data: MeshData) -> Self {
        let triangles = triangulate_mesh(&data);
        Self {
            id,
            name: name.into(),
            data,
            transform: Matrix4::identity(),
            triangles,
        }
    }

    /// Builder-style world transform
    pub fn with_transform(mut self, transform: Matrix4<f64>) -> Self {
        self.transform = transform;
        self
    }

    pub fn set_transform(&mut self, transform: Matrix4<f64>) {
        self.transform = transform;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    pub fn triangles(&self) -> &[FaceTriangle] {
        &self.triangles
    }
}

impl MeshQuery for MeshObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vertices(&self) -> &[Point3<f64>] {
        &self.data.vertices
    }

    fn faces(&self) -> &[Vec<u32>] {
        &self.data.faces
    }

    fn world_transform(&self) -> Matrix4<f64> {
        self.transform
    }

    fn ray_intersect(&self, ray: &Ray) -> Option<LocalHit> {
        let verts = &self.data.vertices;
        let mut closest: Option<(f64, usize)> = None;

        for tri in &self.triangles {
            let [a, b, c] = tri.indices.map(|i| verts[i as usize]);
            if let Some(t) = ray_triangle(ray, &a, &b, &c) {
                if closest.map(|(best, _)| t < best).unwrap_or(true) {
                    closest = Some((t, tri.face));
                }
            }
        }

        let (t, face_index) = closest?;
        let normal = self
            .data
            .face_points(face_index)
            .and_then(|pts| calculate_polygon_normal(&pts))
            .unwrap_or_else(Vector3::z);
        Some(LocalHit {
            location: ray.at(t),
            normal,
            face_index,
            t,
        })
    }
}

/// Faces sharing an edge with each face
///
/// Non-manifold edges link every face that uses them.
pub fn face_adjacency(mesh: &dyn MeshQuery) -> Vec<Vec<usize>> {
    let faces = mesh.faces();
    let mut by_edge: FxHashMap<(u32, u32), Vec<usize>> = FxHashMap::default();
    for (f, face) in faces.iter().enumerate() {
        for (i, &a) in face.iter().enumerate() {
            let b = face[(i + 1) % face.len()];
            let key = if a < b { (a, b) } else { (b, a) };
            by_edge.entry(key).or_default().push(f);
        }
    }

    let mut neighbours = vec![Vec::new(); faces.len()];
    for shared in by_edge.values() {
        for &f in shared {
            for &g in shared {
                if f != g && !neighbours[f].contains(&g) {
                    neighbours[f].push(g);
                }
            }
        }
    }
    neighbours
}

/// In-memory scene of [`MeshObject`]s
#[derive(Debug, Default)]
pub struct MeshScene {
    objects: Vec<MeshObject>,
    next_id: u64,
}

impl MeshScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh, assigning a fresh id
    pub fn add(&mut self, name: impl Into<String>, data: MeshData, transform: Matrix4<f64>) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        self.objects
            .push(MeshObject::new(id, name, data).with_transform(transform));
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<MeshObject> {
        let index = self.objects.iter().position(|o| o.id == id)?;
        Some(self.objects.remove(index))
    }

    pub fn get(&self, id: ObjectId) -> Option<&MeshObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut MeshObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeshObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl SceneQuery for MeshScene {
    fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|o| o.id).collect()
    }

    fn object(&self, id: ObjectId) -> Option<&dyn MeshQuery> {
        self.get(id).map(|o| o as &dyn MeshQuery)
    }
}

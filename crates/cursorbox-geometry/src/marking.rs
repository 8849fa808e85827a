// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Marked faces and points
//!
//! Mutations report which cached visualisations they made stale, so a host
//! can rebuild only the affected overlays.

use cursorbox_model::{ObjectId, SceneQuery};
use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHashSet};

/// Duplicate tolerance of [`MarkingState::add_point_unique`]
pub const POINT_TOLERANCE: f64 = 1e-6;

/// Cached overlay invalidated by a mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Invalidation {
    /// Marked-face overlay of one object
    Object(ObjectId),
    /// Marked-point overlay
    Points,
}

/// Faces and points feeding the bounding-volume computations
///
/// An object appears in the face map only while it has at least one marked
/// face.
#[derive(Clone, Debug, Default)]
pub struct MarkingState {
    faces: FxHashMap<ObjectId, FxHashSet<usize>>,
    points: Vec<Point3<f64>>,
}

impl MarkingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, object: ObjectId, face: usize) -> Vec<Invalidation> {
        if self.faces.entry(object).or_default().insert(face) {
            vec![Invalidation::Object(object)]
        } else {
            Vec::new()
        }
    }

    pub fn unmark(&mut self, object: ObjectId, face: usize) -> Vec<Invalidation> {
        let Some(set) = self.faces.get_mut(&object) else {
            return Vec::new();
        };
        let removed = set.remove(&face);
        if set.is_empty() {
            self.faces.remove(&object);
        }
        if removed {
            vec![Invalidation::Object(object)]
        } else {
            Vec::new()
        }
    }

    /// Toggle a face group
    ///
    /// If `clicked` is already marked the whole group is removed, otherwise
    /// the group is added.
    pub fn mark_group(
        &mut self,
        object: ObjectId,
        clicked: usize,
        group: &FxHashSet<usize>,
    ) -> Vec<Invalidation> {
        if self.is_marked(object, clicked) {
            if let Some(set) = self.faces.get_mut(&object) {
                set.retain(|f| !group.contains(f) && *f != clicked);
                if set.is_empty() {
                    self.faces.remove(&object);
                }
            }
        } else {
            let set = self.faces.entry(object).or_default();
            set.insert(clicked);
            set.extend(group.iter().copied());
        }
        vec![Invalidation::Object(object)]
    }

    pub fn clear_object(&mut self, object: ObjectId) -> Vec<Invalidation> {
        match self.faces.remove(&object) {
            Some(_) => vec![Invalidation::Object(object)],
            None => Vec::new(),
        }
    }

    /// Drop every marked face and point
    pub fn clear_all(&mut self) -> Vec<Invalidation> {
        let mut effects: Vec<_> = self
            .faces
            .drain()
            .map(|(id, _)| Invalidation::Object(id))
            .collect();
        if !self.points.is_empty() {
            self.points.clear();
            effects.push(Invalidation::Points);
        }
        effects
    }

    /// Append a point, duplicates allowed
    pub fn add_point(&mut self, point: Point3<f64>) -> Vec<Invalidation> {
        self.points.push(point);
        vec![Invalidation::Points]
    }

    /// Append a point unless one already lies within [`POINT_TOLERANCE`]
    pub fn add_point_unique(&mut self, point: Point3<f64>) -> Vec<Invalidation> {
        if self
            .points
            .iter()
            .any(|p| (p - point).norm() < POINT_TOLERANCE)
        {
            return Vec::new();
        }
        self.add_point(point)
    }

    pub fn remove_last_point(&mut self) -> Vec<Invalidation> {
        match self.points.pop() {
            Some(_) => vec![Invalidation::Points],
            None => Vec::new(),
        }
    }

    pub fn clear_points(&mut self) -> Vec<Invalidation> {
        if self.points.is_empty() {
            return Vec::new();
        }
        self.points.clear();
        vec![Invalidation::Points]
    }

    /// Forget objects that left the scene and faces past their face count
    pub fn prune_stale(&mut self, scene: &dyn SceneQuery) -> Vec<Invalidation> {
        let mut effects = Vec::new();
        self.faces.retain(|&id, set| {
            let Some(mesh) = scene.object(id) else {
                log::debug!("dropping marks of deleted object {}", id);
                effects.push(Invalidation::Object(id));
                return false;
            };
            let count = mesh.face_count();
            let before = set.len();
            set.retain(|&f| f < count);
            if set.len() != before {
                effects.push(Invalidation::Object(id));
            }
            !set.is_empty()
        });
        effects
    }

    /// World-space vertices of every marked face followed by marked points
    ///
    /// Stale objects and faces are skipped.
    pub fn collect_points(&self, scene: &dyn SceneQuery) -> Vec<Point3<f64>> {
        let mut out = Vec::new();
        let mut ids: Vec<_> = self.faces.keys().copied().collect();
        ids.sort();
        for id in ids {
            let Some(mesh) = scene.object(id) else {
                continue;
            };
            let transform = mesh.world_transform();
            let mut faces: Vec<_> = self.faces[&id].iter().copied().collect();
            faces.sort_unstable();
            for face in faces {
                if let Some(verts) = mesh.vertices_of(face) {
                    out.extend(verts.iter().map(|p| transform.transform_point(p)));
                }
            }
        }
        out.extend_from_slice(&self.points);
        out
    }

    pub fn is_marked(&self, object: ObjectId, face: usize) -> bool {
        self.faces
            .get(&object)
            .is_some_and(|set| set.contains(&face))
    }

    pub fn marked_faces(&self, object: ObjectId) -> Option<&FxHashSet<usize>> {
        self.faces.get(&object)
    }

    pub fn marked_objects(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.faces.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// True when nothing is marked
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshScene;
    use cursorbox_model::MeshData;
    use nalgebra::{Matrix4, Vector3};

    fn scene() -> (MeshScene, ObjectId) {
        let mut scene = MeshScene::new();
        let id = scene.add(
            "Cube",
            MeshData::cuboid(Point3::origin(), Vector3::repeat(1.0)),
            Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)),
        );
        (scene, id)
    }

    #[test]
    fn test_key_exists_only_while_marked() {
        let mut state = MarkingState::new();
        let id = ObjectId(1);
        assert_eq!(state.mark(id, 2), vec![Invalidation::Object(id)]);
        assert!(state.mark(id, 2).is_empty());
        assert_eq!(state.marked_objects(), vec![id]);
        assert_eq!(state.unmark(id, 2), vec![Invalidation::Object(id)]);
        assert!(state.marked_objects().is_empty());
        assert!(state.unmark(id, 2).is_empty());
    }

    #[test]
    fn test_group_toggle() {
        let mut state = MarkingState::new();
        let id = ObjectId(3);
        let group: FxHashSet<usize> = [0, 1, 2].into_iter().collect();
        state.mark(id, 5);
        state.mark_group(id, 0, &group);
        assert_eq!(state.marked_faces(id).unwrap().len(), 4);

        // Clicking a marked face removes its group but keeps the rest
        state.mark_group(id, 1, &group);
        let left: Vec<_> = state.marked_faces(id).unwrap().iter().copied().collect();
        assert_eq!(left, vec![5]);

        state.unmark(id, 5);
        assert!(state.marked_faces(id).is_none());
    }

    #[test]
    fn test_point_lists() {
        let mut state = MarkingState::new();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(state.add_point_unique(p), vec![Invalidation::Points]);
        assert!(state.add_point_unique(p + Vector3::repeat(1e-8)).is_empty());
        state.add_point(p);
        assert_eq!(state.points().len(), 2);
        assert_eq!(state.remove_last_point(), vec![Invalidation::Points]);
        assert_eq!(state.clear_points(), vec![Invalidation::Points]);
        assert!(state.remove_last_point().is_empty());
        assert!(state.clear_points().is_empty());
    }

    #[test]
    fn test_invalidations_are_scoped() {
        let mut state = MarkingState::new();
        state.mark(ObjectId(1), 0);
        state.mark(ObjectId(2), 0);
        assert_eq!(state.clear_object(ObjectId(1)), vec![Invalidation::Object(ObjectId(1))]);
        state.add_point(Point3::origin());
        let mut all = state.clear_all();
        all.sort_by_key(|i| matches!(i, Invalidation::Points));
        assert_eq!(all, vec![Invalidation::Object(ObjectId(2)), Invalidation::Points]);
        assert!(state.is_empty());
    }

    #[test]
    fn test_collect_points_world_space() {
        let (scene, id) = scene();
        let mut state = MarkingState::new();
        state.mark(id, 1);
        state.add_point(Point3::new(0.0, 0.0, 7.0));

        let points = state.collect_points(&scene);
        assert_eq!(points.len(), 5);
        assert!(points[..4].iter().all(|p| p.z == 1.0 && (p.x - 10.0).abs() == 1.0));
        assert_eq!(points[4], Point3::new(0.0, 0.0, 7.0));
    }

    #[test]
    fn test_prune_stale() {
        let (mut scene, id) = scene();
        let mut state = MarkingState::new();
        state.mark(id, 1);
        state.mark(id, 99);
        state.mark(ObjectId(1234), 0);

        let mut effects = state.prune_stale(&scene);
        effects.sort_by_key(|i| match i {
            Invalidation::Object(id) => id.0,
            Invalidation::Points => u64::MAX,
        });
        assert_eq!(effects, vec![Invalidation::Object(id), Invalidation::Object(ObjectId(1234))]);
        assert!(state.is_marked(id, 1));
        assert!(!state.is_marked(id, 99));

        scene.remove(id);
        assert!(state.collect_points(&scene).is_empty());
        state.prune_stale(&scene);
        assert!(state.marked_objects().is_empty());
    }
}

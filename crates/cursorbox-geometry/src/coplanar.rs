// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coplanar face group selection

use crate::math::angle_degrees;
use crate::mesh::face_adjacency;
use cursorbox_model::MeshQuery;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

/// Default angle tolerance in degrees
pub const DEFAULT_COPLANAR_ANGLE: f64 = 5.0;

/// Tolerances reachable with the number keys
pub const ANGLE_PRESETS: [f64; 7] = [5.0, 15.0, 35.0, 45.0, 90.0, 120.0, 180.0];

pub const ANGLE_STEP: f64 = 5.0;
pub const ANGLE_STEP_FINE: f64 = 1.0;

/// Faces reachable from `start_face` through shared edges whose normal stays
/// within `angle_tolerance_degrees` of the start face's normal
///
/// Every candidate is compared against the start face, not its neighbour, so
/// a smooth curved surface stops growing once it has turned far enough.
/// Degenerate faces are never added and never traversed. An out-of-range or
/// degenerate start face yields an empty set.
pub fn grow_coplanar_region(
    mesh: &dyn MeshQuery,
    start_face: usize,
    angle_tolerance_degrees: f64,
) -> FxHashSet<usize> {
    let mut region = FxHashSet::default();
    let Some(reference) = mesh.face_normal(start_face) else {
        return region;
    };

    let adjacency = face_adjacency(mesh);
    let mut queue = VecDeque::from([start_face]);
    region.insert(start_face);

    while let Some(face) = queue.pop_front() {
        for &next in &adjacency[face] {
            if region.contains(&next) {
                continue;
            }
            let Some(normal) = mesh.face_normal(next) else {
                continue;
            };
            if angle_degrees(&reference, &normal) < angle_tolerance_degrees {
                region.insert(next);
                queue.push_back(next);
            }
        }
    }

    region
}

/// Step the tolerance up or down, clamped to `[0, 180]`
pub fn adjust_angle(current: f64, increase: bool, fine: bool) -> f64 {
    let step = if fine { ANGLE_STEP_FINE } else { ANGLE_STEP };
    let next = if increase { current + step } else { current - step };
    next.clamp(0.0, 180.0)
}

/// Preset tolerance for a zero-based key index
pub fn angle_preset(index: usize) -> Option<f64> {
    ANGLE_PRESETS.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshObject;
    use cursorbox_model::{MeshData, ObjectId};
    use nalgebra::{Point3, Vector3};

    fn cube() -> MeshObject {
        MeshObject::new(
            ObjectId(1),
            "Cube",
            MeshData::cuboid(Point3::origin(), Vector3::repeat(1.0)),
        )
    }

    fn triangulated_cube() -> MeshObject {
        let quads = MeshData::cuboid(Point3::origin(), Vector3::repeat(1.0));
        let faces = quads
            .faces
            .iter()
            .flat_map(|q| [vec![q[0], q[1], q[2]], vec![q[0], q[2], q[3]]])
            .collect();
        MeshObject::new(
            ObjectId(2),
            "Tris",
            MeshData {
                vertices: quads.vertices,
                faces,
            },
        )
    }

    #[test]
    fn test_single_face_at_small_tolerance() {
        let region = grow_coplanar_region(&cube(), 0, 5.0);
        assert_eq!(region.len(), 1);
        assert!(region.contains(&0));
    }

    #[test]
    fn test_triangle_pair_forms_a_side() {
        let region = grow_coplanar_region(&triangulated_cube(), 4, 5.0);
        assert_eq!(region.len(), 2);
        assert!(region.contains(&4) && region.contains(&5));
    }

    #[test]
    fn test_wide_tolerance_skips_opposite_face() {
        // Sides are 90° from the start, the opposite face 180°
        let region = grow_coplanar_region(&cube(), 0, 95.0);
        assert_eq!(region.len(), 5);
        assert!(!region.contains(&1));
    }

    #[test]
    fn test_full_tolerance_takes_everything() {
        let region = grow_coplanar_region(&cube(), 0, 180.5);
        assert_eq!(region.len(), 6);
    }

    #[test]
    fn test_bad_start_face() {
        assert!(grow_coplanar_region(&cube(), 42, 180.0).is_empty());
    }

    #[test]
    fn test_angle_adjustment() {
        assert_eq!(adjust_angle(5.0, true, false), 10.0);
        assert_eq!(adjust_angle(5.0, true, true), 6.0);
        assert_eq!(adjust_angle(2.0, false, false), 0.0);
        assert_eq!(adjust_angle(178.0, true, false), 180.0);
        assert_eq!(angle_preset(3), Some(45.0));
        assert_eq!(angle_preset(7), None);
    }
}

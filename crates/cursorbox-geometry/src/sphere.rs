// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame-oriented bounding sphere
//!
//! The center is the midpoint of the frame-local bounding box and the radius
//! the largest distance from it. That is not the minimal enclosing sphere,
//! but it always contains every input point.

use crate::{Error, Result};
use cursorbox_model::{MeshData, ReferenceFrame};
use nalgebra::{Point3, Rotation3, Vector3};

/// Smallest radius produced
pub const MIN_SPHERE_RADIUS: f64 = 0.05;

/// Default longitude segments of the generated mesh
pub const DEFAULT_SEGMENTS: u32 = 32;

/// Default latitude rings of the generated mesh
pub const DEFAULT_RINGS: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    /// World-space center
    pub center: Point3<f64>,
    pub radius: f64,
    /// Frame rotation, orients the generated mesh's poles
    pub rotation: Rotation3<f64>,
}

impl BoundingSphere {
    pub fn contains(&self, point: &Point3<f64>, tol: f64) -> bool {
        (point - self.center).norm() <= self.radius + tol
    }

    /// Sphere mesh of `segments` × `rings`, placed and oriented in world space
    pub fn to_mesh(&self, segments: u32, rings: u32) -> MeshData {
        let mut mesh = uv_sphere(segments, rings);
        for v in &mut mesh.vertices {
            *v = self.center + self.rotation * (v.coords * self.radius);
        }
        mesh
    }
}

/// Bound `points` with a sphere centered in `frame`
///
/// # Arguments
/// * `points` - World-space points
/// * `frame` - Orientation used for the local bounding box and mesh poles
/// * `push` - Signed radius offset; the result never drops below
///   [`MIN_SPHERE_RADIUS`]
pub fn compute_oriented_sphere(
    points: &[Point3<f64>],
    frame: &ReferenceFrame,
    push: f64,
) -> Result<BoundingSphere> {
    let local: Vec<Point3<f64>> = points.iter().map(|p| frame.to_local(p)).collect();
    let first = *local.first().ok_or(Error::EmptyInput)?;
    let (min, max) = local
        .iter()
        .fold((first, first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
    let local_center = nalgebra::center(&min, &max);

    let radius = local
        .iter()
        .map(|p| (p - local_center).norm())
        .fold(0.0f64, f64::max)
        .max(MIN_SPHERE_RADIUS);
    let pushed = (radius + push).max(MIN_SPHERE_RADIUS);
    if pushed > radius + push {
        log::warn!(
            "sphere push {:.4} would collapse radius {:.4}, clamped to {:.4}",
            push,
            radius,
            pushed
        );
    }

    Ok(BoundingSphere {
        center: frame.to_world(&local_center),
        radius: pushed,
        rotation: *frame.rotation(),
    })
}

/// Unit UV sphere centered at the origin with poles on ±Z
///
/// `segments` around the equator (min 3), `rings` from pole to pole (min 2).
/// Pole caps are triangles, the rest quads, all wound outward.
pub fn uv_sphere(segments: u32, rings: u32) -> MeshData {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut vertices = Vec::with_capacity((segments * (rings - 1) + 2) as usize);
    vertices.push(Point3::new(0.0, 0.0, 1.0));
    for ring in 1..rings {
        let theta = std::f64::consts::PI * ring as f64 / rings as f64;
        let (sin_t, cos_t) = theta.sin_cos();
        for seg in 0..segments {
            let phi = std::f64::consts::TAU * seg as f64 / segments as f64;
            let (sin_p, cos_p) = phi.sin_cos();
            vertices.push(Point3::from(Vector3::new(sin_t * cos_p, sin_t * sin_p, cos_t)));
        }
    }
    let bottom = vertices.len() as u32;
    vertices.push(Point3::new(0.0, 0.0, -1.0));

    let ring_start = |ring: u32| 1 + (ring - 1) * segments;
    let mut faces = Vec::with_capacity((segments * rings) as usize);

    for seg in 0..segments {
        let next = (seg + 1) % segments;
        faces.push(vec![0, ring_start(1) + seg, ring_start(1) + next]);
    }
    for ring in 1..rings - 1 {
        let (upper, lower) = (ring_start(ring), ring_start(ring + 1));
        for seg in 0..segments {
            let next = (seg + 1) % segments;
            faces.push(vec![upper + seg, lower + seg, lower + next, upper + next]);
        }
    }
    let last = ring_start(rings - 1);
    for seg in 0..segments {
        let next = (seg + 1) % segments;
        faces.push(vec![bottom, last + next, last + seg]);
    }

    MeshData { vertices, faces }
}

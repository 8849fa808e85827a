// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wavefront OBJ exchange with decomposition tools
//!
//! Only positions, faces and object groups are read or written. Files are
//! Y-up with -Z forward; the scene is Z-up.

use crate::{Error, Result};
use cursorbox_geometry::triangulation::triangulate_face;
use cursorbox_model::{MeshData, MeshQuery};
use nalgebra::Point3;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    character::complete::{char, digit1, space0, space1},
    combinator::{opt, recognize},
    multi::separated_list1,
    number::complete::recognize_float,
    sequence::preceded,
    IResult, Parser,
};
use rustc_hash::FxHashMap;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Object read from an OBJ file, with object-local vertex indices
#[derive(Clone, Debug, PartialEq)]
pub struct ObjObject {
    pub name: String,
    pub mesh: MeshData,
}

/// Scene Z-up to file Y-up
#[inline]
pub fn to_y_up(p: &Point3<f64>) -> Point3<f64> {
    Point3::new(p.x, p.z, -p.y)
}

/// File Y-up to scene Z-up
#[inline]
pub fn from_y_up(p: &Point3<f64>) -> Point3<f64> {
    Point3::new(p.x, -p.z, p.y)
}

// ============================================================================
// Parsing Primitives
// ============================================================================

/// Parse a decimal number with optional exponent
fn float(input: &str) -> IResult<&str, f64> {
    let (rest, text) = recognize_float(input)?;
    let text = text.strip_prefix('+').unwrap_or(text);
    let value: f64 = lexical_core::parse(text.as_bytes()).map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
    })?;
    Ok((rest, value))
}

/// Parse `x y z`, ignoring anything after the third coordinate
fn vertex(input: &str) -> IResult<&str, Point3<f64>> {
    let (input, (x, y, z)) = (
        preceded(space0, float),
        preceded(space1, float),
        preceded(space1, float),
    )
        .parse(input)?;
    Ok((input, Point3::new(x, y, z)))
}

/// Parse one face corner (`7`, `-2`, `7/1`, `7//3`), keeping the position index
fn face_corner(input: &str) -> IResult<&str, i64> {
    let (input, digits) = recognize((opt(char('-')), digit1)).parse(input)?;
    let (input, _) = opt(preceded(
        char('/'),
        take_till(|c: char| c == ' ' || c == '\t'),
    ))
    .parse(input)?;
    let index: i64 = lexical_core::parse(digits.as_bytes()).map_err(|_| {
        nom::Err::Error(nom::error::Error::new(digits, nom::error::ErrorKind::Digit))
    })?;
    Ok((input, index))
}

fn face(input: &str) -> IResult<&str, Vec<i64>> {
    preceded(space0, separated_list1(space1, face_corner)).parse(input)
}

/// Line keyword and the text after it
fn keyword(input: &str) -> IResult<&str, &str> {
    alt((tag("v"), tag("f"), tag("o"), tag("g"))).parse(input)
}

// ============================================================================
// Reader
// ============================================================================

struct PendingObject {
    name: String,
    faces: Vec<Vec<usize>>,
}

impl PendingObject {
    fn named(name: &str) -> Self {
        let name = name.trim();
        Self {
            name: if name.is_empty() { "Object".to_string() } else { name.to_string() },
            faces: Vec::new(),
        }
    }

    /// Remap global vertex indices to a compact object-local list
    fn finish(self, positions: &[Point3<f64>]) -> ObjObject {
        let mut remap: FxHashMap<usize, u32> = FxHashMap::default();
        let mut vertices = Vec::new();
        let faces = self
            .faces
            .iter()
            .map(|face| {
                face.iter()
                    .map(|&global| {
                        *remap.entry(global).or_insert_with(|| {
                            vertices.push(positions[global]);
                            (vertices.len() - 1) as u32
                        })
                    })
                    .collect()
            })
            .collect();
        ObjObject {
            name: self.name,
            mesh: MeshData { vertices, faces },
        }
    }
}

/// Parse OBJ text into its objects
///
/// Faces before the first `o`/`g` line belong to an object named `Object`.
/// Objects without faces are dropped. Negative indices count back from the
/// latest vertex.
pub fn parse_obj(content: &str) -> Result<Vec<ObjObject>> {
    let mut positions: Vec<Point3<f64>> = Vec::new();
    let mut objects = Vec::new();
    let mut current = PendingObject::named("");

    let bytes = content.as_bytes();
    let mut start = 0;
    let mut line_no = 0;
    let ends = memchr::memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for end in ends {
        line_no += 1;
        let line = content[start..end].trim_end_matches('\r').trim_start();
        start = (end + 1).min(bytes.len());

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Ok((rest, key)) = keyword(line) else {
            continue;
        };
        // "vn", "vt", "fo" and friends share a prefix with the keywords
        if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
            continue;
        }

        match key {
            "v" => {
                let (_, p) = vertex(rest).map_err(|_| Error::obj(line_no, "bad vertex"))?;
                positions.push(p);
            }
            "f" => {
                let (_, corners) = face(rest).map_err(|_| Error::obj(line_no, "bad face"))?;
                let count = positions.len() as i64;
                let indices = corners
                    .into_iter()
                    .map(|i| {
                        let resolved = match i {
                            i if i > 0 => i - 1,
                            i if i < 0 => count + i,
                            _ => -1,
                        };
                        if (0..count).contains(&resolved) {
                            Ok(resolved as usize)
                        } else {
                            Err(Error::obj(line_no, format!("vertex index {} out of range", i)))
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                if indices.len() >= 3 {
                    current.faces.push(indices);
                }
            }
            _ => {
                let next = PendingObject::named(rest);
                let done = std::mem::replace(&mut current, next);
                if !done.faces.is_empty() {
                    objects.push(done.finish(&positions));
                }
            }
        }
    }

    if !current.faces.is_empty() {
        objects.push(current.finish(&positions));
    }
    Ok(objects)
}

/// Read an OBJ file as written by a decomposition tool, converted to Z-up
pub fn read_obj(path: &Path) -> Result<Vec<ObjObject>> {
    let content = std::fs::read_to_string(path)?;
    let mut objects = parse_obj(&content)?;
    for object in &mut objects {
        for v in &mut object.mesh.vertices {
            *v = from_y_up(v);
        }
    }
    Ok(objects)
}

// ============================================================================
// Writer
// ============================================================================

/// Write meshes as named OBJ objects, positions and faces only
pub fn write_obj<W: Write>(out: W, objects: &[(&str, &MeshData)]) -> Result<()> {
    let mut out = BufWriter::new(out);
    writeln!(out, "# cursorbox")?;
    let mut offset = 1usize;
    for (name, mesh) in objects {
        writeln!(out, "o {}", name)?;
        for v in &mesh.vertices {
            writeln!(out, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
        }
        for face in &mesh.faces {
            write!(out, "f")?;
            for &i in face {
                write!(out, " {}", i as usize + offset)?;
            }
            writeln!(out)?;
        }
        offset += mesh.vertices.len();
    }
    out.flush()?;
    Ok(())
}

/// Export a scene mesh for a decomposition tool
///
/// World space, every face triangulated, converted to Y-up at scale 1.
/// Faces that cannot be triangulated are skipped with a warning.
pub fn export_mesh_obj(mesh: &dyn MeshQuery, path: &Path) -> Result<()> {
    let transform = mesh.world_transform();
    let world: Vec<Point3<f64>> = mesh
        .vertices()
        .iter()
        .map(|p| transform.transform_point(p))
        .collect();

    let mut faces: Vec<Vec<u32>> = Vec::with_capacity(mesh.face_count() * 2);
    for (index, face) in mesh.faces().iter().enumerate() {
        let Some(points) = face
            .iter()
            .map(|&i| world.get(i as usize).copied())
            .collect::<Option<Vec<_>>>()
        else {
            log::warn!("{}: face {} references a missing vertex", mesh.name(), index);
            continue;
        };
        match triangulate_face(&points) {
            Ok(tris) => faces.extend(tris.into_iter().map(|t| t.iter().map(|&k| face[k]).collect())),
            Err(e) => log::warn!("{}: skipping face {}: {}", mesh.name(), index, e),
        }
    }
    if faces.is_empty() {
        return Err(Error::EmptyMesh(mesh.name().to_string()));
    }

    let data = MeshData {
        vertices: world.iter().map(to_y_up).collect(),
        faces,
    };
    let file = std::fs::File::create(path)?;
    write_obj(file, &[(mesh.name(), &data)])
}

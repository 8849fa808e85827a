// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! cursorbox-model - Shared types and host traits for oriented bounding volumes
//!
//! This crate holds the data every other cursorbox crate agrees on, plus the
//! traits a host application implements to expose its scene.
//!
//! # Architecture
//!
//! - [`ReferenceFrame`] - cursor pose with lossless rotation conversions
//! - [`MeshData`], [`Aabb`], [`Ray`] - plain geometry buffers
//! - [`MeshQuery`] - read access to one mesh object
//! - [`SceneQuery`] - lookup of live objects by [`ObjectId`]
//! - [`Viewport`] - world to screen projection for snapping
//!
//! # Example
//!
//! ```ignore
//! use cursorbox_model::{ReferenceFrame, SceneQuery};
//!
//! let frame = ReferenceFrame::from_euler_xyz(origin, 0.0, 0.0, 0.5);
//! for id in scene.object_ids() {
//!     if let Some(mesh) = scene.object(id) {
//!         println!("{} has {} faces", mesh.name(), mesh.face_count());
//!     }
//! }
//! ```

pub mod error;
pub mod frame;
pub mod traits;
pub mod types;

// Re-export all public types
pub use error::*;
pub use frame::*;
pub use traits::*;
pub use types::*;

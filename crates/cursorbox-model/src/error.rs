// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for shared model operations

use crate::ObjectId;
use thiserror::Error;

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while building frames or validating mesh data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Frame axes or rotation could not be made orthonormal and right-handed
    #[error("Invalid reference frame: {0}")]
    InvalidFrame(String),

    /// Mesh data references missing vertices or has malformed faces
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Face index outside the object's face range
    #[error("Face {face} out of range for object {object} ({count} faces)")]
    FaceOutOfRange {
        object: ObjectId,
        face: usize,
        count: usize,
    },
}

impl ModelError {
    /// Create an invalid frame error
    pub fn frame(msg: impl Into<String>) -> Self {
        ModelError::InvalidFrame(msg.into())
    }

    /// Create an invalid mesh error
    pub fn mesh(msg: impl Into<String>) -> Self {
        ModelError::InvalidMesh(msg.into())
    }
}

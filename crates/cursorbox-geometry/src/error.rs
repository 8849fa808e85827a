// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for bounding-volume and picking operations

use cursorbox_model::ModelError;
use thiserror::Error;

/// Geometry result type
pub type Result<T> = std::result::Result<T, Error>;

/// Geometry errors
///
/// A raycast miss is never an error; it is `None`. These variants cover
/// inputs the engine refuses to turn into geometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No points to bound
    #[error("No input points")]
    EmptyInput,

    /// Collinear, coplanar or otherwise zero-volume input
    #[error("Degenerate geometry: {0}")]
    Degenerate(String),

    /// Triangulation error
    #[error("Triangulation error: {0}")]
    Triangulation(String),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// Error from shared model types
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl Error {
    /// Create a degenerate geometry error
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Error::Degenerate(msg.into())
    }

    /// Create a triangulation error
    pub fn triangulation(msg: impl Into<String>) -> Self {
        Error::Triangulation(msg.into())
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for decomposition jobs

use std::path::PathBuf;
use thiserror::Error;

/// Decomposition result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing or importing a decomposition
///
/// A tool that runs and fails is not an error here; it is reported as a
/// failed [`crate::JobOutcome`].
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed OBJ content
    #[error("OBJ parse error at line {line}: {message}")]
    Obj { line: usize, message: String },

    /// Mesh has nothing to export
    #[error("Mesh '{0}' has no faces to export")]
    EmptyMesh(String),

    /// Configured executable does not exist
    #[error("Executable not found: {}", .0.display())]
    ToolNotFound(PathBuf),

    /// Process could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Host refused the imported result
    #[error("Import error: {0}")]
    Import(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Geometry(#[from] cursorbox_geometry::Error),
}

impl Error {
    /// Create an OBJ parse error
    pub fn obj(line: usize, msg: impl Into<String>) -> Self {
        Error::Obj {
            line,
            message: msg.into(),
        }
    }

    /// Create an import error
    pub fn import(msg: impl Into<String>) -> Self {
        Error::Import(msg.into())
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CursorBox Decompose - convex decomposition through external tools
//!
//! Runs V-HACD, CoACD or the scripted CoACD-U on a scene mesh without
//! blocking the host, then imports the resulting hulls as new objects.
//!
//! # Features
//!
//! - **OBJ exchange** with a `nom` reader and Y-up/Z-up axis conversion
//! - **Tool backends** with ten detail presets each
//! - **Merged tool output** read in the background into a `crossbeam-channel` queue
//! - **Textual progress** parsed from tool output
//! - **Result import** through the [`SceneHost`] trait
//!
//! # Example
//!
//! ```ignore
//! use cursorbox_decompose::{Coacd, CoacdParams, DetailPreset, JobManager};
//!
//! let backend = Coacd::new("/opt/coacd/main", CoacdParams::preset(DetailPreset::D03));
//! let mut manager = JobManager::new();
//! manager.launch(&backend, mesh)?;
//!
//! // In the host's main loop
//! let report = manager.tick(&mut host);
//! for line in &report.progress {
//!     println!("{}", line);
//! }
//! ```

mod error;
mod import;
mod job;
mod manager;
pub mod obj;
pub mod progress;
mod tools;

pub use error::{Error, Result};
pub use import::{
    hull_name, import_results, MemoryScene, SceneHost, SelectionState, DEFAULT_COLLECTION,
};
pub use job::JobSpec;
pub use manager::{
    FailureKind, JobHandle, JobManager, JobOutcome, TickReport, INPUT_FILE_NAME,
    MAX_DEFERRED_TICKS, TICK_INTERVAL,
};
pub use obj::{export_mesh_obj, parse_obj, read_obj, write_obj, ObjObject};
pub use tools::{
    ApproximateMode, Coacd, CoacdParams, CoacdScript, CoacdScriptParams, DecompositionBackend,
    DetailPreset, FillMode, LaunchPlan, PreprocessMode, Vhacd, VhacdParams, COACD_U_PARAMS_NAME,
    COACD_U_SCRIPT, COACD_U_SCRIPT_NAME,
};

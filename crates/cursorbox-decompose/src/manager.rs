// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Non-blocking decomposition job manager
//!
//! The host calls [`JobManager::tick`] from its main loop, every
//! [`TICK_INTERVAL`] while [`TickReport::next_tick`] is `Some`. Each tick
//! drains tool output, renders progress lines and finalises exited jobs by
//! importing their results. Nothing here blocks on a subprocess.

use crate::import::{import_results, SceneHost, DEFAULT_COLLECTION};
use crate::job::{DecompositionJob, JobSpec, JobState};
use crate::obj::export_mesh_obj;
use crate::tools::DecompositionBackend;
use crate::Result;
use cursorbox_model::{MeshQuery, ObjectId};
use std::fmt;
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

/// Delay between ticks while jobs are running
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Ticks an exited job may wait for its output reader
pub const MAX_DEFERRED_TICKS: u32 = 20;

/// Name of the exported mesh inside a job's working directory
pub const INPUT_FILE_NAME: &str = "input.obj";

const REDRAW_EVERY_TICKS: u64 = 10;

/// Identifies a submitted job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u64);

/// Why a job produced nothing
#[derive(Clone, Debug, PartialEq)]
pub enum FailureKind {
    /// Non-zero exit; `code` is `None` for signals or a lost process
    Exit { code: Option<i32>, tail: String },
    /// Clean exit without a result file
    MissingOutput,
    /// Result file could not be imported
    Import(String),
}

/// Result of a finished job
#[derive(Clone, Debug, PartialEq)]
pub enum JobOutcome {
    Succeeded {
        handle: JobHandle,
        tool_name: String,
        source: ObjectId,
        source_name: String,
        /// Created objects, in import order
        objects: Vec<ObjectId>,
        elapsed_secs: f64,
    },
    Failed {
        handle: JobHandle,
        tool_name: String,
        source: ObjectId,
        source_name: String,
        kind: FailureKind,
        elapsed_secs: f64,
    },
}

impl JobOutcome {
    pub fn handle(&self) -> JobHandle {
        match self {
            JobOutcome::Succeeded { handle, .. } | JobOutcome::Failed { handle, .. } => *handle,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Succeeded {
                tool_name,
                source_name,
                objects,
                elapsed_secs,
                ..
            } => write!(
                f,
                "[{}] Created {} hull(s) for '{}' ({:.1}s)",
                tool_name,
                objects.len(),
                source_name,
                elapsed_secs
            ),
            JobOutcome::Failed {
                tool_name,
                source_name,
                kind,
                elapsed_secs,
                ..
            } => match kind {
                FailureKind::Exit { code, tail } => {
                    let code = code.map_or_else(|| "?".to_string(), |c| c.to_string());
                    write!(
                        f,
                        "[{}] FAILED on '{}' (exit {}, {:.1}s):\n{}",
                        tool_name, source_name, code, elapsed_secs, tail
                    )
                }
                FailureKind::MissingOutput => write!(
                    f,
                    "[{}] No output file for '{}' ({:.1}s)",
                    tool_name, source_name, elapsed_secs
                ),
                FailureKind::Import(message) => write!(
                    f,
                    "[{}] Import error for '{}': {}",
                    tool_name, source_name, message
                ),
            },
        }
    }
}

/// What one tick observed
#[derive(Debug, Default)]
pub struct TickReport {
    /// One line per running job
    pub progress: Vec<String>,
    /// Jobs finalised during this tick
    pub outcomes: Vec<JobOutcome>,
    /// The host should repaint its views
    pub redraw: bool,
    /// When to tick again; `None` once no jobs remain
    pub next_tick: Option<Duration>,
}

/// Registry of running decomposition jobs
///
/// Owned by one thread; only each job's output reader runs elsewhere.
/// Dropping the manager cancels every job.
#[derive(Debug)]
pub struct JobManager {
    jobs: Vec<(JobHandle, DecompositionJob)>,
    next_handle: u64,
    tick_count: u64,
    collection: String,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    pub fn new() -> Self {
        Self::with_collection(DEFAULT_COLLECTION)
    }

    /// Put imported objects into `collection` instead of the default
    pub fn with_collection(collection: impl Into<String>) -> Self {
        Self {
            jobs: Vec::new(),
            next_handle: 0,
            tick_count: 0,
            collection: collection.into(),
        }
    }

    /// Start a prepared job
    pub fn submit(&mut self, spec: JobSpec) -> Result<JobHandle> {
        let job = DecompositionJob::spawn(spec)?;
        log::info!("[{}] Started processing '{}'", job.tool_name, job.source_name);
        self.next_handle += 1;
        let handle = JobHandle(self.next_handle);
        self.jobs.push((handle, job));
        Ok(handle)
    }

    /// Export `mesh` and run `backend` on it
    pub fn launch(
        &mut self,
        backend: &dyn DecompositionBackend,
        mesh: &dyn MeshQuery,
    ) -> Result<JobHandle> {
        backend.check()?;
        let dir = tempfile::Builder::new()
            .prefix(backend.temp_prefix())
            .tempdir()?;
        let input = dir.path().join(INPUT_FILE_NAME);
        export_mesh_obj(mesh, &input)?;
        let plan = backend.prepare(dir.path(), &input)?;

        self.submit(JobSpec {
            program: plan.program,
            args: plan.args,
            working_dir: dir,
            expected_output: plan.expected_output,
            source: mesh.id(),
            source_name: mesh.name().to_string(),
            tool_tag: backend.tool_tag().to_string(),
            tool_name: backend.tool_name().to_string(),
        })
    }

    /// Poll every job once, finalising the ones that exited
    pub fn tick(&mut self, host: &mut dyn SceneHost) -> TickReport {
        self.tick_count += 1;
        let mut report = TickReport::default();
        if self.jobs.is_empty() {
            return report;
        }

        let mut running = Vec::with_capacity(self.jobs.len());
        for (handle, mut job) in std::mem::take(&mut self.jobs) {
            match job.poll(MAX_DEFERRED_TICKS) {
                JobState::Running | JobState::Draining => {
                    report.progress.push(job.progress_line());
                    running.push((handle, job));
                }
                JobState::Exited(status) => {
                    report.outcomes.push(self.finalize(handle, job, status, host));
                }
            }
        }
        self.jobs = running;

        let created: usize = report
            .outcomes
            .iter()
            .map(|o| match o {
                JobOutcome::Succeeded { objects, .. } => objects.len(),
                JobOutcome::Failed { .. } => 0,
            })
            .sum();
        if self.jobs.is_empty() && created > 0 {
            log::info!("Decomposition complete: {} hull(s) created", created);
        }

        report.redraw =
            !report.outcomes.is_empty() || self.tick_count % REDRAW_EVERY_TICKS == 0;
        report.next_tick = (!self.jobs.is_empty()).then_some(TICK_INTERVAL);
        report
    }

    fn finalize(
        &self,
        handle: JobHandle,
        mut job: DecompositionJob,
        status: Option<ExitStatus>,
        host: &mut dyn SceneHost,
    ) -> JobOutcome {
        let elapsed_secs = job.elapsed_secs();
        let result = match status {
            Some(s) if s.success() => {
                if job.expected_output.is_file() {
                    import_results(
                        host,
                        &job.expected_output,
                        &job.source_name,
                        &job.tool_tag,
                        &self.collection,
                    )
                    .map_err(|e| FailureKind::Import(e.to_string()))
                } else {
                    Err(FailureKind::MissingOutput)
                }
            }
            _ => Err(FailureKind::Exit {
                code: status.and_then(|s| s.code()),
                tail: job.tail(),
            }),
        };
        job.cleanup();

        let outcome = match result {
            Ok(objects) => JobOutcome::Succeeded {
                handle,
                tool_name: job.tool_name.clone(),
                source: job.source,
                source_name: job.source_name.clone(),
                objects,
                elapsed_secs,
            },
            Err(kind) => JobOutcome::Failed {
                handle,
                tool_name: job.tool_name.clone(),
                source: job.source,
                source_name: job.source_name.clone(),
                kind,
                elapsed_secs,
            },
        };
        if outcome.is_success() {
            log::info!("{}", outcome);
        } else {
            log::warn!("{}", outcome);
        }
        outcome
    }

    /// Kill every job and remove its working directory
    pub fn cancel_all(&mut self) {
        if self.jobs.is_empty() {
            return;
        }
        for (_, mut job) in self.jobs.drain(..) {
            job.kill();
            job.cleanup();
        }
        log::info!("All decomposition jobs cancelled");
    }

    pub fn is_busy(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// One short line per running job, for status panels
    pub fn status_lines(&self) -> Vec<String> {
        self.jobs
            .iter()
            .map(|(_, job)| format!("{}: processing '{}'\u{2026}", job.tool_name, job.source_name))
            .collect()
    }

    /// Working directory of a running job
    pub fn working_dir(&self, handle: JobHandle) -> Option<&Path> {
        self.jobs
            .iter()
            .find(|(h, _)| *h == handle)
            .and_then(|(_, job)| job.working_dir())
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

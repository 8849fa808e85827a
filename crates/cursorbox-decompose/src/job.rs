// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A running decomposition subprocess
//!
//! stdout and stderr share one pipe, so lines arrive in the order the tool
//! wrote them. A background thread reads the pipe and only pushes trimmed
//! lines into the job's channel; everything else happens on the thread that
//! owns the job.

use crate::progress::{failure_tail, parse_percent, render_progress_line};
use crate::{Error, Result};
use crossbeam_channel::{Receiver, Sender};
use cursorbox_model::ObjectId;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::Instant;
use tempfile::TempDir;

/// Output lines kept per job
const OUTPUT_BUFFER_LINES: usize = 256;

/// Keeps console tools from opening a window
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Everything needed to start one decomposition process
#[derive(Debug)]
pub struct JobSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Removed when the job finishes or is cancelled
    pub working_dir: TempDir,
    pub expected_output: PathBuf,
    pub source: ObjectId,
    pub source_name: String,
    /// Prefix for created object names
    pub tool_tag: String,
    /// Display name
    pub tool_name: String,
}

/// State of a job after polling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JobState {
    Running,
    /// Exited, but the reader is still draining the pipe
    Draining,
    /// Finished; `None` when the exit status could not be read
    Exited(Option<ExitStatus>),
}

#[derive(Debug)]
pub(crate) struct DecompositionJob {
    pub source: ObjectId,
    pub source_name: String,
    pub tool_tag: String,
    pub tool_name: String,
    pub expected_output: PathBuf,
    working_dir: Option<TempDir>,
    child: Child,
    lines: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
    output: VecDeque<String>,
    percent: Option<f64>,
    last_status: String,
    tick: u64,
    deferred_ticks: u32,
    started: Instant,
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, tx: Sender<String>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    // Carriage returns separate in-place progress updates
                    let text = String::from_utf8_lossy(&buf);
                    for line in text.split('\r').map(str::trim).filter(|l| !l.is_empty()) {
                        if tx.send(line.to_string()).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    })
}

impl DecompositionJob {
    /// Start the process in its working directory
    pub fn spawn(spec: JobSpec) -> Result<Self> {
        let (pipe, writer) = std::io::pipe()?;
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(spec.working_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer.try_clone()?))
            .stderr(Stdio::from(writer));
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }
        let child = command.spawn().map_err(|source| Error::Spawn {
            program: spec.program.display().to_string(),
            source,
        })?;
        // The command holds our copies of the write end; the reader only
        // sees EOF once they are closed
        drop(command);

        let (tx, rx) = crossbeam_channel::unbounded();
        let readers = vec![spawn_reader(pipe, tx)];

        Ok(Self {
            source: spec.source,
            source_name: spec.source_name,
            tool_tag: spec.tool_tag,
            tool_name: spec.tool_name,
            expected_output: spec.expected_output,
            working_dir: Some(spec.working_dir),
            child,
            lines: rx,
            readers,
            output: VecDeque::with_capacity(OUTPUT_BUFFER_LINES),
            percent: None,
            last_status: String::new(),
            tick: 0,
            deferred_ticks: 0,
            started: Instant::now(),
        })
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_ref().map(TempDir::path)
    }

    /// Move queued lines into the output buffer, updating progress and status
    pub fn drain(&mut self) {
        while let Ok(line) = self.lines.try_recv() {
            if let Some(p) = parse_percent(&line) {
                self.percent = Some(p);
            }
            if self.output.len() == OUTPUT_BUFFER_LINES {
                self.output.pop_front();
            }
            self.last_status.clone_from(&line);
            self.output.push_back(line);
        }
    }

    fn readers_done(&self) -> bool {
        self.readers.iter().all(JoinHandle::is_finished)
    }

    /// Advance one tick: drain output and check for exit
    ///
    /// An exited process whose readers are still busy is reported as
    /// [`JobState::Draining`] for at most `max_deferred` ticks.
    pub fn poll(&mut self, max_deferred: u32) -> JobState {
        self.tick += 1;
        self.drain();
        match self.child.try_wait() {
            Ok(None) => JobState::Running,
            Ok(Some(status)) => {
                if !self.readers_done() && self.deferred_ticks < max_deferred {
                    self.deferred_ticks += 1;
                    return JobState::Draining;
                }
                self.finish_readers();
                JobState::Exited(Some(status))
            }
            Err(e) => {
                log::warn!("[{}] lost track of process: {}", self.tool_name, e);
                self.kill();
                self.finish_readers();
                JobState::Exited(None)
            }
        }
    }

    /// Join finished readers and take their last lines
    fn finish_readers(&mut self) {
        let (done, pending): (Vec<_>, Vec<_>) =
            self.readers.drain(..).partition(JoinHandle::is_finished);
        for handle in done {
            let _ = handle.join();
        }
        // Still blocked on a pipe held open by a grandchild; let it go
        drop(pending);
        self.drain();
    }

    pub fn progress_line(&self) -> String {
        render_progress_line(
            &self.tool_name,
            &self.source_name,
            self.percent,
            self.tick,
            self.elapsed_secs(),
            &self.last_status,
        )
    }

    pub fn percent(&self) -> Option<f64> {
        self.percent
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Last lines of output for failure reports
    pub fn tail(&self) -> String {
        let lines: Vec<&str> = self.output.iter().map(String::as_str).collect();
        failure_tail(&lines)
    }

    /// Kill and reap the process
    pub fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("[{}] kill: {}", self.tool_name, e);
        }
        let _ = self.child.wait();
    }

    /// Remove the working directory
    pub fn cleanup(&mut self) {
        if let Some(dir) = self.working_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

impl Drop for DecompositionJob {
    fn drop(&mut self) {
        if self.working_dir.is_some() {
            self.kill();
            self.cleanup();
        }
    }
}

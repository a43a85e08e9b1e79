pub mod process;
pub mod python;
pub mod shim;

use crate::error::ExecutionError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use python::PythonRunner;

/// One script to execute and where its captured artifacts go.
#[derive(Debug, Clone)]
pub struct ExecJob<'a> {
    pub source: &'a Path,
    pub artifact_dir: &'a Path,
    /// Prepended to each persisted `figure_<n>.png` so names stay unique
    /// across files of one session.
    pub artifact_prefix: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub error: Option<ExecutionError>,
    /// Persisted artifact paths, in figure order.
    pub artifacts: Vec<PathBuf>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeDiag {
    pub python_exe: String,
    pub python_version: Option<String>,
    pub matplotlib_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

pub trait Executor {
    fn doctor(&self) -> Result<RuntimeDiag>;
    /// Never fails: every failure is reported through [`ExecOutcome::error`].
    fn execute(&self, job: &ExecJob<'_>) -> ExecOutcome;
}

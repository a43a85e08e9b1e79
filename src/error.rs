use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A submitted file could not be turned into text. Fatal for that file only.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported format '{ext}': {path}")]
    Unsupported { path: PathBuf, ext: String },
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8 text")]
    Encoding { path: PathBuf },
    #[error("invalid notebook {path}: {reason}")]
    InvalidNotebook { path: PathBuf, reason: String },
    #[error("{path} exceeds max size ({bytes} > {limit} bytes)")]
    TooLarge { path: PathBuf, bytes: u64, limit: u64 },
}

impl ExtractionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// An external reasoning service call failed. Always recovered by the caller.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator disabled (offline mode)")]
    Disabled,
    #[error("request failed: {0}")]
    Http(String),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Why an execution attempt did not complete cleanly. Stored as data on the
/// execution result, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("execution timed out")]
    TimedOut { limit_seconds: u64 },
    #[error("{}", failed_message(.exit_code, .stderr))]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("could not launch interpreter: {message}")]
    Launch { message: String },
}

fn failed_message(exit_code: &Option<i32>, stderr: &str) -> String {
    if !stderr.trim().is_empty() {
        return stderr.to_string();
    }
    match exit_code {
        Some(code) => format!("process exited with status {code}"),
        None => "process terminated by signal".to_string(),
    }
}

/// The final distributable could not be produced; the intermediate artifact
/// is returned instead.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("pdf conversion disabled")]
    Disabled,
    #[error("spawning {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} timed out after {seconds}s")]
    TimedOut { command: String, seconds: u64 },
    #[error("{command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

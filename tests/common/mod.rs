#![allow(dead_code)]

use lab_report::{
    collab::Collaborator,
    config::Config,
    error::{CollaboratorError, ExecutionError},
    runner::{ExecJob, ExecOutcome, Executor, RuntimeDiag},
};
use std::path::{Path, PathBuf};

/// Deterministic stand-in for the reasoning services.
#[derive(Debug, Clone, Default)]
pub struct StubCollaborator {
    pub metadata_answer: Option<String>,
    pub fail_isolation: bool,
    pub fail_explain: bool,
    pub fail_interpret: bool,
    pub fail_extract_text: bool,
}

impl StubCollaborator {
    pub fn with_metadata(json: &str) -> Self {
        Self {
            metadata_answer: Some(json.to_string()),
            ..Default::default()
        }
    }
}

impl Collaborator for StubCollaborator {
    fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String, CollaboratorError> {
        if self.fail_extract_text {
            return Err(CollaboratorError::Http("connection refused".into()));
        }
        Ok(format!("extracted {} bytes of {mime}", bytes.len()))
    }

    fn extract_metadata(&self, _instruction_text: &str) -> Result<String, CollaboratorError> {
        self.metadata_answer
            .clone()
            .ok_or_else(|| CollaboratorError::Status {
                status: 503,
                body: "unavailable".into(),
            })
    }

    fn isolate_block(
        &self,
        code: &str,
        language: &str,
        exercise: &str,
    ) -> Result<String, CollaboratorError> {
        if self.fail_isolation {
            return Err(CollaboratorError::Http("timeout".into()));
        }
        let first = code.lines().next().unwrap_or_default();
        Ok(format!("```{language}\n# {exercise}\n{first}\n```"))
    }

    fn explain(&self, code: &str, language: &str) -> Result<String, CollaboratorError> {
        if self.fail_explain {
            return Err(CollaboratorError::Malformed("no choices".into()));
        }
        Ok(format!("Explains {} line(s) of {language}.", code.lines().count()))
    }

    fn interpret_image(&self, bytes: &[u8], mime: &str) -> Result<String, CollaboratorError> {
        if self.fail_interpret {
            return Err(CollaboratorError::Http("vision model down".into()));
        }
        Ok(format!("A {mime} plot of {} bytes.", bytes.len()))
    }
}

/// Pretends to run a script: prints a line and drops `figures` fake images.
#[derive(Debug, Clone, Default)]
pub struct StubExecutor {
    pub figures: u32,
    pub fail_with: Option<ExecutionError>,
}

impl Executor for StubExecutor {
    fn doctor(&self) -> anyhow::Result<RuntimeDiag> {
        Ok(RuntimeDiag {
            python_exe: "stub".into(),
            python_version: None,
            matplotlib_version: None,
            ok: true,
            error: None,
        })
    }

    fn execute(&self, job: &ExecJob<'_>) -> ExecOutcome {
        std::fs::create_dir_all(job.artifact_dir).expect("artifact dir");
        let artifacts = (1..=self.figures)
            .map(|n| {
                let p = job
                    .artifact_dir
                    .join(format!("{}figure_{n}.png", job.artifact_prefix));
                std::fs::write(&p, format!("png-{n}")).expect("write fake figure");
                p
            })
            .collect();
        let name = job.source.file_name().unwrap().to_string_lossy();
        ExecOutcome {
            stdout: format!("ran {name}\n"),
            stderr: String::new(),
            error: self.fail_with.clone(),
            artifacts,
            elapsed_ms: 0,
        }
    }
}

/// Config that never reaches for the network or an external pdf tool.
pub fn test_config(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.global.offline_only = true;
    cfg.paths.out_dir = root.join("out").display().to_string();
    cfg.paths.work_dir = root.join("work").display().to_string();
    cfg.render.pdf_enabled = false;
    cfg.logging.write_to_file = false;
    cfg
}

pub fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).expect("write fixture");
    p
}

pub fn notebook(cells: &[(&str, &str)]) -> String {
    let cells: Vec<serde_json::Value> = cells
        .iter()
        .map(|(kind, src)| serde_json::json!({"cell_type": kind, "metadata": {}, "source": src}))
        .collect();
    serde_json::json!({"cells": cells, "metadata": {}, "nbformat": 4, "nbformat_minor": 5})
        .to_string()
}

use crate::{
    analyze,
    collab::Collaborator,
    config::Config,
    extract, interpret, metadata,
    render::{self, AssembledReport},
    report::{ArtifactRef, ExecutionResult, FileEntry, LabMetadata, ReportModel, SkippedFile},
    runner::{ExecJob, Executor},
    util::{ensure_dir, sanitize_component},
};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

pub struct Pipeline<C: Collaborator, X: Executor> {
    cfg: Config,
    collab: C,
    executor: X,
}

pub struct RunOutput {
    pub model: ReportModel,
    pub assembled: AssembledReport,
}

impl<C: Collaborator, X: Executor> Pipeline<C, X> {
    pub fn new(cfg: &Config, collab: C, executor: X) -> Self {
        Self {
            cfg: cfg.clone(),
            collab,
            executor,
        }
    }

    /// Produces the full report for one session. Fails only when there is no
    /// code to report on, the instruction document is unreadable, or the
    /// session directory cannot be written.
    pub fn run(
        &self,
        instruction: &Path,
        code_paths: &[PathBuf],
        session_dir: &Path,
    ) -> Result<RunOutput> {
        if code_paths.is_empty() {
            return Err(anyhow!("no code files supplied"));
        }
        if self.cfg.limits.max_code_files > 0 && code_paths.len() > self.cfg.limits.max_code_files
        {
            return Err(anyhow!(
                "too many code files: {} > {}",
                code_paths.len(),
                self.cfg.limits.max_code_files
            ));
        }
        if self.cfg.global.max_parallel_files > 1 {
            warn!(
                "max_parallel_files > 1 is configured, but files are processed sequentially in this build"
            );
        }
        ensure_dir(session_dir)?;

        let meta = metadata::extract_metadata(&self.cfg, &self.collab, instruction)?;
        let model = self.build_model(meta, code_paths, session_dir);

        info!(
            "report model: {} entries, {} skipped, {} artifacts",
            model.entries.len(),
            model.skipped.len(),
            model.artifact_count()
        );

        let assembled = render::assemble(&self.cfg, &model, session_dir)?;
        Ok(RunOutput { model, assembled })
    }

    /// Runs every per-file stage in input order. Each file is its own failure
    /// domain; only an extraction failure drops a file.
    pub fn build_model(
        &self,
        meta: LabMetadata,
        code_paths: &[PathBuf],
        session_dir: &Path,
    ) -> ReportModel {
        let mut model = ReportModel::new(meta);

        for (index, path) in code_paths.iter().enumerate() {
            let _span = info_span!("file", index, path = %path.display()).entered();

            let source = match extract::read_source_file(&self.cfg, path) {
                Ok(s) => s,
                Err(err) => {
                    warn!("skipping file: {err}");
                    model.push_skipped(SkippedFile {
                        index,
                        path: path.display().to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let exercise = model.metadata.exercise_label(index).map(str::to_owned);
            debug!("exercise label: {:?}", exercise);

            let analysis = analyze::analyze(
                &self.collab,
                &source.filename(),
                &source.content,
                source.language,
                exercise.as_deref(),
            );

            let execution = if source.language.is_executable() {
                Some(self.execute(index, path, session_dir))
            } else {
                None
            };

            model.push_entry(FileEntry {
                index,
                analysis,
                execution,
            });
        }

        model
    }

    fn execute(&self, index: usize, path: &Path, session_dir: &Path) -> ExecutionResult {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = format!("{:02}_{}_", index + 1, sanitize_component(&stem));
        let artifact_dir = session_dir.join(&self.cfg.output.artifacts_subdir);

        let outcome = self.executor.execute(&ExecJob {
            source: path,
            artifact_dir: &artifact_dir,
            artifact_prefix: &prefix,
        });

        let artifacts = outcome
            .artifacts
            .iter()
            .map(|abs| ArtifactRef {
                file_path: abs
                    .strip_prefix(session_dir)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| abs.clone()),
                interpretation: interpret::interpret_artifact(&self.collab, abs),
            })
            .collect();

        ExecutionResult {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            error: outcome.error,
            artifacts,
            elapsed_ms: outcome.elapsed_ms,
        }
    }
}

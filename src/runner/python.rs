use super::{
    process::{own_process_group, wait_with_timeout, WaitOutcome},
    shim::{self, CaptureShim, SINK_DIR_ENV},
    ExecJob, ExecOutcome, Executor, RuntimeDiag,
};
use crate::{
    config::Config,
    error::ExecutionError,
    extract,
    util::{ensure_dir, extension_of},
};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DOCTOR_PROBE: &str = r#"import json, sys
info = {"python_version": sys.version.split()[0], "matplotlib_version": None}
try:
    import matplotlib
    info["matplotlib_version"] = matplotlib.__version__
except Exception:
    pass
print(json.dumps(info))
"#;

pub struct PythonRunner {
    cfg: Config,
    python_exe: PathBuf,
    shim: CaptureShim,
}

impl PythonRunner {
    pub fn new(cfg: &Config) -> Result<Self> {
        let python_exe = resolve_python_exe(&cfg.runner.python_exe);
        Ok(Self {
            cfg: cfg.clone(),
            python_exe,
            shim: CaptureShim::new(&cfg.runner.shim_filename),
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.cfg.limits.exec_timeout_seconds)
    }

    /// Writes the executable form of `source` into `work_dir`: notebooks
    /// become their concatenated code cells, anything else is copied as is.
    fn materialize(&self, source: &Path, work_dir: &Path) -> Result<PathBuf> {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string());

        if extension_of(source) == "ipynb" {
            let code = extract::notebook_code(source)?;
            let dest = work_dir.join(format!("{stem}.py"));
            std::fs::write(&dest, code)
                .with_context(|| format!("writing {}", dest.display()))?;
            Ok(dest)
        } else {
            let name = source
                .file_name()
                .ok_or_else(|| anyhow!("source has no file name: {}", source.display()))?;
            let dest = work_dir.join(name);
            std::fs::copy(source, &dest)
                .with_context(|| format!("copying {} into sandbox", source.display()))?;
            Ok(dest)
        }
    }

    fn spawn_and_wait(&self, script: &Path, work_dir: &Path) -> Result<WaitOutcome> {
        let shim_path = self
            .shim
            .install(work_dir)
            .with_context(|| "installing capture shim")?;

        // Both live in `work_dir`, which is the child's cwd; bare names keep
        // sandbox paths out of tracebacks.
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(bare_name(&shim_path));
        cmd.arg(bare_name(script));
        cmd.current_dir(work_dir);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        own_process_group(&mut cmd);

        for (k, v) in &self.cfg.runner.env {
            cmd.env(k, v);
        }
        cmd.env("PYTHONUNBUFFERED", "1");
        cmd.env("PYTHONDONTWRITEBYTECODE", "1");
        cmd.env(SINK_DIR_ENV, work_dir);

        debug!(
            "python run {} timeout={:?}",
            script.display(),
            self.timeout()
        );
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {}", self.python_exe.display()))?;
        wait_with_timeout(&mut child, self.timeout())
    }

    fn run_in(&self, job: &ExecJob<'_>, work_dir: &Path, outcome: &mut ExecOutcome) {
        let script = match self.materialize(job.source, work_dir) {
            Ok(p) => p,
            Err(err) => {
                outcome.error = Some(ExecutionError::Launch {
                    message: format!("{err:#}"),
                });
                return;
            }
        };

        match self.spawn_and_wait(&script, work_dir) {
            Ok(WaitOutcome::Exited {
                status,
                stdout,
                stderr,
            }) => {
                outcome.stdout = String::from_utf8_lossy(&stdout).into_owned();
                outcome.stderr = String::from_utf8_lossy(&stderr).into_owned();
                if !status.success() {
                    outcome.error = Some(ExecutionError::Failed {
                        exit_code: status.code(),
                        stderr: outcome.stderr.clone(),
                    });
                } else if self.cfg.debug.keep_runner_stderr && !outcome.stderr.is_empty() {
                    debug!("python stderr {}: {}", script.display(), outcome.stderr.trim());
                }
            }
            Ok(WaitOutcome::TimedOut { stdout, stderr }) => {
                outcome.stdout = String::from_utf8_lossy(&stdout).into_owned();
                outcome.stderr = String::from_utf8_lossy(&stderr).into_owned();
                outcome.error = Some(ExecutionError::TimedOut {
                    limit_seconds: self.cfg.limits.exec_timeout_seconds,
                });
            }
            Err(err) => {
                outcome.error = Some(ExecutionError::Launch {
                    message: format!("{err:#}"),
                });
            }
        }
    }
}

impl Executor for PythonRunner {
    fn doctor(&self) -> Result<RuntimeDiag> {
        let python_exe = self.python_exe.display().to_string();
        let spawned = Command::new(&self.python_exe)
            .arg("-c")
            .arg(DOCTOR_PROBE)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(c) => c,
            Err(err) => {
                return Ok(RuntimeDiag {
                    python_exe,
                    python_version: None,
                    matplotlib_version: None,
                    ok: false,
                    error: Some(err.to_string()),
                });
            }
        };

        let timeout = Duration::from_secs(self.cfg.runner.doctor_timeout_seconds);
        match wait_with_timeout(&mut child, timeout)? {
            WaitOutcome::Exited { status, stdout, .. } if status.success() => {
                let info: serde_json::Value = serde_json::from_slice(&stdout)
                    .with_context(|| "parsing interpreter probe output")?;
                let field = |k: &str| info.get(k).and_then(|v| v.as_str()).map(String::from);
                let matplotlib_version = field("matplotlib_version");
                Ok(RuntimeDiag {
                    python_exe,
                    python_version: field("python_version"),
                    ok: matplotlib_version.is_some(),
                    error: matplotlib_version
                        .is_none()
                        .then(|| "matplotlib not importable; plots will not be captured".into()),
                    matplotlib_version,
                })
            }
            WaitOutcome::Exited { stderr, .. } => Ok(RuntimeDiag {
                python_exe,
                python_version: None,
                matplotlib_version: None,
                ok: false,
                error: Some(String::from_utf8_lossy(&stderr).trim().to_string()),
            }),
            WaitOutcome::TimedOut { .. } => Ok(RuntimeDiag {
                python_exe,
                python_version: None,
                matplotlib_version: None,
                ok: false,
                error: Some(format!("interpreter probe timed out after {timeout:?}")),
            }),
        }
    }

    fn execute(&self, job: &ExecJob<'_>) -> ExecOutcome {
        let started = Instant::now();
        let mut outcome = ExecOutcome::default();

        // The child runs with a different cwd, so every path handed to it
        // must be absolute.
        let work_root = PathBuf::from(&self.cfg.paths.work_dir);
        let work = ensure_dir(&work_root).and_then(|_| {
            let work_root = std::path::absolute(&work_root)
                .with_context(|| format!("resolving {}", work_root.display()))?;
            tempfile::Builder::new()
                .prefix("lab-run-")
                .tempdir_in(&work_root)
                .with_context(|| format!("creating sandbox dir under {}", work_root.display()))
        });
        let work = match work {
            Ok(w) => w,
            Err(err) => {
                outcome.error = Some(ExecutionError::Launch {
                    message: format!("{err:#}"),
                });
                return outcome;
            }
        };

        self.run_in(job, work.path(), &mut outcome);
        outcome.artifacts = harvest_figures(work.path(), job.artifact_dir, job.artifact_prefix);
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;

        if let Err(err) = work.close() {
            warn!("removing sandbox dir: {err}");
        }

        match &outcome.error {
            None => info!(
                "executed {} in {}ms, {} artifact(s)",
                job.source.display(),
                outcome.elapsed_ms,
                outcome.artifacts.len()
            ),
            Some(err) => {
                let message = err.to_string();
                warn!(
                    "execution of {} ended with error after {}ms: {}",
                    job.source.display(),
                    outcome.elapsed_ms,
                    message.lines().last().unwrap_or_default()
                );
            }
        }
        outcome
    }
}

/// Copies every `figure_<n>.png` in `work_dir` into `artifact_dir`, ordered
/// by `n`. Unreadable entries are skipped.
pub fn harvest_figures(work_dir: &Path, artifact_dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(work_dir) {
        Ok(e) => e,
        Err(err) => {
            warn!("scanning {}: {err}", work_dir.display());
            return Vec::new();
        }
    };

    let mut figures: Vec<(u32, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            shim::figure_index(&name.to_string_lossy()).map(|n| (n, e.path()))
        })
        .collect();
    figures.sort_by_key(|(n, _)| *n);

    if figures.is_empty() {
        return Vec::new();
    }
    if let Err(err) = ensure_dir(artifact_dir) {
        warn!("{err:#}");
        return Vec::new();
    }

    let mut persisted = Vec::with_capacity(figures.len());
    for (n, src) in figures {
        let dest = artifact_dir.join(format!("{prefix}{}", shim::figure_name(n)));
        match std::fs::copy(&src, &dest) {
            Ok(_) => persisted.push(dest),
            Err(err) => warn!("copying {} to {}: {err}", src.display(), dest.display()),
        }
    }
    persisted
}

fn bare_name(path: &Path) -> PathBuf {
    path.file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf())
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("LAB_REPORT_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("python3");
    }
    let path = expand_tilde(raw);
    // The child runs in the sandbox dir, so a relative path to an
    // interpreter must be anchored here; bare names still go through PATH.
    if path.is_relative() && path.components().count() > 1 {
        return std::path::absolute(&path).unwrap_or(path);
    }
    path
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

use crate::{
    collab,
    config::Config,
    pipeline::Pipeline,
    runner::{ExecJob, Executor, PythonRunner},
    util::{ensure_dir, hash_file, now_rfc3339, sha256_hex},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "lab-report")]
#[command(about = "Runs submitted lab code, captures its plots, and assembles a narrative report")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./lab-report.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the interpreter, plotting library and pdf backend.
    Doctor {},
    /// Print the lab metadata derived from an instruction document.
    Metadata {
        #[arg(long)]
        instruction: PathBuf,
    },
    /// Execute one script in the sandbox and print the outcome as JSON.
    Execute {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        artifact_dir: Option<PathBuf>,
    },
    /// Build the full report.
    Run {
        #[arg(long)]
        instruction: PathBuf,
        #[arg(long, num_args = 1.., required = true)]
        code: Vec<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = match &cfg_path {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            doctor(&cfg)
        }
        Command::Metadata { instruction } => {
            let _guard = init_logging(&args, &cfg, None)?;
            print_metadata(&cfg, instruction)
        }
        Command::Execute {
            input,
            artifact_dir,
        } => {
            let _guard = init_logging(&args, &cfg, None)?;
            execute_one(&cfg, input, artifact_dir.as_deref())
        }
        Command::Run {
            instruction,
            code,
            out_dir,
        } => run(&args, &cfg, instruction, code, out_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    [PathBuf::from("lab-report.toml"), PathBuf::from("lab-report.example.toml")]
        .into_iter()
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let runner = PythonRunner::new(cfg)?;
    let runtime = runner.doctor()?;
    let pdf_backend = which(&cfg.render.pdf_command);
    let api_key_present = std::env::var(&cfg.collaborator.api_key_env)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "runtime": runtime,
            "pdf_backend": {
                "command": cfg.render.pdf_command,
                "found": pdf_backend,
                "enabled": cfg.render.pdf_enabled,
            },
            "collaborator": {
                "api_url": cfg.collaborator.api_url,
                "api_key_env": cfg.collaborator.api_key_env,
                "api_key_present": api_key_present,
                "offline_only": cfg.global.offline_only,
            },
        }))?
    );
    Ok(())
}

fn print_metadata(cfg: &Config, instruction: &Path) -> Result<()> {
    validate_input(cfg, instruction)?;
    let collab = collab::connect(cfg)?;
    let meta = crate::metadata::extract_metadata(cfg, &*collab, instruction)?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}

fn execute_one(cfg: &Config, input: &Path, artifact_dir: Option<&Path>) -> Result<()> {
    validate_input(cfg, input)?;
    let runner = PythonRunner::new(cfg)?;
    let artifact_dir = artifact_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir).join("artifacts"));
    let outcome = runner.execute(&ExecJob {
        source: input,
        artifact_dir: &artifact_dir,
        artifact_prefix: "",
    });
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn run(
    args: &Args,
    cfg: &Config,
    instruction: &Path,
    code: &[PathBuf],
    out_override: Option<&Path>,
) -> Result<()> {
    validate_input(cfg, instruction)?;
    // Unreadable code files are skipped by the pipeline, not rejected here.
    for path in code {
        reject_url(cfg, path)?;
    }

    let session_id = session_id(cfg, instruction, code)?;
    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let session_dir = out_root.join(&session_id);

    if session_dir.exists() && !cfg.global.reuse_session_dir {
        return Err(anyhow!(
            "session dir already exists and reuse_session_dir=false: {}",
            session_dir.display()
        ));
    }

    ensure_dir(&session_dir)?;
    ensure_dir(&session_dir.join("logs"))?;

    let log_path = resolve_log_path(cfg, &session_dir);
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("session_id={session_id} out={}", session_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(session_dir.join("effective-config.toml"), raw)?;
    }

    let collab = collab::connect(cfg)?;
    let runner = PythonRunner::new(cfg)?;
    let pipeline = Pipeline::new(cfg, collab, runner);

    let started = now_rfc3339();
    let output = pipeline.run(instruction, code, &session_dir)?;

    if cfg.output.write_index_json {
        let index = serde_json::json!({
            "session_id": session_id,
            "started": started,
            "finished": now_rfc3339(),
            "entries": output.model.entries.len(),
            "skipped": output.model.skipped.len(),
            "artifacts": output.model.artifact_count(),
            "report": output.assembled,
        });
        std::fs::write(
            session_dir.join("index.json"),
            serde_json::to_string_pretty(&index)?,
        )?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "session_id": session_id,
                "session_dir": session_dir,
                "report": output.assembled.final_path,
                "warnings": output.assembled.warnings,
                "status": "ok"
            }))?
        );
    }

    Ok(())
}

/// Deterministic id derived from the effective config and every input.
fn session_id(cfg: &Config, instruction: &Path, code: &[PathBuf]) -> Result<String> {
    let mut material = sha256_hex(cfg.normalized_for_hash().as_bytes());
    for path in std::iter::once(instruction).chain(code.iter().map(PathBuf::as_path)) {
        let h = if path.is_file() {
            hash_file(path).with_context(|| format!("hashing input: {}", path.display()))?
        } else {
            format!("missing:{}", path.display())
        };
        material.push(':');
        material.push_str(&h);
    }
    Ok(sha256_hex(material.as_bytes())[..16].to_string())
}

fn reject_url(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();
    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }
    Ok(())
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    reject_url(cfg, input)?;

    if !input.is_file() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    Ok(())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}

fn which(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|p| p.is_file())
}

fn resolve_log_path(cfg: &Config, session_dir: &Path) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(session_dir.join("logs").join("lab-report.log"))
}

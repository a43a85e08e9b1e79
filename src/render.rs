use crate::{
    config::Config,
    error::AssemblyError,
    report::{ExecutionResult, FileEntry, ReportModel},
    runner::process::{own_process_group, wait_with_timeout, WaitOutcome},
    util::truncate_chars,
};
use anyhow::{Context, Result};
use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};

const STYLESHEET: &str = "\
body { font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }
h1 { color: #333; }
h2 { color: #444; margin-top: 20px; }
h3 { color: #555; }
pre { background-color: #f5f5f5; padding: 10px; border-radius: 5px; overflow-x: auto; }
code { font-family: Consolas, monospace; }
img { max-width: 100%; height: auto; }
";

#[derive(Debug, Clone, Serialize)]
pub struct AssembledReport {
    pub markdown_path: PathBuf,
    pub html_path: Option<PathBuf>,
    pub pdf_path: Option<PathBuf>,
    /// The most finished artifact that exists: pdf, else html, else markdown.
    pub final_path: PathBuf,
    pub warnings: Vec<String>,
}

/// Renders the report as markdown. Output depends only on `cfg` and `model`.
pub fn render_markdown(cfg: &Config, model: &ReportModel) -> String {
    let mut md = String::new();
    let meta = &model.metadata;

    let _ = writeln!(md, "# {}\n", meta.title);

    md.push_str("## Objectives\n\n");
    for objective in &meta.objectives {
        let _ = writeln!(md, "* {objective}");
    }
    md.push('\n');

    for entry in &model.entries {
        render_entry(cfg, model, entry, &mut md);
    }

    if !model.skipped.is_empty() {
        md.push_str("## Skipped Files\n\n");
        for s in &model.skipped {
            let _ = writeln!(md, "* `{}`: {}", s.path, s.reason);
        }
        md.push('\n');
    }

    md
}

fn render_entry(cfg: &Config, model: &ReportModel, entry: &FileEntry, md: &mut String) {
    let analysis = &entry.analysis;
    let _ = writeln!(md, "## {}\n", model.metadata.section_heading(entry.index));
    let _ = writeln!(md, "**File:** {}\n", analysis.filename);

    md.push_str("### Source Code\n\n");
    let code = truncate_chars(&analysis.isolated_block, cfg.output.code_display_chars);
    push_fenced(md, analysis.language.tag(), &code);

    md.push_str("### Analysis\n\n");
    let _ = writeln!(md, "{}\n", analysis.explanation.trim_end());

    if let Some(exec) = &entry.execution {
        render_execution(cfg, exec, md);
    }
}

fn render_execution(cfg: &Config, exec: &ExecutionResult, md: &mut String) {
    if !exec.stdout.is_empty() {
        md.push_str("### Execution Output\n\n");
        let out = truncate_chars(&exec.stdout, cfg.output.stdout_display_chars);
        push_fenced(md, "", &out);
    }

    if let Some(err) = &exec.error {
        md.push_str("### Execution Error\n\n");
        push_fenced(md, "", &err.to_string());
    }

    for artifact in &exec.artifacts {
        let name = artifact
            .file_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        md.push_str("### Generated Plot\n\n");
        let _ = writeln!(md, "![{name}]({})\n", slash_path(&artifact.file_path));
        md.push_str("#### Plot Interpretation\n\n");
        let _ = writeln!(md, "{}\n", artifact.interpretation.display_text().trim_end());
    }
}

/// Fences `body` with enough backticks that nothing inside can close it.
fn push_fenced(md: &mut String, lang: &str, body: &str) {
    let longest = body
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    let _ = writeln!(md, "{fence}{lang}\n{}\n{fence}\n", body.trim_end_matches('\n'));
}

fn slash_path(p: &Path) -> String {
    p.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn markdown_to_html(title: &str, md: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(md, options);
    let mut body = String::new();
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n\
         <style>\n{STYLESHEET}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(title)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Converts `html_path` to `pdf_path` with the configured external command.
pub fn convert_pdf(cfg: &Config, html_path: &Path, pdf_path: &Path) -> Result<(), AssemblyError> {
    if !cfg.render.pdf_enabled {
        return Err(AssemblyError::Disabled);
    }
    let command = cfg.render.pdf_command.clone();
    let mut cmd = Command::new(&command);
    cmd.args(&cfg.render.pdf_args)
        .arg(html_path)
        .arg(pdf_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut cmd);
    let mut child = cmd
        .spawn()
        .map_err(|source| AssemblyError::Spawn {
            command: command.clone(),
            source,
        })?;

    let seconds = cfg.render.timeout_seconds;
    let outcome = wait_with_timeout(&mut child, Duration::from_secs(seconds)).map_err(|e| {
        AssemblyError::Failed {
            command: command.clone(),
            stderr: format!("{e:#}"),
        }
    })?;
    match outcome {
        WaitOutcome::Exited { status, .. } if status.success() && pdf_path.exists() => Ok(()),
        WaitOutcome::Exited { stderr, .. } => Err(AssemblyError::Failed {
            command,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        }),
        WaitOutcome::TimedOut { .. } => Err(AssemblyError::TimedOut { command, seconds }),
    }
}

/// Writes markdown, the structured report, html and finally the pdf into
/// `session_dir`. The markdown is always written first, so a failure later on
/// still leaves a readable report behind.
pub fn assemble(cfg: &Config, model: &ReportModel, session_dir: &Path) -> Result<AssembledReport> {
    let markdown = render_markdown(cfg, model);
    let markdown_path = session_dir.join(&cfg.output.markdown_filename);
    std::fs::write(&markdown_path, &markdown)
        .with_context(|| format!("writing {}", markdown_path.display()))?;

    if cfg.output.write_report_json {
        let report_path = session_dir.join(&cfg.output.report_filename);
        std::fs::write(&report_path, serde_json::to_string_pretty(model)?)
            .with_context(|| format!("writing {}", report_path.display()))?;
    }

    let mut report = AssembledReport {
        final_path: markdown_path.clone(),
        markdown_path,
        html_path: None,
        pdf_path: None,
        warnings: Vec::new(),
    };

    if !cfg.render.write_html {
        return Ok(report);
    }

    let html_path = session_dir.join(&cfg.output.html_filename);
    let html = markdown_to_html(&model.metadata.title, &markdown);
    if let Err(err) = std::fs::write(&html_path, html) {
        warn!("writing {}: {err}; returning markdown", html_path.display());
        report.warnings.push(format!("html: {err}"));
        return Ok(report);
    }
    report.html_path = Some(html_path.clone());
    report.final_path = html_path.clone();

    let html_abs = std::path::absolute(&html_path).unwrap_or_else(|_| html_path.clone());
    let pdf_path = session_dir.join(&cfg.output.pdf_filename);
    let pdf_abs = std::path::absolute(&pdf_path).unwrap_or_else(|_| pdf_path.clone());
    // A pdf left by an earlier run in a reused session dir must not survive.
    if pdf_path.exists() {
        if let Err(err) = std::fs::remove_file(&pdf_path) {
            warn!("removing stale {}: {err}", pdf_path.display());
        }
    }
    match convert_pdf(cfg, &html_abs, &pdf_abs) {
        Ok(()) => {
            info!("rendered {}", pdf_path.display());
            report.pdf_path = Some(pdf_path.clone());
            report.final_path = pdf_path;
        }
        Err(AssemblyError::Disabled) => {
            info!("pdf conversion disabled; final report is {}", html_path.display());
        }
        Err(err) => {
            warn!("pdf conversion failed, returning html instead: {err}");
            report.warnings.push(err.to_string());
        }
    }

    Ok(report)
}

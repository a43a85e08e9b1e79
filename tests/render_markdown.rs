mod common;

use common::test_config;
use lab_report::{
    error::ExecutionError,
    render::{assemble, markdown_to_html, render_markdown},
    report::{
        ArtifactRef, CodeAnalysis, ExecutionResult, FileEntry, Interpretation, IsolationOutcome,
        LabMetadata, Language, ReportModel, SkippedFile, INTERPRETATION_UNAVAILABLE,
    },
};
use std::path::PathBuf;

fn analysis(filename: &str, block: &str) -> CodeAnalysis {
    CodeAnalysis {
        filename: filename.into(),
        language: Language::Python,
        full_code: block.into(),
        isolated_block: block.into(),
        explanation: "It prints.".into(),
        isolation: IsolationOutcome::NotRequested,
    }
}

fn model() -> ReportModel {
    let mut m = ReportModel::new(LabMetadata {
        title: "Lab 1".into(),
        objectives: vec!["Plot data".into()],
        exercises: vec!["Fibonacci".into()],
    });
    m.push_entry(FileEntry {
        index: 0,
        analysis: analysis("fib.py", "print(1)"),
        execution: Some(ExecutionResult {
            stdout: "1\n".into(),
            stderr: String::new(),
            error: None,
            artifacts: vec![
                ArtifactRef {
                    file_path: PathBuf::from("artifacts").join("01_fib_figure_1.png"),
                    interpretation: Interpretation::Provided("Rising curve.".into()),
                },
                ArtifactRef {
                    file_path: PathBuf::from("artifacts").join("01_fib_figure_2.png"),
                    interpretation: Interpretation::Unavailable("timeout".into()),
                },
            ],
            elapsed_ms: 12,
        }),
    });
    m.push_entry(FileEntry {
        index: 1,
        analysis: CodeAnalysis {
            language: Language::Java,
            ..analysis("Main.java", "class Main {}")
        },
        execution: None,
    });
    m
}

#[test]
fn renders_sections_in_order() {
    let cfg = test_config(std::path::Path::new("."));
    let md = render_markdown(&cfg, &model());

    let title = md.find("# Lab 1").unwrap();
    let objectives = md.find("## Objectives").unwrap();
    let first = md.find("## Exercise: Fibonacci").unwrap();
    let second = md.find("## Code Sample 2").unwrap();
    assert!(title < objectives && objectives < first && first < second);

    assert!(md.contains("* Plot data"));
    assert!(md.contains("```python\nprint(1)\n```"));
    assert!(md.contains("### Execution Output"));
    assert!(md.contains("![01_fib_figure_1.png](artifacts/01_fib_figure_1.png)"));
    assert!(md.contains("Rising curve."));
    assert!(md.contains(INTERPRETATION_UNAVAILABLE));
    assert!(!md.contains("### Execution Error"));
    assert_eq!(md.matches("### Generated Plot").count(), 2);
}

#[test]
fn non_executable_entry_has_no_execution_sections() {
    let cfg = test_config(std::path::Path::new("."));
    let md = render_markdown(&cfg, &model());
    let java = &md[md.find("## Code Sample 2").unwrap()..];
    assert!(java.contains("```java\nclass Main {}\n```"));
    assert!(!java.contains("### Execution Output"));
}

#[test]
fn long_code_and_output_are_truncated() {
    let mut cfg = test_config(std::path::Path::new("."));
    cfg.output.code_display_chars = 10;
    cfg.output.stdout_display_chars = 5;

    let mut m = ReportModel::new(LabMetadata::fallback());
    m.push_entry(FileEntry {
        index: 0,
        analysis: analysis("a.py", "abcdefghijKLMNOP"),
        execution: Some(ExecutionResult {
            stdout: "0123456789".into(),
            stderr: "Traceback".into(),
            error: Some(ExecutionError::TimedOut { limit_seconds: 30 }),
            artifacts: vec![],
            elapsed_ms: 30_000,
        }),
    });

    let md = render_markdown(&cfg, &m);
    assert!(md.contains("abcdefghij..."));
    assert!(!md.contains("KLMNOP"));
    assert!(md.contains("01234..."));
    assert!(md.contains("### Execution Error\n\n```\nexecution timed out\n```"));
}

#[test]
fn code_containing_fences_stays_fenced() {
    let cfg = test_config(std::path::Path::new("."));
    let mut m = ReportModel::new(LabMetadata::fallback());
    m.push_entry(FileEntry {
        index: 0,
        analysis: analysis("doc.py", "s = \"\"\"\n```\n\"\"\""),
        execution: None,
    });
    let md = render_markdown(&cfg, &m);
    assert!(md.contains("````python\n"));
}

#[test]
fn skipped_files_are_listed() {
    let cfg = test_config(std::path::Path::new("."));
    let mut m = model();
    m.push_skipped(SkippedFile {
        index: 2,
        path: "blob.bin".into(),
        reason: "unsupported format 'bin'".into(),
    });
    let md = render_markdown(&cfg, &m);
    assert!(md.trim_end().ends_with("* `blob.bin`: unsupported format 'bin'"));
}

#[test]
fn html_wraps_rendered_markdown() {
    let html = markdown_to_html("A <b> lab", "# Hi\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
    assert!(html.contains("<title>A &lt;b&gt; lab</title>"));
    assert!(html.contains("<h1>Hi</h1>"));
    assert!(html.contains("<table>"));
}

#[test]
fn pdf_failure_falls_back_to_html() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.render.pdf_enabled = true;
    cfg.render.pdf_command = "lab-report-no-such-pdf-tool".into();

    let out = assemble(&cfg, &model(), dir.path()).unwrap();
    assert!(out.markdown_path.exists());
    assert_eq!(out.final_path, dir.path().join("lab_report.html"));
    assert!(out.pdf_path.is_none());
    assert_eq!(out.warnings.len(), 1);
    assert!(dir.path().join("report.json").exists());
}

#[test]
fn html_disabled_returns_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.render.write_html = false;
    let out = assemble(&cfg, &model(), dir.path()).unwrap();
    assert_eq!(out.final_path, out.markdown_path);
    assert!(!dir.path().join("lab_report.html").exists());
}

#[test]
fn failed_conversion_leaves_no_stale_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.render.pdf_enabled = true;
    cfg.render.pdf_command = "lab-report-no-such-pdf-tool".into();
    let stale = dir.path().join("lab_report.pdf");
    std::fs::write(&stale, "%PDF from an earlier run").unwrap();

    let out = assemble(&cfg, &model(), dir.path()).unwrap();
    assert!(out.pdf_path.is_none());
    assert!(!stale.exists());
}

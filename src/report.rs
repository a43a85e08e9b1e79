use crate::error::ExecutionError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_TITLE: &str = "Lab Report";
pub const INTERPRETATION_UNAVAILABLE: &str = "Unable to provide plot interpretation.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub exercises: Vec<String>,
}

impl LabMetadata {
    /// Used whenever the instruction document could not be understood.
    pub fn fallback() -> Self {
        Self {
            title: DEFAULT_TITLE.into(),
            objectives: vec!["Analyze and document code functionality".into()],
            exercises: vec!["Code Analysis".into()],
        }
    }

    /// Fills a blank title, drops blank list items, and substitutes the
    /// fallback lists for any list left empty.
    pub fn normalized(mut self) -> Self {
        let fallback = Self::fallback();
        if self.title.trim().is_empty() {
            self.title = fallback.title;
        } else {
            self.title = self.title.trim().to_string();
        }
        self.objectives.retain(|o| !o.trim().is_empty());
        if self.objectives.is_empty() {
            self.objectives = fallback.objectives;
        }
        self.exercises.retain(|e| !e.trim().is_empty());
        if self.exercises.is_empty() {
            self.exercises = fallback.exercises;
        }
        self
    }

    /// Positional association: file `index` maps to exercise `index`.
    pub fn exercise_label(&self, index: usize) -> Option<&str> {
        self.exercises.get(index).map(String::as_str)
    }

    pub fn section_heading(&self, index: usize) -> String {
        match self.exercise_label(index) {
            Some(label) => format!("Exercise: {label}"),
            None => format!("Code Sample {}", index + 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    C,
    Text,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "py" | "ipynb" => Language::Python,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            _ => Language::Text,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::C => "c",
            Language::Text => "text",
        }
    }

    pub fn is_executable(self) -> bool {
        matches!(self, Language::Python)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
    pub content: String,
}

impl SourceFile {
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "cause", rename_all = "snake_case")]
pub enum IsolationOutcome {
    NotRequested,
    Isolated,
    Fallback(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAnalysis {
    pub filename: String,
    pub language: Language,
    pub full_code: String,
    pub isolated_block: String,
    pub explanation: String,
    pub isolation: IsolationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum Interpretation {
    Provided(String),
    Unavailable(String),
}

impl Interpretation {
    pub fn display_text(&self) -> &str {
        match self {
            Interpretation::Provided(text) => text,
            Interpretation::Unavailable(_) => INTERPRETATION_UNAVAILABLE,
        }
    }

    pub fn is_provided(&self) -> bool {
        matches!(self, Interpretation::Provided(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Relative to the session directory.
    pub file_path: PathBuf,
    pub interpretation: Interpretation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub error: Option<ExecutionError>,
    pub artifacts: Vec<ArtifactRef>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub index: usize,
    pub analysis: CodeAnalysis,
    pub execution: Option<ExecutionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub index: usize,
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportModel {
    pub metadata: LabMetadata,
    pub entries: Vec<FileEntry>,
    pub skipped: Vec<SkippedFile>,
}

impl ReportModel {
    pub fn new(metadata: LabMetadata) -> Self {
        Self {
            metadata,
            entries: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn push_entry(&mut self, entry: FileEntry) {
        self.entries.push(entry);
    }

    pub fn push_skipped(&mut self, skipped: SkippedFile) {
        self.skipped.push(skipped);
    }

    pub fn artifact_count(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|e| e.execution.as_ref())
            .map(|x| x.artifacts.len())
            .sum()
    }
}

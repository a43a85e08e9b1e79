use crate::{
    collab::{mime_for_extension, Collaborator},
    config::Config,
    error::ExtractionError,
    postprocess,
    report::{Language, SourceFile},
    util::extension_of,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Notebook {
    cells: Vec<NotebookCell>,
}

#[derive(Debug, Deserialize)]
struct NotebookCell {
    #[serde(default)]
    cell_type: String,
    #[serde(default)]
    source: CellSource,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellSource {
    Lines(Vec<String>),
    Text(String),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    fn joined(&self) -> String {
        match self {
            CellSource::Lines(lines) => lines.concat(),
            CellSource::Text(text) => text.clone(),
        }
    }
}

/// Concatenates the code cells of a notebook document, in order, each
/// followed by a blank line. Markdown and raw cells are dropped.
pub fn notebook_code_from_str(raw: &str) -> Result<String, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("not valid JSON: {e}"))?;
    if value.get("cells").is_none() {
        return Err("'cells' not found".to_string());
    }
    let notebook: Notebook =
        serde_json::from_value(value).map_err(|e| format!("unexpected cell layout: {e}"))?;

    let mut code = String::new();
    for cell in notebook.cells.iter().filter(|c| c.cell_type == "code") {
        code.push_str(&cell.source.joined());
        code.push_str("\n\n");
    }
    Ok(code)
}

pub fn notebook_code(path: &Path) -> Result<String, ExtractionError> {
    let raw = read_utf8(path)?;
    notebook_code_from_str(&raw).map_err(|reason| ExtractionError::InvalidNotebook {
        path: path.to_path_buf(),
        reason,
    })
}

/// Reads the instruction document as plain text. Binary formats go to the
/// extraction collaborator; its failure yields empty text.
pub fn extract_instruction_text(
    cfg: &Config,
    collab: &dyn Collaborator,
    path: &Path,
) -> Result<String, ExtractionError> {
    check_size(path, cfg.limits.max_instruction_bytes)?;
    let ext = extension_of(path);

    let text = if ext == "ipynb" {
        notebook_code(path)?
    } else if cfg.extract.text_extensions.iter().any(|e| *e == ext) {
        read_utf8(path)?
    } else if cfg.extract.delegated_extensions.iter().any(|e| *e == ext) {
        let bytes = std::fs::read(path).map_err(|e| ExtractionError::io(path, e))?;
        match collab.extract_text(&bytes, mime_for_extension(&ext)) {
            Ok(text) => text,
            Err(err) => {
                warn!("text extraction failed for {}: {err}", path.display());
                String::new()
            }
        }
    } else {
        return Err(ExtractionError::Unsupported {
            path: path.to_path_buf(),
            ext,
        });
    };

    debug!("instruction text {} chars from {}", text.chars().count(), path.display());
    Ok(postprocess::normalize_extracted_text(cfg, &text))
}

/// Reads one submitted code file.
pub fn read_source_file(cfg: &Config, path: &Path) -> Result<SourceFile, ExtractionError> {
    check_size(path, cfg.limits.max_code_file_bytes)?;
    let ext = extension_of(path);

    let content = if ext == "ipynb" {
        notebook_code(path)?
    } else if cfg.extract.code_extensions.iter().any(|e| *e == ext) {
        read_utf8(path)?
    } else {
        return Err(ExtractionError::Unsupported {
            path: path.to_path_buf(),
            ext,
        });
    };

    Ok(SourceFile {
        path: path.to_path_buf(),
        language: Language::from_path(path),
        content,
    })
}

fn read_utf8(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractionError::io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|_| ExtractionError::Encoding {
        path: path.to_path_buf(),
    })?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn check_size(path: &Path, limit: u64) -> Result<(), ExtractionError> {
    let meta = std::fs::metadata(path).map_err(|e| ExtractionError::io(path, e))?;
    if limit > 0 && meta.len() > limit {
        return Err(ExtractionError::TooLarge {
            path: path.to_path_buf(),
            bytes: meta.len(),
            limit,
        });
    }
    Ok(())
}

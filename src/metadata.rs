use crate::{
    analyze::strip_code_fences,
    collab::Collaborator,
    config::Config,
    error::CollaboratorError,
    extract,
    report::LabMetadata,
};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Reads the instruction document and derives the lab metadata. Only an
/// unreadable document is an error; a failed or malformed collaborator
/// answer yields [`LabMetadata::fallback`].
pub fn extract_metadata(
    cfg: &Config,
    collab: &dyn Collaborator,
    instruction: &Path,
) -> Result<LabMetadata> {
    let text = extract::extract_instruction_text(cfg, collab, instruction)
        .with_context(|| format!("reading instruction document: {}", instruction.display()))?;
    Ok(metadata_from_text(collab, &text))
}

pub fn metadata_from_text(collab: &dyn Collaborator, text: &str) -> LabMetadata {
    let parsed = collab
        .extract_metadata(text)
        .and_then(|answer| parse_metadata_answer(&answer));
    match parsed {
        Ok(meta) => {
            info!(
                "lab metadata title={:?} objectives={} exercises={}",
                meta.title,
                meta.objectives.len(),
                meta.exercises.len()
            );
            meta
        }
        Err(err) => {
            warn!("metadata extraction failed, using defaults: {err}");
            LabMetadata::fallback()
        }
    }
}

/// Parses the collaborator's JSON answer, tolerating a fenced reply.
pub fn parse_metadata_answer(answer: &str) -> Result<LabMetadata, CollaboratorError> {
    let body = strip_code_fences(answer);
    let meta: LabMetadata = serde_json::from_str(body.trim())
        .map_err(|e| CollaboratorError::Malformed(format!("metadata JSON: {e}")))?;
    Ok(meta.normalized())
}

use crate::{collab::Collaborator, report::Interpretation};
use std::path::Path;
use tracing::warn;

/// Asks the vision collaborator to interpret one captured image. Never fails:
/// an unreadable file or a failed call becomes [`Interpretation::Unavailable`].
pub fn interpret_artifact(collab: &dyn Collaborator, path: &Path) -> Interpretation {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(err) => {
            warn!("reading artifact {}: {err}", path.display());
            return Interpretation::Unavailable(err.to_string());
        }
    };
    match collab.interpret_image(&bytes, "image/png") {
        Ok(text) if !text.trim().is_empty() => Interpretation::Provided(text),
        Ok(_) => Interpretation::Unavailable("empty interpretation".into()),
        Err(err) => {
            warn!("interpreting {}: {err}", path.display());
            Interpretation::Unavailable(err.to_string())
        }
    }
}

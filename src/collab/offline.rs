use super::Collaborator;
use crate::error::CollaboratorError;

/// Refuses every request so the pipeline takes each documented fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCollaborator;

impl Collaborator for OfflineCollaborator {
    fn extract_text(&self, _bytes: &[u8], _mime: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn extract_metadata(&self, _instruction_text: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn isolate_block(
        &self,
        _code: &str,
        _language: &str,
        _exercise: &str,
    ) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn explain(&self, _code: &str, _language: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn interpret_image(&self, _bytes: &[u8], _mime: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }
}

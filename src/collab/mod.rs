pub mod http;
pub mod offline;
pub mod types;

use crate::config::Config;
use crate::error::CollaboratorError;
use anyhow::Result;
use tracing::warn;

pub use http::ChatClient;
pub use offline::OfflineCollaborator;

/// The external reasoning services the pipeline delegates to. Every call may
/// fail; callers decide the fallback.
pub trait Collaborator {
    /// Text contained in a binary document or image.
    fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String, CollaboratorError>;
    /// Raw JSON answer with `title`, `objectives` and `exercises` keys.
    fn extract_metadata(&self, instruction_text: &str) -> Result<String, CollaboratorError>;
    /// The part of `code` relevant to `exercise`, possibly fenced.
    fn isolate_block(
        &self,
        code: &str,
        language: &str,
        exercise: &str,
    ) -> Result<String, CollaboratorError>;
    fn explain(&self, code: &str, language: &str) -> Result<String, CollaboratorError>;
    fn interpret_image(&self, bytes: &[u8], mime: &str) -> Result<String, CollaboratorError>;
}

impl<T: Collaborator + ?Sized> Collaborator for Box<T> {
    fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String, CollaboratorError> {
        (**self).extract_text(bytes, mime)
    }
    fn extract_metadata(&self, instruction_text: &str) -> Result<String, CollaboratorError> {
        (**self).extract_metadata(instruction_text)
    }
    fn isolate_block(
        &self,
        code: &str,
        language: &str,
        exercise: &str,
    ) -> Result<String, CollaboratorError> {
        (**self).isolate_block(code, language, exercise)
    }
    fn explain(&self, code: &str, language: &str) -> Result<String, CollaboratorError> {
        (**self).explain(code, language)
    }
    fn interpret_image(&self, bytes: &[u8], mime: &str) -> Result<String, CollaboratorError> {
        (**self).interpret_image(bytes, mime)
    }
}

/// Picks the HTTP client, or the offline stand-in when configured offline or
/// when no API key is available.
pub fn connect(cfg: &Config) -> Result<Box<dyn Collaborator>> {
    if cfg.global.offline_only {
        warn!("offline_only=true; all collaborator calls will use fallbacks");
        return Ok(Box::new(OfflineCollaborator));
    }
    match std::env::var(&cfg.collaborator.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(Box::new(ChatClient::new(cfg, key)?)),
        _ => {
            warn!(
                "{} is not set; running offline with fallback analysis",
                cfg.collaborator.api_key_env
            );
            Ok(Box::new(OfflineCollaborator))
        }
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

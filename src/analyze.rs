use crate::{
    collab::Collaborator,
    report::{CodeAnalysis, IsolationOutcome, Language},
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[^\n]*\n").expect("static regex"));
static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n```\s*$").expect("static regex"));

/// Removes a leading ```lang line and a trailing ``` line, if present.
pub fn strip_code_fences(answer: &str) -> &str {
    let start = OPENING_FENCE.find(answer).map(|m| m.end()).unwrap_or(0);
    let rest = &answer[start..];
    let end = CLOSING_FENCE.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    &rest[..end]
}

/// Isolates the block relevant to `exercise` (if any) and explains it.
/// Neither phase can abort the other: a failed isolation falls back to the
/// full source, a failed explanation becomes an error-describing string.
pub fn analyze(
    collab: &dyn Collaborator,
    filename: &str,
    code: &str,
    language: Language,
    exercise: Option<&str>,
) -> CodeAnalysis {
    let (isolated_block, isolation) = match exercise {
        None => (code.to_string(), IsolationOutcome::NotRequested),
        Some(label) => match collab.isolate_block(code, language.tag(), label) {
            Ok(answer) => {
                let block = strip_code_fences(&answer);
                if block.trim().is_empty() {
                    warn!("{filename}: isolation for {label:?} returned nothing; using full source");
                    (
                        code.to_string(),
                        IsolationOutcome::Fallback("empty isolation answer".into()),
                    )
                } else {
                    debug!("{filename}: isolated {} chars for {label:?}", block.len());
                    (block.to_string(), IsolationOutcome::Isolated)
                }
            }
            Err(err) => {
                warn!("{filename}: isolation for {label:?} failed: {err}");
                (code.to_string(), IsolationOutcome::Fallback(err.to_string()))
            }
        },
    };

    let explanation = match collab.explain(&isolated_block, language.tag()) {
        Ok(text) => text,
        Err(err) => {
            warn!("{filename}: explanation failed: {err}");
            format!("Error analyzing code: {err}")
        }
    };

    CodeAnalysis {
        filename: filename.to_string(),
        language,
        full_code: code.to_string(),
        isolated_block,
        explanation,
        isolation,
    }
}

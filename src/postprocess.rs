use crate::config::Config;
use unicode_normalization::UnicodeNormalization;

/// Cleans text that came back from document extraction before it is handed
/// to metadata extraction.
pub fn normalize_extracted_text(cfg: &Config, raw: &str) -> String {
    let mut text = raw.strip_prefix('\u{feff}').unwrap_or(raw).to_string();

    if cfg.postprocess.normalize_newlines {
        text = text.replace("\r\n", "\n").replace('\r', "\n");
    }

    if cfg.postprocess.normalize_unicode {
        text = text.nfkc().collect::<String>();
    }

    text = sanitize_control_chars(&text, &cfg.postprocess.control_chars_to_sanitize);

    if cfg.postprocess.trim_trailing_whitespace {
        text = text
            .lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
    }

    text
}

fn sanitize_control_chars(s: &str, codes: &[u8]) -> String {
    if codes.is_empty() {
        return s.to_string();
    }

    let mut mask = [false; 128];
    for &code in codes {
        if (code as usize) < mask.len() {
            mask[code as usize] = true;
        }
    }

    s.chars()
        .filter(|&ch| {
            // Structural whitespace always survives.
            if ch == '\n' || ch == '\r' || ch == '\t' {
                return true;
            }
            let cp = ch as u32;
            if cp < 128 {
                !mask[cp as usize]
            } else {
                !ch.is_control()
            }
        })
        .collect()
}

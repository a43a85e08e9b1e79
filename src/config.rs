use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub extract: Extract,
    #[serde(default)]
    pub runner: Runner,
    #[serde(default)]
    pub collaborator: Collaborator,
    #[serde(default)]
    pub postprocess: Postprocess,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub offline_only: bool,
    pub reuse_session_dir: bool,
    pub max_parallel_files: usize,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            offline_only: false,
            reuse_session_dir: true,
            max_parallel_files: 1,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub out_dir: String,
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            work_dir: ".lab-report-work".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub exec_timeout_seconds: u64,
    pub max_instruction_bytes: u64,
    pub max_code_file_bytes: u64,
    pub max_code_files: usize,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            exec_timeout_seconds: 30,
            max_instruction_bytes: 16 * 1024 * 1024,
            max_code_file_bytes: 16 * 1024 * 1024,
            max_code_files: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Extract {
    /// Extensions read directly as UTF-8 text.
    pub text_extensions: Vec<String>,
    /// Extensions handed whole to the extraction collaborator.
    pub delegated_extensions: Vec<String>,
    /// Extensions accepted as submitted code (notebooks are always accepted).
    pub code_extensions: Vec<String>,
}
impl Default for Extract {
    fn default() -> Self {
        Self {
            text_extensions: vec!["txt".into(), "md".into()],
            delegated_extensions: vec!["pdf".into(), "png".into(), "jpg".into(), "jpeg".into()],
            code_extensions: vec![
                "py".into(),
                "java".into(),
                "c".into(),
                "h".into(),
                "txt".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Runner {
    pub python_exe: String,
    pub shim_filename: String,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    pub doctor_timeout_seconds: u64,
}
impl Default for Runner {
    fn default() -> Self {
        Self {
            python_exe: "auto".into(),
            shim_filename: "_lab_report_shim.py".into(),
            env: Default::default(),
            doctor_timeout_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Collaborator {
    pub api_url: String,
    pub api_key_env: String,
    pub chat_model: String,
    pub coder_model: String,
    pub vision_model: String,
    pub request_timeout_seconds: u64,
}
impl Default for Collaborator {
    fn default() -> Self {
        Self {
            api_url: "https://api.deepseek.com/v1/chat/completions".into(),
            api_key_env: "DEEPSEEK_API_KEY".into(),
            chat_model: "deepseek-chat".into(),
            coder_model: "deepseek-coder".into(),
            vision_model: "deepseek-vision".into(),
            request_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Postprocess {
    pub normalize_unicode: bool,
    pub normalize_newlines: bool,
    pub trim_trailing_whitespace: bool,
    pub control_chars_to_sanitize: Vec<u8>,
}
impl Default for Postprocess {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            normalize_newlines: true,
            trim_trailing_whitespace: true,
            // C0 controls except tab/newline/carriage return, plus DEL.
            control_chars_to_sanitize: (0u8..32)
                .filter(|c| !matches!(*c, 9 | 10 | 13))
                .chain(std::iter::once(127))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub markdown_filename: String,
    pub html_filename: String,
    pub pdf_filename: String,
    pub report_filename: String,
    pub artifacts_subdir: String,
    pub write_report_json: bool,
    pub write_index_json: bool,
    pub code_display_chars: usize,
    pub stdout_display_chars: usize,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            markdown_filename: "lab_report.md".into(),
            html_filename: "lab_report.html".into(),
            pdf_filename: "lab_report.pdf".into(),
            report_filename: "report.json".into(),
            artifacts_subdir: "artifacts".into(),
            write_report_json: true,
            write_index_json: true,
            code_display_chars: 1000,
            stdout_display_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Render {
    pub write_html: bool,
    pub pdf_enabled: bool,
    pub pdf_command: String,
    #[serde(default)]
    pub pdf_args: Vec<String>,
    pub timeout_seconds: u64,
}
impl Default for Render {
    fn default() -> Self {
        Self {
            write_html: true,
            pdf_enabled: true,
            pdf_command: "wkhtmltopdf".into(),
            pdf_args: vec!["--enable-local-file-access".into(), "--quiet".into()],
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_runner_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_runner_stderr: true,
            dump_effective_config: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub reject_url_inputs: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
        }
    }
}

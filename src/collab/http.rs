use super::{
    types::{ChatMessage, ChatRequest, ChatResponse},
    Collaborator,
};
use crate::config::{self, Config};
use crate::error::CollaboratorError;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::time::Duration;
use tracing::debug;

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct ChatClient {
    cfg: config::Collaborator,
    api_key: String,
    http: reqwest::blocking::Client,
}

impl ChatClient {
    pub fn new(cfg: &Config, api_key: String) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.collaborator.request_timeout_seconds))
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self {
            cfg: cfg.collaborator.clone(),
            api_key,
            http,
        })
    }

    fn complete(&self, req: &ChatRequest) -> Result<String, CollaboratorError> {
        debug!(model = %req.model, url = %self.cfg.api_url, "collaborator request");
        let resp = self
            .http
            .post(&self.cfg.api_url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body: body.chars().take(400).collect(),
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| CollaboratorError::Malformed(e.to_string()))?;
        parsed
            .first_content()
            .ok_or_else(|| CollaboratorError::Malformed("response has no message content".into()))
    }
}

fn data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

impl Collaborator for ChatClient {
    fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String, CollaboratorError> {
        self.complete(&ChatRequest {
            model: self.cfg.vision_model.clone(),
            messages: vec![
                ChatMessage::system(
                    "You are a helpful assistant that extracts text from images and documents.",
                ),
                ChatMessage::user_with_attachment(
                    "Extract all the text from this document.",
                    data_url(bytes, mime),
                ),
            ],
        })
    }

    fn extract_metadata(&self, instruction_text: &str) -> Result<String, CollaboratorError> {
        self.complete(&ChatRequest {
            model: self.cfg.chat_model.clone(),
            messages: vec![
                ChatMessage::system(
                    "You are a helpful assistant that extracts information from lab instructions.",
                ),
                ChatMessage::user(format!(
                    "Extract the lab title, objectives, and exercise titles from the following text. \
                     Format your response as JSON with keys 'title', 'objectives' (as a list), and \
                     'exercises' (as a list of exercise titles):\n\n{instruction_text}"
                )),
            ],
        })
    }

    fn isolate_block(
        &self,
        code: &str,
        language: &str,
        exercise: &str,
    ) -> Result<String, CollaboratorError> {
        self.complete(&ChatRequest {
            model: self.cfg.coder_model.clone(),
            messages: vec![
                ChatMessage::system("You are a helpful programming assistant."),
                ChatMessage::user(format!(
                    "Extract the code block that corresponds to '{exercise}' from the following \
                     {language} code. Return ONLY the extracted code, nothing else. If you can't \
                     identify a specific block, return a representative portion of the code that \
                     would be most relevant to this exercise:\n\n```{language}\n{code}\n```"
                )),
            ],
        })
    }

    fn explain(&self, code: &str, language: &str) -> Result<String, CollaboratorError> {
        self.complete(&ChatRequest {
            model: self.cfg.coder_model.clone(),
            messages: vec![
                ChatMessage::system("You are a helpful programming assistant."),
                ChatMessage::user(format!(
                    "Analyze the following {language} code and provide a detailed explanation of \
                     what it does, its structure, and any notable algorithms or techniques \
                     used:\n\n```{language}\n{code}\n```"
                )),
            ],
        })
    }

    fn interpret_image(&self, bytes: &[u8], mime: &str) -> Result<String, CollaboratorError> {
        self.complete(&ChatRequest {
            model: self.cfg.vision_model.clone(),
            messages: vec![
                ChatMessage::system(
                    "You are a scientific data analyst specializing in interpreting plots and \
                     visualizations.",
                ),
                ChatMessage::user_with_attachment(
                    "Provide a detailed scientific interpretation of this plot. Describe what it \
                     shows, the trends or patterns visible, and what scientific conclusions might \
                     be drawn from it. Be specific and technical in your analysis.",
                    data_url(bytes, mime),
                ),
            ],
        })
    }
}

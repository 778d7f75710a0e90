//! Analysis service: turns an uploaded resume plus instructions into structured feedback.
//!
//! The orchestrator only sees the `AnalysisService` trait. The production
//! backend extracts the PDF text and submits it through `LlmClient`.

pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::analysis::prompts::REVIEW_SYSTEM;
use crate::llm_client::{ContentBlock, LlmClient, LlmError};
use crate::models::resume::BlobRef;
use crate::stores::{BlobStore, StoreError};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("could not read document: {0}")]
    Document(#[from] StoreError),

    #[error("could not extract document text: {0}")]
    Extraction(String),

    #[error("inference call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("reply had no text content")]
    EmptyReply,

    #[error("reply is not a JSON object: {0}")]
    Malformed(String),
}

/// Reply content arrives either as a plain string or as a list of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReply {
    pub content: ReplyContent,
}

impl AnalysisReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: ReplyContent::Text(text.into()),
        }
    }

    pub fn blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            content: ReplyContent::Blocks(blocks),
        }
    }

    /// Normalizes both reply shapes to the feedback text. For block replies the
    /// first block carries the payload.
    pub fn feedback_text(&self) -> Result<&str, AnalysisError> {
        let text = match &self.content {
            ReplyContent::Text(text) => Some(text.as_str()),
            ReplyContent::Blocks(blocks) => blocks.first().and_then(|b| b.text.as_deref()),
        };
        text.filter(|t| !t.trim().is_empty())
            .ok_or(AnalysisError::EmptyReply)
    }
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(
        &self,
        document: &BlobRef,
        instructions: &str,
    ) -> Result<AnalysisReply, AnalysisError>;
}

/// Parses feedback text into the structured object persisted on the record.
/// Markdown code fences around the JSON are tolerated.
pub fn parse_feedback(text: &str) -> Result<Map<String, Value>, AnalysisError> {
    match serde_json::from_str::<Value>(strip_json_fences(text)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AnalysisError::Malformed(format!(
            "expected an object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(AnalysisError::Malformed(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    stripped
        .trim_start()
        .strip_suffix("```")
        .map(str::trim)
        .unwrap_or(stripped.trim_start())
}

/// Production analysis backend: PDF text extraction followed by one LLM call.
pub struct LlmAnalysisService {
    llm: LlmClient,
    blobs: Arc<dyn BlobStore>,
}

impl LlmAnalysisService {
    pub fn new(llm: LlmClient, blobs: Arc<dyn BlobStore>) -> Self {
        Self { llm, blobs }
    }
}

#[async_trait]
impl AnalysisService for LlmAnalysisService {
    async fn analyze(
        &self,
        document: &BlobRef,
        instructions: &str,
    ) -> Result<AnalysisReply, AnalysisError> {
        let bytes = self.blobs.read(document).await?;

        // pdf-extract is CPU-bound and synchronous.
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| AnalysisError::Extraction(e.to_string()))?
        .map_err(AnalysisError::Extraction)?;
        debug!("Extracted {} chars from {document}", text.len());

        let prompt = prompts::review_prompt(&text, instructions);
        let response = self.llm.call(&prompt, REVIEW_SYSTEM).await?;
        Ok(AnalysisReply::blocks(response.content))
    }
}

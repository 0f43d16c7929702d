use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GeminiConfig;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("vision request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("vision service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("vision service returned no text")]
    EmptyResponse,
}

/// Image-to-text collaborator producing the free-form nutrition report.
#[async_trait]
pub trait ReportAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        prompt: &str,
        image: Bytes,
        mime_type: &str,
    ) -> Result<String, VisionError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            cfg.base_url.trim_end_matches('/'),
            cfg.model
        );
        Ok(Self {
            http,
            endpoint,
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl ReportAnalyzer for GeminiClient {
    async fn analyze(
        &self,
        prompt: &str,
        image: Bytes,
        mime_type: &str,
    ) -> Result<String, VisionError> {
        let body = request_body(prompt, &image, mime_type);
        debug!(endpoint = %self.endpoint, image_bytes = image.len(), %mime_type, "calling vision service");

        let res = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "vision service error");
            return Err(VisionError::Status { status, body });
        }

        let parsed: GenerateResponse = res.json().await?;
        response_text(parsed).ok_or(VisionError::EmptyResponse)
    }
}

// ---- generateContent wire types ----

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Default, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: Option<String>,
}

fn request_body<'a>(prompt: &'a str, image: &[u8], mime_type: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text { text: prompt },
                Part::Inline {
                    inline_data: InlineData {
                        mime_type,
                        data: STANDARD.encode(image),
                    },
                },
            ],
        }],
    }
}

/// Text parts of the first candidate, joined. `None` when there is no text.
fn response_text(res: GenerateResponse) -> Option<String> {
    let text: String = res
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

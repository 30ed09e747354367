use crate::adapters::ensure_success;
use crate::config::GeminiConfig;
use crate::core::prompts::{greenery_prompt, metadata_turn, recommendation_prompt};
use crate::core::text::clean_json_response;
use crate::domain::model::{GreeneryReport, InlineImage, WardMetadata};
use crate::domain::ports::{GreeneryAnalyst, RecommendationRequest};
use crate::utils::error::{GreenwardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SERVICE: &str = "Gemini";

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: String },
    InlineData { inline_data: &'a InlineImage },
}

fn user_turn(part: Part<'_>) -> Content<'_> {
    Content {
        role: "user",
        parts: vec![part],
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl Candidate {
    fn parts(&self) -> &[ResponsePart] {
        self.content.as_ref().map(|c| c.parts.as_slice()).unwrap_or(&[])
    }
}

impl GenerateContentResponse {
    /// The answer text: the first candidate's joined parts, else the first
    /// non-blank part of any candidate.
    fn extract_text(&self) -> Result<String> {
        if let Some(first) = self.candidates.first() {
            let joined: String = first
                .parts()
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect();
            if !joined.trim().is_empty() {
                return Ok(joined);
            }
        }

        let fallback = self
            .candidates
            .iter()
            .flat_map(Candidate::parts)
            .filter_map(|p| p.text.as_deref())
            .find(|text| !text.trim().is_empty());
        if let Some(text) = fallback {
            return Ok(text.to_string());
        }

        let feedback = self
            .prompt_feedback
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "none".to_string());
        Err(GreenwardError::invalid_ai_response(format!(
            "Gemini returned no usable text (feedback={})",
            feedback
        )))
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate(&self, contents: Vec<Content<'_>>) -> Result<String> {
        tracing::debug!(model = %self.config.model, turns = contents.len(), "Calling Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&GenerateContentRequest { contents })
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;

        let body: GenerateContentResponse = response.json().await?;
        body.extract_text()
    }
}

#[async_trait]
impl GreeneryAnalyst for GeminiClient {
    async fn assess_greenery(
        &self,
        image: Option<&InlineImage>,
        metadata: &WardMetadata,
    ) -> Result<GreeneryReport> {
        let mut contents = vec![user_turn(Part::Text {
            text: greenery_prompt(image.is_some()),
        })];
        if let Some(image) = image {
            contents.push(user_turn(Part::InlineData { inline_data: image }));
        }
        contents.push(user_turn(Part::Text {
            text: metadata_turn(metadata),
        }));

        let text = self.generate(contents).await?;
        clean_json_response(&text)
    }

    async fn recommend_construction(&self, request: RecommendationRequest<'_>) -> Result<String> {
        let contents = vec![user_turn(Part::Text {
            text: recommendation_prompt(&request),
        })];
        let text = self.generate(contents).await?;
        Ok(text.trim().to_string())
    }
}

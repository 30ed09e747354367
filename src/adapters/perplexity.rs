use crate::adapters::ensure_success;
use crate::config::PerplexityConfig;
use crate::core::prompts::{tree_prompt, TREE_SYSTEM_PROMPT};
use crate::core::text::parse_numbered_list;
use crate::domain::model::WardMetadata;
use crate::domain::ports::TreeAdvisor;
use crate::utils::error::{GreenwardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "Perplexity";
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 400;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Chat-completions client used for native tree suggestions.
#[derive(Debug, Clone)]
pub struct PerplexityClient {
    client: Client,
    config: PerplexityConfig,
}

impl PerplexityClient {
    pub fn new(config: PerplexityConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TreeAdvisor for PerplexityClient {
    async fn suggest_trees(&self, metadata: &WardMetadata) -> Result<Vec<String>> {
        let request = ChatRequest {
            model: &self.config.model,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: TREE_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: tree_prompt(metadata),
                },
            ],
        };

        tracing::debug!(model = %self.config.model, "Requesting tree suggestions");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GreenwardError::invalid_ai_response("Perplexity returned no choices."))?;

        let trees = parse_numbered_list(&content);
        tracing::debug!(count = trees.len(), "Tree suggestions parsed");
        Ok(trees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body() {
        let request = ChatRequest {
            model: "sonar-pro",
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            messages: vec![ChatMessage {
                role: "system".to_string(),
                content: TREE_SYSTEM_PROMPT.to_string(),
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], json!("sonar-pro"));
        assert_eq!(value["max_tokens"], json!(400));
        assert!((value["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(
            value["messages"][0],
            json!({"role": "system", "content": "You recommend trees indigenous to Delhi."})
        );
    }

    #[test]
    fn test_response_without_choices_parses() {
        let response: ChatResponse = serde_json::from_value(json!({"id": "x"})).unwrap();
        assert!(response.choices.is_empty());
    }
}

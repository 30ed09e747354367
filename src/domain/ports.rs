use crate::domain::model::{GreeneryReport, InlineImage, WardMetadata};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Inputs to a construction siting recommendation.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationRequest<'a> {
    pub construction_type: &'a str,
    pub metadata: &'a WardMetadata,
    pub greenery: &'a GreeneryReport,
    pub trees: &'a [String],
}

/// Multimodal model that judges vegetation and gives planning advice.
#[async_trait]
pub trait GreeneryAnalyst: Send + Sync {
    async fn assess_greenery(
        &self,
        image: Option<&InlineImage>,
        metadata: &WardMetadata,
    ) -> Result<GreeneryReport>;

    async fn recommend_construction(&self, request: RecommendationRequest<'_>) -> Result<String>;
}

/// Search-augmented model that proposes native tree species.
#[async_trait]
pub trait TreeAdvisor: Send + Sync {
    async fn suggest_trees(&self, metadata: &WardMetadata) -> Result<Vec<String>>;
}

/// Source of satellite imagery for a ward.
#[async_trait]
pub trait MapImagery: Send + Sync {
    async fn fetch_satellite_image(&self, metadata: &WardMetadata) -> Result<Vec<u8>>;
}

/// Keeps analysis images addressable by an opaque token.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save(&self, bytes: &[u8], mime_type: &str) -> Result<String>;
    async fn load(&self, token: &str) -> Result<Vec<u8>>;
    /// Best effort; failures are only logged.
    async fn delete(&self, token: &str);
}

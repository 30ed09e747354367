use crate::domain::model::{AnalysisRecord, InlineImage, UploadedImage, WardMetadata};
use crate::domain::ports::{
    GreeneryAnalyst, ImageStore, MapImagery, RecommendationRequest, TreeAdvisor,
};
use crate::utils::error::{GreenwardError, Result};
use chrono::Utc;
use std::sync::Arc;

pub const METADATA_REQUIRED: &str = "Ward metadata is required for analysis.";
pub const PREVIEW_UNAVAILABLE: &str =
    "Satellite preview unavailable; proceeding with metadata-only analysis.";

/// The image that accompanies an analysis, already persisted.
struct PreparedImage {
    inline: InlineImage,
    token: String,
    mime_type: String,
}

/// Runs a ward through the vision model, the tree advisor and, when needed,
/// the static map provider.
pub struct AnalysisService {
    analyst: Arc<dyn GreeneryAnalyst>,
    trees: Arc<dyn TreeAdvisor>,
    imagery: Arc<dyn MapImagery>,
    images: Arc<dyn ImageStore>,
}

impl AnalysisService {
    pub fn new(
        analyst: Arc<dyn GreeneryAnalyst>,
        trees: Arc<dyn TreeAdvisor>,
        imagery: Arc<dyn MapImagery>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            analyst,
            trees,
            imagery,
            images,
        }
    }

    pub fn images(&self) -> &Arc<dyn ImageStore> {
        &self.images
    }

    async fn store_image(&self, bytes: &[u8], mime_type: &str) -> Result<PreparedImage> {
        let token = self.images.save(bytes, mime_type).await?;
        Ok(PreparedImage {
            inline: InlineImage::from_bytes(bytes, mime_type),
            token,
            mime_type: mime_type.to_string(),
        })
    }

    pub async fn analyze(
        &self,
        metadata: WardMetadata,
        upload: Option<UploadedImage>,
    ) -> Result<AnalysisRecord> {
        let mut image_error = None;

        tracing::info!(
            ward_name = metadata.ward_name().as_deref().unwrap_or("-"),
            ward_number = metadata.ward_number().as_deref().unwrap_or("-"),
            district = metadata.district_name().as_deref().unwrap_or("-"),
            has_coordinates = metadata.has_coordinates(),
            has_geojson = metadata.ward_geojson().is_some(),
            "Metadata parsed"
        );

        let image = match upload {
            Some(upload) => {
                tracing::debug!(
                    filename = %upload.filename,
                    bytes = upload.bytes.len(),
                    "Using uploaded satellite image"
                );
                Some(self.store_image(&upload.bytes, upload.mime_type()).await?)
            }
            None if metadata.is_empty() => {
                return Err(GreenwardError::validation(METADATA_REQUIRED));
            }
            None => match self.imagery.fetch_satellite_image(&metadata).await {
                Ok(bytes) => Some(self.store_image(&bytes, "image/png").await?),
                Err(e) => {
                    tracing::warn!("Static map generation failed: {}", e);
                    image_error = Some(PREVIEW_UNAVAILABLE.to_string());
                    None
                }
            },
        };

        let metadata_for_ai = metadata.for_ai();

        let greenery = match self
            .analyst
            .assess_greenery(image.as_ref().map(|i| &i.inline), &metadata_for_ai)
            .await
        {
            Ok(greenery) => greenery,
            Err(e) => {
                tracing::error!(
                    category = ?e.category(),
                    "Greenery analysis failed: {}",
                    e
                );
                if let Some(image) = &image {
                    self.images.delete(&image.token).await;
                }
                return Err(e);
            }
        };

        let trees = match self.trees.suggest_trees(&metadata_for_ai).await {
            Ok(trees) => trees,
            // transport and status failures included; the page still renders
            Err(e) => {
                tracing::warn!("Tree suggestion service failed: {}", e);
                vec![format!("Tree suggestion service failed: {}", e)]
            }
        };

        tracing::info!(
            ward = metadata.ward_name().as_deref().unwrap_or("unknown"),
            score = ?greenery.greenery_score,
            trees = trees.len(),
            has_image = image.is_some(),
            "Ward analysis completed"
        );

        let (image_token, image_mime) = match image {
            Some(image) => (Some(image.token), Some(image.mime_type)),
            None => (None, None),
        };

        Ok(AnalysisRecord {
            metadata: metadata.sanitized(),
            greenery,
            trees,
            recommendations: None,
            recommendations_html: None,
            construction_type: None,
            image_token,
            image_mime,
            image_error,
            created_at: Utc::now(),
        })
    }

    pub async fn recommend(&self, record: &AnalysisRecord, construction_type: &str) -> Result<String> {
        let construction_type = construction_type.trim();
        if construction_type.is_empty() {
            return Err(GreenwardError::validation(
                "Tell us what type of construction you're planning.",
            ));
        }

        tracing::info!(construction_type, "Generating construction recommendations");
        self.analyst
            .recommend_construction(RecommendationRequest {
                construction_type,
                metadata: &record.metadata,
                greenery: &record.greenery,
                trees: &record.trees,
            })
            .await
    }
}

use crate::adapters::ensure_success;
use crate::config::MapsConfig;
use crate::core::geo::{build_static_map_path, choose_zoom};
use crate::domain::model::WardMetadata;
use crate::domain::ports::MapImagery;
use crate::utils::error::{GreenwardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

const SERVICE: &str = "Google Static Maps";
const MIN_EXPECTED_IMAGE_BYTES: usize = 5000;
const URL_PREVIEW_CHARS: usize = 200;

/// Satellite snapshots of a ward from the Google Static Maps API.
#[derive(Debug, Clone)]
pub struct StaticMapClient {
    client: Client,
    config: MapsConfig,
}

impl StaticMapClient {
    pub fn new(config: MapsConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    /// Query parameters for the snapshot, in request order.
    fn query_params(&self, metadata: &WardMetadata) -> Result<Vec<(&'static str, String)>> {
        let api_key = self
            .config
            .api_key()
            .ok_or_else(|| GreenwardError::config("GOOGLE_MAPS_API_KEY is not configured."))?;
        let center = metadata.center().ok_or_else(|| {
            GreenwardError::validation(
                "Ward center coordinates are required for static map generation.",
            )
        })?;

        let mut params = vec![
            ("key", api_key.to_string()),
            ("center", format!("{},{}", center.lat, center.lng)),
            ("zoom", choose_zoom(metadata).to_string()),
            ("size", "640x640".to_string()),
            ("maptype", "satellite".to_string()),
            ("scale", "2".to_string()),
            ("format", "png".to_string()),
        ];
        if let Some(path) = metadata.ward_geojson().and_then(build_static_map_path) {
            params.push(("path", path));
        }
        Ok(params)
    }
}

/// The request URL with the API key masked, cut to a loggable length.
fn redacted_preview(base: &str, params: &[(&'static str, String)]) -> (usize, String) {
    let full_len = Url::parse_with_params(base, params)
        .map(|u| u.as_str().len())
        .unwrap_or_default();
    let masked = params.iter().map(|(k, v)| {
        let value = if *k == "key" { "REDACTED" } else { v.as_str() };
        (*k, value)
    });
    let preview = match Url::parse_with_params(base, masked) {
        Ok(url) => url.to_string(),
        Err(_) => base.to_string(),
    };

    let preview = if preview.chars().count() > URL_PREVIEW_CHARS {
        format!("{}...", preview.chars().take(URL_PREVIEW_CHARS).collect::<String>())
    } else {
        preview
    };
    (full_len, preview)
}

#[async_trait]
impl MapImagery for StaticMapClient {
    async fn fetch_satellite_image(&self, metadata: &WardMetadata) -> Result<Vec<u8>> {
        let params = self.query_params(metadata)?;

        let (url_length, url_preview) = redacted_preview(&self.config.static_map_url, &params);
        let param = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
                .unwrap_or_default()
        };
        tracing::info!(
            center = param("center"),
            zoom = param("zoom"),
            has_boundary = params.iter().any(|(k, _)| *k == "path"),
            url_length,
            url_preview = %url_preview,
            "Fetching static satellite map"
        );

        let response = self
            .client
            .get(&self.config.static_map_url)
            .query(&params)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        tracing::info!(bytes = bytes.len(), content_type = %content_type, "Static map received");
        if bytes.len() < MIN_EXPECTED_IMAGE_BYTES {
            tracing::warn!(
                bytes = bytes.len(),
                "Static map image seems too small; it may contain an error message"
            );
        }
        Ok(bytes)
    }
}

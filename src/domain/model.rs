use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// Keys that only matter to the map frontend and the static map request.
const LOCATION_KEYS: [&str; 3] = ["ward_geojson", "coordinates", "map_view"];

/// Free-form ward metadata as posted by the map frontend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WardMetadata(Map<String, Value>);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A corner whose components may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialLatLng {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub southwest: PartialLatLng,
    pub northeast: PartialLatLng,
}

impl BoundingBox {
    /// Degrees spanned as (lat, lng) when every corner value is present and non-zero.
    pub fn span(&self) -> Option<(f64, f64)> {
        let nonzero = |v: Option<f64>| v.filter(|x| *x != 0.0);
        let sw_lat = nonzero(self.southwest.lat)?;
        let sw_lng = nonzero(self.southwest.lng)?;
        let ne_lat = nonzero(self.northeast.lat)?;
        let ne_lng = nonzero(self.northeast.lng)?;
        Some(((ne_lat - sw_lat).abs(), (ne_lng - sw_lng).abs()))
    }
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn partial_lat_lng(obj: Option<&Map<String, Value>>) -> PartialLatLng {
    PartialLatLng {
        lat: obj.and_then(|o| o.get("lat")).and_then(number),
        lng: obj.and_then(|o| o.get("lng")).and_then(number),
    }
}

impl WardMetadata {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Accepts only JSON objects; `null` becomes empty metadata.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Null => Some(Self::default()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// A scalar field rendered as text, for log lines and page headings.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn ward_name(&self) -> Option<String> {
        self.text("wardName")
    }

    pub fn ward_number(&self) -> Option<String> {
        self.text("wardNumber")
    }

    pub fn district_name(&self) -> Option<String> {
        self.text("districtName")
    }

    fn coordinates_field(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0
            .get("coordinates")?
            .as_object()?
            .get(name)?
            .as_object()
            .filter(|obj| !obj.is_empty())
    }

    pub fn has_coordinates(&self) -> bool {
        self.0
            .get("coordinates")
            .and_then(Value::as_object)
            .is_some_and(|obj| !obj.is_empty())
    }

    /// The ward center; both components are required.
    pub fn center(&self) -> Option<LatLng> {
        let center = self.coordinates_field("center")?;
        Some(LatLng {
            lat: number(center.get("lat")?)?,
            lng: number(center.get("lng")?)?,
        })
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let bbox = self.coordinates_field("bounding_box")?;
        Some(BoundingBox {
            southwest: partial_lat_lng(bbox.get("southwest").and_then(Value::as_object)),
            northeast: partial_lat_lng(bbox.get("northeast").and_then(Value::as_object)),
        })
    }

    fn map_view(&self) -> Option<&Map<String, Value>> {
        self.0
            .get("map_view")?
            .as_object()
            .filter(|obj| !obj.is_empty())
    }

    /// Zoom level the user was looking at in the map frontend.
    pub fn map_zoom(&self) -> Option<f64> {
        self.map_view()?.get("zoom").and_then(number)
    }

    pub fn ward_geojson(&self) -> Option<&Value> {
        self.0.get("ward_geojson").filter(|v| !v.is_null())
    }

    /// Metadata without the bulky location payloads.
    pub fn sanitized(&self) -> Self {
        let mut map = self.0.clone();
        for key in LOCATION_KEYS {
            map.remove(key);
        }
        Self(map)
    }

    /// Metadata as sent to the AI models: sanitized, with a compact, rounded
    /// summary of the location.
    pub fn for_ai(&self) -> Self {
        let mut trimmed = self.sanitized();

        if let Some(center) = self.coordinates_field("center") {
            let center = partial_lat_lng(Some(center));
            trimmed.0.insert(
                "center_point".to_string(),
                json!({
                    "lat": round6(center.lat.unwrap_or(0.0)),
                    "lng": round6(center.lng.unwrap_or(0.0)),
                }),
            );
        }

        if let Some(bbox) = self.bounding_box() {
            let corner = |c: PartialLatLng| {
                json!({
                    "lat": round6(c.lat.unwrap_or(0.0)),
                    "lng": round6(c.lng.unwrap_or(0.0)),
                })
            };
            trimmed.0.insert(
                "bounding_box".to_string(),
                json!({
                    "southwest": corner(bbox.southwest),
                    "northeast": corner(bbox.northeast),
                }),
            );
        }

        if let Some(view) = self.map_view() {
            trimmed.0.insert(
                "map_zoom".to_string(),
                view.get("zoom").cloned().unwrap_or(Value::Null),
            );
        }

        trimmed
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.to_json())
    }
}

/// Structured greenery assessment returned by the vision model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GreeneryReport {
    #[serde(default, deserialize_with = "deserialize_score")]
    pub greenery_score: Option<f64>,
    #[serde(default)]
    pub greenery_summary: Option<String>,
    #[serde(default)]
    pub population_context: Option<String>,
    #[serde(default, deserialize_with = "deserialize_observations")]
    pub observations: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GreeneryReport {
    pub fn score_label(&self) -> Option<String> {
        self.greenery_score.map(|score| {
            if score.fract() == 0.0 {
                format!("{:.0}", score)
            } else {
                format!("{:.1}", score)
            }
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// Models sometimes quote the score; anything numeric is clamped to 0..=100.
fn deserialize_score<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let score = match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 100.0)))
}

fn deserialize_observations<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let as_text = |v: Value| match v {
        Value::String(s) => s,
        other => other.to_string(),
    };
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .map(as_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        other => vec![as_text(other)],
    })
}

/// Base64 image part for a multimodal prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }
}

/// An image file posted by the user.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// MIME type guessed from the file extension, defaulting to PNG.
    pub fn mime_type(&self) -> &'static str {
        let extension = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        mime_for_extension(&extension)
    }
}

pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Everything remembered about the latest analysis of a browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub metadata: WardMetadata,
    pub greenery: GreeneryReport,
    pub trees: Vec<String>,
    pub recommendations: Option<String>,
    pub recommendations_html: Option<String>,
    pub construction_type: Option<String>,
    pub image_token: Option<String>,
    pub image_mime: Option<String>,
    pub image_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> WardMetadata {
        WardMetadata::from_value(json!({
            "wardName": "Chandni Chowk",
            "wardNumber": 81,
            "districtName": "Central",
            "population": 52000,
            "coordinates": {
                "center": {"lat": 28.65061234567, "lng": 77.23012345678},
                "bounding_box": {
                    "southwest": {"lat": 28.6401, "lng": 77.2201},
                    "northeast": {"lat": 28.6601, "lng": 77.2401}
                }
            },
            "map_view": {"zoom": 14, "mapTypeId": "satellite"},
            "ward_geojson": {"type": "Feature", "geometry": null}
        }))
        .unwrap()
    }

    #[test]
    fn test_sanitized_drops_location_keys() {
        let sanitized = sample_metadata().sanitized();
        assert!(sanitized.get("coordinates").is_none());
        assert!(sanitized.get("map_view").is_none());
        assert!(sanitized.get("ward_geojson").is_none());
        assert_eq!(sanitized.get("population"), Some(&json!(52000)));
    }

    #[test]
    fn test_for_ai_adds_rounded_location_summary() {
        let ai = sample_metadata().for_ai();
        assert_eq!(
            ai.get("center_point"),
            Some(&json!({"lat": 28.650612, "lng": 77.230123}))
        );
        assert_eq!(
            ai.get("bounding_box"),
            Some(&json!({
                "southwest": {"lat": 28.6401, "lng": 77.2201},
                "northeast": {"lat": 28.6601, "lng": 77.2401}
            }))
        );
        assert_eq!(ai.get("map_zoom"), Some(&json!(14)));
        assert!(ai.get("coordinates").is_none());
    }

    #[test]
    fn test_for_ai_defaults_missing_components_to_zero() {
        let metadata = WardMetadata::from_value(json!({
            "coordinates": {"center": {"lat": 28.5}}
        }))
        .unwrap();
        let ai = metadata.for_ai();
        assert_eq!(ai.get("center_point"), Some(&json!({"lat": 28.5, "lng": 0.0})));
        assert!(metadata.center().is_none());
    }

    #[test]
    fn test_text_accessors() {
        let metadata = sample_metadata();
        assert_eq!(metadata.ward_name().as_deref(), Some("Chandni Chowk"));
        assert_eq!(metadata.ward_number().as_deref(), Some("81"));
        assert!(metadata.has_coordinates());
        assert_eq!(metadata.map_zoom(), Some(14.0));
        assert_eq!(
            metadata.center(),
            Some(LatLng {
                lat: 28.65061234567,
                lng: 77.23012345678
            })
        );
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(WardMetadata::from_value(json!([1, 2])).is_none());
        assert!(WardMetadata::from_value(json!("ward")).is_none());
        assert!(WardMetadata::from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_bounding_box_span_requires_nonzero_corners() {
        let bbox = sample_metadata().bounding_box().unwrap();
        let (lat_span, lng_span) = bbox.span().unwrap();
        assert!((lat_span - 0.02).abs() < 1e-9);
        assert!((lng_span - 0.02).abs() < 1e-9);

        let partial = BoundingBox {
            southwest: PartialLatLng {
                lat: Some(0.0),
                lng: Some(77.0),
            },
            ..bbox
        };
        assert!(partial.span().is_none());
    }

    #[test]
    fn test_greenery_report_is_lenient() {
        let report: GreeneryReport = serde_json::from_value(json!({
            "greenery_score": "62",
            "greenery_summary": "Tree cover along the ridge",
            "observations": ["Dense canopy in the north", 3],
            "confidence": "medium"
        }))
        .unwrap();

        assert_eq!(report.greenery_score, Some(62.0));
        assert_eq!(report.score_label().as_deref(), Some("62"));
        assert_eq!(report.observations, vec!["Dense canopy in the north", "3"]);
        assert_eq!(report.extra.get("confidence"), Some(&json!("medium")));
        assert!(report.population_context.is_none());
    }

    #[test]
    fn test_greenery_score_is_clamped() {
        let report: GreeneryReport =
            serde_json::from_value(json!({"greenery_score": 140.5, "observations": "single"}))
                .unwrap();
        assert_eq!(report.greenery_score, Some(100.0));
        assert_eq!(report.observations, vec!["single"]);
    }

    #[test]
    fn test_uploaded_image_mime_type() {
        let image = UploadedImage {
            filename: "ward.JPEG".to_string(),
            bytes: vec![],
        };
        assert_eq!(image.mime_type(), "image/jpeg");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("image/gif"), "png");
    }

    #[test]
    fn test_inline_image_is_base64() {
        let image = InlineImage::from_bytes(b"abc", "image/png");
        assert_eq!(image.data, "YWJj");
        assert_eq!(image.mime_type, "image/png");
    }
}

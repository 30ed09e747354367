#![allow(dead_code)]

use greenward::AppConfig;
use serde_json::{json, Value};
use std::path::Path;

pub const GEMINI_PATH: &str = "/v1beta/models/gemini-2.5-pro:generateContent";
pub const STATIC_MAP_PATH: &str = "/maps/api/staticmap";
/// Request body cap used by the test server.
pub const TEST_UPLOAD_LIMIT: usize = 64 * 1024;

pub struct Upstreams<'a> {
    pub gemini: &'a str,
    pub perplexity: &'a str,
    pub maps: Option<&'a str>,
}

/// Test configuration pointing every upstream at local mock servers.
pub fn test_config(upstreams: &Upstreams<'_>, data_dir: &Path) -> AppConfig {
    let maps = match upstreams.maps {
        Some(base) => format!(
            "[maps]\napi_key = \"maps-key\"\nstatic_map_url = \"{}{}\"\n",
            base, STATIC_MAP_PATH
        ),
        None => String::new(),
    };
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
data_dir = "{data_dir}"
max_upload_bytes = {max_upload_bytes}
allowed_origins = ["http://localhost:5500"]

[gemini]
api_key = "gemini-key"
base_url = "{gemini}"
timeout_seconds = 10

[perplexity]
api_key = "pplx-key"
base_url = "{perplexity}"
timeout_seconds = 10

{maps}"#,
        data_dir = data_dir.display(),
        gemini = upstreams.gemini,
        perplexity = upstreams.perplexity,
        maps = maps,
        max_upload_bytes = TEST_UPLOAD_LIMIT,
    );
    AppConfig::from_toml_str(&toml).expect("test config parses")
}

/// A Gemini `generateContent` reply whose single part is `text`.
pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [
            {"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}
        ]
    })
}

pub fn greenery_reply() -> Value {
    gemini_reply(
        "```json\n{\"greenery_score\": 42, \"greenery_summary\": \"Patchy canopy along the ridge\", \
         \"population_context\": \"Dense housing limits open space\", \
         \"observations\": [\"Central park is the main green patch\"]}\n```",
    )
}

pub fn perplexity_reply() -> Value {
    json!({
        "id": "chat-1",
        "model": "sonar-pro",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "1. **Neem (Azadirachta indica)** — drought hardy and cleans the air [1]\n\
                            2. **Peepal** (Ficus religiosa) — broad shade for busy streets [2]\n\
                            3. **Jamun** (Syzygium cumini) — fruiting native suited to parks\n\
                            4. **Arjun** (Terminalia arjuna) — tolerates waterlogged drains\n\
                            5. **Amaltas** (Cassia fistula) — bright summer flowers for avenues"
            }
        }]
    })
}

pub fn ward_metadata() -> Value {
    json!({
        "wardName": "Karol Bagh",
        "wardNumber": 84,
        "districtName": "Central",
        "population": 61000,
        "coordinates": {
            "center": {"lat": 28.6519, "lng": 77.1909},
            "bounding_box": {
                "southwest": {"lat": 28.6419, "lng": 77.1809},
                "northeast": {"lat": 28.6619, "lng": 77.2009}
            }
        },
        "map_view": {"zoom": 15},
        "ward_geojson": {
            "type": "Feature",
            "properties": {"Ward_No": 84},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[77.1809, 28.6419], [77.2009, 28.6419], [77.2009, 28.6619], [77.1809, 28.6619]]]
            }
        }
    })
}

/// Bytes big enough not to trip the small-image warning.
pub fn fake_png() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(6000, 0);
    bytes
}

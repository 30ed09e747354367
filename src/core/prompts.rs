use crate::domain::model::WardMetadata;
use crate::domain::ports::RecommendationRequest;

const GREENERY_JSON_SHAPE: &str = r#"{
  "greenery_score": <integer 0-100>,
  "greenery_summary": <string>,
  "population_context": <string>,
  "observations": [<string>, ...]
}"#;

pub const TREE_SYSTEM_PROMPT: &str = "You recommend trees indigenous to Delhi.";

pub fn greenery_prompt(has_image: bool) -> String {
    if has_image {
        format!(
            "You are an urban analysis assistant focused on Delhi, India.\n\
             Using the provided ward metadata and satellite imagery, estimate a greenery score \
             between 0 and 100 (higher means more visible vegetation), summarize what you see, \
             and relate it to the population density. Respond ONLY with valid JSON in this structure:\n\
             {}\n\
             Ground every observation in the image cues and the metadata.",
            GREENERY_JSON_SHAPE
        )
    } else {
        format!(
            "You are an urban analysis assistant focused on Delhi, India.\n\
             There is no current satellite imagery available, so rely solely on the ward metadata \
             to infer greenery conditions. Estimate a greenery score between 0 and 100, summarize \
             likely vegetation, and relate it to the population density. Respond ONLY with valid JSON \
             in this structure:\n\
             {}\n\
             Ground every observation explicitly in the metadata or reasonable inference rules when \
             image data is missing.",
            GREENERY_JSON_SHAPE
        )
    }
}

pub fn metadata_turn(metadata: &WardMetadata) -> String {
    format!("Ward metadata (JSON):\n{}", metadata.to_json_pretty())
}

pub fn tree_prompt(metadata: &WardMetadata) -> String {
    format!(
        "You are a Delhi-based urban forestry expert. Based on this ward metadata: {}, \
         list 5 native Delhi tree species with a short rationale for each. \
         Output requirements (follow exactly):\n\
         - Return EXACTLY 5 items as a numbered list from 1 to 5.\n\
         - Each item MUST be a single line in the form: 1. **Tree Name** (Latin name) — rationale (12–20 words).\n\
         - Bold ONLY the common tree name; the Latin name MUST NOT be bold; do not bold the rationale.\n\
         - Do NOT include any citations or reference markers like [1], [2], [a], etc.\n\
         - No headings, no extra paragraphs, no code fences, no trailing commentary.",
        metadata.to_json()
    )
}

pub fn recommendation_prompt(request: &RecommendationRequest<'_>) -> String {
    let trees = serde_json::to_string(request.trees).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are an urban planner for Delhi adhering to SDG 11 and Delhi Development Authority rules.\n\
         Construction type requested: {construction}.\n\
         Ward metadata: {metadata}\n\
         Greenery findings: {greenery}\n\
         Suggested trees: {trees}\n\
         Identify one or two optimal micro-locations within the ward for the construction. \
         For each location provide:\n\
         1. A short description tied to features visible in the imagery metadata.\n\
         2. Why it satisfies SDG 11 principles (e.g., sustainable transport, inclusive access).\n\
         3. How it complies with relevant DDA guidance (setbacks, green buffers, density).\n\
         Close with one actionable next step for city planners. Limit the answer to 200 words. \
         The points must each be in separate paragraph format not being bundled together for better \
         understanding and readability. \
         Give heading for each point like *SDG11 requirements:* and *DDA Rules Compliance* that should \
         be in bold like Actionable Next Steps.",
        construction = request.construction_type,
        metadata = request.metadata.to_json(),
        greenery = request.greenery.to_json(),
        trees = trees,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::GreeneryReport;
    use serde_json::json;

    #[test]
    fn test_greenery_prompt_depends_on_image() {
        let with_image = greenery_prompt(true);
        let without_image = greenery_prompt(false);
        assert!(with_image.contains("satellite imagery, estimate"));
        assert!(without_image.contains("no current satellite imagery"));
        for prompt in [&with_image, &without_image] {
            assert!(prompt.contains("\"greenery_score\": <integer 0-100>"));
            assert!(prompt.contains("between 0 and 100"));
        }
    }

    #[test]
    fn test_tree_prompt_embeds_compact_metadata() {
        let metadata = WardMetadata::from_value(json!({"wardName": "Rohini"})).unwrap();
        let prompt = tree_prompt(&metadata);
        assert!(prompt.contains(r#"{"wardName":"Rohini"}"#));
        assert!(prompt.contains("EXACTLY 5 items"));
    }

    #[test]
    fn test_recommendation_prompt_includes_inputs() {
        let metadata = WardMetadata::from_value(json!({"wardName": "Rohini"})).unwrap();
        let greenery = GreeneryReport {
            greenery_score: Some(40.0),
            ..GreeneryReport::default()
        };
        let trees = vec!["**Neem** (Azadirachta indica)".to_string()];
        let prompt = recommendation_prompt(&RecommendationRequest {
            construction_type: "community library",
            metadata: &metadata,
            greenery: &greenery,
            trees: &trees,
        });

        assert!(prompt.contains("Construction type requested: community library."));
        assert!(prompt.contains("\"greenery_score\":40.0"));
        assert!(prompt.contains("Azadirachta indica"));
        assert!(prompt.contains("200 words"));
    }
}

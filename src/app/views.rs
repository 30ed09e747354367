use crate::app::session::Flash;
use crate::core::markdown::render_markdown_html;
use crate::core::text::display_tree_suggestion;
use crate::domain::model::{AnalysisRecord, GreeneryReport};
use crate::utils::error::Result;
use serde::Serialize;
use serde_json::Value;
use tera::{Context, Tera};

const BASE_TEMPLATE: &str = include_str!("../../templates/base.html");
const HOME_TEMPLATE: &str = include_str!("../../templates/home.html");
const RESULTS_TEMPLATE: &str = include_str!("../../templates/results.html");

#[derive(Debug, Clone, Serialize)]
pub struct MetadataField {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeSuggestion {
    pub markdown: String,
    pub html: Option<String>,
}

/// Everything the results page shows.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsView {
    pub ward_title: String,
    pub metadata: Vec<MetadataField>,
    pub greenery: GreeneryReport,
    pub score_label: Option<String>,
    pub tree_suggestions: Vec<TreeSuggestion>,
    pub recommendations: Option<String>,
    pub recommendations_html: Option<String>,
    pub construction_type: Option<String>,
    pub image_url: Option<String>,
    pub image_error: Option<String>,
    pub back_to_map_url: String,
}

impl ResultsView {
    pub fn from_record(record: &AnalysisRecord, back_to_map_url: &str) -> Self {
        let metadata = &record.metadata;
        let ward_title = match (metadata.ward_name(), metadata.ward_number()) {
            (Some(name), Some(number)) => format!("{} (Ward {})", name, number),
            (Some(name), None) => name,
            (None, Some(number)) => format!("Ward {}", number),
            (None, None) => "Ward analysis".to_string(),
        };

        let tree_suggestions = record
            .trees
            .iter()
            .map(|raw| {
                let markdown = display_tree_suggestion(raw);
                let html = render_markdown_html(Some(&markdown));
                TreeSuggestion { markdown, html }
            })
            .collect();

        let recommendations_html = record
            .recommendations_html
            .clone()
            .or_else(|| render_markdown_html(record.recommendations.as_deref()));

        Self {
            ward_title,
            metadata: metadata
                .as_map()
                .iter()
                .map(|(key, value)| MetadataField {
                    key: key.clone(),
                    value: display_value(value),
                })
                .collect(),
            score_label: record.greenery.score_label(),
            greenery: record.greenery.clone(),
            tree_suggestions,
            recommendations: record.recommendations.clone(),
            recommendations_html,
            construction_type: record.construction_type.clone(),
            image_url: record
                .image_token
                .as_ref()
                .map(|token| format!("/analysis/image/{}", token)),
            image_error: record.image_error.clone(),
            back_to_map_url: back_to_map_url.to_string(),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "—".to_string(),
        other => other.to_string(),
    }
}

/// Page templates compiled into the binary.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", BASE_TEMPLATE),
            ("home.html", HOME_TEMPLATE),
            ("results.html", RESULTS_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    pub fn home(&self, flashes: &[Flash], back_to_map_url: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("flashes", flashes);
        context.insert("back_to_map_url", back_to_map_url);
        Ok(self.tera.render("home.html", &context)?)
    }

    pub fn results(&self, view: &ResultsView) -> Result<String> {
        let mut context = Context::new();
        context.insert("view", view);
        context.insert("back_to_map_url", &view.back_to_map_url);
        Ok(self.tera.render("results.html", &context)?)
    }
}

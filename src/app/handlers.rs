use crate::app::respond::{is_json_body, json_error, respond_error, wants_json};
use crate::app::server::AppState;
use crate::app::session::{Flash, SessionId};
use crate::app::views::ResultsView;
use crate::core::markdown::render_markdown_html;
use crate::domain::model::{mime_for_extension, AnalysisRecord, UploadedImage, WardMetadata};
use crate::utils::error::{GreenwardError, Result};
use crate::utils::validation::allowed_extension;
use axum::body::Bytes;
use axum::extract::rejection::FormRejection;
use axum::extract::{Extension, Form, FromRequest, Multipart, Path, Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

const INVALID_METADATA: &str = "Metadata must be valid JSON.";
const UNSUPPORTED_FILE: &str = "Unsupported file type. Upload PNG, JPG, JPEG, or WEBP.";
const NO_ANALYSIS_TO_SHOW: &str = "Please upload a ward before viewing results.";
const NO_ANALYSIS_TO_RECOMMEND: &str = "Please analyze a ward before requesting recommendations.";

type InputResult<T> = std::result::Result<T, (String, StatusCode)>;

struct AnalyzeInput {
    metadata: WardMetadata,
    upload: Option<UploadedImage>,
}

fn bad_request(message: &str) -> (String, StatusCode) {
    (message.to_string(), StatusCode::BAD_REQUEST)
}

fn parse_metadata_text(raw: &str) -> InputResult<WardMetadata> {
    if raw.trim().is_empty() {
        return Ok(WardMetadata::default());
    }
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(WardMetadata::from_value)
        .ok_or_else(|| bad_request(INVALID_METADATA))
}

async fn read_json_input(state: &AppState, request: Request) -> InputResult<AnalyzeInput> {
    let body = Bytes::from_request(request, state)
        .await
        .map_err(|e| (e.body_text(), e.status()))?;

    // unreadable JSON bodies count as an empty payload
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let metadata = payload.get("metadata").cloned().unwrap_or(Value::Null);
    let metadata = WardMetadata::from_value(metadata).ok_or_else(|| bad_request(INVALID_METADATA))?;

    Ok(AnalyzeInput {
        metadata,
        upload: None,
    })
}

async fn read_multipart_input(state: &AppState, request: Request) -> InputResult<AnalyzeInput> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| (e.body_text(), e.status()))?;

    let mut metadata_raw = String::new();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.body_text(), e.status()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("metadata_json") => {
                metadata_raw = field.text().await.map_err(|e| (e.body_text(), e.status()))?;
            }
            Some("satellite_image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| (e.body_text(), e.status()))?;
                if filename.is_empty() {
                    continue;
                }
                tracing::info!(
                    uploaded_filename = %filename,
                    content_type = ?content_type,
                    bytes = bytes.len(),
                    "Satellite image uploaded"
                );
                upload = Some(UploadedImage {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let metadata = parse_metadata_text(&metadata_raw)?;
    if let Some(image) = &upload {
        if allowed_extension(&image.filename, &state.config.server.allowed_extensions).is_none() {
            return Err(bad_request(UNSUPPORTED_FILE));
        }
    }

    Ok(AnalyzeInput { metadata, upload })
}

async fn read_form_input(state: &AppState, request: Request) -> InputResult<AnalyzeInput> {
    let Form(fields) = Form::<HashMap<String, String>>::from_request(request, state)
        .await
        .map_err(|e| (e.body_text(), e.status()))?;
    let raw = fields.get("metadata_json").map(String::as_str).unwrap_or_default();

    Ok(AnalyzeInput {
        metadata: parse_metadata_text(raw)?,
        upload: None,
    })
}

fn results_page(state: &AppState, record: &AnalysisRecord) -> Result<String> {
    let view = ResultsView::from_record(record, state.back_to_map_url());
    state.views.results(&view)
}

fn render_results(state: &AppState, record: &AnalysisRecord) -> Response {
    match results_page(state, record) {
        Ok(page) => Html(page).into_response(),
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: GreenwardError) -> Response {
    tracing::error!(category = ?e.category(), "{}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.user_friendly_message()).into_response()
}

/// `/analyze` answers anything unexpected with a JSON 500.
fn unexpected_analyze_error(message: &str) -> Response {
    tracing::error!("Unexpected error in /analyze: {}", message);
    json_error(message, StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn home(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Response {
    let flashes = state.sessions.take_flashes(session).await;
    match state.views.home(&flashes, state.back_to_map_url()) {
        Ok(page) => Html(page).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    request: Request,
) -> Response {
    let headers = request.headers().clone();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_json = is_json_body(&headers);

    tracing::info!(
        content_type = %content_type,
        content_length = ?headers.get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()),
        is_json,
        "Analyze request received"
    );

    let input = if is_json {
        read_json_input(&state, request).await
    } else if content_type.starts_with("multipart/form-data") {
        read_multipart_input(&state, request).await
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        read_form_input(&state, request).await
    } else {
        Ok(AnalyzeInput {
            metadata: WardMetadata::default(),
            upload: None,
        })
    };

    let input = match input {
        Ok(input) => input,
        Err((message, status)) => {
            return respond_error(&state, session, &headers, &message, status).await;
        }
    };
    if input.metadata.is_empty() {
        tracing::warn!("Metadata missing from request");
    }

    let record = match state.analysis.analyze(input.metadata, input.upload).await {
        Ok(record) => record,
        Err(e @ GreenwardError::ValidationError { .. }) => {
            return respond_error(&state, session, &headers, &e.to_string(), StatusCode::BAD_REQUEST)
                .await;
        }
        Err(GreenwardError::IoError(e)) => {
            return unexpected_analyze_error(&e.to_string());
        }
        Err(e) => {
            let message = format!("Analysis failed: {}", e);
            return respond_error(
                &state,
                session,
                &headers,
                &message,
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .await;
        }
    };

    if let Some(stale) = state.sessions.replace_analysis(session, record.clone()).await {
        state.analysis.images().delete(&stale).await;
    }

    if wants_json(&headers) {
        return Json(json!({ "redirect_url": "/analysis/latest" })).into_response();
    }
    match results_page(&state, &record) {
        Ok(page) => Html(page).into_response(),
        Err(e) => unexpected_analyze_error(&e.to_string()),
    }
}

pub async fn latest_analysis(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
) -> Response {
    match state.sessions.analysis(session).await {
        Some(record) => render_results(&state, &record),
        None => {
            state
                .sessions
                .flash(session, Flash::error(NO_ANALYSIS_TO_SHOW))
                .await;
            Redirect::to("/").into_response()
        }
    }
}

pub async fn analysis_image(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    Path(token): Path<String>,
) -> Response {
    let Some(record) = state.sessions.analysis(session).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if record.image_token.as_deref() != Some(token.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.analysis.images().load(&token).await {
        Ok(bytes) => {
            let mime_type = record.image_mime.clone().unwrap_or_else(|| {
                let extension = token.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
                mime_for_extension(extension).to_string()
            });
            (
                [
                    (CONTENT_TYPE, mime_type),
                    (CACHE_CONTROL, "no-store".to_string()),
                ],
                bytes,
            )
                .into_response()
        }
        Err(GreenwardError::NotFound { .. }) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendForm {
    #[serde(default)]
    pub construction_type: String,
}

pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionId>,
    headers: HeaderMap,
    form: std::result::Result<Form<RecommendForm>, FormRejection>,
) -> Response {
    let construction_type = form
        .map(|Form(form)| form.construction_type)
        .unwrap_or_default();
    let construction_type = construction_type.trim();

    let Some(record) = state.sessions.analysis(session).await else {
        return respond_error(
            &state,
            session,
            &headers,
            NO_ANALYSIS_TO_RECOMMEND,
            StatusCode::BAD_REQUEST,
        )
        .await;
    };

    let text = match state.analysis.recommend(&record, construction_type).await {
        Ok(text) => text,
        Err(e @ GreenwardError::ValidationError { .. }) => {
            return respond_error(&state, session, &headers, &e.to_string(), StatusCode::BAD_REQUEST)
                .await;
        }
        Err(e) => {
            let message = format!("Failed to generate recommendations: {}", e);
            return respond_error(&state, session, &headers, &message, StatusCode::BAD_GATEWAY)
                .await;
        }
    };

    let html = render_markdown_html(Some(&text));
    let updated = match state
        .sessions
        .set_recommendations(session, construction_type, text.clone(), html.clone())
        .await
    {
        Some(updated) => updated,
        None => AnalysisRecord {
            recommendations: Some(text),
            recommendations_html: html,
            construction_type: Some(construction_type.to_string()),
            ..record
        },
    };
    render_results(&state, &updated)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn maps_sdk_url(State(state): State<Arc<AppState>>) -> Response {
    match state.config.maps.api_key() {
        Some(key) => Json(json!({
            "sdk_url": format!("{}?key={}&loading=async", state.config.maps.sdk_url, key)
        }))
        .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "API key not configured").into_response(),
    }
}

use crate::app::server::AppState;
use crate::app::session::{Flash, SessionId};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;

/// True when the request body is JSON (`application/json` or `+json`).
pub fn is_json_body(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

/// JSON clients ask for it explicitly or talk JSON themselves.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("application/json"));
    accepts_json || is_json_body(headers)
}

pub fn json_error(message: &str, status: StatusCode) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// `{"error": ...}` for JSON clients; otherwise a flash message and a trip home.
pub async fn respond_error(
    state: &AppState,
    session: SessionId,
    headers: &HeaderMap,
    message: &str,
    status: StatusCode,
) -> Response {
    tracing::info!(status = status.as_u16(), "{}", message);
    if wants_json(headers) {
        return json_error(message, status);
    }
    state.sessions.flash(session, Flash::error(message)).await;
    Redirect::to("/").into_response()
}

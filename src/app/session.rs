//! Per-browser result cache keyed by an opaque cookie.

use crate::app::server::AppState;
use crate::domain::model::AnalysisRecord;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "greenward_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flash {
    pub category: String,
    pub message: String,
}

impl Flash {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            category: "error".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SessionData {
    analysis: Option<AnalysisRecord>,
    flashes: Vec<Flash>,
}

/// In-memory session contents. Lives as long as the process.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionData>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn analysis(&self, id: SessionId) -> Option<AnalysisRecord> {
        self.sessions
            .read()
            .await
            .get(&id)
            .and_then(|data| data.analysis.clone())
    }

    /// Stores a new analysis and returns the image token it made obsolete, if any.
    pub async fn replace_analysis(&self, id: SessionId, record: AnalysisRecord) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        let data = sessions.entry(id).or_default();
        let previous = data
            .analysis
            .replace(record)
            .and_then(|old| old.image_token);

        let current = data.analysis.as_ref().and_then(|a| a.image_token.as_deref());
        previous.filter(|token| Some(token.as_str()) != current)
    }

    /// Attaches recommendations to the current analysis and returns the updated record.
    pub async fn set_recommendations(
        &self,
        id: SessionId,
        construction_type: &str,
        text: String,
        html: Option<String>,
    ) -> Option<AnalysisRecord> {
        let mut sessions = self.sessions.write().await;
        let analysis = sessions.get_mut(&id)?.analysis.as_mut()?;
        analysis.construction_type = Some(construction_type.to_string());
        analysis.recommendations = Some(text);
        analysis.recommendations_html = html;
        Some(analysis.clone())
    }

    pub async fn flash(&self, id: SessionId, flash: Flash) {
        self.sessions
            .write()
            .await
            .entry(id)
            .or_default()
            .flashes
            .push(flash);
    }

    pub async fn take_flashes(&self, id: SessionId) -> Vec<Flash> {
        match self.sessions.write().await.get_mut(&id) {
            Some(data) => std::mem::take(&mut data.flashes),
            None => Vec::new(),
        }
    }
}

/// Reads the session id from the `Cookie` headers.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(SessionId)
}

pub fn session_cookie(id: SessionId, secure: bool) -> String {
    let same_site = if secure {
        "SameSite=None; Secure"
    } else {
        "SameSite=Lax"
    };
    format!(
        "{}={}; HttpOnly; Path=/; {}",
        SESSION_COOKIE,
        id.0.simple(),
        same_site
    )
}

/// Makes a `SessionId` available to handlers, issuing the cookie on first contact.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (id, issued) = match session_from_headers(request.headers()) {
        Some(id) => (id, false),
        None => (SessionId(Uuid::new_v4()), true),
    };
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if issued {
        let cookie = session_cookie(id, state.config.server.session_cookie_secure);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid session cookie header: {}", e),
        }
    }
    response
}

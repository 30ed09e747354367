mod common;

use common::*;
use greenward::{build_router, AppState};
use httpmock::prelude::*;
use reqwest::header::{
    ACCEPT, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_METHOD, CACHE_CONTROL, CONTENT_SECURITY_POLICY, CONTENT_TYPE, COOKIE,
    LOCATION, ORIGIN, PRAGMA, SET_COOKIE,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

struct TestApp {
    base: String,
    client: Client,
    gemini: MockServer,
    perplexity: MockServer,
    maps: MockServer,
    dir: TempDir,
}

impl TestApp {
    async fn spawn(with_maps: bool) -> Self {
        let gemini = MockServer::start_async().await;
        let perplexity = MockServer::start_async().await;
        let maps = MockServer::start_async().await;
        let dir = TempDir::new().unwrap();

        let gemini_url = gemini.base_url();
        let perplexity_url = perplexity.base_url();
        let maps_url = maps.base_url();
        let config = test_config(
            &Upstreams {
                gemini: &gemini_url,
                perplexity: &perplexity_url,
                maps: with_maps.then_some(maps_url.as_str()),
            },
            dir.path(),
        );
        let state = Arc::new(AppState::from_config(config).unwrap());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            base: format!("http://{}", addr),
            client,
            gemini,
            perplexity,
            maps,
            dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn mock_happy_upstreams(&self) {
        self.gemini
            .mock_async(|when, then| {
                when.method(POST)
                    .path(GEMINI_PATH)
                    .body_contains("Ward metadata (JSON)");
                then.status(200).json_body(greenery_reply());
            })
            .await;
        self.gemini
            .mock_async(|when, then| {
                when.method(POST)
                    .path(GEMINI_PATH)
                    .body_contains("Construction type requested");
                then.status(200).json_body(gemini_reply(
                    "**SDG11 requirements:** next to the metro.\n\n**Actionable Next Steps:** * survey the plot * consult DDA",
                ));
            })
            .await;
        self.perplexity
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(perplexity_reply());
            })
            .await;
        self.maps
            .mock_async(|when, then| {
                when.method(GET).path(STATIC_MAP_PATH);
                then.status(200)
                    .header("Content-Type", "image/png")
                    .body(fake_png());
            })
            .await;
    }

    fn stored_images(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("analysis_images"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    async fn analyze_json(&self, cookie: &str) -> Response {
        self.client
            .post(self.url("/analyze"))
            .header(COOKIE, cookie)
            .json(&json!({ "metadata": ward_metadata() }))
            .send()
            .await
            .unwrap()
    }

    /// Starts a session by hitting `/health` and returns its cookie.
    async fn session(&self) -> String {
        let response = self.client.get(self.url("/health")).send().await.unwrap();
        session_cookie(&response).expect("session cookie issued")
    }
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("greenward_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Log sink shared between the subscriber and the assertions.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn image_src(page: &str) -> Option<String> {
    let start = page.find("src=\"/analysis/image/")? + "src=\"".len();
    let end = start + page[start..].find('"')?;
    Some(page[start..end].to_string())
}

#[tokio::test]
async fn test_health_sets_headers_and_cookie() {
    let app = TestApp::spawn(false).await;
    let response = app.client.get(app.url("/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers[CONTENT_SECURITY_POLICY]
        .to_str()
        .unwrap()
        .starts_with("default-src 'self';"));
    assert_eq!(headers[CACHE_CONTROL], "no-cache, no-store, must-revalidate");
    assert_eq!(headers[PRAGMA], "no-cache");
    assert_eq!(headers["expires"], "0");

    let set_cookie = headers[SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_existing_session_is_not_reissued() {
    let app = TestApp::spawn(false).await;
    let cookie = app.session().await;

    let response = app
        .client
        .get(app.url("/health"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_maps_sdk_url() {
    let without_key = TestApp::spawn(false).await;
    let response = without_key
        .client
        .get(without_key.url("/api/maps/sdk_url"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "API key not configured");

    let with_key = TestApp::spawn(true).await;
    let body: Value = with_key
        .client
        .get(with_key.url("/api/maps/sdk_url"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["sdk_url"],
        "https://maps.googleapis.com/maps/api/js?key=maps-key&loading=async"
    );
}

#[tokio::test]
async fn test_json_analysis_flow() {
    let app = TestApp::spawn(true).await;
    app.mock_happy_upstreams().await;
    let cookie = app.session().await;

    let response = app.analyze_json(&cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"redirect_url": "/analysis/latest"}));

    let page = app
        .client
        .get(app.url("/analysis/latest"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Karol Bagh (Ward 84)"));
    assert!(page.contains("42 / 100"));
    assert!(page.contains("Patchy canopy along the ridge"));
    // citation removed and only the common name bold
    assert!(page.contains("<strong>Neem</strong> (Azadirachta indica)"));
    assert!(!page.contains("[1]"));
    assert!(page.contains("href=\"http://localhost:5500\""));

    let src = image_src(&page).expect("image on results page");
    let image = app
        .client
        .get(app.url(&src))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(image.headers()[CONTENT_TYPE], "image/png");
    assert!(image.headers()[CACHE_CONTROL]
        .to_str()
        .unwrap()
        .contains("no-store"));
    assert_eq!(image.bytes().await.unwrap().to_vec(), fake_png());

    // the image belongs to this session only
    let stranger = app
        .client
        .get(app.url(&src))
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status(), StatusCode::NOT_FOUND);

    let unknown = app
        .client
        .get(app.url("/analysis/image/00000000000000000000000000000000.png"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_multipart_upload_renders_results() {
    let app = TestApp::spawn(false).await;
    app.mock_happy_upstreams().await;

    let form = Form::new()
        .text("metadata_json", ward_metadata().to_string())
        .part(
            "satellite_image",
            Part::bytes(b"webp bytes".to_vec())
                .file_name("ward.WEBP")
                .mime_str("image/webp")
                .unwrap(),
        );
    let response = app
        .client
        .post(app.url("/analyze"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("session cookie issued");
    let page = response.text().await.unwrap();
    assert!(page.contains("<strong>Amaltas</strong>"));
    assert!(image_src(&page).unwrap().ends_with(".webp"));

    let src = image_src(&page).unwrap();
    let image = app
        .client
        .get(app.url(&src))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(image.headers()[CONTENT_TYPE], "image/webp");
}

#[tokio::test]
async fn test_unsupported_upload_flashes_and_redirects() {
    let app = TestApp::spawn(false).await;
    let cookie = app.session().await;

    let form = Form::new()
        .text("metadata_json", ward_metadata().to_string())
        .part(
            "satellite_image",
            Part::bytes(b"GIF89a".to_vec()).file_name("ward.gif"),
        );
    let response = app
        .client
        .post(app.url("/analyze"))
        .header(COOKIE, &cookie)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/");

    let home = app
        .client
        .get(app.url("/"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(home.contains("Unsupported file type. Upload PNG, JPG, JPEG, or WEBP."));

    // flashes are shown once
    let again = app
        .client
        .get(app.url("/upload"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!again.contains("Unsupported file type"));
}

#[tokio::test]
async fn test_invalid_metadata_json_error() {
    let app = TestApp::spawn(false).await;
    let form = Form::new().text("metadata_json", "{not json");
    let response = app
        .client
        .post(app.url("/analyze"))
        .header(ACCEPT, "application/json")
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "Metadata must be valid JSON."}));
}

#[tokio::test]
async fn test_missing_metadata_error() {
    let app = TestApp::spawn(false).await;
    let response = app
        .client
        .post(app.url("/analyze"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "Ward metadata is required for analysis."}));
}

#[tokio::test]
async fn test_failed_analysis_reports_cause() {
    let app = TestApp::spawn(false).await;
    app.gemini
        .mock_async(|when, then| {
            when.method(POST).path(GEMINI_PATH);
            then.status(500).body("boom");
        })
        .await;

    let response = app
        .client
        .post(app.url("/analyze"))
        .json(&json!({ "metadata": ward_metadata() }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Analysis failed: Gemini request failed with status 500: boom"
    );
}

#[tokio::test]
async fn test_latest_without_analysis_redirects_home() {
    let app = TestApp::spawn(false).await;
    let cookie = app.session().await;

    let response = app
        .client
        .get(app.url("/analysis/latest"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let home = app
        .client
        .get(app.url("/"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(home.contains("Please upload a ward before viewing results."));
}

#[tokio::test]
async fn test_recommendation_flow() {
    let app = TestApp::spawn(true).await;
    app.mock_happy_upstreams().await;
    let cookie = app.session().await;

    let before = app
        .client
        .post(app.url("/recommend"))
        .header(COOKIE, &cookie)
        .header(ACCEPT, "application/json")
        .form(&[("construction_type", "community library")])
        .send()
        .await
        .unwrap();
    assert_eq!(before.status(), StatusCode::BAD_REQUEST);
    let body: Value = before.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Please analyze a ward before requesting recommendations."
    );

    app.client
        .post(app.url("/analyze"))
        .header(COOKIE, &cookie)
        .json(&json!({ "metadata": ward_metadata() }))
        .send()
        .await
        .unwrap();

    let blank = app
        .client
        .post(app.url("/recommend"))
        .header(COOKIE, &cookie)
        .header(ACCEPT, "application/json")
        .form(&[("construction_type", "   ")])
        .send()
        .await
        .unwrap();
    let body: Value = blank.json().await.unwrap();
    assert_eq!(body["error"], "Tell us what type of construction you're planning.");

    let page = app
        .client
        .post(app.url("/recommend"))
        .header(COOKIE, &cookie)
        .form(&[("construction_type", "community library")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("<strong>SDG11 requirements:</strong>"));
    assert!(page.contains("<li>"));
    assert!(page.contains("value=\"community library\""));
    assert!(page.contains("<strong>Neem</strong>"));

    // the recommendation is kept for later visits
    let latest = app
        .client
        .get(app.url("/analysis/latest"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(latest.contains("<strong>Actionable Next Steps:</strong>"));
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend() {
    let app = TestApp::spawn(false).await;

    let response = app
        .client
        .request(Method::OPTIONS, app.url("/analyze"))
        .header(ORIGIN, "http://localhost:5500")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5500"
    );
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let file_origin = app
        .client
        .get(app.url("/health"))
        .header(ORIGIN, "null")
        .send()
        .await
        .unwrap();
    assert_eq!(file_origin.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "null");

    let stranger = app
        .client
        .get(app.url("/health"))
        .header(ORIGIN, "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(stranger.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_reanalysis_replaces_previous_image() {
    let app = TestApp::spawn(true).await;
    app.mock_happy_upstreams().await;
    let cookie = app.session().await;

    for _ in 0..3 {
        let response = app.analyze_json(&cookie).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(app.stored_images(), 1);

    let page = app
        .client
        .get(app.url("/analysis/latest"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let src = image_src(&page).expect("image on results page");
    let image = app
        .client
        .get(app.url(&src))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(image.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = TestApp::spawn(false).await;
    let greenery = app
        .gemini
        .mock_async(|when, then| {
            when.method(POST).path(GEMINI_PATH);
            then.status(200).json_body(greenery_reply());
        })
        .await;
    let cookie = app.session().await;

    let padding = "x".repeat(TEST_UPLOAD_LIMIT + 16 * 1024);
    let response = app
        .client
        .post(app.url("/analyze"))
        .header(COOKIE, &cookie)
        .json(&json!({ "metadata": { "wardName": "Rohini", "notes": padding } }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
    greenery.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_urlencoded_metadata_form() {
    let app = TestApp::spawn(true).await;
    app.mock_happy_upstreams().await;
    let cookie = app.session().await;

    let response = app
        .client
        .post(app.url("/analyze"))
        .header(COOKIE, &cookie)
        .header(ACCEPT, "application/json")
        .form(&[("metadata_json", ward_metadata().to_string())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"redirect_url": "/analysis/latest"}));

    let page = app
        .client
        .get(app.url("/analysis/latest"))
        .header(COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Karol Bagh (Ward 84)"));
}

#[tokio::test]
async fn test_requests_are_logged_at_info() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("tower_http=info"))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    // current-thread runtime: the server tasks run on this thread too
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::spawn(false).await;
    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let output = logs.contents();
    assert!(output.contains("started processing request"));
    assert!(output.contains("finished processing request"));
    assert!(output.contains("/health"));
}

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use plant_identifier::api::error::GENERIC_ANALYSIS_MESSAGE;
use plant_identifier::api::handlers::identify::TOO_LARGE_MESSAGE;
use plant_identifier::config::{AppConfig, PLACEHOLDER_FILE};
use plant_identifier::infrastructure::bootstrap::prepare_public_dirs;
use plant_identifier::services::analysis::{AnalysisError, PlantAnalyzer};
use plant_identifier::services::uploads::UploadRecord;
use plant_identifier::{AppState, create_app};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";
const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89,
];

struct StubAnalyzer {
    reply: &'static str,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl PlantAnalyzer for StubAnalyzer {
    async fn identify(&self, upload: &UploadRecord) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(upload.path.exists(), "analyzer must see the staged file");
        Ok(self.reply.to_string())
    }
}

struct FailingAnalyzer;

#[async_trait::async_trait]
impl PlantAnalyzer for FailingAnalyzer {
    async fn identify(&self, _upload: &UploadRecord) -> Result<String, AnalysisError> {
        Err(AnalysisError::Api {
            status: 500,
            body: "upstream exploded: secret-detail".to_string(),
        })
    }
}

struct TestApp {
    _root: TempDir,
    uploads: PathBuf,
    app: Router,
}

async fn setup(analyzer: Arc<dyn PlantAnalyzer>) -> TestApp {
    setup_with(analyzer, |_| {}).await
}

async fn setup_with(
    analyzer: Arc<dyn PlantAnalyzer>,
    configure: impl FnOnce(&mut AppConfig),
) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let mut config = AppConfig::development(root.path().join("public"));
    configure(&mut config);
    assert!(prepare_public_dirs(&config).await.is_ok());
    let uploads = config.uploads_dir();

    let app = create_app(AppState::new(config, analyzer));
    TestApp {
        _root: root,
        uploads,
        app,
    }
}

fn file_part(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
        Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    part.extend_from_slice(data);
    part.extend_from_slice(b"\r\n");
    part
}

fn text_part(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"{field}\"\r\n\r\n\
        {value}\r\n"
    )
    .into_bytes()
}

fn finish(mut parts: Vec<u8>) -> Vec<u8> {
    parts.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    parts
}

async fn post_upload(app: &Router, body: Vec<u8>) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

fn image_link(html: &str) -> Option<String> {
    let start = html.find("src=\"/uploads/")? + "src=\"".len();
    let end = start + html[start..].find('"')?;
    Some(html[start..end].to_string())
}

fn staged_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name != PLACEHOLDER_FILE)
        .collect()
}

#[tokio::test]
async fn test_identify_flow() {
    let analyzer = Arc::new(StubAnalyzer {
        reply: "Rose, Rosaceae",
        calls: AtomicUsize::new(0),
    });
    let t = setup(analyzer.clone()).await;

    let (status, html) =
        post_upload(&t.app, finish(file_part("image", "rose.png", "image/png", PNG))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Rose, Rosaceae"));
    assert!(!html.contains("class=\"error\""));
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);

    let link = image_link(&html).expect("result should link the uploaded image");
    assert!(link.starts_with("/uploads/plant-"));
    assert!(link.ends_with(".png"));

    let file_name = link.trim_start_matches("/uploads/");
    assert_eq!(std::fs::read(t.uploads.join(file_name)).unwrap(), PNG);

    // The link is served by the static file fallback
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(&link)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let served = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&served[..], PNG);
}

#[tokio::test]
async fn test_rapid_uploads_get_distinct_names() {
    let analyzer = Arc::new(StubAnalyzer {
        reply: "Fern",
        calls: AtomicUsize::new(0),
    });
    let t = setup(analyzer).await;

    let (_, first) =
        post_upload(&t.app, finish(file_part("image", "a.PNG", "image/png", PNG))).await;
    let (_, second) =
        post_upload(&t.app, finish(file_part("image", "b.png", "image/png", PNG))).await;

    let first = image_link(&first).unwrap();
    let second = image_link(&second).unwrap();
    assert_ne!(first, second);
    assert!(first.ends_with(".png") && second.ends_with(".png"));
    assert_eq!(staged_files(&t.uploads).len(), 2);
}

#[tokio::test]
async fn test_upload_without_file() {
    let analyzer = Arc::new(StubAnalyzer {
        reply: "unused",
        calls: AtomicUsize::new(0),
    });
    let t = setup(analyzer.clone()).await;

    let (status, html) = post_upload(&t.app, finish(text_part("note", "hello"))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("class=\"error\""));
    assert!(html.contains("Please choose an image to upload."));
    assert!(!html.contains("class=\"result\""));
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    assert!(staged_files(&t.uploads).is_empty());
}

#[tokio::test]
async fn test_upload_without_multipart_body() {
    let t = setup(Arc::new(FailingAnalyzer)).await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8_lossy(&body);
    assert!(html.contains("class=\"error\""));
    assert!(!html.contains("class=\"result\""));
}

#[tokio::test]
async fn test_non_image_is_rejected() {
    let analyzer = Arc::new(StubAnalyzer {
        reply: "unused",
        calls: AtomicUsize::new(0),
    });
    let t = setup(analyzer.clone()).await;

    let (status, html) = post_upload(
        &t.app,
        finish(file_part("image", "notes.txt", "text/plain", b"just some text")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("is not allowed"));
    assert!(!html.contains("class=\"result\""));
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    assert!(staged_files(&t.uploads).is_empty());
}

#[tokio::test]
async fn test_body_over_limit_reports_size() {
    let analyzer = Arc::new(StubAnalyzer {
        reply: "unused",
        calls: AtomicUsize::new(0),
    });
    let t = setup_with(analyzer.clone(), |config| config.max_upload_bytes = 1024).await;

    // well past the file limit plus form overhead
    let mut big = PNG.to_vec();
    big.resize(200_000, 0);
    let (status, html) =
        post_upload(&t.app, finish(file_part("image", "huge.png", "image/png", &big))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains(TOO_LARGE_MESSAGE));
    assert!(!html.contains("class=\"result\""));
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
    assert!(staged_files(&t.uploads).is_empty());
}

#[tokio::test]
async fn test_file_over_limit_within_body_limit() {
    let t = setup_with(Arc::new(FailingAnalyzer), |config| config.max_upload_bytes = 1024).await;

    let mut big = PNG.to_vec();
    big.resize(4096, 0);
    let (status, html) =
        post_upload(&t.app, finish(file_part("image", "big.png", "image/png", &big))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("exceeds maximum allowed"));
    assert!(!html.contains("class=\"result\""));
    assert!(staged_files(&t.uploads).is_empty());
}

#[tokio::test]
async fn test_analysis_failure_keeps_upload() {
    let t = setup(Arc::new(FailingAnalyzer)).await;

    let (status, html) =
        post_upload(&t.app, finish(file_part("image", "rose.jpg", "image/png", PNG))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains(GENERIC_ANALYSIS_MESSAGE));
    assert!(!html.contains("secret-detail"));
    assert!(!html.contains("class=\"result\""));

    // Cleanup is left to the sweeper
    let staged = staged_files(&t.uploads);
    assert_eq!(staged.len(), 1);
    assert!(staged[0].starts_with("plant-") && staged[0].ends_with(".jpg"));
}

#[tokio::test]
async fn test_index_renders_form() {
    let t = setup(Arc::new(FailingAnalyzer)).await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8_lossy(&body);
    assert!(html.contains("enctype=\"multipart/form-data\""));
    assert!(html.contains("name=\"image\""));
    assert!(!html.contains("class=\"result\""));
    assert!(!html.contains("class=\"error\""));

    // Bootstrap seeded the stylesheet the page links to
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/css/style.css")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unbounded_upload_limit_builds_router() {
    let root = tempfile::tempdir().unwrap();
    let mut config = AppConfig::development(root.path().join("public"));
    config.max_upload_bytes = usize::MAX;
    let app = create_app(AppState::new(config, Arc::new(FailingAnalyzer)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_check() {
    // No directories at all: health must not care
    let root = tempfile::tempdir().unwrap();
    let config = AppConfig::development(root.path().join("does-not-exist"));
    let app = create_app(AppState::new(config, Arc::new(FailingAnalyzer)));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let t = setup(Arc::new(FailingAnalyzer)).await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

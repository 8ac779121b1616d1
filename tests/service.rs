//! Integration tests against an in-process mock of the conversion service.
//!
//! Each test binds an axum server on `127.0.0.1:0` that records the
//! multipart fields it receives and answers the way the real service does:
//! the artifact bytes on success, plain text or a `{"detail": ...}` JSON
//! body on failure.
//!
//! Run with:
//!   cargo test --test service -- --nocapture

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use convmerge::error::service_detail;
use convmerge::{
    check_service, convert_image, merge_pdfs, ClientConfig, ConvmergeError, FileHandle,
    ImageOptions, OutputFormat, Phase, Session, SubmitOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_test::assert_ok;

// ── Mock service ─────────────────────────────────────────────────────────────

/// One multipart field as seen by the server.
#[derive(Debug, Clone, PartialEq)]
struct SeenField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone, Copy)]
enum Reply {
    Artifact,
    PlainError(StatusCode, &'static str),
    DetailError(StatusCode, &'static str),
}

#[derive(Clone)]
struct ServerState {
    reply: Reply,
    seen: Arc<Mutex<Vec<(String, Vec<SeenField>)>>>,
}

impl ServerState {
    fn requests(&self) -> Vec<(String, Vec<SeenField>)> {
        self.seen.lock().unwrap().clone()
    }
}

async fn read_fields(mut multipart: Multipart) -> Vec<SeenField> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let body = field.bytes().await.unwrap().to_vec();
        fields.push(SeenField {
            name,
            file_name,
            content_type,
            body,
        });
    }
    fields
}

fn respond(reply: Reply, artifact: Vec<u8>) -> Response {
    match reply {
        Reply::Artifact => (StatusCode::OK, artifact).into_response(),
        Reply::PlainError(status, text) => (status, text).into_response(),
        Reply::DetailError(status, detail) => {
            (status, Json(serde_json::json!({ "detail": detail }))).into_response()
        }
    }
}

async fn handle_convert(State(state): State<ServerState>, multipart: Multipart) -> Response {
    let fields = read_fields(multipart).await;
    let text = |name: &str| {
        fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| String::from_utf8_lossy(&f.body).into_owned())
            .unwrap_or_default()
    };
    let artifact = format!("converted:{}:{}", text("out"), text("quality")).into_bytes();
    state
        .seen
        .lock()
        .unwrap()
        .push(("/convert-image".to_string(), fields));
    respond(state.reply, artifact)
}

async fn handle_merge(State(state): State<ServerState>, multipart: Multipart) -> Response {
    let fields = read_fields(multipart).await;
    let names: Vec<_> = fields.iter().filter_map(|f| f.file_name.clone()).collect();
    let artifact = format!("%PDF-merged:{}", names.join(",")).into_bytes();
    state
        .seen
        .lock()
        .unwrap()
        .push(("/merge-pdfs".to_string(), fields));
    respond(state.reply, artifact)
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "File conversion API running",
    }))
}

async fn spawn_service(reply: Reply) -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let state = ServerState {
        reply,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/", get(handle_root))
        .route("/convert-image", post(handle_convert))
        .route("/merge-pdfs", post(handle_merge))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

// ── Test helpers ─────────────────────────────────────────────────────────────

fn config(base_url: &str, output_dir: &Path) -> ClientConfig {
    ClientConfig::builder()
        .base_url(base_url)
        .output_dir(output_dir)
        .release_grace_ms(20)
        .build()
        .expect("config")
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

/// Files left in `dir` once transient download references are released.
async fn settled_listing(dir: &Path) -> Vec<String> {
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Image conversion ─────────────────────────────────────────────────────────

#[tokio::test]
async fn png_converted_to_jpg_is_saved_as_photo_jpg() {
    let (url, server) = spawn_service(Reply::Artifact).await;
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let photo = write_file(input.path(), "photo.png", b"\x89PNG-bytes");

    let outcome = convert_image(
        &photo,
        ImageOptions::new(OutputFormat::Jpg, 80),
        &config(&url, out.path()),
    )
    .await
    .unwrap();

    let SubmitOutcome::Succeeded { message, delivery } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(message, "Done. Download started.");
    assert_eq!(delivery.filename, "photo.jpg");
    assert_eq!(
        std::fs::read(out.path().join("photo.jpg")).unwrap(),
        b"converted:jpg:80"
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let (endpoint, fields) = &requests[0];
    assert_eq!(endpoint, "/convert-image");
    let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["file", "out", "quality"]);
    assert_eq!(fields[0].file_name.as_deref(), Some("photo.png"));
    assert_eq!(fields[0].content_type.as_deref(), Some("image/png"));
    assert_eq!(fields[0].body, b"\x89PNG-bytes");

    assert_eq!(settled_listing(out.path()).await, ["photo.jpg"]);
}

#[tokio::test]
async fn lossless_format_still_sends_quality_field() {
    let (url, server) = spawn_service(Reply::Artifact).await;
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let scan = write_file(input.path(), "scan.webp", b"RIFF");

    let outcome = convert_image(
        &scan,
        ImageOptions::new(OutputFormat::Png, 40),
        &config(&url, out.path()),
    )
    .await
    .unwrap();

    assert!(outcome.is_success());
    // Default quality is sent because 40 never applied to png.
    assert_eq!(
        std::fs::read(out.path().join("scan.png")).unwrap(),
        b"converted:png:90"
    );
    assert_eq!(server.requests()[0].1[2].name, "quality");
}

#[tokio::test]
async fn plain_text_error_becomes_failed_message() {
    let (url, _server) =
        spawn_service(Reply::PlainError(StatusCode::INTERNAL_SERVER_ERROR, "bad format")).await;
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let photo = write_file(input.path(), "photo.png", b"\x89PNG");

    let outcome = convert_image(
        &photo,
        ImageOptions::default(),
        &config(&url, out.path()),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Failed {
            message: "bad format".into()
        }
    );
    assert!(settled_listing(out.path()).await.is_empty());
}

#[tokio::test]
async fn json_error_body_is_reported_verbatim() {
    let (url, _server) = spawn_service(Reply::DetailError(
        StatusCode::BAD_REQUEST,
        "Unsupported output format",
    ))
    .await;
    let out = tempfile::tempdir().unwrap();
    let session = Session::new(&config(&url, out.path())).unwrap();

    session
        .image()
        .stage(vec![FileHandle::from_bytes("a.gif", "image/gif", b"GIF89a".to_vec())]);
    let outcome = session.image().submit().await.unwrap();

    let body = r#"{"detail":"Unsupported output format"}"#;
    assert_eq!(
        outcome,
        SubmitOutcome::Failed {
            message: body.into()
        }
    );
    assert_eq!(session.image().phase(), Phase::Failed);
    assert_eq!(session.image().status_line(), body);
    assert_eq!(
        service_detail(&session.image().last_message()).as_deref(),
        Some("Unsupported output format")
    );
}

#[tokio::test]
async fn unreadable_staged_file_fails_without_request() {
    let (url, server) = spawn_service(Reply::Artifact).await;
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let photo = write_file(input.path(), "photo.png", b"\x89PNG");
    let session = Session::new(&config(&url, out.path())).unwrap();

    session
        .image()
        .stage(vec![FileHandle::from_path(&photo).unwrap()]);
    std::fs::remove_file(&photo).unwrap();
    let outcome = session.image().submit().await.unwrap();

    let SubmitOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("photo.png"), "{message}");
    assert_eq!(session.image().phase(), Phase::Failed);
    assert!(server.requests().is_empty());
}

// ── PDF merge ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_preserves_order_after_removal() {
    let (url, server) = spawn_service(Reply::Artifact).await;
    let out = tempfile::tempdir().unwrap();
    let session = Session::new(&config(&url, out.path())).unwrap();
    let pdf = session.pdf();

    pdf.stage(vec![
        FileHandle::from_bytes("a.pdf", "application/pdf", b"%PDF-a".to_vec()),
        FileHandle::from_bytes("b.pdf", "application/pdf", b"%PDF-b".to_vec()),
        FileHandle::from_bytes("c.pdf", "application/pdf", b"%PDF-c".to_vec()),
    ]);
    pdf.remove(1);

    let outcome = pdf.submit().await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(pdf.last_message(), "Merged. Download started.");
    assert_eq!(
        std::fs::read(out.path().join("merged.pdf")).unwrap(),
        b"%PDF-merged:a.pdf,c.pdf"
    );

    let (endpoint, fields) = &server.requests()[0];
    assert_eq!(endpoint, "/merge-pdfs");
    assert!(fields.iter().all(|f| f.name == "files"));
    let bodies: Vec<_> = fields.iter().map(|f| f.body.clone()).collect();
    assert_eq!(bodies, [b"%PDF-a".to_vec(), b"%PDF-c".to_vec()]);
}

#[tokio::test]
async fn merge_from_paths() {
    let (url, _server) = spawn_service(Reply::Artifact).await;
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let first = write_file(input.path(), "first.pdf", b"%PDF-1");
    let second = write_file(input.path(), "Second.PDF", b"%PDF-2");

    let outcome = merge_pdfs([first, second], &config(&url, out.path()))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(settled_listing(out.path()).await, ["merged.pdf"]);
}

#[tokio::test]
async fn single_pdf_sends_nothing() {
    let (url, server) = spawn_service(Reply::Artifact).await;
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let only = write_file(input.path(), "only.pdf", b"%PDF");

    let err = merge_pdfs([only], &config(&url, out.path()))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Pick at least 2 PDFs.");
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn both_workflows_submit_concurrently() {
    let (url, server) = spawn_service(Reply::Artifact).await;
    let out = tempfile::tempdir().unwrap();
    let session = Session::new(&config(&url, out.path())).unwrap();

    session
        .image()
        .stage(vec![FileHandle::from_bytes("cat.bmp", "image/bmp", b"BM".to_vec())]);
    session.image().set_output_format(OutputFormat::Webp).unwrap();
    session.pdf().stage(vec![
        FileHandle::from_bytes("x.pdf", "application/pdf", b"%PDF".to_vec()),
        FileHandle::from_bytes("y.pdf", "application/pdf", b"%PDF".to_vec()),
    ]);

    let (image, merge) = futures::join!(session.image().submit(), session.pdf().submit());

    assert!(image.unwrap().is_success());
    assert!(merge.unwrap().is_success());
    assert_eq!(server.requests().len(), 2);
    assert_eq!(
        settled_listing(out.path()).await,
        ["cat.webp", "merged.pdf"]
    );
}

// ── Connectivity ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_service_is_recovered_as_failed() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    // Grab a free port, then close it again.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let out = tempfile::tempdir().unwrap();
    let session = Session::new(&config(&format!("http://{addr}"), out.path())).unwrap();

    session.pdf().stage(vec![
        FileHandle::from_bytes("a.pdf", "application/pdf", b"%PDF".to_vec()),
        FileHandle::from_bytes("b.pdf", "application/pdf", b"%PDF".to_vec()),
    ]);
    let outcome = session.pdf().submit().await.unwrap();

    assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
    assert_eq!(session.pdf().phase(), Phase::Failed);
    assert!(session.pdf().can_submit());

    let err = session.health().await.unwrap_err();
    assert!(matches!(err, ConvmergeError::Transport(_)));
}

#[tokio::test]
async fn health_reports_ok() {
    let (url, _server) = spawn_service(Reply::Artifact).await;
    let out = tempfile::tempdir().unwrap();

    let status = assert_ok!(check_service(&config(&url, out.path())).await);

    assert!(status.is_ok());
    assert_eq!(status.message.as_deref(), Some("File conversion API running"));
}

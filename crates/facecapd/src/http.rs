use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use facecap_core::{DecodeError, VerificationOutcome, VerifyError};
use serde_json::{json, Value};

use crate::engine::EngineHandle;

const WIDGET_HTML: &str = include_str!("../assets/widget.html");

/// Shared state accessible by HTTP handlers.
pub struct AppState {
    pub engine: EngineHandle,
    pub verify_timeout: Duration,
    pub cascade_path: PathBuf,
}

/// Build the daemon router.
///
/// `GET /` serves the capture widget, `POST /upload/` verifies a capture and
/// `GET /health` reports engine liveness.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(widget))
        .route("/upload/", post(upload).fallback(method_required))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

fn rejection(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(VerificationOutcome::rejected(error))).into_response()
}

async fn widget() -> Html<&'static str> {
    Html(WIDGET_HTML)
}

async fn method_required(method: Method) -> Response {
    tracing::debug!(%method, "upload: wrong method");
    rejection(StatusCode::BAD_REQUEST, "POST method required")
}

async fn upload(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Response {
    tracing::info!(%peer, bytes = body.len(), "upload requested");

    let request: Value = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(%peer, error = %e, "upload: invalid JSON body");
            return rejection(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    let Some(fields) = request.as_object() else {
        tracing::warn!(%peer, kind = json_kind(&request), "upload: body is not an object");
        return rejection(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("expected a JSON object, found {}", json_kind(&request)),
        );
    };

    let image = match fields.get("image").filter(|v| !is_blank(v)) {
        None => return rejection(StatusCode::BAD_REQUEST, "No image provided"),
        Some(Value::String(image)) => image.clone(),
        Some(other) => {
            tracing::info!(%peer, kind = json_kind(other), "upload: image is not a string");
            let err = VerifyError::Decode(DecodeError::NotText(json_kind(other)));
            let outcome = VerificationOutcome::rejected(err.public_message());
            return (StatusCode::OK, Json(outcome)).into_response();
        }
    };

    match state.engine.verify(image, state.verify_timeout).await {
        Ok(outcome) => {
            tracing::info!(%peer, success = outcome.success, "upload processed");
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => {
            tracing::error!(%peer, error = %e, "upload failed");
            rejection(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Null, `false`, zero and empty strings or containers count as no image.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let alive = state.engine.is_alive();
    let (status, label) = if alive {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let body = json!({
        "status": label,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "services": { "engine": if alive { "ok" } else { "down" } },
        "cascade": state.cascade_path.display().to_string(),
    });
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::Request;
    use facecap_core::{FaceBounds, FaceDetector, PipelineConfig};
    use image::{GrayImage, ImageEncoder, Rgb, RgbImage};
    use tower::ServiceExt;

    /// Reports one face covering the whole frame.
    struct WholeFrame;

    impl FaceDetector for WholeFrame {
        fn detect(&self, gray: &GrayImage) -> Vec<FaceBounds> {
            vec![FaceBounds {
                x: 0,
                y: 0,
                width: gray.width(),
                height: gray.height(),
            }]
        }
    }

    struct NoFaces;

    impl FaceDetector for NoFaces {
        fn detect(&self, _gray: &GrayImage) -> Vec<FaceBounds> {
            Vec::new()
        }
    }

    fn app(detector: Box<dyn FaceDetector>, capture_dir: &std::path::Path) -> Router {
        app_with_limit(detector, capture_dir, 1024 * 1024)
    }

    fn app_with_limit(
        detector: Box<dyn FaceDetector>,
        capture_dir: &std::path::Path,
        max_body_bytes: usize,
    ) -> Router {
        let config = PipelineConfig {
            capture_dir: capture_dir.to_path_buf(),
            ..PipelineConfig::default()
        };
        let state = Arc::new(AppState {
            engine: spawn_engine(detector, config).unwrap(),
            verify_timeout: Duration::from_secs(10),
            cascade_path: PathBuf::from("/models/haarcascade_frontalface_default.xml"),
        });
        let peer = SocketAddr::from(([127, 0, 0, 1], 4000));
        router(state, max_body_bytes).layer(MockConnectInfo(peer))
    }

    fn checkerboard_data_url() -> String {
        let img = RgbImage::from_fn(32, 32, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([40, 40, 40])
            }
        });
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), 32, 32, image::ExtendedColorType::Rgb8)
            .unwrap();
        facecap_core::decode::to_data_url("image/png", &buf)
    }

    fn post_upload(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload/")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn upload_accepts_valid_capture() {
        let tmp = tempfile::tempdir().unwrap();
        let body = json!({ "image": checkerboard_data_url() }).to_string();

        let resp = app(Box::new(WholeFrame), tmp.path())
            .oneshot(post_upload(body))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Face validated and saved successfully");
        let path = PathBuf::from(json["path"].as_str().unwrap());
        assert!(path.exists());
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn upload_reports_rejection_with_200() {
        let tmp = tempfile::tempdir().unwrap();
        let body = json!({ "image": checkerboard_data_url() }).to_string();

        let resp = app(Box::new(NoFaces), tmp.path())
            .oneshot(post_upload(body))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({ "success": false, "error": "No face detected" })
        );
    }

    #[tokio::test]
    async fn upload_requires_post() {
        let tmp = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .uri("/upload/")
            .body(Body::empty())
            .unwrap();

        let resp = app(Box::new(NoFaces), tmp.path()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "POST method required");
    }

    #[tokio::test]
    async fn upload_requires_image() {
        let tmp = tempfile::tempdir().unwrap();
        let bodies = [
            r#"{}"#,
            r#"{"image": ""}"#,
            r#"{"image": null}"#,
            r#"{"image": false}"#,
            r#"{"image": 0}"#,
            r#"{"image": []}"#,
        ];
        for body in bodies {
            let resp = app(Box::new(NoFaces), tmp.path())
                .oneshot(post_upload(body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json_body(resp).await["error"], "No image provided");
        }
    }

    #[tokio::test]
    async fn upload_malformed_json_is_server_error() {
        let tmp = tempfile::tempdir().unwrap();
        for body in ["{not json", "[1, 2]", "\"data:image/png;base64,AAAA\""] {
            let resp = app(Box::new(NoFaces), tmp.path())
                .oneshot(post_upload(body))
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{body}");
            let json = json_body(resp).await;
            assert_eq!(json["success"], false);
            assert!(!json["error"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn upload_non_string_image_is_invalid_image() {
        let tmp = tempfile::tempdir().unwrap();
        for body in [r#"{"image": 123}"#, r#"{"image": ["AAAA"]}"#, r#"{"image": true}"#] {
            let resp = app(Box::new(WholeFrame), tmp.path())
                .oneshot(post_upload(body))
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::OK, "{body}");
            let json = json_body(resp).await;
            assert_eq!(json["success"], false);
            let error = json["error"].as_str().unwrap();
            assert!(error.starts_with("Invalid image:"), "{error}");
        }
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn upload_bad_base64_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let resp = app(Box::new(WholeFrame), tmp.path())
            .oneshot(post_upload(r#"{"image": "not-base64"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid image:"));
    }

    #[tokio::test]
    async fn upload_enforces_body_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let body = json!({ "image": "A".repeat(4096) }).to_string();

        let resp = app_with_limit(Box::new(NoFaces), tmp.path(), 1024)
            .oneshot(post_upload(body))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn index_serves_widget() {
        let tmp = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();

        let resp = app(Box::new(NoFaces), tmp.path()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("/upload/"));
    }

    #[tokio::test]
    async fn health_reports_engine() {
        let tmp = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let resp = app(Box::new(NoFaces), tmp.path()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["services"]["engine"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json["cascade"]
            .as_str()
            .unwrap()
            .ends_with("haarcascade_frontalface_default.xml"));
    }
}

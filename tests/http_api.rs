//! HTTP surface tests against the router with fake sessions

#![cfg(feature = "server")]

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use bg_remover::{
    server::{create_router, AppState, BatchResponse, ErrorResponse, ModelsResponse, RootResponse},
    ModelId, ServerConfig, SessionCache, SessionFactory,
};
use common::{jpeg_bytes, png_bytes, FakeFactory};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "bg-remover-test-boundary";

enum Part<'a> {
    File {
        field: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: Vec<u8>,
    },
    Text {
        field: &'a str,
        value: &'a str,
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                field,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            },
            Part::Text { field, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            },
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn image_part<'a>(field: &'a str, filename: &'a str) -> Part<'a> {
    Part::File {
        field,
        filename,
        content_type: "image/png",
        data: png_bytes(),
    }
}

struct TestServer {
    router: Router,
    factory: Arc<FakeFactory>,
    temp_dir: TempDir,
}

impl TestServer {
    fn new(capacity: usize) -> Self {
        Self::with_factory(FakeFactory::new(), capacity)
    }

    fn with_factory(factory: FakeFactory, capacity: usize) -> Self {
        let factory = Arc::new(factory);
        let default_session = Arc::new(factory.session(ModelId::U2net));
        let sessions = Arc::new(SessionCache::new(
            default_session,
            Arc::clone(&factory) as Arc<dyn SessionFactory>,
            capacity,
        ));
        let temp_dir = TempDir::new().unwrap();
        let state = AppState::new(sessions, ServerConfig::default()).with_temp_dir(temp_dir.path());
        Self {
            router: create_router(state),
            factory,
            temp_dir,
        }
    }

    async fn get(&self, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(&self, uri: &str, parts: &[Part<'_>]) -> Response {
        let request = Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn temp_files_left(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path()).unwrap().count()
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let server = TestServer::new(2);
    let response = server.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let root: RootResponse = json(response).await;
    assert_eq!(root.message, "Background Remover API");
    for endpoint in ["/models", "/remove", "/remove-batch"] {
        assert!(root.endpoints.contains_key(endpoint), "{endpoint}");
    }
}

#[tokio::test]
async fn test_models_lists_four_fixed_entries() {
    let server = TestServer::new(2);
    let models: ModelsResponse = json(server.get("/models").await).await;

    let names: Vec<&str> = models.models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["u2net", "u2netp", "u2net_human_seg", "u2net_cloth_seg"]);
    assert_eq!(
        models.models[0].description,
        "General purpose background removal (default)"
    );
}

#[tokio::test]
async fn test_remove_returns_png_attachment() {
    let server = TestServer::new(2);
    let response = server
        .post("/remove", &[image_part("file", "holiday.png")])
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=holiday_no_bg.png"
    );

    let image = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert!(image.color().has_alpha());
    assert_eq!((image.width(), image.height()), (40, 30));
    assert_eq!(server.factory.infer_calls(), 1);
    assert_eq!(server.temp_files_left(), 0);
}

#[tokio::test]
async fn test_remove_only_mask() {
    let server = TestServer::new(2);
    let response = server
        .post(
            "/remove",
            &[
                image_part("file", "a.png"),
                Part::Text {
                    field: "only_mask",
                    value: "true",
                },
                Part::Text {
                    field: "alpha_matting",
                    value: "yes",
                },
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let mask = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert_eq!(mask.color(), image::ColorType::L8);
}

#[cfg(feature = "webp-support")]
#[tokio::test]
async fn test_remove_webp_output() {
    let server = TestServer::new(2);
    let response = server
        .post(
            "/remove",
            &[
                image_part("file", "shot.png"),
                Part::Text {
                    field: "output_format",
                    value: "webp",
                },
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=shot_no_bg.webp"
    );
}

#[tokio::test]
async fn test_remove_rejects_non_image_before_processing() {
    let server = TestServer::new(2);
    let response = server
        .post(
            "/remove",
            &[Part::File {
                field: "file",
                filename: "notes.txt",
                content_type: "text/plain",
                data: b"hello".to_vec(),
            }],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json(response).await;
    assert_eq!(error.detail, "File must be an image");
    assert_eq!(server.factory.infer_calls(), 0);
    assert_eq!(server.temp_files_left(), 0);
}

#[tokio::test]
async fn test_remove_rejects_unknown_output_format() {
    let server = TestServer::new(2);
    let response = server
        .post(
            "/remove",
            &[
                image_part("file", "a.png"),
                Part::Text {
                    field: "output_format",
                    value: "jpeg",
                },
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json(response).await;
    assert_eq!(error.detail, "Output format must be png or webp");
    assert_eq!(server.temp_files_left(), 0);
}

#[tokio::test]
async fn test_remove_rejects_unknown_model() {
    let server = TestServer::new(2);
    let response = server
        .post(
            "/remove",
            &[
                image_part("file", "a.png"),
                Part::Text {
                    field: "model",
                    value: "isnet",
                },
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json(response).await;
    assert_eq!(error.detail, "Unknown model: isnet");
    assert_eq!(server.factory.sessions_created(), 0);
}

#[tokio::test]
async fn test_undecodable_image_is_server_error() {
    let server = TestServer::new(2);
    let response = server
        .post(
            "/remove",
            &[Part::File {
                field: "file",
                filename: "broken.png",
                content_type: "image/png",
                data: b"not really a png".to_vec(),
            }],
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = json(response).await;
    assert!(error.detail.starts_with("Error processing image: "));
    assert_eq!(server.temp_files_left(), 0);
}

#[tokio::test]
async fn test_model_switch_keeps_default_session() {
    let server = TestServer::new(2);
    let request = |model: &'static str| {
        vec![
            image_part("file", "a.png"),
            Part::Text {
                field: "model",
                value: model,
            },
        ]
    };

    for model in ["u2netp", "u2net", "u2netp"] {
        let response = server.post("/remove", &request(model)).await;
        assert_eq!(response.status(), StatusCode::OK, "{model}");
    }

    assert_eq!(
        server.factory.created_models.lock().unwrap().as_slice(),
        &[ModelId::U2netp]
    );
}

#[tokio::test]
async fn test_zero_capacity_builds_session_per_request() {
    let server = TestServer::new(0);
    for _ in 0..2 {
        let response = server
            .post(
                "/remove",
                &[
                    image_part("file", "a.png"),
                    Part::Text {
                        field: "model",
                        value: "u2net_human_seg",
                    },
                ],
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(server.factory.sessions_created(), 2);
}

#[tokio::test]
async fn test_model_load_failure_is_server_error() {
    let server = TestServer::with_factory(FakeFactory::failing(ModelId::U2netClothSeg), 2);
    let response = server
        .post(
            "/remove",
            &[
                image_part("file", "a.png"),
                Part::Text {
                    field: "model",
                    value: "u2net_cloth_seg",
                },
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = json(response).await;
    assert!(error.detail.contains("Failed to load model"));
}

#[tokio::test]
async fn test_batch_reports_mixed_results() {
    let server = TestServer::new(2);
    let response = server
        .post(
            "/remove-batch",
            &[
                image_part("files", "one.png"),
                Part::File {
                    field: "files",
                    filename: "readme.txt",
                    content_type: "text/plain",
                    data: b"text".to_vec(),
                },
                Part::File {
                    field: "files",
                    filename: "two.jpg",
                    content_type: "image/jpeg",
                    data: jpeg_bytes(),
                },
                Part::File {
                    field: "files",
                    filename: "corrupt.png",
                    content_type: "image/png",
                    data: b"garbage".to_vec(),
                },
                Part::Text {
                    field: "output_format",
                    value: "webp",
                },
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let batch: BatchResponse = json(response).await;
    assert_eq!(batch.processed, 4);
    assert_eq!(batch.successful, 2);
    assert_eq!(batch.failed, 2);
    assert_eq!(batch.results.len(), 4);

    let names: Vec<&str> = batch.results.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["one.png", "readme.txt", "two.jpg", "corrupt.png"]);
    assert!(batch.results[0].success && batch.results[0].output_size.unwrap() > 0);
    assert_eq!(batch.results[1].error.as_deref(), Some("File must be an image"));
    assert!(batch.results[2].success);
    assert!(!batch.results[3].success);
    assert_eq!(server.temp_files_left(), 0);
}

#[tokio::test]
async fn test_batch_over_limit_is_rejected_without_inference() {
    let server = TestServer::new(2);
    let names: Vec<String> = (0..11).map(|i| format!("img{i}.png")).collect();
    let parts: Vec<Part<'_>> = names.iter().map(|n| image_part("files", n)).collect();

    let response = server.post("/remove-batch", &parts).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = json(response).await;
    assert_eq!(error.detail, "Maximum 10 images per batch");
    assert_eq!(server.factory.infer_calls(), 0);
    assert_eq!(server.factory.sessions_created(), 0);
}

#[tokio::test]
async fn test_batch_at_limit_is_accepted() {
    let server = TestServer::new(2);
    let names: Vec<String> = (0..10).map(|i| format!("img{i}.png")).collect();
    let parts: Vec<Part<'_>> = names.iter().map(|n| image_part("files", n)).collect();

    let response = server.post("/remove-batch", &parts).await;

    assert_eq!(response.status(), StatusCode::OK);
    let batch: BatchResponse = json(response).await;
    assert_eq!(batch.successful, 10);
    assert_eq!(server.factory.infer_calls(), 10);
}

#[tokio::test]
async fn test_invalid_boolean_is_rejected() {
    let server = TestServer::new(2);
    let response = server
        .post(
            "/remove",
            &[
                image_part("file", "a.png"),
                Part::Text {
                    field: "alpha_matting",
                    value: "sometimes",
                },
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

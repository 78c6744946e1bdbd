//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use gallery_core::config::{AppConfig, IndexConfig, StorageConfig};
use gallery_index::{IndexStore, SqliteStore};
use gallery_server::{AppState, HttpFetcher, StaticTokenVerifier, create_router};
use gallery_storage::{BlobStore, FilesystemBackend};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Public base URL of the test blob store.
#[allow(dead_code)]
pub const BLOB_BASE_URL: &str = "http://gallery.test/blobs";

/// A test server over tempdir-backed filesystem storage and a SQLite index.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with default test configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_path = temp_dir.path().join("blobs");
        let db_path = temp_dir.path().join("index.db");

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_path.clone(),
            public_base_url: BLOB_BASE_URL.to_string(),
        };
        config.index = IndexConfig::Sqlite {
            path: db_path.clone(),
            connect_attempts: 1,
            connect_backoff_ms: 10,
        };
        config.reconcile.fetch_timeout_secs = Some(5);
        modifier(&mut config);

        let storage: Arc<dyn BlobStore> = Arc::new(
            FilesystemBackend::new(&storage_path, config.storage.public_base_url())
                .await
                .expect("Failed to create storage backend"),
        );
        let index: Arc<dyn IndexStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create index store"),
        );
        let fetcher = HttpFetcher::new(Some(Duration::from_secs(5)), config.upload.max_file_size)
            .expect("Failed to create fetcher");
        let verifier =
            StaticTokenVerifier::from_config(&config.auth).expect("Failed to load test tokens");

        let state = AppState::new(config, storage, index, Arc::new(fetcher), Arc::new(verifier));
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Send a request and decode the JSON body (Null when empty or not JSON).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Send a bodiless request, optionally with a bearer token.
    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Upload one multipart part named `field`.
    pub async fn upload(
        &self,
        token: Option<&str>,
        field: &str,
        filename: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let (boundary, body) = multipart_body(field, filename, content_type, data);
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            );
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }
}

/// Build a single-part multipart/form-data body.
#[allow(dead_code)]
pub fn multipart_body(
    field: &str,
    filename: &str,
    content_type: Option<&str>,
    data: &[u8],
) -> (&'static str, Vec<u8>) {
    let boundary = "gallery-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    if let Some(content_type) = content_type {
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (boundary, body)
}

//! Exposes an in-process file storage server for use in integration tests.
//!
//! The server implements the HTTP API exercised by the load test:
//!
//! - `POST /files` stores the multipart field `file` under its filename
//! - `GET /files` lists stored filenames as `{"files": [...]}`
//! - `GET /files/{filename}` returns a stored file
//! - `GET /health`, `GET /metrics` and `GET /`
//!
//! ```
//! use filestore_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/health");
//!    // use the URL in tests...
//! }
//! ```

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use filestore_config::StorageDir;
use futures::{StreamExt, future, stream};
use serde::Serialize;
use tempfile::TempDir;

/// Deviations from a well-behaved file storage service.
#[derive(Clone, Copy, Debug, Default)]
struct Quirks {
    /// Answer every upload with `500 Internal Server Error`.
    reject_uploads: bool,
    /// Store uploads, but break off the response body after the first bytes.
    truncate_upload_responses: bool,
    /// Answer listings with `204 No Content`.
    listing_without_content: bool,
}

#[derive(Debug)]
struct ServerState {
    storage: StorageDir,
    quirks: Quirks,
    uploads: AtomicU64,
    downloads: AtomicU64,
}

type SharedState = Arc<ServerState>;

/// An in-process test server for use in integration tests.
///
/// Files are stored in a temporary directory, which is deleted when the server is dropped. The
/// server listens on a random available port on localhost.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    state: SharedState,
    _tempdir: TempDir,
}

impl TestServer {
    /// Starts a server that accepts uploads.
    pub async fn new() -> Self {
        Self::start(Quirks::default()).await
    }

    /// Starts a server that answers every upload with `500 Internal Server Error`.
    ///
    /// All other endpoints behave normally.
    pub async fn rejecting_uploads() -> Self {
        Self::start(Quirks {
            reject_uploads: true,
            ..Default::default()
        })
        .await
    }

    /// Starts a server that stores uploads and answers `200 OK`, but aborts the connection in the
    /// middle of the response body.
    pub async fn truncating_upload_responses() -> Self {
        Self::start(Quirks {
            truncate_upload_responses: true,
            ..Default::default()
        })
        .await
    }

    /// Starts a server that answers `GET /files` with `204 No Content`.
    pub async fn listing_without_content() -> Self {
        Self::start(Quirks {
            listing_without_content: true,
            ..Default::default()
        })
        .await
    }

    async fn start(quirks: Quirks) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let tempdir = tempfile::tempdir().unwrap();
        let storage = StorageDir::create(tempdir.path().join("storage")).unwrap();

        let state = Arc::new(ServerState {
            storage,
            quirks,
            uploads: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
        });
        let app = router(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            state,
            _tempdir: tempdir,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// Stores a file directly, bypassing the HTTP API.
    pub fn put_file(&self, filename: &str, contents: &[u8]) {
        std::fs::write(self.state.storage.join(filename), contents).unwrap();
    }

    /// Returns the names of all stored files, sorted.
    pub fn stored_files(&self) -> Vec<String> {
        let mut files: Vec<_> = std::fs::read_dir(self.state.storage.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        files.sort_unstable();
        files
    }

    /// Number of uploads that were stored successfully.
    pub fn upload_count(&self) -> u64 {
        self.state.uploads.load(Ordering::Relaxed)
    }

    /// Number of files that were served successfully.
    pub fn download_count(&self) -> u64 {
        self.state.downloads.load(Ordering::Relaxed)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/health", routing::get(health))
        .route("/metrics", routing::get(metrics))
        .route("/files", routing::get(list_files).post(upload_file))
        .route("/files/{filename}", routing::get(download_file))
        .with_state(state)
}

fn is_valid_filename(filename: &str) -> bool {
    !filename.is_empty() && filename != "." && filename != ".." && !filename.contains(['/', '\\'])
}

#[derive(Serialize)]
struct Uploaded {
    filename: String,
    size: usize,
}

#[derive(Serialize)]
struct Listing {
    files: Vec<String>,
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "service": "filestore-test" }))
}

async fn health() -> impl IntoResponse {
    "OK"
}

async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    format!(
        "uploads_total {}\ndownloads_total {}\n",
        state.uploads.load(Ordering::Relaxed),
        state.downloads.load(Ordering::Relaxed),
    )
}

async fn upload_file(State(state): State<SharedState>, mut multipart: Multipart) -> Response {
    if state.quirks.reject_uploads {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage is read-only").into_response();
    }

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return err.into_response(),
        };
        if field.name() != Some("file") {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_owned) else {
            return (StatusCode::BAD_REQUEST, "missing filename").into_response();
        };
        if !is_valid_filename(&filename) {
            return (StatusCode::BAD_REQUEST, "invalid filename").into_response();
        }

        let contents = match field.bytes().await {
            Ok(contents) => contents,
            Err(err) => return err.into_response(),
        };
        if let Err(err) = tokio::fs::write(state.storage.join(&filename), &contents).await {
            tracing::error!(error = &err as &dyn std::error::Error, "failed to store file");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }

        state.uploads.fetch_add(1, Ordering::Relaxed);
        if state.quirks.truncate_upload_responses {
            // the pause makes hyper flush the status line and first chunk before the error
            let head = stream::once(future::ready(Ok::<_, io::Error>("{\"filename\":")));
            let abort = stream::once(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(io::Error::other("connection lost"))
            });
            return Body::from_stream(head.chain(abort)).into_response();
        }

        let uploaded = Uploaded {
            filename,
            size: contents.len(),
        };
        return Json(uploaded).into_response();
    }

    (StatusCode::BAD_REQUEST, "missing `file` field").into_response()
}

async fn list_files(State(state): State<SharedState>) -> Response {
    if state.quirks.listing_without_content {
        return StatusCode::NO_CONTENT.into_response();
    }

    let mut entries = match tokio::fs::read_dir(state.storage.path()).await {
        Ok(entries) => entries,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let mut files = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        files.push(entry.file_name().to_string_lossy().into_owned());
    }
    files.sort_unstable();

    Json(Listing { files }).into_response()
}

async fn download_file(State(state): State<SharedState>, Path(filename): Path<String>) -> Response {
    if !is_valid_filename(&filename) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    match tokio::fs::read(state.storage.join(&filename)).await {
        Ok(contents) => {
            state.downloads.fetch_add(1, Ordering::Relaxed);
            contents.into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "file not found").into_response(),
    }
}

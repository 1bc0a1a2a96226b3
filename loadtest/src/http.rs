//! Contains a remote implementation using HTTP to interact with the file storage API.

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;

/// Errors that can happen while talking to the file storage API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Any error emitted from the underlying [`reqwest`] client.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// The server did not answer an upload with `200 OK`.
    #[error("Upload failed: {body}")]
    UploadFailed {
        /// The status code returned by the server.
        status: StatusCode,
        /// The response body, for diagnostics.
        body: String,
    },
    /// The server answered with a client or server error status.
    #[error("unexpected status: {0}")]
    Status(StatusCode),
    /// A response body could not be parsed.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
    /// Error when URL manipulation fails.
    #[error("invalid URL: {message}")]
    InvalidUrl {
        /// The URL error message.
        message: String,
    },
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Body of `GET /files`.
#[derive(Debug, Deserialize)]
struct FileListing {
    #[serde(default)]
    files: Vec<String>,
}

/// A remote implementation using HTTP to interact with the file storage API.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base: Url,
    client: reqwest::Client,
}

impl HttpRemote {
    /// Creates a new `HttpRemote` for the given base URL with a default client.
    pub fn new(remote: &str) -> Result<Self> {
        let base = Url::parse(remote).map_err(|err| Error::InvalidUrl {
            message: format!("`{remote}`: {err}"),
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                message: format!("`{remote}` cannot be used as a base URL"),
            });
        }

        Ok(Self {
            base,
            client: reqwest::Client::new(),
        })
    }

    /// Replaces the HTTP client, for example to configure timeouts.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Builds the URL of `segments` relative to the base URL.
    ///
    /// Every segment is percent-encoded, so filenames cannot escape their path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl {
                message: format!("`{}` cannot be used as a base URL", self.base),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Uploads `contents` as `filename` via `POST /files`.
    ///
    /// Only `200 OK` counts as success. For any other status, the response body is returned in
    /// [`Error::UploadFailed`].
    pub async fn upload(&self, filename: &str, contents: Vec<u8>) -> Result<()> {
        let part = Part::bytes(contents)
            .file_name(filename.to_owned())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint(&["files"])?)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UploadFailed { status, body });
        }

        // the file is stored once the server answered 200, the body is informational only
        if let Err(err) = response.bytes().await {
            tracing::debug!(
                filename,
                error = &err as &dyn std::error::Error,
                "failed to read upload response"
            );
        }
        Ok(())
    }

    /// Downloads `filename` via `GET /files/{filename}`, returning the number of bytes received.
    pub async fn download(&self, filename: &str) -> Result<u64> {
        self.get_segments(&["files", filename]).await
    }

    /// Lists stored filenames via `GET /files`.
    ///
    /// Only a `200 OK` body is parsed. Other successful statuses and a body without a `files`
    /// field yield an empty list.
    pub async fn list(&self) -> Result<Vec<String>> {
        let response = self.client.get(self.endpoint(&["files"])?).send().await?;
        let response = check_status(response)?;
        if response.status() != StatusCode::OK {
            response.bytes().await?;
            return Ok(Vec::new());
        }

        let body = response.bytes().await?;
        let listing: FileListing = serde_json::from_slice(&body)?;
        Ok(listing.files)
    }

    /// Requests `path` via `GET`, returning the number of bytes received.
    ///
    /// `path` is split on `/` into segments.
    pub async fn get(&self, path: &str) -> Result<u64> {
        let segments: Vec<_> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.get_segments(&segments).await
    }

    async fn get_segments(&self, segments: &[&str]) -> Result<u64> {
        let response = self.client.get(self.endpoint(segments)?).send().await?;
        let body = check_status(response)?.bytes().await?;
        Ok(body.len() as u64)
    }
}

/// Classifies client and server error statuses as failures.
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(Error::Status(status));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_relative_to_base() {
        let remote = HttpRemote::new("http://localhost:8000").unwrap();
        assert_eq!(
            remote.endpoint(&["files"]).unwrap().as_str(),
            "http://localhost:8000/files"
        );
        assert_eq!(
            remote.endpoint(&[]).unwrap().as_str(),
            "http://localhost:8000/"
        );

        let remote = HttpRemote::new("http://localhost:8000/api/").unwrap();
        assert_eq!(
            remote.endpoint(&["files", "a.bin"]).unwrap().as_str(),
            "http://localhost:8000/api/files/a.bin"
        );
    }

    #[test]
    fn filenames_stay_in_their_segment() {
        let remote = HttpRemote::new("http://localhost:8000").unwrap();
        let url = remote.endpoint(&["files", "../etc/passwd"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/files/..%2Fetc%2Fpasswd");
    }

    #[test]
    fn rejects_invalid_remote() {
        assert!(matches!(
            HttpRemote::new("not a url"),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpRemote::new("mailto:someone@example.com"),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn upload_failure_carries_body() {
        let err = Error::UploadFailed {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "disk full".into(),
        };
        assert_eq!(err.to_string(), "Upload failed: disk full");
    }
}

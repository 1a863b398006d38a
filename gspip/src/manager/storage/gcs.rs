//! Google Cloud Storage reader over the JSON API.
//!
//! Objects are fetched with a single media download request:
//!
//! ```text
//! GET {endpoint}/storage/v1/b/{bucket}/o/{object}?alt=media[&userProject={project}]
//! ```
//!
//! The object name is percent-encoded as one path segment, so `foo/foo.tar.gz`
//! becomes `foo%2Ffoo.tar.gz`.

use std::env;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::token::{discover_access_token, AccessToken};
use crate::manager::config::ManagerConfig;
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::ObjectStore;

/// Public Cloud Storage endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Environment variable naming a Cloud Storage emulator (`host:port` or URL).
pub const EMULATOR_HOST_ENV: &str = "STORAGE_EMULATOR_HOST";

/// Default timeout for a single object download (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Buffer size for streaming object bodies to disk (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Longest error body excerpt carried into error messages.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`GcsObjectStore`].
#[derive(Debug, Clone)]
pub struct GcsOptions {
    /// API endpoint, without a trailing path.
    pub endpoint: String,
    /// Billing project sent as `userProject`.
    pub project: Option<String>,
    /// Bearer token; `None` sends anonymous requests.
    pub token: Option<AccessToken>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GcsOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project: None,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GcsOptions {
    /// Resolve options from the run configuration and the environment.
    ///
    /// An explicit endpoint wins over `STORAGE_EMULATOR_HOST`. Emulators are
    /// addressed anonymously; otherwise an access token is discovered.
    pub fn from_manager_config(config: &ManagerConfig) -> Self {
        let emulator = env::var(EMULATOR_HOST_ENV)
            .ok()
            .filter(|host| !host.trim().is_empty())
            .map(|host| normalize_endpoint(&host));

        let (endpoint, token) = match (&config.endpoint, emulator) {
            (Some(endpoint), _) => (normalize_endpoint(endpoint), discover_access_token()),
            (None, Some(emulator)) => (emulator, None),
            (None, None) => (DEFAULT_ENDPOINT.to_string(), discover_access_token()),
        };

        Self {
            endpoint,
            project: config.project.clone(),
            token,
            timeout: config.fetch_timeout,
        }
    }
}

/// Add a scheme to bare `host:port` values and drop trailing slashes.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Reads package archives from a Cloud Storage bucket.
#[derive(Debug)]
pub struct GcsObjectStore {
    client: Client,
    bucket: String,
    options: GcsOptions,
}

impl GcsObjectStore {
    /// Create a store for `bucket`.
    pub fn new(bucket: impl Into<String>, options: GcsOptions) -> ManagerResult<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ManagerError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            bucket: bucket.into(),
            options,
        })
    }

    /// Media download URL for an object.
    pub fn object_url(&self, object: &str) -> ManagerResult<Url> {
        let mut url = Url::parse(&self.options.endpoint).map_err(|e| {
            ManagerError::InvalidConfig(format!(
                "invalid storage endpoint '{}': {}",
                self.options.endpoint, e
            ))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                ManagerError::InvalidConfig(format!(
                    "storage endpoint '{}' cannot carry a path",
                    self.options.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o", object]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(project) = &self.options.project {
                query.append_pair("userProject", project);
            }
        }

        Ok(url)
    }

    fn fetch_error(&self, object: &str, reason: String) -> ManagerError {
        ManagerError::FetchFailed {
            bucket: self.bucket.clone(),
            object: object.to_string(),
            reason,
        }
    }

    fn transport_error(&self, object: &str, e: reqwest::Error) -> ManagerError {
        if e.is_timeout() {
            ManagerError::Timeout {
                operation: format!("fetching gs://{}/{}", self.bucket, object),
                timeout_secs: self.options.timeout.as_secs(),
            }
        } else {
            self.fetch_error(object, e.to_string())
        }
    }

    /// Map a non-success status to the error taxonomy.
    fn status_error(&self, object: &str, status: StatusCode, body: String) -> ManagerError {
        let mut reason = format!("HTTP {}", status);
        let body = body.trim();
        if !body.is_empty() {
            let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
            reason = format!("{}: {}", reason, excerpt);
        }

        match status {
            StatusCode::NOT_FOUND => ManagerError::ObjectNotFound {
                bucket: self.bucket.clone(),
                object: object.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ManagerError::PermissionDenied {
                bucket: self.bucket.clone(),
                object: object.to_string(),
                reason,
            },
            _ => self.fetch_error(object, reason),
        }
    }
}

impl ObjectStore for GcsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn fetch(&self, object: &str, dest: &Path, cancel: &CancellationToken) -> ManagerResult<u64> {
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        let url = self.object_url(object)?;
        debug!(bucket = %self.bucket, object, "Fetching object");

        let mut request = self.client.get(url);
        if let Some(token) = &self.options.token {
            request = request.bearer_auth(token.secret());
        }

        let mut response = request
            .send()
            .map_err(|e| self.transport_error(object, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(self.status_error(object, status, body));
        }

        let file = File::create(dest).map_err(|e| ManagerError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(ManagerError::Cancelled);
            }

            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| self.fetch_error(object, format!("read error: {}", e)))?;
            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| ManagerError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;
            written += bytes_read as u64;
        }

        writer.flush().map_err(|e| ManagerError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        debug!(bucket = %self.bucket, object, bytes = written, "Fetched object");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::TempDir;

    /// Serve one canned HTTP response and report the request line.
    fn serve_once(status: &str, body: &'static [u8]) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                headers.push(line.trim().to_string());
            }
            let auth = headers
                .iter()
                .find(|h| h.to_lowercase().starts_with("authorization:"))
                .cloned()
                .unwrap_or_default();
            tx.send(format!("{}|{}", request_line.trim(), auth)).unwrap();

            let header = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(header.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
        });

        (format!("http://{}", addr), rx)
    }

    fn store(endpoint: &str, project: Option<&str>) -> GcsObjectStore {
        GcsObjectStore::new(
            "bucket-x",
            GcsOptions {
                endpoint: endpoint.to_string(),
                project: project.map(str::to_string),
                token: AccessToken::new("test-token"),
                timeout: Duration::from_secs(10),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_object_url_encodes_object_as_one_segment() {
        let url = store(DEFAULT_ENDPOINT, None)
            .object_url("foo/foo-1.2.3.tar.gz")
            .unwrap();
        assert_eq!(
            url.as_str(),
            concat!(
                "https://storage.googleapis.com/storage/v1/b/bucket-x/o/",
                "foo%2Ffoo-1.2.3.tar.gz?alt=media"
            )
        );
    }

    #[test]
    fn test_object_url_carries_billing_project() {
        let url = store(DEFAULT_ENDPOINT, Some("my-project"))
            .object_url("foo/foo.tar.gz")
            .unwrap();
        assert!(url.as_str().ends_with("?alt=media&userProject=my-project"));
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("localhost:9023"), "http://localhost:9023");
        assert_eq!(
            normalize_endpoint("https://gcs.example.com/"),
            "https://gcs.example.com"
        );
    }

    #[test]
    fn test_fetch_writes_body_and_sends_token() {
        let (endpoint, requests) = serve_once("200 OK", b"sdist-bytes");
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("foo-1.2.3.tar.gz");

        let bytes = store(&endpoint, None)
            .fetch("foo/foo-1.2.3.tar.gz", &dest, &CancellationToken::new())
            .unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"sdist-bytes");

        let request = requests.recv().unwrap();
        assert!(request.starts_with(
            "GET /storage/v1/b/bucket-x/o/foo%2Ffoo-1.2.3.tar.gz?alt=media HTTP/1.1"
        ));
        assert!(request.ends_with("Bearer test-token"));
    }

    #[test]
    fn test_fetch_not_found() {
        let (endpoint, _requests) = serve_once("404 Not Found", b"No such object");
        let temp = TempDir::new().unwrap();

        let err = store(&endpoint, None)
            .fetch(
                "foo/foo.tar.gz",
                &temp.path().join("foo.tar.gz"),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ManagerError::ObjectNotFound { .. }));
        assert!(!temp.path().join("foo.tar.gz").exists());
    }

    #[test]
    fn test_fetch_forbidden() {
        let (endpoint, _requests) = serve_once("403 Forbidden", b"denied");
        let temp = TempDir::new().unwrap();

        let err = store(&endpoint, None)
            .fetch(
                "foo/foo.tar.gz",
                &temp.path().join("foo.tar.gz"),
                &CancellationToken::new(),
            )
            .unwrap_err();
        match err {
            ManagerError::PermissionDenied { reason, .. } => assert!(reason.contains("denied")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fetch_server_error() {
        let (endpoint, _requests) = serve_once("503 Service Unavailable", b"");
        let temp = TempDir::new().unwrap();

        let err = store(&endpoint, None)
            .fetch(
                "foo/foo.tar.gz",
                &temp.path().join("foo.tar.gz"),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ManagerError::FetchFailed { .. }));
    }

    #[test]
    fn test_fetch_cancelled_before_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let temp = TempDir::new().unwrap();

        let err = store("http://127.0.0.1:9", None)
            .fetch("foo/foo.tar.gz", &temp.path().join("foo.tar.gz"), &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}

//! Authenticated HTTP client for the upstream archive
//!
//! Every request carries the user-agent, the logged-in cookie pair, and the
//! optional `LOW` authorization header. Bodies of pages are buffered;
//! asset bodies are streamed and never buffered here.

use crate::config::ArchiveAuth;
use crate::url::{capture_url, raw_capture_url};
use crate::{ArchiverError, ConfigError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Fallback pause when a 429 arrives without a Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Classified failure of a capture request
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The archive holds no capture for this URL (404/410)
    #[error("capture not found (HTTP {status})")]
    NotFound { status: u16 },

    /// The archive asked us to back off (429)
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Network failure, timeout, or 5xx — may succeed on a later run
    #[error("transient error: {0}")]
    Transient(String),

    /// Any other 4xx — retrying will not help
    #[error("permanent error (HTTP {status})")]
    Permanent { status: u16 },
}

/// A fetched page body
#[derive(Debug)]
pub struct PageCapture {
    pub body: String,
    pub status: u16,
}

/// A streaming asset response
///
/// Wraps the raw response so the fetch layer can inspect headers before
/// deciding whether to drain the stream.
#[derive(Debug)]
pub struct AssetStream {
    response: Response,
}

impl AssetStream {
    /// Declared body size, if the archive sent one
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Declared content type, if any
    pub fn content_type(&self) -> Option<String> {
        self.response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Consumes the wrapper, yielding the response for streaming
    pub fn into_response(self) -> Response {
        self.response
    }
}

/// Authenticated client for one archive host
pub struct CaptureClient {
    client: Client,
    host: String,
}

impl CaptureClient {
    /// Builds a client for the given archive host
    ///
    /// # Arguments
    ///
    /// * `host` - Archive hostname (e.g. `web.archive.org`)
    /// * `auth` - Credentials loaded from the environment
    ///
    /// # Returns
    ///
    /// * `Ok(CaptureClient)` - Ready-to-use client
    /// * `Err(ArchiverError)` - Credentials could not be encoded or the
    ///   client could not be built
    pub fn new(host: &str, auth: &ArchiveAuth) -> Result<Self, ArchiverError> {
        let mut headers = HeaderMap::new();

        let cookie = HeaderValue::from_str(&auth.cookie_header()).map_err(|_| {
            ConfigError::Validation("cookie credentials contain invalid header characters".into())
        })?;
        headers.insert(COOKIE, cookie);

        if let Some(authorization) = auth.authorization_header() {
            let value = HeaderValue::from_str(&authorization).map_err(|_| {
                ConfigError::Validation("S3 credentials contain invalid header characters".into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let user_agent = format!(
            "wayback-archiver/{} (personal archival; slow, polite crawler)",
            env!("CARGO_PKG_VERSION")
        );

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            host: host.to_string(),
        })
    }

    /// Fetches the archived document body for `(url, timestamp)`
    ///
    /// Uses the replayed form `https://{host}/web/{ts}/{url}`. Redirects
    /// within the archive (to the nearest capture) are followed by the
    /// client, up to 5 hops.
    pub async fn get_page(&self, url: &str, timestamp: &str) -> Result<PageCapture, CaptureError> {
        let capture = capture_url(&self.host, timestamp, url);
        tracing::debug!("Fetching page: {}", capture);

        let response = self.client.get(&capture).send().await.map_err(map_request_error)?;
        let response = check_status(response)?;
        let status = response.status().as_u16();

        let body = response
            .text()
            .await
            .map_err(|e| CaptureError::Transient(format!("body read failed: {}", e)))?;

        Ok(PageCapture { body, status })
    }

    /// Opens a streaming GET for an already-formed capture URL
    ///
    /// The body is not read here; callers inspect `Content-Length` first and
    /// may drop the stream without draining it.
    pub async fn get_asset(&self, capture_url: &str) -> Result<AssetStream, CaptureError> {
        tracing::debug!("Fetching asset: {}", capture_url);

        let response = self
            .client
            .get(capture_url)
            .send()
            .await
            .map_err(map_request_error)?;
        let response = check_status(response)?;

        Ok(AssetStream { response })
    }

    /// Opens a streaming GET for the raw (`id_`) variant of a capture
    ///
    /// The raw form returns the original archived bytes without the replay
    /// chrome the archive injects into rendered captures.
    pub async fn get_raw(&self, url: &str, timestamp: &str) -> Result<AssetStream, CaptureError> {
        let capture = raw_capture_url(&self.host, timestamp, url);
        self.get_asset(&capture).await
    }

    /// The archive host this client talks to
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Maps a transport-level failure onto the capture taxonomy
fn map_request_error(err: reqwest::Error) -> CaptureError {
    if err.is_timeout() {
        CaptureError::Transient("request timeout".to_string())
    } else if err.is_connect() {
        CaptureError::Transient("connection failed".to_string())
    } else if err.is_redirect() {
        CaptureError::Permanent { status: 0 }
    } else {
        CaptureError::Transient(err.to_string())
    }
}

/// Classifies a response status, passing successful responses through
///
/// | Status | Classification |
/// |--------|----------------|
/// | 2xx | success |
/// | 404, 410 | NotFound |
/// | 429 | RateLimited (Retry-After header, else 60 s) |
/// | other 4xx | Permanent |
/// | 5xx | Transient |
fn check_status(response: Response) -> Result<Response, CaptureError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(CaptureError::NotFound {
            status: status.as_u16(),
        });
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(CaptureError::RateLimited { retry_after });
    }

    if status.is_server_error() {
        return Err(CaptureError::Transient(format!("HTTP {}", status.as_u16())));
    }

    Err(CaptureError::Permanent {
        status: status.as_u16(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_auth() -> ArchiveAuth {
        ArchiveAuth {
            logged_in_user: "user%40example.com".to_string(),
            logged_in_sig: "test-sig".to_string(),
            s3_access: None,
            s3_secret: None,
        }
    }

    /// Builds a client whose "archive host" is the mock server
    fn client_for(server: &MockServer) -> CaptureClient {
        let host = server.uri().strip_prefix("http://").unwrap().to_string();
        CaptureClient::new(&host, &test_auth()).unwrap()
    }

    /// The client builds https URLs; point requests at the mock directly.
    async fn get_via(client: &CaptureClient, server: &MockServer, suffix: &str) -> Result<AssetStream, CaptureError> {
        client.get_asset(&format!("{}{}", server.uri(), suffix)).await
    }

    #[test]
    fn test_new_client() {
        let client = CaptureClient::new("web.archive.org", &test_auth());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().host(), "web.archive.org");
    }

    #[tokio::test]
    async fn test_requests_carry_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/asset"))
            .and(header(
                "cookie",
                "logged-in-user=user%40example.com; logged-in-sig=test-sig",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let stream = get_via(&client, &server, "/asset").await.unwrap();
        assert_eq!(stream.content_length(), Some(2));
    }

    #[tokio::test]
    async fn test_authorization_header_sent_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/asset"))
            .and(header("authorization", "LOW AK:SK"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut auth = test_auth();
        auth.s3_access = Some("AK".to_string());
        auth.s3_secret = Some("SK".to_string());
        let host = server.uri().strip_prefix("http://").unwrap().to_string();
        let client = CaptureClient::new(&host, &auth).unwrap();

        let result = get_via(&client, &server, "/asset").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_404_classified_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = get_via(&client, &server, "/missing").await.unwrap_err();
        assert!(matches!(err, CaptureError::NotFound { status: 404 }));
    }

    #[tokio::test]
    async fn test_429_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = get_via(&client, &server, "/limited").await.unwrap_err();
        assert!(matches!(err, CaptureError::RateLimited { retry_after: 17 }));
    }

    #[tokio::test]
    async fn test_429_without_header_defaults_to_60s() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = get_via(&client, &server, "/limited").await.unwrap_err();
        assert!(matches!(err, CaptureError::RateLimited { retry_after: 60 }));
    }

    #[tokio::test]
    async fn test_5xx_classified_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = get_via(&client, &server, "/busy").await.unwrap_err();
        assert!(matches!(err, CaptureError::Transient(_)));
    }

    #[tokio::test]
    async fn test_other_4xx_classified_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = get_via(&client, &server, "/forbidden").await.unwrap_err();
        assert!(matches!(err, CaptureError::Permanent { status: 403 }));
    }
}

//! HTTP client with safe logging, retries, and bearer auth.
//!
//! - JSON helpers for API calls (`post_json`) anchored to a base URL
//! - Text requests (`send_text`) for page fetches with arbitrary method,
//!   headers and body against absolute URLs
//! - Redacts sensitive headers and never logs secret values
//! - Retries 429/5xx and transport errors with exponential backoff and
//!   `Retry-After` support, within a per-request retry budget
//! - Optional *raw* request/response logging via `PAGEDIFF_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), pagediff_http::HttpError> {
//! use pagediff_http::{HttpClient, Method, RequestOpts};
//!
//! let client = HttpClient::detached()?;
//! let page = client
//!     .send_text(Method::GET, "https://example.com", None, RequestOpts::default())
//!     .await?;
//! println!("{} bytes, status {}", page.body.len(), page.status);
//! # Ok(()) }
//! ```

use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

pub use reqwest::{Method, Url};

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "PAGEDIFF_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Render a request as a `curl` command line.
///
/// Values are single-quoted with embedded quotes escaped the POSIX way, so
/// the output survives shell-style tokenization unchanged. Nothing is
/// redacted here; callers that log the result pass redacted headers.
///
/// ```
/// use pagediff_http::render_curl;
///
/// let curl = render_curl(
///     "POST",
///     "https://a.test/x",
///     &[("Accept".to_string(), "text/html".to_string())],
///     Some("it's"),
/// );
/// assert_eq!(
///     curl,
///     r#"curl 'https://a.test/x' -X POST -H 'Accept: text/html' -d 'it'\''s'"#
/// );
/// ```
pub fn render_curl(
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: Option<&str>,
) -> String {
    let mut parts = vec!["curl".to_string(), shell_quote(url)];
    if !method.eq_ignore_ascii_case("GET") || body.is_some() {
        parts.push(format!("-X {method}"));
    }
    for (name, value) in headers {
        parts.push(format!("-H {}", shell_quote(&format!("{name}: {value}"))));
    }
    if let Some(body) = body {
        parts.push(format!("-d {}", shell_quote(body)));
    }
    parts.join(" ")
}

/// Redact sensitive headers for logging.
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") || key.eq_ignore_ascii_case("cookie") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Request Options
// ==============================

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use pagediff_http::RequestOpts;
///
/// let opts = RequestOpts {
///     retries: Some(0),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.retries, Some(0));
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts {
    /// Overrides the client's retry budget for this request.
    pub retries: Option<usize>,
    pub headers: Option<HeaderMap>,
}

/// A completed text request. Returned for every status; see
/// [`TextResponse::error_for_status`].
#[derive(Debug, Clone)]
pub struct TextResponse {
    pub status: StatusCode,
    /// URL after redirects.
    pub url: String,
    pub body: String,
    pub request_id: String,
}

impl TextResponse {
    /// Keep 2xx and 3xx responses, turn everything else into [`HttpError::Api`].
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.status.is_success() || self.status.is_redirection() {
            Ok(self)
        } else {
            Err(HttpError::Api {
                status: self.status,
                message: snip_body(self.body.as_bytes()),
                request_id: self.request_id,
            })
        }
    }
}

struct RawResponse {
    status: StatusCode,
    url: String,
    headers: HeaderMap,
    bytes: Vec<u8>,
    req_id: String,
}

// ==============================
// Client
// ==============================

/// Shared connection pool plus defaults. Cheap to clone; carries no
/// per-request state between calls.
#[derive(Clone)]
pub struct HttpClient {
    base: Option<Url>,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use pagediff_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        Self::build(Some(base), Duration::from_secs(5))
    }

    /// Construct a client without a base; every path must be an absolute URL.
    pub fn detached() -> Result<Self, HttpError> {
        Self::build(None, Duration::from_secs(5))
    }

    /// Like [`HttpClient::detached`] with an explicit connect timeout.
    pub fn detached_with_connect_timeout(connect: Duration) -> Result<Self, HttpError> {
        Self::build(None, connect)
    }

    fn build(base: Option<Url>, connect: Duration) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(connect)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    /// Override the default timeout.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        if let Ok(abs) = Url::parse(path) {
            return Ok(abs);
        }
        match &self.base {
            Some(base) => base.join(path).map_err(|e| HttpError::Url(e.to_string())),
            None => Err(HttpError::Url(format!("relative path without base: {path}"))),
        }
    }

    /// POST JSON using optional Bearer auth; non-2xx becomes [`HttpError::Api`].
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.resolve(path)?;
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        let raw = self
            .execute(
                Method::POST,
                url,
                Some((bytes, "application/json")),
                RequestOpts::default(),
                bearer,
                true,
            )
            .await?;

        if !raw.status.is_success() {
            return Err(api_error(&raw));
        }

        let snippet = snip_body(&raw.bytes);

        serde_json::from_slice::<T>(&raw.bytes).map_err(|e| {
            tracing::warn!(
                req_id=%raw.req_id,
                serde_line=%e.line(),
                serde_col=%e.column(),
                serde_err=%e.to_string(),
                body_snippet=%snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        })
    }

    /// Send an arbitrary request and return the body as text.
    ///
    /// Non-success statuses are *not* errors here: the caller decides, e.g.
    /// via [`TextResponse::error_for_status`]. 429/5xx are still retried
    /// within the retry budget.
    pub async fn send_text(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        opts: RequestOpts,
    ) -> Result<TextResponse, HttpError> {
        let url = self.resolve(path)?;
        let body = body.map(|b| (b.into_bytes(), "application/x-www-form-urlencoded"));
        let raw = self.execute(method, url, body, opts, None, false).await?;

        Ok(TextResponse {
            status: raw.status,
            url: raw.url,
            body: String::from_utf8_lossy(&raw.bytes).into_owned(),
            request_id: raw.req_id,
        })
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<(Vec<u8>, &'static str)>,
        opts: RequestOpts,
        bearer: Option<&str>,
        warn_on_error_status: bool,
    ) -> Result<RawResponse, HttpError> {
        let mut attempt = 0usize;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let req_id = format!("r{}", uuid::Uuid::new_v4().simple());
        let bearer = bearer.map(sanitize_api_key).transpose()?;
        let timeout = self.default_timeout;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);

            // Caller headers go last so a replayed Content-Type wins.
            if let Some((bytes, content_type)) = &body {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, *content_type)
                    .body(bytes.clone());
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }

            if let Some(tok) = &bearer {
                rb = rb.bearer_auth(tok);
            }
            let auth_kind = if bearer.is_some() { "bearer" } else { "none" };

            tracing::debug!(
                target: "http",
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                timeout_ms=timeout.as_millis() as u64,
                auth_kind,
                has_body=%body.is_some(),
                "http.request.start"
            );

            if raw_enabled() {
                let hdrs = opts.headers.as_ref().map(redact_headers).unwrap_or_default();
                let body_text = body.as_ref().map(|(bytes, _)| {
                    let end = bytes.len().min(RAW_MAX_BODY);
                    String::from_utf8_lossy(&bytes[..end]).into_owned()
                });
                let curl = render_curl(method.as_str(), url.as_str(), &hdrs, body_text.as_deref());
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            let t0 = std::time::Instant::now();
            let sent = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();
                    let headers = resp.headers().clone();
                    resp.bytes()
                        .await
                        .map(|bytes| (status, final_url, headers, bytes.to_vec()))
                        .map_err(|e| ("body", e.to_string()))
                }
                Err(err) => Err(("send", err.to_string())),
            };

            let (status, final_url, headers, bytes) = match sent {
                Ok(parts) => parts,
                Err((phase, message)) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            target: "http",
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            phase,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        target: "http",
                        req_id=%req_id,
                        attempt,
                        phase,
                        message=%message,
                        "http.network_error"
                    );
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            tracing::debug!(
                target: "http",
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                final_url=%final_url,
                "http.response.headers"
            );

            if raw_enabled() {
                let hdrs = redact_headers(&headers);
                let end = bytes.len().min(RAW_MAX_BODY);
                let text = String::from_utf8_lossy(&bytes[..end]);
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?hdrs,
                    body=%text,
                    truncated=bytes.len() > RAW_MAX_BODY
                );
            }

            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            if (is_429 || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_delay_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if is_429 => backoff(attempt).max(Duration::from_millis(1100)),
                    None => backoff(attempt),
                };
                tracing::warn!(
                    target: "http",
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    body_snippet=%snip_body(&bytes),
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            if !status.is_success() && warn_on_error_status {
                tracing::warn!(
                    target: "http",
                    req_id=%req_id,
                    %status,
                    message=%extract_error_message(&bytes),
                    body_snippet=%snip_body(&bytes),
                    "http.error"
                );
            }

            return Ok(RawResponse {
                status,
                url: final_url,
                headers,
                bytes,
                req_id,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(16)))
}

fn api_error(raw: &RawResponse) -> HttpError {
    let request_id = raw
        .headers
        .get("x-request-id")
        .or_else(|| raw.headers.get("x-correlation-id"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or(&raw.req_id)
        .to_string();
    HttpError::Api {
        status: raw.status,
        message: extract_error_message(&raw.bytes),
        request_id,
    }
}

fn extract_error_message(body: &[u8]) -> String {
    // OpenAI style: {"error":{"message":"..."}}
    #[derive(Deserialize)]
    struct OpenAiEnv {
        error: OpenAiDetail,
    }
    #[derive(Deserialize)]
    struct OpenAiDetail {
        message: String,
    }

    // Generic: {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<OpenAiEnv>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();

    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_quotes_and_whitespace() {
        assert_eq!(sanitize_api_key(" 'sk-ab c\n' ").unwrap(), "sk-abc");
        assert!(sanitize_api_key("   ").is_err());
        assert!(sanitize_api_key("sk-é").is_err());
    }

    #[test]
    fn error_message_prefers_openai_envelope() {
        let body = br#"{"error":{"message":"bad key"}}"#;
        assert_eq!(extract_error_message(body), "bad key");
        assert_eq!(extract_error_message(br#"{"detail":"nope"}"#), "nope");
        assert_eq!(extract_error_message(b"plain"), "plain");
    }

    #[test]
    fn credential_headers_are_redacted() {
        let mut h = HeaderMap::new();
        h.insert("authorization", HeaderValue::from_static("Bearer sk-live"));
        h.insert("cookie", HeaderValue::from_static("session=abc"));
        h.insert("accept", HeaderValue::from_static("text/html"));
        let red = redact_headers(&h);
        let value = |name: &str| red.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
        assert_eq!(value("authorization"), Some("<redacted>"));
        assert_eq!(value("cookie"), Some("<redacted>"));
        assert_eq!(value("accept"), Some("text/html"));
    }

    #[test]
    fn get_without_body_renders_no_method_flag() {
        let curl = render_curl("GET", "https://a.test", &[], None);
        assert_eq!(curl, "curl 'https://a.test'");
    }

    #[test]
    fn relative_path_needs_base() {
        let client = HttpClient::detached().unwrap();
        assert!(matches!(client.resolve("v1/x"), Err(HttpError::Url(_))));
        let anchored = HttpClient::new("https://api.test/v1/").unwrap();
        assert_eq!(
            anchored.resolve("responses").unwrap().as_str(),
            "https://api.test/v1/responses"
        );
    }

    #[test]
    fn error_for_status_keeps_redirects() {
        let resp = TextResponse {
            status: StatusCode::FOUND,
            url: "https://a.test".into(),
            body: String::new(),
            request_id: "r1".into(),
        };
        assert!(resp.error_for_status().is_ok());

        let resp = TextResponse {
            status: StatusCode::NOT_FOUND,
            url: "https://a.test".into(),
            body: "missing".into(),
            request_id: "r2".into(),
        };
        assert!(matches!(
            resp.error_for_status(),
            Err(HttpError::Api { status, .. }) if status == StatusCode::NOT_FOUND
        ));
    }
}

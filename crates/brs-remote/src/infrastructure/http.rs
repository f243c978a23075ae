//! HTTP plumbing shared by the ECP and installer clients.
//!
//! Every exchange runs under an absolute deadline covering both the request
//! and the full body read.  When the deadline passes, the in-flight future is
//! dropped, which cancels the request.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode, Url};

use crate::error::ClientError;

/// Deadline for queries, key events, probes and screenshot downloads.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for authenticated requests, which may carry a package upload.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Builds the `reqwest` client used by one simulator client.
///
/// Redirects are not followed and system proxies are ignored: the simulator
/// is always addressed directly.
pub fn build_client() -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .map_err(|e| ClientError::InvalidEndpoint(format!("failed to build HTTP client: {e}")))
}

/// Parses a base URL such as `http://127.0.0.1:8060`.
pub fn parse_base_url(base: &str) -> Result<Url, ClientError> {
    Url::parse(base).map_err(|e| ClientError::InvalidEndpoint(format!("{base}: {e}")))
}

/// Resolves an absolute path (e.g. `/query/apps`) against `base`.
pub fn endpoint(base: &Url, path: &str) -> Result<Url, ClientError> {
    base.join(path)
        .map_err(|e| ClientError::InvalidEndpoint(format!("{path}: {e}")))
}

/// Sends `request` and reads the whole body, all within `timeout`.
///
/// # Errors
///
/// - [`ClientError::Timeout`] if the deadline passes first.
/// - [`ClientError::Unreachable`] if no response could be obtained.
pub async fn exchange(
    request: RequestBuilder,
    operation: &str,
    url: &Url,
    timeout: Duration,
) -> Result<HttpReply, ClientError> {
    let work = async {
        let response = request
            .send()
            .await
            .map_err(|source| ClientError::Unreachable {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Unreachable {
                url: url.to_string(),
                source,
            })?;
        Ok::<_, ClientError>(HttpReply {
            status,
            headers,
            body: body.to_vec(),
        })
    };

    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| ClientError::Timeout {
            operation: operation.to_string(),
            timeout,
        })?
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_absolute_path() {
        let base = parse_base_url("http://127.0.0.1:8060").unwrap();
        let url = endpoint(&base, "/query/apps").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8060/query/apps");
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        let result = parse_base_url("not a url");
        assert!(matches!(result, Err(ClientError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_reply_text_is_lossy_utf8() {
        let reply = HttpReply {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: vec![b'o', b'k', 0xff],
        };
        assert!(reply.is_success());
        assert_eq!(reply.text(), "ok\u{fffd}");
    }

    #[tokio::test]
    async fn test_exchange_against_closed_port_is_unreachable() {
        // Arrange: bind then drop a listener so the port is known to be free
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = build_client().unwrap();
        let url = parse_base_url(&format!("http://{addr}/")).unwrap();

        // Act
        let result = exchange(client.get(url.clone()), "GET /", &url, REQUEST_TIMEOUT).await;

        // Assert
        assert!(matches!(result, Err(ClientError::Unreachable { .. })));
    }
}

//! Web installer client: Digest-authenticated package upload and screenshots.
//!
//! # Authentication cycle
//!
//! ```text
//! Client                                   Installer
//! ──────                                   ─────────
//! POST /plugin_install (no body)  ───────▶
//!                                 ◀─────── 401 WWW-Authenticate: Digest nonce=...
//! nc += 1, fresh cnonce, compute response
//! POST /plugin_install + Authorization
//!      + multipart body           ───────▶
//!                                 ◀─────── 200
//! ```
//!
//! The unauthenticated probe has a 10 s deadline.  The authenticated retry
//! carries the real body and gets 30 s, since it may be a large upload.  If
//! the probe is not answered with 401 its response is returned as is.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use brs_core::protocol::ecp::{PLUGIN_INSPECT, PLUGIN_INSTALL, SCREENSHOT_JPG, SCREENSHOT_PNG};
use brs_core::{DigestAuthenticator, DigestChallenge, DigestCredentials, DigestError, SimulatorConfig};
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode, Url};
use tracing::{debug, info, warn};

use super::http::{self, HttpReply, REQUEST_TIMEOUT, UPLOAD_TIMEOUT};
use crate::application::status::HealthProbe;
use crate::error::ClientError;

/// Longest response snippet included in an install failure message.
const INSTALL_BODY_CHARS: usize = 500;

/// Multipart field that selects the installer action.
const SUBMIT_FIELD: &str = "mysubmit";

/// Multipart field carrying the package file.
const ARCHIVE_FIELD: &str = "archive";

/// Body attached to the authenticated half of a Digest cycle.
#[derive(Debug)]
pub enum RequestBody {
    Empty,
    Bytes(Vec<u8>),
    Form(Form),
}

/// Encoding of a captured screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Raw image bytes fetched from the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

/// Client for the Digest-protected web installer.
///
/// The nonce count lives inside the client's [`DigestAuthenticator`] and is
/// advanced exactly once per authenticated attempt.
#[derive(Debug)]
pub struct InstallerClient {
    http: reqwest::Client,
    base_url: Url,
    auth: DigestAuthenticator,
    screenshot_delay: Duration,
}

impl InstallerClient {
    /// Creates a client for the installer port of `config`, authenticating
    /// as the developer account with `config.web_password`.
    pub fn new(config: &SimulatorConfig) -> Result<Self, ClientError> {
        Self::with_authenticator(
            &config.installer_base_url(),
            DigestAuthenticator::new(DigestCredentials::developer(config.web_password.clone())),
            config.screenshot_delay(),
        )
    }

    /// Creates a client with an explicit base URL and authenticator.
    pub fn with_authenticator(
        base: &str,
        auth: DigestAuthenticator,
        screenshot_delay: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: http::build_client()?,
            base_url: http::parse_base_url(base)?,
            auth,
            screenshot_delay,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Number of authenticated attempts made so far.
    pub fn nonce_count(&self) -> u32 {
        self.auth.nonce_count()
    }

    /// Runs one Digest cycle for `method path`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Protocol`] if the 401 carries no usable Digest challenge.
    /// - [`ClientError::Timeout`] / [`ClientError::Unreachable`] on transport failure.
    ///
    /// A non-2xx final status is *not* an error here; callers decide.
    pub async fn digest_request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<HttpReply, ClientError> {
        let url = http::endpoint(&self.base_url, path)?;
        let operation = format!("{method} {path}");

        let probe = http::exchange(
            self.http.request(method.clone(), url.clone()),
            &operation,
            &url,
            REQUEST_TIMEOUT,
        )
        .await?;
        if probe.status != StatusCode::UNAUTHORIZED {
            debug!("{operation} answered {} without a challenge", probe.status);
            return Ok(probe);
        }

        let challenge = challenge_from(&probe)?;
        let authorization = self.auth.authorize(&challenge, method.as_str(), path);
        debug!(nc = %authorization.nc, realm = %challenge.realm, "retrying {operation} with digest authorization");

        let request = self
            .http
            .request(method, url.clone())
            .header(AUTHORIZATION, authorization.to_string());
        let request = match body {
            RequestBody::Empty => request,
            RequestBody::Bytes(bytes) => request.body(bytes),
            RequestBody::Form(form) => request.multipart(form),
        };
        http::exchange(request, &operation, &url, UPLOAD_TIMEOUT).await
    }

    /// Asks the simulator to save a screenshot, waits for it to reach disk,
    /// then downloads it.
    ///
    /// # Errors
    ///
    /// [`ClientError::Retrieval`] if neither image path can be fetched, or
    /// any error from the authenticated request.
    pub async fn capture_screenshot(&self) -> Result<Screenshot, ClientError> {
        let form = Form::new().text(SUBMIT_FIELD, "Screenshot");
        let reply = self
            .digest_request(Method::POST, PLUGIN_INSPECT, RequestBody::Form(form))
            .await?;
        if !reply.is_success() {
            warn!("screenshot request answered {}", reply.status);
        }

        tokio::time::sleep(self.screenshot_delay).await;
        self.fetch_screenshot().await
    }

    /// Downloads the last saved screenshot, PNG first, then JPG.
    pub async fn fetch_screenshot(&self) -> Result<Screenshot, ClientError> {
        let mut last_status = StatusCode::NOT_FOUND;
        for (path, format) in [
            (SCREENSHOT_PNG, ImageFormat::Png),
            (SCREENSHOT_JPG, ImageFormat::Jpeg),
        ] {
            let url = http::endpoint(&self.base_url, path)?;
            let reply = http::exchange(
                self.http.get(url.clone()),
                &format!("GET {path}"),
                &url,
                REQUEST_TIMEOUT,
            )
            .await?;
            if reply.is_success() {
                return Ok(Screenshot {
                    format,
                    data: reply.body,
                });
            }
            debug!("GET {path} answered {}", reply.status);
            last_status = reply.status;
        }
        Err(ClientError::Retrieval {
            status: last_status.as_u16(),
        })
    }

    /// Side-loads the channel package at `path`.
    ///
    /// Returns a human-readable outcome: `Channel installed successfully
    /// (200)` on a 2xx, otherwise the status and the first 500 characters of
    /// the installer's answer.
    ///
    /// # Errors
    ///
    /// [`ClientError::Package`] if the file cannot be read, or any transport
    /// or authentication error.
    pub async fn install_package(&self, path: impl AsRef<Path>) -> Result<String, ClientError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::Package {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.zip".to_string());
        info!("installing {file_name} ({} bytes)", data.len());

        let archive = Part::bytes(data)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| ClientError::InvalidEndpoint(format!("archive part: {e}")))?;
        let form = Form::new()
            .text(SUBMIT_FIELD, "Install")
            .part(ARCHIVE_FIELD, archive);

        let reply = self
            .digest_request(Method::POST, PLUGIN_INSTALL, RequestBody::Form(form))
            .await?;
        Ok(install_outcome(&reply))
    }

    /// `true` if `GET /` answers 401 or any 2xx.
    ///
    /// A 401 proves the authentication layer is up even without credentials.
    /// Never fails: transport errors and timeouts report `false`.
    pub async fn check_health(&self) -> bool {
        let url = self.base_url.clone();
        match http::exchange(
            self.http.get(url.clone()),
            "installer health",
            &url,
            REQUEST_TIMEOUT,
        )
        .await
        {
            Ok(reply) => reply.status == StatusCode::UNAUTHORIZED || reply.is_success(),
            Err(e) => {
                debug!("installer health check failed: {e}");
                false
            }
        }
    }
}

/// Picks the Digest challenge out of a 401 response.
///
/// Servers may offer several schemes; the first one that parses as Digest wins.
fn challenge_from(reply: &HttpReply) -> Result<DigestChallenge, DigestError> {
    let mut first_error = DigestError::MissingHeader;
    for (i, value) in reply.headers.get_all(WWW_AUTHENTICATE).iter().enumerate() {
        match DigestChallenge::parse(&String::from_utf8_lossy(value.as_bytes())) {
            Ok(challenge) => return Ok(challenge),
            Err(e) if i == 0 => first_error = e,
            Err(_) => {}
        }
    }
    Err(first_error)
}

fn install_outcome(reply: &HttpReply) -> String {
    let status = reply.status.as_u16();
    if reply.is_success() {
        format!("Channel installed successfully ({status})")
    } else {
        format!(
            "Install responded with status {status}: {}",
            http::truncate_chars(&reply.text(), INSTALL_BODY_CHARS)
        )
    }
}

#[async_trait]
impl HealthProbe for InstallerClient {
    async fn check_health(&self) -> bool {
        InstallerClient::check_health(self).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn reply(status: StatusCode, body: &str) -> HttpReply {
        HttpReply {
            status,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_new_uses_installer_port_and_zero_counter() {
        let cfg = SimulatorConfig::default();
        let installer = InstallerClient::new(&cfg).unwrap();
        assert_eq!(installer.base_url().as_str(), "http://127.0.0.1:8888/");
        assert_eq!(installer.nonce_count(), 0);
    }

    #[test]
    fn test_install_outcome_success() {
        let text = install_outcome(&reply(StatusCode::OK, "<html>ok</html>"));
        assert_eq!(text, "Channel installed successfully (200)");
    }

    #[test]
    fn test_install_outcome_failure_truncates_body() {
        // Arrange
        let long = "e".repeat(900);

        // Act
        let text = install_outcome(&reply(StatusCode::BAD_REQUEST, &long));

        // Assert
        let prefix = "Install responded with status 400: ";
        assert!(text.starts_with(prefix));
        assert_eq!(text.len(), prefix.len() + INSTALL_BODY_CHARS);
    }

    #[test]
    fn test_challenge_from_missing_header() {
        let result = challenge_from(&reply(StatusCode::UNAUTHORIZED, ""));
        assert_eq!(result, Err(DigestError::MissingHeader));
    }

    #[test]
    fn test_challenge_from_skips_basic_offer() {
        // Arrange: Basic offered first, Digest second
        let mut r = reply(StatusCode::UNAUTHORIZED, "");
        r.headers
            .append(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"x\""));
        r.headers.append(
            WWW_AUTHENTICATE,
            HeaderValue::from_static("Digest realm=\"rokudev\", nonce=\"abc\""),
        );

        // Act
        let challenge = challenge_from(&r).unwrap();

        // Assert
        assert_eq!(challenge.nonce, "abc");
    }

    #[test]
    fn test_challenge_from_reports_first_error_when_nothing_parses() {
        let mut r = reply(StatusCode::UNAUTHORIZED, "");
        r.headers
            .append(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"x\""));
        assert_eq!(
            challenge_from(&r),
            Err(DigestError::UnsupportedScheme("Basic".into()))
        );
    }

    #[test]
    fn test_image_format_labels() {
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    }

    #[tokio::test]
    async fn test_install_package_missing_file_is_package_error() {
        let installer = InstallerClient::new(&SimulatorConfig::default()).unwrap();
        let result = installer
            .install_package("/definitely/not/here/app.zip")
            .await;
        assert!(matches!(result, Err(ClientError::Package { .. })));
    }
}

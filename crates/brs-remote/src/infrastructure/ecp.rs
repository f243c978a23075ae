//! ECP remote-control client.
//!
//! Stateless request/response calls against the simulator's ECP service:
//! key events, app launches and the three XML query endpoints.  Each call
//! carries a 10 second deadline.

use async_trait::async_trait;
use brs_core::protocol::ecp::{LAUNCH_PREFIX, QUERY_ACTIVE_APP, QUERY_APPS, QUERY_DEVICE_INFO};
use brs_core::{KeyAction, SimulatorConfig};
use reqwest::Url;
use tracing::debug;

use super::http::{self, HttpReply, REQUEST_TIMEOUT};
use crate::application::navigation::KeySender;
use crate::application::status::HealthProbe;
use crate::error::ClientError;

/// Longest body snippet kept in a [`ClientError::Status`].
const ERROR_BODY_CHARS: usize = 500;

/// Client for the ECP service.
#[derive(Debug, Clone)]
pub struct RemoteControlClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RemoteControlClient {
    /// Creates a client for the ECP port of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] if the host does not form a
    /// valid URL.
    pub fn new(config: &SimulatorConfig) -> Result<Self, ClientError> {
        Self::with_base_url(&config.ecp_base_url())
    }

    /// Creates a client for an explicit base URL such as `http://10.0.0.2:8060`.
    pub fn with_base_url(base: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: http::build_client()?,
            base_url: http::parse_base_url(base)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends one key event, e.g. `POST /keypress/Select`.
    ///
    /// The key name is percent-encoded as a single path segment.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Status`] if the service answers outside `200..300`.
    /// - [`ClientError::Timeout`] / [`ClientError::Unreachable`] on transport failure.
    pub async fn send_key(&self, key: &str, action: KeyAction) -> Result<(), ClientError> {
        let url = self.segment_url(&[action.endpoint(), key])?;
        let operation = format!("{} {key}", action.endpoint());
        let reply = self.post(&url, &operation).await?;
        ensure_success(reply, operation)
    }

    /// `GET /query/device-info` – raw XML.
    pub async fn query_device_info(&self) -> Result<String, ClientError> {
        self.query(QUERY_DEVICE_INFO).await
    }

    /// `GET /query/active-app` – raw XML.
    pub async fn query_active_app(&self) -> Result<String, ClientError> {
        self.query(QUERY_ACTIVE_APP).await
    }

    /// `GET /query/apps` – raw XML.
    pub async fn query_apps(&self) -> Result<String, ClientError> {
        self.query(QUERY_APPS).await
    }

    /// Launches an installed app, `POST /launch/{app_id}?k=v&...`.
    ///
    /// Parameters are form-encoded into the query string; their order carries
    /// no meaning to the simulator.  No `?` is added when there are none.
    ///
    /// # Errors
    ///
    /// [`ClientError::Status`] if the launch is rejected, or a transport error.
    pub async fn launch_app<I, K, V>(&self, app_id: &str, params: I) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self.segment_url(&[LAUNCH_PREFIX, app_id])?;
        let params: Vec<(K, V)> = params.into_iter().collect();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        let operation = format!("launch {app_id}");
        let reply = self.post(&url, &operation).await?;
        ensure_success(reply, operation)
    }

    /// `true` if the service answers `GET /` with any status at all.
    ///
    /// Never fails: transport errors and timeouts report `false`.
    pub async fn check_health(&self) -> bool {
        let url = self.base_url.clone();
        match http::exchange(self.http.get(url.clone()), "ECP health", &url, REQUEST_TIMEOUT).await
        {
            Ok(_) => true,
            Err(e) => {
                debug!("ECP health check failed: {e}");
                false
            }
        }
    }

    async fn query(&self, path: &str) -> Result<String, ClientError> {
        let url = http::endpoint(&self.base_url, path)?;
        let reply = http::exchange(
            self.http.get(url.clone()),
            &format!("GET {path}"),
            &url,
            REQUEST_TIMEOUT,
        )
        .await?;
        if !reply.is_success() {
            debug!("GET {path} answered {}", reply.status);
        }
        Ok(reply.text())
    }

    async fn post(&self, url: &Url, operation: &str) -> Result<HttpReply, ClientError> {
        debug!("ECP {operation}");
        http::exchange(self.http.post(url.clone()), operation, url, REQUEST_TIMEOUT).await
    }

    /// The base URL with its path replaced by the given encoded segments.
    fn segment_url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidEndpoint(format!("{} cannot be a base", self.base_url)))?
            .clear()
            .extend(segments);
        Ok(url)
    }
}

fn ensure_success(reply: HttpReply, operation: String) -> Result<(), ClientError> {
    if reply.is_success() {
        return Ok(());
    }
    Err(ClientError::Status {
        operation,
        status: reply.status.as_u16(),
        body: http::truncate_chars(&reply.text(), ERROR_BODY_CHARS).to_string(),
    })
}

#[async_trait]
impl KeySender for RemoteControlClient {
    async fn send_key(&self, key: &str, action: KeyAction) -> Result<(), ClientError> {
        RemoteControlClient::send_key(self, key, action).await
    }
}

#[async_trait]
impl HealthProbe for RemoteControlClient {
    async fn check_health(&self) -> bool {
        RemoteControlClient::check_health(self).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

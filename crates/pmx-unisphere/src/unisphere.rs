use crate::error::{Result, UnisphereError};
use crate::{ApiClient, ApiResponse, KeyFilter, MetricsPayload};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

/// Port Unisphere serves its REST API on.
pub const UNISPHERE_PORT: u16 = 8443;
/// Path prefix of the REST API.
pub const API_PATH: &str = "/univmax/restapi";

/// Connection settings for [`UnisphereClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Host name or IP, or a full `http(s)://host:port` base.
    pub address: String,
    pub user: String,
    pub password: String,
    /// Unisphere ships with a self-signed certificate.
    pub accept_invalid_certs: bool,
    pub request_timeout: Option<Duration>,
}

/// Build the REST API root for `address`.
///
/// A bare host gets `https`, port 8443 and the API path; an address that
/// already has a scheme only gets the API path appended.
pub fn api_base_url(address: &str) -> String {
    let addr = address.trim().trim_end_matches('/');
    if addr.contains("://") {
        return format!("{addr}{API_PATH}");
    }
    format!("https://{addr}:{UNISPHERE_PORT}{API_PATH}")
}

/// [`ApiClient`] speaking JSON over HTTPS with basic auth.
pub struct UnisphereClient {
    base_url: String,
    user: String,
    password: String,
    client: Client,
}

impl UnisphereClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .default_headers(headers);
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| UnisphereError::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = api_base_url(&settings.address);
        tracing::info!(base_url = %base_url, "Init HTTP client to Unisphere");

        Ok(Self {
            base_url,
            user: settings.user.clone(),
            password: settings.password.clone(),
            client,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<ApiResponse> {
        let transport = |source| UnisphereError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport)?;

        if !(200..300).contains(&status) {
            tracing::debug!(endpoint, status, "Unisphere returned an error status");
        }
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

#[async_trait::async_trait]
impl ApiClient for UnisphereClient {
    async fn fetch_keys(&self, endpoint: &str, filter: &KeyFilter) -> Result<ApiResponse> {
        let url = self.url(endpoint);
        let request = if filter.is_empty() {
            tracing::debug!(url = %url, "Get");
            self.client.get(&url)
        } else {
            tracing::debug!(url = %url, "Post");
            tracing::trace!(url = %url, filter = ?filter, "Post body");
            self.client.post(&url).json(filter)
        };
        self.send(endpoint, request).await
    }

    async fn fetch_metrics(
        &self,
        endpoint: &str,
        payload: &MetricsPayload,
    ) -> Result<ApiResponse> {
        let url = self.url(endpoint);
        tracing::debug!(url = %url, "Post");
        tracing::trace!(url = %url, payload = ?payload, "Post body");
        let request = self.client.post(&url).json(payload);
        self.send(endpoint, request).await
    }
}

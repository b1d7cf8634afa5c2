//! Shared HTTP plumbing for the YouTube Data and Analytics APIs.

use crate::config::Config;
use crate::error::ApiError;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::instrument;

/// Where the two APIs live. Overridable so tests can point at a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub data_api: String,
    pub analytics_api: String,
}

impl Endpoints {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_api: config.data_api_base.trim_end_matches('/').to_string(),
            analytics_api: config.analytics_api_base.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn data(&self, resource: &str) -> String {
        format!("{}/{resource}", self.data_api)
    }

    pub(crate) fn analytics(&self, resource: &str) -> String {
        format!("{}/{resource}", self.analytics_api)
    }
}

/// Authenticated, read-only access to the Google APIs.
///
/// Cheap to clone; clones share the underlying connection pool. The bearer token is passed per
/// call, so the client itself holds no session state.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl ApiClient {
    /// Builds a client whose every request is bounded by the configured timeout.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ApiError::Network {
                status: None,
                message: format!("build HTTP client: {e}"),
            })?;
        Ok(Self::with_http(http, Endpoints::from_config(config)))
    }

    pub fn with_http(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Issues one authenticated GET and decodes the JSON body.
    ///
    /// Exactly one attempt is made. Anything but `200 OK` is an error, classified by
    /// [`ApiError::from_status`]. A body that does not decode as `T` is [`ApiError::Decode`].
    #[instrument(skip(self, token), level = tracing::Level::TRACE)]
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        if token.is_empty() {
            return Err(ApiError::Auth("empty bearer token".to_string()));
        }

        let response = self
            .http
            .request(Method::GET, url)
            .bearer_auth(token)
            .query(query_params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url, error = %e, "request to YouTube failed");
                ApiError::from_transport(&e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        if status != StatusCode::OK {
            let err = ApiError::from_status(status.as_u16(), &body);
            tracing::warn!(url, %status, error = %err, "YouTube API returned an error");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(url, error = %e, "could not decode YouTube API response");
            ApiError::Decode(e.to_string())
        })
    }
}

//! HTTP transport for the provisioning API
//!
//! The engine only needs one endpoint of its own, the operation status
//! endpoint, which it reaches through the [`ControlPlane`] trait so tests and
//! embedders can substitute their own client. [`HttpControlPlane`] is the
//! `reqwest`-backed implementation. It is the single place where HTTP
//! responses are turned into [`ApiError`]s.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::config::Settings;
use crate::error::{ApiError, MAX_RETRY_AFTER};
use crate::model::{Location, Operation};

/// User agent sent with every request
pub const USER_AGENT_VALUE: &str = concat!("provisionctl/", env!("CARGO_PKG_VERSION"));

/// The backend calls the engine itself depends on
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetch an operation, asking the server to hold the request for up to
    /// `wait_hint` if the operation is still running
    async fn get_operation(
        &self,
        operation_id: &str,
        location: &Location,
        wait_hint: Duration,
    ) -> Result<Operation, ApiError>;
}

/// Error body returned by the API on non-2xx responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after_seconds: Option<f64>,
}

/// `reqwest`-backed control-plane client
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpControlPlane {
    /// Build a client from resolved settings
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        Self::with_token(
            &settings.api_url,
            &settings.api_token,
            settings.polling.request_timeout(),
        )
    }

    /// Build a client for `base_url` authenticating with a bearer token
    pub fn with_token(
        base_url: &str,
        token: &str,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ApiError::invalid_request(format!("invalid API URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::invalid_request(format!(
                "invalid API URL '{}': not a hierarchical URL",
                base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| {
                ApiError::invalid_request("API token contains invalid header characters")
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET the path made of `segments` below the base URL and decode the JSON body
    ///
    /// Each segment is percent-encoded on its own, so a `/`, `?` or `#` inside
    /// an identifier never changes the shape of the request.
    pub async fn get_json<T, I>(&self, segments: I) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let url = self.url(segments)?;
        self.send(Method::GET, url).await
    }

    fn url<I>(&self, segments: I) -> Result<Url, ApiError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::invalid_request("API URL cannot carry a path"))?;
            path.pop_if_empty();
            for segment in segments {
                let segment = segment.as_ref();
                // empty, "." and ".." would be dropped or resolved by the URL parser
                if matches!(segment, "" | "." | "..") {
                    return Err(ApiError::invalid_request(format!(
                        "invalid path segment '{}'",
                        segment
                    )));
                }
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T, ApiError> {
        trace!("{} {}", method, url);
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        let status = response.status();
        debug!("Response status: {}", status);
        if !status.is_success() {
            return Err(classify_response(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::decode(format!("failed to decode response: {}", e)))
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn get_operation(
        &self,
        operation_id: &str,
        location: &Location,
        wait_hint: Duration,
    ) -> Result<Operation, ApiError> {
        let mut url = self.url(
            location
                .segments()
                .into_iter()
                .chain(["operations", operation_id]),
        )?;
        url.query_pairs_mut()
            .append_pair("wait", &format_wait_hint(wait_hint));
        self.send(Method::GET, url).await
    }
}

/// Encode a wait hint as seconds, with millisecond precision rounded up
fn format_wait_hint(hint: Duration) -> String {
    let millis = hint.as_nanos().div_ceil(1_000_000);
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}.{:03}s", millis / 1000, millis % 1000)
    }
}

/// Turn a non-2xx response into an [`ApiError`]
///
/// The retry hint comes from the error body's `retryAfterSeconds`, falling
/// back to the `Retry-After` header. Either is capped at [`MAX_RETRY_AFTER`].
async fn classify_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let header_hint = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER));

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).ok();

    let body_hint = body
        .as_ref()
        .and_then(|b| b.retry_after_seconds)
        .map(|secs| secs.min(MAX_RETRY_AFTER.as_secs_f64()))
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    let code = body.as_ref().and_then(|b| b.code);
    let message = body
        .and_then(|b| b.message)
        .unwrap_or_else(|| if text.is_empty() { "no response body".to_string() } else { text });

    ApiError::from_status(status, message)
        .with_code(code)
        .with_retry_after(body_hint.or(header_hint))
}

use std::env;
use std::time::Duration;

use portal_core::model::AuthToken;
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` unless `base_url` is an absolute http(s) URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|err| ApiError::InvalidUrl(format!("{base_url}: {err}")))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(base_url.to_owned()));
        }
        Ok(Self {
            base_url: parsed,
            timeout,
        })
    }

    /// Read `PORTAL_API_URL` and `PORTAL_HTTP_TIMEOUT_SECS`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the configured URL is unusable.
    pub fn from_env() -> Result<Self, ApiError> {
        let base_url = env::var("PORTAL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let timeout = env::var("PORTAL_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(&base_url, Duration::from_secs(timeout))
    }
}

/// Thin JSON client over the portal REST API.
///
/// Cloning is cheap; clones share the connection pool. Each clone carries its own
/// optional bearer token.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Option<AuthToken>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: None,
        })
    }

    #[must_use]
    pub fn with_token(&self, token: AuthToken) -> Self {
        Self {
            token: Some(token),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn anonymous(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` below the base URL, keeping the base path (`/api`).
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the base cannot take path segments.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
        Ok(url)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body)).await
    }

    pub(crate) async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub(crate) async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.send::<(), Value>(Method::DELETE, path, None).await
    }

    pub(crate) async fn post_empty(&self, path: &str) -> Result<Value, ApiError> {
        self.send::<(), Value>(Method::POST, path, None).await
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        let request = self.http.post(self.endpoint(path)?).multipart(form);
        let body = self.execute(request, &Method::POST, path).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Fetch raw bytes, e.g. a document download.
    pub(crate) async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let request = self.authorize(self.http.get(self.endpoint(path)?));
        let response = request.send().await?;
        let status = response.status();
        debug!(method = %Method::GET, path, status = status.as_u16(), "api response");
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(rejection(status.as_u16(), &bytes));
        }
        Ok(bytes.to_vec())
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.request(method.clone(), self.endpoint(path)?);
        if let Some(body) = body {
            request = request.json(body);
        }
        let value = self.execute(request, &method, path).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        method: &Method,
        path: &str,
    ) -> Result<Value, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "api response");
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(rejection(status.as_u16(), &bytes));
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        let body: Value = serde_json::from_slice(&bytes)?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let message = server_message(&body).unwrap_or_else(|| "request failed".to_owned());
            return Err(ApiError::rejected(400, message));
        }
        Ok(body)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        }
    }
}

fn rejection(status: u16, bytes: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<Value>(bytes)
        .ok()
        .as_ref()
        .and_then(server_message)
        .unwrap_or_else(|| format!("HTTP {status}"));
    ApiError::rejected(status, message)
}

/// `message`, then `error`, ignoring blanks.
pub(crate) fn server_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_owned)
}

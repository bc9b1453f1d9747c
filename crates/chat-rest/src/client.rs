//! Authenticated REST client

use crate::error::{RestError, RestResult};
use chat_common::ClientConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Body of a 429 response
#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

/// REST client that signs every request with `Authorization: Bot <token>`
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Create a client for a versioned base URL, e.g. `https://host/api/v10`
    ///
    /// # Errors
    /// Returns [`RestError::Configuration`] for an empty or unprintable token
    pub fn new(base_url: impl Into<String>, token: &str) -> RestResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RestError::Configuration("token must not be empty".to_string()));
        }

        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|e| RestError::Configuration(format!("invalid token: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("chat-rest/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the API settings and token in `config`
    ///
    /// # Errors
    /// See [`RestClient::new`]
    pub fn from_config(config: &ClientConfig) -> RestResult<Self> {
        Self::new(config.api.base_url(), &config.auth.token)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> RestResult<T> {
        let response = self.execute(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> RestResult<T> {
        let response = self.execute(self.request(Method::POST, path).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> RestResult<T> {
        let response = self.execute(self.request(Method::PUT, path).json(body)).await?;
        Ok(response.json().await?)
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> RestResult<T> {
        let response = self.execute(self.request(Method::PATCH, path).json(body)).await?;
        Ok(response.json().await?)
    }

    /// DELETE; the response body is ignored
    pub async fn delete(&self, path: &str) -> RestResult<()> {
        self.execute(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// Send and map non-success statuses to errors
    async fn execute(&self, request: RequestBuilder) -> RestResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        tracing::trace!(status = status.as_u16(), url = %response.url(), "REST response");

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let header = retry_after_header(response.headers());
            let body = response.text().await.unwrap_or_default();
            let retry_after = serde_json::from_str::<RateLimitBody>(&body)
                .ok()
                .and_then(|b| Duration::try_from_secs_f64(b.retry_after).ok())
                .or(header)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            tracing::warn!(retry_after_ms = retry_after.as_millis() as u64, "REST request rate limited");
            return Err(RestError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), body = %body, "REST request failed");
        Err(RestError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: f64 = raw.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

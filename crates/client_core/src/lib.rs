use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE},
    Client, Method, RequestBuilder, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use shared::error::ErrorBody;
use tracing::debug;
use url::Url;

pub mod access;
pub mod approvals;
pub mod auth;
pub mod cache;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod query;
pub mod sort;
pub mod summary;
pub mod users;

pub use controller::{ControllerOptions, FetchStatus, ListQueryController, ListView, PageSource};
pub use error::{ClientError, ClientResult};
pub use feed::{CursorFeed, CursorSource, FeedView};
pub use pagination::PageResult;
pub use query::{ListQuery, PageParams};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client for the marketplace API.
///
/// Cookies set by the server are kept and replayed on every request, which is
/// how the session travels. Cloning is cheap and shares the cookie jar.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    base_url: String,
    session_cookie: Option<String>,
    timeout: Duration,
}

impl ApiClientBuilder {
    /// Sends a fixed `Cookie` header on every request.
    ///
    /// While set it takes the place of the cookie store: reqwest only adds
    /// stored cookies to requests that carry no `Cookie` header yet, so
    /// cookies the server sets later are not replayed.
    pub fn session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> ClientResult<ApiClient> {
        let base_url = parse_base_url(&self.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(cookie) = self.session_cookie.as_deref() {
            let value = HeaderValue::from_str(cookie.trim())
                .map_err(|_| ClientError::InvalidSessionCookie)?;
            headers.insert(COOKIE, value);
        }

        let http = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(self.timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(ApiClient { http, base_url })
    }
}

fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let normalized = format!("{}/", raw.trim().trim_end_matches('/'));
    let url = Url::parse(&normalized).map_err(|source| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidBaseUrl {
            url: raw.to_string(),
            source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
        });
    }
    Ok(url)
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            session_cookie: None,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        Self::builder(base_url).build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `segments` below the base URL, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn get_json<T, Q>(&self, segments: &[&str], query: &Q) -> ClientResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let body = self
            .execute(self.http.get(url).query(query))
            .await?
            .ok_or(ClientError::EmptyBody)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Issues a body-less request and ignores any response payload.
    pub(crate) async fn send_empty(&self, method: Method, segments: &[&str]) -> ClientResult<()> {
        let url = self.endpoint(segments)?;
        debug!(%url, %method, "send");
        self.execute(self.http.request(method, url)).await?;
        Ok(())
    }

    async fn execute(&self, request: RequestBuilder) -> ClientResult<Option<Vec<u8>>> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let server_message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.message);
            return Err(ClientError::from_status(status, server_message));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(body.to_vec()))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

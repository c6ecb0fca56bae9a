//! Per-backend clients built by [`NetworkContext::generate_service`](crate::context::NetworkContext::generate_service).
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudnet::context::NetworkContext;
//! use cloudnet::config::NetworkConfig;
//! use cloudnet::service::ServiceDescriptor;
//! use cloudnet::storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), cloudnet::base::neterror::NetError> {
//! let context = NetworkContext::new(NetworkConfig::default(), Arc::new(InMemoryStore::new()));
//! let api = context.generate_service(ServiceDescriptor::parse("https://api.example.com/v1/")?);
//!
//! let resp = api.get("orders").query("page", "2").send().await?;
//! println!("{}", resp.status());
//! # Ok(())
//! # }
//! ```

use crate::base::neterror::NetError;
use crate::cookies::httpcookie::CookieOrigin;
use crate::http::apicall::{self, ApiResult};
use crate::http::interceptor::Pipeline;
use crate::http::request::{parse_header, HttpRequest};
use crate::http::response::HttpResponse;
use crate::http::retry::RetryConfig;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// What a service needs from the shared network context.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub base_url: Url,
    /// Send the base parameters as query parameters.
    pub legacy: bool,
    pub base_params: bool,
    pub cookies: bool,
    pub session_expiration: bool,
    /// `None` uses the configured request (or upload) timeout.
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
    pub upload: bool,
    pub body_logging: bool,
}

impl ServiceDescriptor {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            legacy: false,
            base_params: true,
            cookies: true,
            session_expiration: false,
            timeout: None,
            follow_redirects: true,
            upload: false,
            body_logging: true,
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, NetError> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    /// Photo upload service: longer timeout, never legacy, bodies not logged.
    pub fn upload(base_url: Url) -> Self {
        Self {
            upload: true,
            body_logging: false,
            ..Self::new(base_url)
        }
    }

    pub fn legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn base_params(mut self, enabled: bool) -> Self {
        self.base_params = enabled;
        self
    }

    pub fn cookies(mut self, enabled: bool) -> Self {
        self.cookies = enabled;
        self
    }

    pub fn session_expiration(mut self, enabled: bool) -> Self {
        self.session_expiration = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }
}

/// Runs requests against one base URL through its interceptor pipeline.
#[derive(Clone)]
pub struct ServiceClient {
    base_url: Url,
    pipeline: Pipeline,
    timeout: Duration,
    follow_redirects: bool,
    max_redirects: usize,
}

impl ServiceClient {
    pub fn new(
        base_url: Url,
        pipeline: Pipeline,
        timeout: Duration,
        follow_redirects: bool,
        max_redirects: usize,
    ) -> Self {
        Self {
            base_url,
            pipeline,
            timeout,
            follow_redirects,
            max_redirects,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// `path` is resolved against the base URL; absolute URLs replace it.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
            error: None,
        }
    }

    /// Run `request` through the pipeline, following redirects when enabled.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NetError> {
        if !self.follow_redirects {
            return self.execute_once(request).await;
        }

        let mut request = request;
        let mut remaining = self.max_redirects;
        loop {
            let response = self.execute_once(request.clone()).await?;
            let Some(next) = redirect_target(&request.url, &response)? else {
                return Ok(response);
            };
            if remaining == 0 {
                return Err(NetError::TooManyRedirects);
            }
            remaining -= 1;
            debug!(from = %request.url, to = %next, status = response.code(), "following redirect");
            prepare_redirect(&mut request, next, response.status());
        }
    }

    /// One pass through the pipeline. Redirects come back as-is.
    pub async fn execute_once(&self, mut request: HttpRequest) -> Result<HttpResponse, NetError> {
        if request.timeout.is_none() {
            request.timeout = Some(self.timeout);
        }
        self.pipeline.execute(request).await
    }
}

fn redirect_target(current: &Url, response: &HttpResponse) -> Result<Option<Url>, NetError> {
    if !response.is_redirect() {
        return Ok(None);
    }
    let Some(location) = response.location() else {
        return Ok(None);
    };
    let next = current.join(location).map_err(|_| NetError::InvalidRedirect)?;
    match next.scheme() {
        "http" | "https" => Ok(Some(next)),
        _ => Err(NetError::InvalidRedirect),
    }
}

/// Rewrite `request` for the next hop: 303 (and 301/302 after a POST) turn
/// into a body-less GET, credentials stay behind when the origin changes.
fn prepare_redirect(request: &mut HttpRequest, next: Url, status: StatusCode) {
    let to_get = (status == StatusCode::SEE_OTHER && request.method != Method::HEAD)
        || (matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND)
            && request.method == Method::POST);
    if to_get {
        request.method = Method::GET;
        request.body = Bytes::new();
        request.headers.remove(CONTENT_TYPE);
        request.headers.remove(CONTENT_LENGTH);
    }
    if request.origin() != CookieOrigin::from_url(&next) {
        request.headers.remove(AUTHORIZATION);
        request.headers.remove(COOKIE);
    }
    request.url = next;
}

/// Builder for a single request.
#[derive(Clone)]
pub struct RequestBuilder {
    client: ServiceClient,
    method: Method,
    path: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    error: Option<NetError>,
}

impl RequestBuilder {
    /// Add a header. Invalid names or values fail the request on `send`.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match parse_header(name, value) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set JSON body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        match serde_json::to_vec(json) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.headers.insert(
                    CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json; charset=utf-8"),
                );
            }
            Err(e) => self.error = Some(e.into()),
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<HttpRequest, NetError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut url = self.client.base_url.join(&self.path)?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        let mut request = HttpRequest::new(self.method, url);
        request.headers = self.headers;
        request.body = self.body.unwrap_or_default();
        request.timeout = self.timeout;
        Ok(request)
    }

    pub async fn send(self) -> Result<HttpResponse, NetError> {
        let client = self.client.clone();
        let request = self.build()?;
        client.execute(request).await
    }

    /// Send and decode the payload into an [`ApiResult`].
    pub async fn call<T: DeserializeOwned>(self) -> ApiResult<T> {
        apicall::safe_api_call(|| self.send()).await
    }

    /// [`call`](Self::call) with exponential backoff between failed attempts.
    pub async fn call_with_retries<T: DeserializeOwned>(self, config: &RetryConfig) -> ApiResult<T> {
        apicall::safe_api_call_with_retries(config, || self.clone().send()).await
    }

    /// Send once without following redirects and capture the `location`.
    pub async fn redirect_location(self) -> ApiResult<()> {
        let client = self.client.clone();
        apicall::launch_redirecting_api(|| async move {
            let request = self.build()?;
            client.execute_once(request).await
        })
        .await
    }
}

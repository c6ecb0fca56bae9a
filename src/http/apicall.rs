//! Result envelopes around API calls.
//!
//! Every helper here turns an async operation yielding
//! `Result<HttpResponse, NetError>` into an [`ApiResult`]. Transport failures,
//! non-2xx statuses and undecodable payloads all come back as
//! [`ApiResult::Error`]; nothing is returned as a Rust `Err`.

use crate::base::neterror::NetError;
use crate::http::response::HttpResponse;
use crate::http::retry::{calculate_backoff, should_retry, RetryConfig};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Status line, headers and final URL of the raw response.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
}

impl From<&HttpResponse> for ResponseMeta {
    fn from(response: &HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            url: response.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("API call failed with code {code}: {}", .message.as_deref().unwrap_or("no message"))]
pub struct ApiError {
    /// HTTP status, or `-1` when no response was received.
    pub code: i32,
    pub message: Option<String>,
    #[source]
    pub cause: Option<NetError>,
    pub raw_error_body: Option<String>,
    pub error_body_meta: Option<Value>,
}

impl ApiError {
    pub const NO_STATUS: i32 = -1;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            cause: None,
            raw_error_body: None,
            error_body_meta: None,
        }
    }

    pub fn from_cause(cause: NetError) -> Self {
        Self {
            code: Self::NO_STATUS,
            message: Some(cause.to_string()),
            cause: Some(cause),
            raw_error_body: None,
            error_body_meta: None,
        }
    }

    /// False for failures that are routine on mobile networks.
    pub fn is_loggable(&self) -> bool {
        self.cause.as_ref().map_or(true, NetError::is_loggable)
    }
}

/// Server error payload: `{"errors": {"detail": ".."}, "meta": ..}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Option<ErrorDetail>,
    #[serde(default)]
    pub meta: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug)]
pub enum ApiResult<T> {
    Success { data: Option<T>, meta: ResponseMeta },
    Redirect { location: String, meta: ResponseMeta },
    Error(ApiError),
}

impl<T> ApiResult<T> {
    /// True for `Success` and `Redirect`.
    pub fn is_success(&self) -> bool {
        !matches!(self, ApiResult::Error(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ApiResult::Success { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            ApiResult::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn redirection(&self) -> Option<&str> {
        match self {
            ApiResult::Redirect { location, .. } => Some(location),
            _ => None,
        }
    }

    pub fn meta(&self) -> Option<&ResponseMeta> {
        match self {
            ApiResult::Success { meta, .. } | ApiResult::Redirect { meta, .. } => Some(meta),
            ApiResult::Error(_) => None,
        }
    }

    /// Runs `f` with the payload when the call succeeded (a redirect passes `None`).
    pub fn on_success(&self, f: impl FnOnce(Option<&T>)) -> &Self {
        if self.is_success() {
            f(self.data());
        }
        self
    }

    pub fn on_error(&self, f: impl FnOnce(&ApiError)) -> &Self {
        if let ApiResult::Error(e) = self {
            f(e);
        }
        self
    }

    /// Drops the metadata. A redirect maps to `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        match self {
            ApiResult::Success { data, .. } => Ok(data),
            ApiResult::Redirect { .. } => Ok(None),
            ApiResult::Error(e) => Err(e),
        }
    }
}

/// Runs `call` once and classifies its outcome.
pub async fn safe_api_call<T, F, Fut>(call: F) -> ApiResult<T>
where
    T: DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<HttpResponse, NetError>>,
{
    match call().await {
        Ok(response) => process_response(response),
        Err(cause) => {
            debug!(error = %cause, "API call failed before a response");
            ApiResult::Error(ApiError::from_cause(cause))
        }
    }
}

/// [`safe_api_call`] with exponential backoff between failed attempts.
///
/// Returns the first success, or the last error once `config.retries + 1`
/// attempts have failed. There is no sleep after the final attempt.
pub async fn safe_api_call_with_retries<T, F, Fut>(config: &RetryConfig, mut call: F) -> ApiResult<T>
where
    T: DeserializeOwned,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpResponse, NetError>>,
{
    let mut attempt = 0;
    loop {
        let result = safe_api_call(&mut call).await;
        attempt += 1;
        let error = match &result {
            ApiResult::Error(e) => e,
            _ => return result,
        };
        if !should_retry(attempt, config) {
            return result;
        }
        let delay = calculate_backoff(attempt - 1, config);
        debug!(
            attempt,
            code = error.code,
            delay_ms = delay.as_millis() as u64,
            "retrying API call"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Captures a redirect instead of following it.
///
/// Requires a transport that does not follow redirects. Any status other
/// than 301/302/303/307/308, or a redirect without `location`, is an error.
pub async fn launch_redirecting_api<T, F, Fut>(call: F) -> ApiResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<HttpResponse, NetError>>,
{
    let response = match call().await {
        Ok(r) => r,
        Err(cause) => return ApiResult::Error(ApiError::from_cause(cause)),
    };
    let location = if response.is_redirect() {
        response.location().map(str::to_string)
    } else {
        None
    };
    match location {
        Some(location) => ApiResult::Redirect {
            location,
            meta: ResponseMeta::from(&response),
        },
        None => ApiResult::Error(ApiError::new(
            i32::from(response.code()),
            "No redirecting URL",
        )),
    }
}

/// Parses `raw` as JSON, `None` when absent or malformed.
pub fn parse_error_body<T: DeserializeOwned>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|body| serde_json::from_str(body).ok())
}

fn process_response<T: DeserializeOwned>(response: HttpResponse) -> ApiResult<T> {
    let meta = ResponseMeta::from(&response);

    if !response.is_successful() {
        let raw = String::from_utf8_lossy(response.body()).into_owned();
        let parsed: Option<ErrorBody> = parse_error_body(Some(&raw));
        let detail = parsed
            .as_ref()
            .and_then(|b| b.errors.as_ref())
            .and_then(|e| e.detail.clone());
        return ApiResult::Error(ApiError {
            code: i32::from(response.code()),
            message: Some(detail.unwrap_or_else(|| response.message().to_string())),
            cause: None,
            raw_error_body: Some(raw),
            error_body_meta: parsed.and_then(|b| b.meta),
        });
    }

    if response.body().is_empty() {
        return ApiResult::Success { data: None, meta };
    }
    match response.json::<T>() {
        Ok(data) => ApiResult::Success {
            data: Some(data),
            meta,
        },
        Err(cause) => {
            debug!(url = %meta.url, "response payload did not match the expected type");
            ApiResult::Error(ApiError::from_cause(cause))
        }
    }
}

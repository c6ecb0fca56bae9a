//! The network round trip behind the interceptor pipeline.
//!
//! [`HyperTransport`] opens one connection per request through
//! [`ConnectJob`](crate::socket::connectjob::ConnectJob), speaks HTTP/1.1 via
//! hyper and buffers the whole response body. Redirects are returned to the
//! caller untouched.

use crate::base::neterror::NetError;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::socket::connectjob::{ConnectJob, ConnectOptions};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderValue, HOST, USER_AGENT};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tracing::debug;

/// Performs a single HTTP exchange.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, NetError>>;
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect: ConnectOptions,
    /// Deadline for the whole exchange when the request carries none.
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect: ConnectOptions::default(),
            request_timeout: Duration::from_secs(20),
            user_agent: Some(concat!("cloudnet/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HyperTransport {
    config: TransportConfig,
}

impl HyperTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse, NetError> {
        let deadline = request.timeout.unwrap_or(self.config.request_timeout);
        let url = request.url.clone();
        match tokio::time::timeout(deadline, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(url = %url, timeout_ms = deadline.as_millis() as u64, "request timed out");
                Err(NetError::TimedOut)
            }
        }
    }

    async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, NetError> {
        let socket = ConnectJob::connect(&request.url, &self.config.connect).await?;
        let io = TokioIo::new(socket);

        let (mut sender, conn) = http1::handshake(io)
            .await
            .map_err(|_| NetError::ConnectionFailed)?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let hyper_request = self.to_hyper(&request)?;
        let response = sender
            .send_request(hyper_request)
            .await
            .map_err(map_hyper_error)?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|_| NetError::HttpBodyError)?
            .to_bytes();

        Ok(HttpResponse {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body,
            url: request.url,
        })
    }

    fn to_hyper(&self, request: &HttpRequest) -> Result<http::Request<Full<Bytes>>, NetError> {
        let mut builder = http::Request::builder()
            .method(request.method.clone())
            .uri(request.path_and_query());

        let headers = builder.headers_mut().ok_or(NetError::InvalidUrl)?;
        for (name, value) in &request.headers {
            headers.append(name, value.clone());
        }
        if !headers.contains_key(HOST) {
            let host = request.url.host_str().ok_or(NetError::InvalidUrl)?;
            let host = match request.url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            headers.insert(
                HOST,
                HeaderValue::from_str(&host).map_err(|_| NetError::InvalidHeader)?,
            );
        }
        if let Some(agent) = &self.config.user_agent {
            if !headers.contains_key(USER_AGENT) {
                headers.insert(
                    USER_AGENT,
                    HeaderValue::from_str(agent).map_err(|_| NetError::InvalidHeader)?,
                );
            }
        }

        builder
            .body(Full::new(request.body.clone()))
            .map_err(|_| NetError::InvalidUrl)
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, NetError>> {
        Box::pin(self.round_trip(request))
    }
}

fn map_hyper_error(err: hyper::Error) -> NetError {
    debug!(error = %err, "request failed");
    if err.is_incomplete_message() {
        NetError::EmptyResponse
    } else if err.is_parse() {
        NetError::InvalidResponse
    } else if err.is_canceled() {
        NetError::Aborted
    } else if err.is_timeout() {
        NetError::TimedOut
    } else {
        NetError::ConnectionClosed
    }
}

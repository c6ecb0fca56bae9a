//! Outgoing request model shared by interceptors and the transport.

use crate::base::neterror::NetError;
use crate::cookies::httpcookie::CookieOrigin;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Extensions, HeaderMap, Method};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Whole-exchange deadline. Falls back to the transport default when `None`.
    pub timeout: Option<Duration>,
    /// Per-call scratch space for interceptors.
    pub extensions: Extensions,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: None,
            extensions: Extensions::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        let mut req = Self::new(Method::POST, url);
        req.body = body.into();
        req
    }

    /// Replace any existing value of `name`.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Add a value without removing existing ones.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), NetError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn add_query_param(&mut self, key: &str, value: &str) {
        self.url.query_pairs_mut().append_pair(key, value);
    }

    pub fn set_json_body<T: serde::Serialize + ?Sized>(&mut self, body: &T) -> Result<(), NetError> {
        self.body = Bytes::from(serde_json::to_vec(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        Ok(())
    }

    pub fn origin(&self) -> Option<CookieOrigin> {
        CookieOrigin::from_url(&self.url)
    }

    /// Url with the query string attached only when present.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), NetError> {
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| NetError::InvalidHeader)?;
    let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeader)?;
    Ok((name, value))
}

//! Pass-through stages that describe each exchange through `tracing`.

use crate::base::neterror::NetError;
use crate::config::HttpLogLevel;
use crate::http::interceptor::Interceptor;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::session::expiration::is_plaintext;
use http::header::{HeaderName, AUTHORIZATION, COOKIE, SET_COOKIE};
use http::HeaderMap;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};

const REDACTED: &str = "██";

#[derive(Debug, Clone, Copy)]
struct RequestStart(Instant);

pub struct HttpLoggingInterceptor {
    level: HttpLogLevel,
    redacted: HashSet<HeaderName>,
}

impl HttpLoggingInterceptor {
    /// `Authorization`, `Cookie` and `Set-Cookie` values are redacted by default.
    pub fn new(level: HttpLogLevel) -> Self {
        Self {
            level,
            redacted: [AUTHORIZATION, COOKIE, SET_COOKIE].into_iter().collect(),
        }
    }

    pub fn level(&self) -> HttpLogLevel {
        self.level
    }

    /// Also hide the value of `name`. Invalid names are ignored.
    pub fn redact_header(mut self, name: &str) -> Self {
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            self.redacted.insert(name);
        }
        self
    }

    fn log_headers(&self, direction: &str, headers: &HeaderMap) {
        for (name, value) in headers {
            let shown = if self.redacted.contains(name) {
                REDACTED
            } else {
                value.to_str().unwrap_or("<non-ascii>")
            };
            info!("{} {}: {}", direction, name, shown);
        }
    }

    fn log_body(&self, direction: &str, body: &[u8]) {
        if body.is_empty() {
            return;
        }
        match std::str::from_utf8(body) {
            Ok(text) if is_plaintext(body) => info!("{} {}", direction, text),
            _ => info!("{} (binary {}-byte body omitted)", direction, body.len()),
        }
    }
}

impl Interceptor for HttpLoggingInterceptor {
    fn name(&self) -> &'static str {
        "http-logging"
    }

    fn on_request(&self, request: &mut HttpRequest) -> Result<(), NetError> {
        if self.level == HttpLogLevel::None {
            return Ok(());
        }
        request.extensions.insert(RequestStart(Instant::now()));

        info!("--> {} {} ({}-byte body)", request.method, request.url, request.body.len());
        if self.level >= HttpLogLevel::Headers {
            self.log_headers("-->", &request.headers);
        }
        if self.level >= HttpLogLevel::Body {
            self.log_body("-->", &request.body);
        }
        Ok(())
    }

    fn on_response(&self, request: &HttpRequest, response: &mut HttpResponse) -> Result<(), NetError> {
        if self.level == HttpLogLevel::None {
            return Ok(());
        }
        let elapsed_ms = request
            .extensions
            .get::<RequestStart>()
            .map(|start| start.0.elapsed().as_millis() as u64);

        info!(
            elapsed_ms,
            "<-- {} {} {} ({}-byte body)",
            response.code(),
            response.message(),
            response.url,
            response.body().len()
        );
        if self.level >= HttpLogLevel::Headers {
            self.log_headers("<--", response.headers());
        }
        if self.level >= HttpLogLevel::Body {
            self.log_body("<--", response.body());
        }
        Ok(())
    }
}

/// Logs every request as a replayable curl command at `debug`.
#[derive(Debug, Default)]
pub struct CurlLoggingInterceptor;

impl CurlLoggingInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for CurlLoggingInterceptor {
    fn name(&self) -> &'static str {
        "curl-logging"
    }

    fn on_request(&self, request: &mut HttpRequest) -> Result<(), NetError> {
        debug!("{}", to_curl(request));
        Ok(())
    }
}

/// Shell-quoted curl command reproducing `request`. Non-UTF-8 bodies are left out.
pub fn to_curl(request: &HttpRequest) -> String {
    let mut cmd = format!("curl -X {}", request.method);
    for (name, value) in &request.headers {
        if let Ok(value) = value.to_str() {
            cmd.push_str(" -H ");
            cmd.push_str(&shell_quote(&format!("{}: {}", name, value)));
        }
    }
    if let Ok(body) = std::str::from_utf8(&request.body) {
        if !body.is_empty() {
            cmd.push_str(" --data ");
            cmd.push_str(&shell_quote(body));
        }
    }
    cmd.push(' ');
    cmd.push_str(&shell_quote(request.url.as_str()));
    cmd
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

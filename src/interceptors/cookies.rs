use crate::base::neterror::NetError;
use crate::cookies::manager::CookieManager;
use crate::http::interceptor::Interceptor;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use http::header::{COOKIE, SET_COOKIE};
use tracing::debug;
use url::Url;

/// Sends stored cookies and records the ones the server sets.
///
/// Cookies are keyed by the request origin (`scheme://host`), so paths set by
/// the server default to `/`.
pub struct CookieInterceptor {
    manager: CookieManager,
}

impl CookieInterceptor {
    pub fn new(manager: CookieManager) -> Self {
        Self { manager }
    }
}

fn origin_url(request: &HttpRequest) -> Option<Url> {
    let origin = request.origin()?;
    Url::parse(origin.as_str()).ok()
}

impl Interceptor for CookieInterceptor {
    fn name(&self) -> &'static str {
        "cookies"
    }

    fn on_request(&self, request: &mut HttpRequest) -> Result<(), NetError> {
        let Some(base) = origin_url(request) else {
            return Ok(());
        };
        if let Some(header) = self.manager.cookie_header(&base) {
            debug!(url = %base, "adding cookie header");
            request.append_header(COOKIE.as_str(), &header)?;
        }
        Ok(())
    }

    fn on_response(&self, request: &HttpRequest, response: &mut HttpResponse) -> Result<(), NetError> {
        let Some(base) = origin_url(request) else {
            return Ok(());
        };
        let values = response.header_all(SET_COOKIE.as_str());
        if !values.is_empty() {
            self.manager.put(&base, values);
        }
        Ok(())
    }
}

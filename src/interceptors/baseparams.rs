use crate::base::neterror::NetError;
use crate::config::SessionHeaderConfig;
use crate::http::interceptor::Interceptor;
use crate::http::request::HttpRequest;
use crate::session::baseparams::BaseParams;
use http::Method;
use std::sync::Arc;
use tracing::debug;

/// Attaches the base parameters and the session header to every request.
pub struct BaseParamsInterceptor {
    params: Arc<BaseParams>,
    legacy: bool,
    headers: SessionHeaderConfig,
}

impl BaseParamsInterceptor {
    pub fn new(params: Arc<BaseParams>, legacy: bool, headers: SessionHeaderConfig) -> Self {
        Self {
            params,
            legacy,
            headers,
        }
    }

    fn is_login(&self, request: &HttpRequest) -> bool {
        request.method == Method::POST
            && request
                .url
                .path()
                .eq_ignore_ascii_case(&self.headers.login_path)
    }
}

impl Interceptor for BaseParamsInterceptor {
    fn name(&self) -> &'static str {
        "base-params"
    }

    fn on_request(&self, request: &mut HttpRequest) -> Result<(), NetError> {
        if self.legacy {
            for (key, value) in self.params.query_params() {
                request.add_query_param(key, value);
            }
        }

        if !self.is_login(request) {
            match self.params.session_id() {
                Some(id) if !id.trim().is_empty() => {
                    request.append_header(&self.headers.session_header, &id)?;
                }
                session => {
                    debug!(session = ?session, url = %request.url, "no session on header");
                }
            }
        }

        request.append_header(&self.headers.country_header, self.params.country_iso_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn params(session: Option<&str>) -> Arc<BaseParams> {
        let params = BaseParams::builder("EN")
            .param("currency", "EUR")
            .timezone_offset("-60")
            .country_iso_code("FR")
            .build();
        params.set_session_id(session.map(str::to_string));
        Arc::new(params)
    }

    fn url(path: &str) -> Url {
        Url::parse("https://api.example.com").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_session_and_country_headers() {
        let stage = BaseParamsInterceptor::new(params(Some("s1")), false, Default::default());
        let mut req = HttpRequest::get(url("/v1/orders"));
        stage.on_request(&mut req).unwrap();

        assert_eq!(req.header("__session"), Some("s1"));
        assert_eq!(req.header("X-VC-Country"), Some("FR"));
        assert_eq!(req.url.query(), None);
    }

    #[test]
    fn test_login_post_has_no_session() {
        let stage = BaseParamsInterceptor::new(params(Some("s1")), false, Default::default());

        let mut login = HttpRequest::post(url("/SESSIONS"), "{}");
        stage.on_request(&mut login).unwrap();
        assert!(login.header("__session").is_none());
        assert_eq!(login.header("X-VC-Country"), Some("FR"));

        let mut lookup = HttpRequest::get(url("/sessions"));
        stage.on_request(&mut lookup).unwrap();
        assert_eq!(lookup.header("__session"), Some("s1"));
    }

    #[test]
    fn test_blank_or_missing_session_is_not_sent() {
        for session in [None, Some("   ")] {
            let stage = BaseParamsInterceptor::new(params(session), false, Default::default());
            let mut req = HttpRequest::get(url("/v1/orders"));
            stage.on_request(&mut req).unwrap();
            assert!(req.header("__session").is_none());
        }
    }

    #[test]
    fn test_legacy_query_params() {
        let stage = BaseParamsInterceptor::new(params(None), true, Default::default());
        let mut req = HttpRequest::get(url("/legacy?x=1"));
        stage.on_request(&mut req).unwrap();
        assert_eq!(req.url.query(), Some("x=1&lang=EN&currency=EUR"));
    }
}

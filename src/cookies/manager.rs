use crate::cookies::httpcookie::{CookieOrigin, HttpCookie};
use crate::cookies::psl;
use crate::cookies::store::CookieStore;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Which `Set-Cookie` values the manager keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookiePolicy {
    #[default]
    AcceptAll,
    AcceptNone,
    /// Only cookies whose domain covers the responding host and is not a public suffix.
    AcceptOriginalServer,
}

impl CookiePolicy {
    pub fn should_accept(&self, url: &Url, cookie: &HttpCookie) -> bool {
        match self {
            CookiePolicy::AcceptAll => true,
            CookiePolicy::AcceptNone => false,
            CookiePolicy::AcceptOriginalServer => match (url.host_str(), cookie.domain.as_deref()) {
                (Some(host), Some(domain)) => psl::is_valid_cookie_domain(domain, host),
                _ => false,
            },
        }
    }
}

/// Bridges `Set-Cookie`/`Cookie` headers and a [`CookieStore`].
#[derive(Clone)]
pub struct CookieManager {
    store: Arc<dyn CookieStore>,
    policy: CookiePolicy,
}

impl CookieManager {
    pub fn new(store: Arc<dyn CookieStore>, policy: CookiePolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn CookieStore> {
        &self.store
    }

    pub fn policy(&self) -> CookiePolicy {
        self.policy
    }

    /// Parse and store the `Set-Cookie` values received from `url`.
    ///
    /// Missing `Path` defaults to the directory of the url path, missing
    /// `Domain` to the url host. Returns how many cookies were stored.
    pub fn put<'a>(&self, url: &Url, set_cookie_values: impl IntoIterator<Item = &'a str>) -> usize {
        let mut stored = 0;
        for raw in set_cookie_values {
            let mut cookie = match HttpCookie::parse(raw) {
                Ok(cookie) => cookie,
                Err(e) => {
                    debug!(url = %url, error = %e, "ignoring malformed Set-Cookie");
                    continue;
                }
            };

            if cookie.path.is_none() {
                cookie.path = Some(default_path(url.path()));
            }
            if cookie.domain.is_none() {
                if let Some(host) = url.host_str() {
                    cookie.set_domain(host);
                }
            }

            if !self.policy.should_accept(url, &cookie) {
                debug!(url = %url, name = %cookie.name, policy = ?self.policy, "cookie rejected");
                continue;
            }

            self.store.add(url, cookie);
            stored += 1;
        }
        stored
    }

    pub fn cookies_for(&self, url: &Url) -> Vec<HttpCookie> {
        self.store.get(url)
    }

    /// Value for the `Cookie` request header: `name=value;` pairs, no separators.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let header: String = self
            .cookies_for(url)
            .iter()
            .map(HttpCookie::header_pair)
            .collect();
        (!header.is_empty()).then_some(header)
    }

    pub fn origins(&self) -> Vec<CookieOrigin> {
        self.store.get_uris()
    }

    pub fn clear(&self) -> bool {
        self.store.remove_all()
    }
}

/// RFC 6265 §5.1.4 default-path.
fn default_path(path: &str) -> String {
    if !path.starts_with('/') {
        return "/".to_string();
    }
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

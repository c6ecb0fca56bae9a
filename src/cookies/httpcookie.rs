use crate::base::neterror::NetError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use time::OffsetDateTime;
use url::Url;

/// `max_age` value for a cookie without `Max-Age`/`Expires` (lives for the session).
pub const SESSION_MAX_AGE: i64 = -1;

/// One HTTP cookie as stored in the cookie jar.
///
/// Equality and hashing follow cookie identity: the name and domain compare
/// case-insensitively, the path compares exactly. Two cookies with the same
/// identity replace each other in the jar.
#[derive(Debug, Clone)]
pub struct HttpCookie {
    pub name: String,
    pub value: String,
    pub comment: Option<String>,
    pub comment_url: Option<String>,
    pub discard: bool,
    /// Always lowercase.
    pub domain: Option<String>,
    /// Seconds to live relative to `created_at`. `-1` means session cookie, `0` expired.
    pub max_age: i64,
    pub path: Option<String>,
    pub portlist: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub version: i32,
    pub created_at: OffsetDateTime,
}

impl HttpCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            comment: None,
            comment_url: None,
            discard: false,
            domain: None,
            max_age: SESSION_MAX_AGE,
            path: None,
            portlist: None,
            secure: false,
            http_only: false,
            version: 1,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_domain(mut self, domain: impl AsRef<str>) -> Self {
        self.set_domain(domain.as_ref());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn set_domain(&mut self, domain: &str) {
        self.domain = Some(domain.to_ascii_lowercase());
    }

    /// Parse a single `Set-Cookie` value.
    ///
    /// `Max-Age` takes precedence over `Expires`. An `Expires` date is turned
    /// into a relative max-age; dates in the past yield `0`.
    pub fn parse(line: &str) -> Result<Self, NetError> {
        let line = line.trim();
        let line = strip_header_name(line);

        let parsed = cookie::Cookie::parse(line).map_err(|_| NetError::CookieRejected)?;
        if parsed.name().is_empty() {
            return Err(NetError::CookieRejected);
        }

        let now = OffsetDateTime::now_utc();
        let mut cookie = HttpCookie::new(parsed.name(), parsed.value());
        cookie.created_at = now;

        if let Some(domain) = parsed.domain() {
            cookie.set_domain(domain);
        }
        cookie.path = parsed.path().map(str::to_string);
        cookie.secure = parsed.secure().unwrap_or(false);
        cookie.http_only = parsed.http_only().unwrap_or(false);

        cookie.max_age = if let Some(max_age) = parsed.max_age() {
            max_age.whole_seconds().max(0)
        } else if let Some(expires) = parsed.expires_datetime() {
            (expires - now).whole_seconds().max(0)
        } else {
            SESSION_MAX_AGE
        };

        Ok(cookie)
    }

    pub fn has_expired(&self) -> bool {
        self.has_expired_at(OffsetDateTime::now_utc())
    }

    pub fn has_expired_at(&self, now: OffsetDateTime) -> bool {
        match self.max_age {
            0 => true,
            age if age < 0 => false,
            age => (now - self.created_at).whole_seconds() > age,
        }
    }

    /// Whether the domain attribute covers `host`. Cookies without a domain never match.
    pub fn matches_host(&self, host: &str) -> bool {
        self.domain
            .as_deref()
            .is_some_and(|domain| domain_matches(domain, host))
    }

    /// `name=value;` fragment used when building a `Cookie` header.
    pub fn header_pair(&self) -> String {
        format!("{}={};", self.name, self.value)
    }
}

impl PartialEq for HttpCookie {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && eq_ignore_case_opt(self.domain.as_deref(), other.domain.as_deref())
            && self.path == other.path
    }
}

impl Eq for HttpCookie {}

impl Hash for HttpCookie {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_ascii_lowercase().hash(state);
        self.domain.as_deref().map(str::to_ascii_lowercase).hash(state);
        self.path.hash(state);
    }
}

impl fmt::Display for HttpCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

fn eq_ignore_case_opt(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

fn strip_header_name(line: &str) -> &str {
    const PREFIX: &str = "set-cookie:";
    match line.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => line[PREFIX.len()..].trim_start(),
        _ => line,
    }
}

/// RFC 6265 §5.1.3 domain matching.
///
/// A leading dot on `domain` is ignored. Suffix matches are only allowed on
/// hostnames, never on IP addresses.
pub fn domain_matches(domain: &str, host: &str) -> bool {
    let domain = domain.trim_start_matches('.');
    if domain.is_empty() || host.is_empty() {
        return false;
    }
    if host.eq_ignore_ascii_case(domain) {
        return true;
    }
    if host.len() <= domain.len() || is_ip_literal(host) {
        return false;
    }

    let split = host.len() - domain.len();
    match (host.get(split..), host.as_bytes().get(split - 1)) {
        (Some(suffix), Some(b'.')) => suffix.eq_ignore_ascii_case(domain),
        _ => false,
    }
}

fn is_ip_literal(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}

/// Cookie-store partition key: `scheme://host`, lowercased, without port, path or query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CookieOrigin(String);

impl CookieOrigin {
    /// Normalize a URL to its origin. URLs without a host have no origin.
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        Some(Self(format!(
            "{}://{}",
            url.scheme().to_ascii_lowercase(),
            host.to_ascii_lowercase()
        )))
    }

    /// Parse a previously persisted origin string.
    pub fn parse(raw: &str) -> Result<Self, NetError> {
        let url = Url::parse(raw)?;
        Self::from_url(&url).ok_or(NetError::InvalidUrl)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn host(&self) -> &str {
        self.0
            .split_once("://")
            .map(|(_, host)| host)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for CookieOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Network layer configuration.

use crate::base::neterror::NetError;
use crate::session::locale::TelephonyInfo;
use crate::socket::tls::TlsConfig;
use std::time::Duration;
use url::Url;

pub use crate::cookies::store::CookieStoreConfig;
pub use crate::session::expiration::ExpirationConfig;

/// Backend environment the app talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    Staging,
    #[default]
    Release,
}

impl AppEnvironment {
    /// Debug builds talk to staging, everything else to release.
    pub fn from_build_type(build_type: &str) -> Self {
        if build_type.eq_ignore_ascii_case("debug") {
            AppEnvironment::Staging
        } else {
            AppEnvironment::Release
        }
    }

    pub fn is_staging(&self) -> bool {
        matches!(self, AppEnvironment::Staging)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentUrls {
    pub staging: String,
    pub release: String,
}

impl EnvironmentUrls {
    pub fn for_environment(&self, environment: AppEnvironment) -> &str {
        match environment {
            AppEnvironment::Staging => &self.staging,
            AppEnvironment::Release => &self.release,
        }
    }
}

/// How much of each exchange the HTTP logging interceptor writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum HttpLogLevel {
    None,
    /// Request line, status and timing.
    Basic,
    /// `Basic` plus headers.
    Headers,
    /// `Headers` plus bodies.
    #[default]
    Body,
}

/// Header names and the login endpoint used by the base-params interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeaderConfig {
    pub session_header: String,
    pub country_header: String,
    /// `POST` to this path (compared case-insensitively) never carries the session header.
    pub login_path: String,
}

impl Default for SessionHeaderConfig {
    fn default() -> Self {
        Self {
            session_header: "__session".to_string(),
            country_header: "X-VC-Country".to_string(),
            login_path: "/sessions".to_string(),
        }
    }
}

/// Configuration for [`NetworkContext`](crate::context::NetworkContext).
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub environment: AppEnvironment,
    pub base_urls: EnvironmentUrls,

    /// Language sent as the `lang` base parameter.
    pub lang: String,
    /// Takes precedence over the telephony-derived country.
    pub country_iso_code: Option<String>,
    pub telephony: TelephonyInfo,
    /// Extra query parameters for legacy services, in order.
    pub base_params: Vec<(String, String)>,

    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_redirects: usize,
    pub tls: TlsConfig,

    pub http_log_level: HttpLogLevel,
    pub curl_logging: bool,

    pub cookies: CookieStoreConfig,
    pub session: SessionHeaderConfig,
    pub expiration: ExpirationConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            environment: AppEnvironment::default(),
            base_urls: EnvironmentUrls::default(),
            lang: "EN".to_string(),
            country_iso_code: None,
            telephony: TelephonyInfo::default(),
            base_params: Vec::new(),
            request_timeout: Duration::from_secs(20),
            upload_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(20),
            max_redirects: 20,
            tls: TlsConfig::default(),
            http_log_level: HttpLogLevel::default(),
            curl_logging: true,
            cookies: CookieStoreConfig::default(),
            session: SessionHeaderConfig::default(),
            expiration: ExpirationConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Base URL of the configured environment.
    pub fn base_url(&self) -> Result<Url, NetError> {
        let raw = self.base_urls.for_environment(self.environment);
        if raw.is_empty() {
            return Err(NetError::InvalidUrl);
        }
        Ok(Url::parse(raw)?)
    }

    /// Debug logging is on everywhere but release.
    pub fn debug_logs_enabled(&self) -> bool {
        self.environment.is_staging()
    }
}

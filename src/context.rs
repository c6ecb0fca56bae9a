//! Shared network state for every generated service.
//!
//! One [`NetworkContext`] owns the cookie jar, the base parameters and the
//! session expiration listeners. Services built from it share all three.

use crate::config::{HttpLogLevel, NetworkConfig};
use crate::cookies::manager::CookieManager;
use crate::cookies::store::{CookieStore, PersistentCookieStore};
use crate::http::interceptor::Pipeline;
use crate::http::transport::{HyperTransport, Transport, TransportConfig};
use crate::interceptors::{
    BaseParamsInterceptor, CookieInterceptor, CurlLoggingInterceptor, HttpLoggingInterceptor,
    SessionExpirationInterceptor,
};
use crate::service::{ServiceClient, ServiceDescriptor};
use crate::session::baseparams::BaseParams;
use crate::session::expiration::{
    ListenerId, ListenerRegistry, SessionExpirationDetector, SessionExpirationListener,
};
use crate::session::locale;
use crate::socket::connectjob::ConnectOptions;
use crate::storage::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct NetworkContext {
    config: NetworkConfig,
    cookie_store: Arc<dyn CookieStore>,
    cookie_manager: CookieManager,
    base_params: Arc<BaseParams>,
    listeners: Arc<ListenerRegistry>,
    transport: Option<Arc<dyn Transport>>,
}

impl NetworkContext {
    /// Replays the persisted cookie jar from `storage` and fixes the base
    /// parameters for the lifetime of the context.
    pub fn new(config: NetworkConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        let cookie_store: Arc<dyn CookieStore> =
            Arc::new(PersistentCookieStore::open(storage, &config.cookies));
        let cookie_manager = CookieManager::new(cookie_store.clone(), config.cookies.policy);

        let country = config
            .country_iso_code
            .as_deref()
            .and_then(locale::normalize_country_code)
            .or_else(|| locale::resolve_country_iso(&config.telephony))
            .unwrap_or_default();
        let mut builder = BaseParams::builder(config.lang.clone()).country_iso_code(country);
        for (key, value) in &config.base_params {
            builder = builder.param(key.clone(), value.clone());
        }

        Self {
            cookie_store,
            cookie_manager,
            base_params: Arc::new(builder.build()),
            listeners: Arc::new(ListenerRegistry::new()),
            transport: None,
            config,
        }
    }

    /// Route every service through `transport` instead of the network.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn cookie_store(&self) -> &Arc<dyn CookieStore> {
        &self.cookie_store
    }

    pub fn cookie_manager(&self) -> &CookieManager {
        &self.cookie_manager
    }

    pub fn base_params(&self) -> &Arc<BaseParams> {
        &self.base_params
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    pub fn set_session_id(&self, session_id: Option<String>) {
        self.base_params.set_session_id(session_id);
    }

    /// Forget the session id and every stored cookie.
    pub fn clear_session(&self) {
        self.base_params.set_session_id(None);
        let had_cookies = self.cookie_store.remove_all();
        debug!(had_cookies, "session cleared");
    }

    /// A session id has been set. Blank ids count.
    pub fn is_valid_session_id(&self) -> bool {
        self.base_params.has_session()
    }

    pub fn subscribe_session_expiration(
        &self,
        listener: Arc<dyn SessionExpirationListener>,
    ) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe_session_expiration(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Build a client whose pipeline runs base params, cookies, session
    /// expiration, curl logging then HTTP logging, as the descriptor enables them.
    pub fn generate_service(&self, descriptor: ServiceDescriptor) -> ServiceClient {
        let timeout = self.resolve_timeout(&descriptor);
        let transport = self
            .transport
            .clone()
            .unwrap_or_else(|| self.network_transport(&descriptor, timeout));

        let mut pipeline = Pipeline::new(transport);
        if descriptor.base_params {
            pipeline.push(Arc::new(BaseParamsInterceptor::new(
                self.base_params.clone(),
                descriptor.legacy && !descriptor.upload,
                self.config.session.clone(),
            )));
        }
        if descriptor.cookies {
            pipeline.push(Arc::new(CookieInterceptor::new(self.cookie_manager.clone())));
        }
        if descriptor.session_expiration {
            pipeline.push(Arc::new(SessionExpirationInterceptor::new(
                SessionExpirationDetector::new(self.config.expiration.clone()),
                self.listeners.clone(),
            )));
        }
        if self.config.curl_logging {
            pipeline.push(Arc::new(CurlLoggingInterceptor::new()));
        }
        let level = if descriptor.body_logging {
            self.config.http_log_level
        } else {
            self.config.http_log_level.min(HttpLogLevel::Headers)
        };
        if level != HttpLogLevel::None {
            pipeline.push(Arc::new(
                HttpLoggingInterceptor::new(level).redact_header(&self.config.session.session_header),
            ));
        }

        debug!(base_url = %descriptor.base_url, stages = ?pipeline.names(), "service generated");
        ServiceClient::new(
            descriptor.base_url,
            pipeline,
            timeout,
            descriptor.follow_redirects,
            self.config.max_redirects,
        )
    }

    fn resolve_timeout(&self, descriptor: &ServiceDescriptor) -> Duration {
        match descriptor.timeout {
            Some(timeout) => timeout,
            None if descriptor.upload => self.config.upload_timeout,
            None => self.config.request_timeout,
        }
    }

    fn network_transport(&self, descriptor: &ServiceDescriptor, timeout: Duration) -> Arc<dyn Transport> {
        let connect_timeout = if descriptor.upload {
            self.config.upload_timeout
        } else {
            self.config.connect_timeout
        };
        Arc::new(HyperTransport::new(TransportConfig {
            connect: ConnectOptions {
                connect_timeout,
                tls: self.config.tls.clone(),
            },
            request_timeout: timeout,
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::locale::{PhoneType, TelephonyInfo};
    use crate::storage::InMemoryStore;

    fn context(config: NetworkConfig) -> NetworkContext {
        NetworkContext::new(config, Arc::new(InMemoryStore::new()))
    }

    fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor::parse("https://api.example.com/").unwrap()
    }

    #[test]
    fn test_country_override_wins() {
        let ctx = context(NetworkConfig {
            country_iso_code: Some("fr".into()),
            telephony: TelephonyInfo {
                sim_country_iso: Some("de".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(ctx.base_params().country_iso_code(), "FR");
    }

    #[test]
    fn test_country_from_telephony() {
        let ctx = context(NetworkConfig {
            telephony: TelephonyInfo {
                sim_country_iso: None,
                network_country_iso: Some("it".into()),
                phone_type: PhoneType::Gsm,
            },
            ..Default::default()
        });
        assert_eq!(ctx.base_params().country_iso_code(), "IT");
    }

    #[test]
    fn test_session_lifecycle() {
        let ctx = context(NetworkConfig::default());
        assert!(!ctx.is_valid_session_id());
        ctx.set_session_id(Some("abc".into()));
        assert!(ctx.is_valid_session_id());
        ctx.clear_session();
        assert!(!ctx.is_valid_session_id());
    }

    #[test]
    fn test_pipeline_order() {
        let ctx = context(NetworkConfig::default());
        let api = ctx.generate_service(descriptor().session_expiration(true));
        assert_eq!(
            api.pipeline().names(),
            vec!["base-params", "cookies", "session-expiration", "curl-logging", "http-logging"]
        );

        let bare = ctx.generate_service(descriptor().base_params(false).cookies(false));
        assert_eq!(bare.pipeline().names(), vec!["curl-logging", "http-logging"]);
    }

    #[test]
    fn test_timeouts() {
        let ctx = context(NetworkConfig::default());
        assert_eq!(ctx.generate_service(descriptor()).timeout(), Duration::from_secs(20));

        let upload = ServiceDescriptor::upload(descriptor().base_url);
        assert_eq!(ctx.generate_service(upload).timeout(), Duration::from_secs(60));

        let custom = descriptor().timeout(Duration::from_secs(5));
        assert_eq!(ctx.generate_service(custom).timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_logging_disabled() {
        let ctx = context(NetworkConfig {
            http_log_level: HttpLogLevel::None,
            curl_logging: false,
            ..Default::default()
        });
        let api = ctx.generate_service(descriptor());
        assert_eq!(api.pipeline().names(), vec!["base-params", "cookies"]);
    }
}

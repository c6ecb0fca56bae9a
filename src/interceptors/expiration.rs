use crate::base::neterror::NetError;
use crate::http::interceptor::Interceptor;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::session::expiration::{ListenerRegistry, SessionExpirationDetector, SessionVerdict};
use std::sync::Arc;
use tracing::{debug, trace};

/// Notifies the registry when a response shows the server dropped the session.
///
/// The response itself is never altered.
pub struct SessionExpirationInterceptor {
    detector: SessionExpirationDetector,
    listeners: Arc<ListenerRegistry>,
}

impl SessionExpirationInterceptor {
    pub fn new(detector: SessionExpirationDetector, listeners: Arc<ListenerRegistry>) -> Self {
        Self {
            detector,
            listeners,
        }
    }
}

impl Interceptor for SessionExpirationInterceptor {
    fn name(&self) -> &'static str {
        "session-expiration"
    }

    fn on_response(&self, request: &HttpRequest, response: &mut HttpResponse) -> Result<(), NetError> {
        match self.detector.inspect(request, response) {
            SessionVerdict::Expired(source) => {
                debug!(url = %request.url, source = ?source, status = response.code(), "session expired");
                self.listeners.notify();
            }
            SessionVerdict::Skipped(reason) => {
                trace!(url = %request.url, reason = ?reason, "session check skipped");
            }
            SessionVerdict::Active => {}
        }
        Ok(())
    }
}

//! Ordered request/response stages around a [`Transport`].
//!
//! ```text
//!  on_request:  [0] -> [1] -> ... -> [n]  -> transport
//!  on_response: [0] <- [1] <- ... <- [n]  <- transport
//! ```

use crate::base::neterror::NetError;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use crate::http::transport::Transport;
use std::sync::Arc;
use tracing::debug;

/// One stage of the pipeline. Both hooks default to pass-through.
///
/// An `Err` from either hook aborts the call with that error.
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_request(&self, _request: &mut HttpRequest) -> Result<(), NetError> {
        Ok(())
    }

    fn on_response(
        &self,
        _request: &HttpRequest,
        _response: &mut HttpResponse,
    ) -> Result<(), NetError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct Pipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            interceptors: Vec::new(),
            transport,
        }
    }

    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.push(Arc::new(interceptor));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Run every request hook, the transport, then every response hook in reverse.
    pub async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, NetError> {
        for interceptor in &self.interceptors {
            if let Err(e) = interceptor.on_request(&mut request) {
                debug!(stage = interceptor.name(), error = %e, "request hook aborted the call");
                return Err(e);
            }
        }

        let mut response = self.transport.send(request.clone()).await?;

        for interceptor in self.interceptors.iter().rev() {
            if let Err(e) = interceptor.on_response(&request, &mut response) {
                debug!(stage = interceptor.name(), error = %e, "response hook aborted the call");
                return Err(e);
            }
        }
        Ok(response)
    }
}

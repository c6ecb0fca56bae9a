pub mod apicall;
pub mod interceptor;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

// Re-exports for convenience
pub use apicall::{ApiError, ApiResult, ResponseMeta};
pub use interceptor::{Interceptor, Pipeline};
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use retry::RetryConfig;
pub use transport::{HyperTransport, Transport, TransportConfig};

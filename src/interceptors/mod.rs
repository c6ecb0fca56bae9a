//! Concrete pipeline stages, in the order a service installs them:
//!
//! | Stage | Request side | Response side |
//! |---|---|---|
//! | [`BaseParamsInterceptor`] | legacy query params, `__session`, country header | - |
//! | [`CookieInterceptor`] | `Cookie` header | stores `Set-Cookie` |
//! | [`SessionExpirationInterceptor`] | - | notifies listeners on logout |
//! | [`CurlLoggingInterceptor`] | logs a replayable curl command | - |
//! | [`HttpLoggingInterceptor`] | request line, headers, body | status, timing, body |

pub mod baseparams;
pub mod cookies;
pub mod expiration;
pub mod logging;

pub use baseparams::BaseParamsInterceptor;
pub use cookies::CookieInterceptor;
pub use expiration::SessionExpirationInterceptor;
pub use logging::{CurlLoggingInterceptor, HttpLoggingInterceptor};

//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): network error codes modeled on Chromium's `net_error_list.h`
//! - [`context`]: helpers attaching context to IO failures

pub mod context;
pub mod neterror;

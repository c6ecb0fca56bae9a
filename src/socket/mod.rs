//! Connection establishment.
//!
//! - [`connectjob`]: DNS -> TCP -> TLS with a connect timeout
//! - [`client`]: the resulting plain or TLS socket
//! - [`tls`]: BoringSSL client settings

pub mod client;
pub mod connectjob;
pub mod tls;

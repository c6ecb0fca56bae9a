//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into classified `NetError` variants.

use crate::base::neterror::NetError;
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Classify a connect failure and log the target it happened on.
    ///
    /// # Example
    /// ```ignore
    /// use cloudnet::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("example.com", 443)?;
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// Map a DNS lookup failure to `NameNotResolved`.
    fn dns_context(self, domain: &str) -> Result<T, NetError>;

    /// Map a storage IO failure to `StorageFailed`, keeping the path in the message.
    fn storage_context(self, path: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(host = %host, port, error = %e, "connection failed");
            NetError::from_io(&e)
        })
    }

    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(domain = %domain, error = %e, "DNS resolution failed");
            NetError::NameNotResolved
        })
    }

    fn storage_context(self, path: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::StorageFailed {
            message: format!("{}: {}", path, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_connection_context() {
        let result: Result<(), io::Error> =
            Err(Error::new(ErrorKind::ConnectionRefused, "refused"));
        let err = result.connection_context("example.com", 443).unwrap_err();
        assert_eq!(err, NetError::ConnectionRefused);
    }

    #[test]
    fn test_dns_context() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::NotFound, "no such host"));
        let err = result.dns_context("unknown.example.com").unwrap_err();
        assert_eq!(err, NetError::NameNotResolved);
    }

    #[test]
    fn test_storage_context_keeps_path() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::PermissionDenied, "denied"));
        match result.storage_context("/tmp/cookies.json").unwrap_err() {
            NetError::StorageFailed { message } => assert!(message.contains("/tmp/cookies.json")),
            other => panic!("Expected StorageFailed, got {:?}", other),
        }
    }
}

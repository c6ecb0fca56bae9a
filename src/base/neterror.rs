use std::io;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Generic
    #[error("Operation aborted")]
    Aborted,
    #[error("Operation timed out")]
    TimedOut,

    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Internet disconnected")]
    InternetDisconnected,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Connection timed out")]
    ConnectionTimedOut,

    // HTTP Errors
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Disallowed URL scheme")]
    DisallowedUrlScheme,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,

    // Request/response plumbing (custom codes starting at -10001)
    #[error("Invalid header name or value")]
    InvalidHeader,
    #[error("Failed to read HTTP body")]
    HttpBodyError,
    #[error("Body is not valid UTF-8")]
    InvalidUtf8,
    #[error("Failed to parse JSON body")]
    JsonParseError,
    #[error("Cookie record could not be decoded: {reason}")]
    CookieDecodeFailed { reason: String },
    #[error("Cookie rejected by policy")]
    CookieRejected,
    #[error("Storage operation failed: {message}")]
    StorageFailed { message: String },
    #[error("Interceptor {stage} failed: {message}")]
    InterceptorFailed { stage: String, message: String },

    #[error("Unknown error: {0}")]
    Unknown(i32),
}

impl NetError {
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::Aborted => -3,
            NetError::TimedOut => -7,
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::InternetDisconnected => -106,
            NetError::SslProtocolError => -107,
            NetError::AddressUnreachable => -109,
            NetError::ConnectionTimedOut => -118,

            NetError::InvalidUrl => -300,
            NetError::DisallowedUrlScheme => -301,
            NetError::InvalidRedirect => -303,
            NetError::TooManyRedirects => -310,
            NetError::InvalidResponse => -320,
            NetError::EmptyResponse => -324,

            NetError::InvalidHeader => -10001,
            NetError::HttpBodyError => -10002,
            NetError::InvalidUtf8 => -10003,
            NetError::JsonParseError => -10004,
            NetError::CookieDecodeFailed { .. } => -10005,
            NetError::CookieRejected => -10006,
            NetError::StorageFailed { .. } => -10007,
            NetError::InterceptorFailed { .. } => -10008,
            NetError::Unknown(code) => *code,
        }
    }

    /// Whether this failure is worth reporting.
    ///
    /// Reachability faults (no DNS, refused connection, cancelled call) are
    /// expected on mobile networks and are not logged as errors.
    pub fn is_loggable(&self) -> bool {
        !matches!(
            self,
            NetError::NameNotResolved | NetError::ConnectionRefused | NetError::Aborted
        )
    }

    /// Classify an IO error coming out of the socket layer.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof => {
                NetError::ConnectionClosed
            }
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            io::ErrorKind::AddrNotAvailable => NetError::AddressUnreachable,
            io::ErrorKind::Interrupted => NetError::Aborted,
            _ => NetError::ConnectionFailed,
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        NetError::StorageFailed {
            message: err.to_string(),
        }
    }

    pub fn cookie_decode(reason: impl Into<String>) -> Self {
        NetError::CookieDecodeFailed {
            reason: reason.into(),
        }
    }
}

impl From<i32> for NetError {
    fn from(code: i32) -> Self {
        match code {
            -3 => NetError::Aborted,
            -7 => NetError::TimedOut,
            -100 => NetError::ConnectionClosed,
            -101 => NetError::ConnectionReset,
            -102 => NetError::ConnectionRefused,
            -103 => NetError::ConnectionAborted,
            -104 => NetError::ConnectionFailed,
            -105 => NetError::NameNotResolved,
            -106 => NetError::InternetDisconnected,
            -107 => NetError::SslProtocolError,
            -109 => NetError::AddressUnreachable,
            -118 => NetError::ConnectionTimedOut,

            -300 => NetError::InvalidUrl,
            -301 => NetError::DisallowedUrlScheme,
            -303 => NetError::InvalidRedirect,
            -310 => NetError::TooManyRedirects,
            -320 => NetError::InvalidResponse,
            -324 => NetError::EmptyResponse,

            -10001 => NetError::InvalidHeader,
            -10002 => NetError::HttpBodyError,
            -10003 => NetError::InvalidUtf8,
            -10004 => NetError::JsonParseError,
            -10006 => NetError::CookieRejected,
            _ => NetError::Unknown(code),
        }
    }
}

// Conversion from rusqlite errors
impl From<rusqlite::Error> for NetError {
    fn from(err: rusqlite::Error) -> Self {
        NetError::storage(err)
    }
}

impl From<serde_json::Error> for NetError {
    fn from(_: serde_json::Error) -> Self {
        NetError::JsonParseError
    }
}

impl From<url::ParseError> for NetError {
    fn from(_: url::ParseError) -> Self {
        NetError::InvalidUrl
    }
}

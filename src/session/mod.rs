//! Session state shared by every request: base parameters, locale inputs and
//! server-side logout detection.

pub mod baseparams;
pub mod expiration;
pub mod locale;

pub use baseparams::BaseParams;
pub use expiration::{
    ExpirationConfig, ExpirationSource, ListenerId, ListenerRegistry, SessionExpirationDetector,
    SessionExpirationListener, SessionVerdict, SkipReason,
};

//! Server-side logout detection.
//!
//! [`SessionExpirationDetector`] classifies a finished exchange; the decision
//! is a pure function of the request url, the status, one header and the
//! buffered body. [`ListenerRegistry`] fans a detected expiration out to every
//! subscriber.
//!
//! | Check | Outcome |
//! |-------|---------|
//! | url contains a session or excluded path | `Skipped` |
//! | body prefix is binary | `Skipped` |
//! | body longer than the threshold | `Skipped` |
//! | identifier header has the atlas marker and status is 401 | `Expired(Atlas)` |
//! | no atlas marker and body contains the legacy marker | `Expired(Legacy)` |
//! | otherwise | `Active` |

use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use http::StatusCode;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ExpirationConfig {
    /// Logout/login/session endpoints. Their responses never signal expiration.
    pub session_paths: Vec<String>,
    pub excluded_paths: Vec<String>,
    pub identifier_header: String,
    pub atlas_marker: String,
    pub legacy_marker: String,
    /// Bodies longer than this are not inspected.
    pub max_body_len: usize,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            session_paths: vec![
                "userDisconnect".to_string(),
                "sessions".to_string(),
                "userLogin".to_string(),
            ],
            excluded_paths: vec!["notification-feed-counter".to_string()],
            identifier_header: "identifier".to_string(),
            atlas_marker: "atlas".to_string(),
            legacy_marker: r#""isLogged":"0""#.to_string(),
            max_body_len: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SessionRequest,
    ExcludedRequest,
    NotPlaintext,
    BodyTooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationSource {
    Atlas,
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    Skipped(SkipReason),
    Active,
    Expired(ExpirationSource),
}

impl SessionVerdict {
    pub fn is_expired(&self) -> bool {
        matches!(self, SessionVerdict::Expired(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionExpirationDetector {
    config: ExpirationConfig,
}

impl SessionExpirationDetector {
    pub fn new(config: ExpirationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExpirationConfig {
        &self.config
    }

    pub fn inspect(&self, request: &HttpRequest, response: &HttpResponse) -> SessionVerdict {
        let url = request.url.as_str();
        if self.config.session_paths.iter().any(|p| url.contains(p.as_str())) {
            return SessionVerdict::Skipped(SkipReason::SessionRequest);
        }
        if self.config.excluded_paths.iter().any(|p| url.contains(p.as_str())) {
            return SessionVerdict::Skipped(SkipReason::ExcludedRequest);
        }
        if !is_plaintext(&response.body) {
            return SessionVerdict::Skipped(SkipReason::NotPlaintext);
        }
        if response.body.len() > self.config.max_body_len {
            return SessionVerdict::Skipped(SkipReason::BodyTooLarge);
        }

        let identifier = response.header(&self.config.identifier_header);
        let is_atlas = identifier.is_some_and(|id| contains_ignore_case(id, &self.config.atlas_marker));

        if let Some(id) = identifier {
            if !is_atlas {
                warn!(
                    header = %self.config.identifier_header,
                    value = %id,
                    url = %url,
                    "identifier header no longer carries the atlas marker"
                );
            }
        }

        if is_atlas {
            if response.status == StatusCode::UNAUTHORIZED {
                return SessionVerdict::Expired(ExpirationSource::Atlas);
            }
            return SessionVerdict::Active;
        }

        let body = String::from_utf8_lossy(&response.body);
        if contains_ignore_case(body.trim(), &self.config.legacy_marker) {
            return SessionVerdict::Expired(ExpirationSource::Legacy);
        }
        SessionVerdict::Active
    }
}

/// Probe the first 64 bytes: up to 16 code points, none of them a control
/// character other than whitespace. An invalid sequence reads as U+FFFD; only
/// a sequence cut by the probe window or by the end of the body counts as
/// binary.
pub fn is_plaintext(body: &[u8]) -> bool {
    let prefix = &body[..body.len().min(64)];
    let mut rest = prefix;

    for _ in 0..16 {
        if rest.is_empty() {
            break;
        }
        let width = utf8_width(rest[0]);
        if width == 0 {
            rest = &rest[1..];
            continue;
        }
        if rest.len() < width {
            return false;
        }
        match std::str::from_utf8(&rest[..width]).ok().and_then(|s| s.chars().next()) {
            Some(c) if c.is_control() && !is_separator_control(c) => return false,
            Some(_) => rest = &rest[width..],
            None => {
                let valid = rest[1..width]
                    .iter()
                    .take_while(|b| (0x80..=0xbf).contains(*b))
                    .count();
                rest = &rest[1 + valid..];
            }
        }
    }
    true
}

/// Control characters that still count as whitespace: tab through carriage
/// return and the four information separators.
fn is_separator_control(c: char) -> bool {
    matches!(c, '\t'..='\r' | '\u{1c}'..='\u{1f}')
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => 0,
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

/// Receives session expiration signals.
///
/// Called synchronously on the task that ran the request pipeline. Work that
/// needs another executor or thread must be handed off by the listener.
pub trait SessionExpirationListener: Send + Sync {
    fn on_session_expired(&self);
}

impl<F> SessionExpirationListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_session_expired(&self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Multi-slot subscriber list for session expiration.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn SessionExpirationListener>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn SessionExpirationListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Invoke every listener in subscription order. Returns how many were called.
    pub fn notify(&self) -> usize {
        // Snapshot so listeners may (un)subscribe from inside the callback.
        let snapshot: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        debug!(listeners = snapshot.len(), "session expired");
        for listener in &snapshot {
            listener.on_session_expired();
        }
        snapshot.len()
    }
}

//! Public Suffix List checks for cookie domains.
//!
//! A server may not set a cookie on a public suffix such as `com` or
//! `co.uk`. Lookups go through Mozilla's list bundled in the `psl` crate.

use crate::cookies::httpcookie::domain_matches;
use psl::{List, Psl};

/// True when `domain` is itself a public suffix (`com`, `co.uk`, `github.io`).
pub fn is_public_suffix(domain: &str) -> bool {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    List.suffix(domain.as_bytes())
        .is_some_and(|suffix| suffix.is_known() && suffix.as_bytes() == domain.as_bytes())
}

/// Whether a server at `host` may set a cookie for `cookie_domain`.
///
/// The domain must cover the host and must not be a public suffix, unless it
/// is exactly the host (a site hosted directly on a suffix keeps host cookies).
pub fn is_valid_cookie_domain(cookie_domain: &str, host: &str) -> bool {
    if !domain_matches(cookie_domain, host) {
        return false;
    }
    let bare = cookie_domain.trim_start_matches('.');
    bare.eq_ignore_ascii_case(host) || !is_public_suffix(bare)
}

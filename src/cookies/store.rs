//! Cookie jar persisted through a [`KeyValueStore`].
//!
//! Layout in the key-value layer (`p` is the configured key prefix):
//!
//! | Key | Value |
//! |-----|-------|
//! | `p.CookieStore.domain` | comma-joined origins |
//! | `p.CookieStore.domain_{origin}` | comma-joined cookie names of that origin (`%` and `,` escaped) |
//! | `p.CookieStore.cookie_{origin}{name}` | hex record, see [`codec`](crate::cookies::codec) |
//!
//! Every public operation takes the jar lock and keeps it until the durable
//! write has been applied. Storage failures are logged and swallowed; the
//! in-memory jar stays authoritative for the rest of the process.

use crate::cookies::codec;
use crate::cookies::cookiemap::CookieMap;
use crate::cookies::httpcookie::{CookieOrigin, HttpCookie};
use crate::cookies::manager::CookiePolicy;
use crate::storage::{KeyValueStore, WriteBatch};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

/// Cookie jar contract shared by the persistent store and test doubles.
pub trait CookieStore: Send + Sync {
    /// Store `cookie` under the origin of `url`, replacing any cookie with the same identity.
    fn add(&self, url: &Url, cookie: HttpCookie);

    /// Cookies stored under the origin of `url` plus cookies from other origins
    /// whose domain covers the url host. Expired cookies are evicted.
    fn get(&self, url: &Url) -> Vec<HttpCookie>;

    /// Every live cookie, de-duplicated.
    fn get_cookies(&self) -> Vec<HttpCookie>;

    fn get_uris(&self) -> Vec<CookieOrigin>;

    fn remove(&self, url: &Url, cookie: &HttpCookie) -> bool;

    /// Drop every cookie. Returns whether the jar held anything.
    fn remove_all(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct CookieStoreConfig {
    /// Namespace prefix for every persisted key.
    pub key_prefix: String,
    /// When set, a cookie domain containing this marker and not starting with
    /// `.` is rewritten to start at its first `.`.
    pub domain_rewrite_marker: Option<String>,
    pub policy: CookiePolicy,
}

impl Default for CookieStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "cloudnet".to_string(),
            domain_rewrite_marker: None,
            policy: CookiePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoreKeys {
    domains: String,
    domain_prefix: String,
    cookie_prefix: String,
}

impl StoreKeys {
    fn new(prefix: &str) -> Self {
        Self {
            domains: format!("{}.CookieStore.domain", prefix),
            domain_prefix: format!("{}.CookieStore.domain_", prefix),
            cookie_prefix: format!("{}.CookieStore.cookie_", prefix),
        }
    }

    fn names(&self, origin: &CookieOrigin) -> String {
        format!("{}{}", self.domain_prefix, origin)
    }

    fn cookie(&self, origin: &CookieOrigin, name: &str) -> String {
        format!("{}{}{}", self.cookie_prefix, origin, name)
    }

    fn owns(&self, key: &str) -> bool {
        key == self.domains
            || key.starts_with(&self.domain_prefix)
            || key.starts_with(&self.cookie_prefix)
    }
}

pub struct PersistentCookieStore {
    cookies: Mutex<CookieMap>,
    backend: Arc<dyn KeyValueStore>,
    keys: StoreKeys,
    domain_rewrite_marker: Option<String>,
}

impl PersistentCookieStore {
    /// Open the store, replaying whatever the backend already holds.
    ///
    /// Unreadable indexes and undecodable records are skipped.
    pub fn open(backend: Arc<dyn KeyValueStore>, config: &CookieStoreConfig) -> Self {
        let keys = StoreKeys::new(&config.key_prefix);
        let cookies = load(backend.as_ref(), &keys);
        debug!(origins = cookies.len(), "cookie store loaded");

        Self {
            cookies: Mutex::new(cookies),
            backend,
            keys,
            domain_rewrite_marker: config.domain_rewrite_marker.clone(),
        }
    }

    fn rewrite_domain(&self, cookie: &mut HttpCookie) {
        let Some(marker) = self.domain_rewrite_marker.as_deref() else {
            return;
        };
        let Some(domain) = cookie.domain.as_deref() else {
            return;
        };
        if domain.starts_with('.') || !domain.contains(marker) {
            return;
        }
        if let Some(idx) = domain.find('.') {
            let rewritten = domain[idx..].to_string();
            debug!(from = %domain, to = %rewritten, "rewriting cookie domain");
            cookie.domain = Some(rewritten);
        }
    }

    /// Queue the name index and every record of `origin`, and delete records
    /// for `dropped` names that no longer exist there.
    fn stage_origin<'a>(
        &self,
        batch: &mut WriteBatch,
        map: &CookieMap,
        origin: &CookieOrigin,
        dropped: impl IntoIterator<Item = &'a str>,
    ) {
        let names = map.cookie_names(origin);
        batch.put(self.keys.names(origin), join_names(&names));

        for cookie in map.get(origin) {
            match codec::encode_hex(cookie) {
                Ok(record) => {
                    batch.put(self.keys.cookie(origin, &cookie.name), record);
                }
                Err(e) => {
                    warn!(origin = %origin, name = %cookie.name, error = %e, "skipping cookie record");
                }
            }
        }

        for name in dropped {
            if !names.contains(name) {
                batch.remove(self.keys.cookie(origin, name));
            }
        }
    }

    fn stage_origin_index(&self, batch: &mut WriteBatch, map: &CookieMap) {
        let origins = map.all_origins();
        batch.put(
            self.keys.domains.clone(),
            join(origins.iter().map(CookieOrigin::as_str)),
        );
    }

    fn flush(&self, batch: WriteBatch) {
        if batch.is_empty() {
            return;
        }
        if let Err(e) = self.backend.apply(batch) {
            warn!(error = %e, "cookie store write failed");
        }
    }

    /// Drop expired cookies selected by `filter`, returning the live selected
    /// cookies and the evicted names. Unselected cookies are left alone.
    fn evict_expired(
        list: &mut Vec<HttpCookie>,
        now: OffsetDateTime,
        filter: impl Fn(&HttpCookie) -> bool,
    ) -> (Vec<HttpCookie>, Vec<String>) {
        let mut live = Vec::new();
        let mut evicted = Vec::new();
        list.retain(|cookie| {
            if !filter(cookie) {
                return true;
            }
            if cookie.has_expired_at(now) {
                evicted.push(cookie.name.clone());
                false
            } else {
                live.push(cookie.clone());
                true
            }
        });
        (live, evicted)
    }

    fn persist_evictions(&self, map: &CookieMap, evictions: Vec<(CookieOrigin, Vec<String>)>) {
        let mut batch = WriteBatch::new();
        for (origin, names) in &evictions {
            if names.is_empty() {
                continue;
            }
            debug!(origin = %origin, count = names.len(), "evicting expired cookies");
            self.stage_origin(&mut batch, map, origin, names.iter().map(String::as_str));
        }
        self.flush(batch);
    }
}

impl CookieStore for PersistentCookieStore {
    fn add(&self, url: &Url, mut cookie: HttpCookie) {
        let Some(origin) = CookieOrigin::from_url(url) else {
            debug!(url = %url, "ignoring cookie for url without host");
            return;
        };
        self.rewrite_domain(&mut cookie);

        let mut map = self.cookies.lock();
        let replaced = map.upsert(origin.clone(), cookie);

        let mut batch = WriteBatch::new();
        self.stage_origin_index(&mut batch, &map);
        self.stage_origin(
            &mut batch,
            &map,
            &origin,
            replaced.iter().map(|c| c.name.as_str()),
        );
        self.flush(batch);
    }

    fn get(&self, url: &Url) -> Vec<HttpCookie> {
        let Some(origin) = CookieOrigin::from_url(url) else {
            return Vec::new();
        };
        let host = origin.host().to_string();
        let now = OffsetDateTime::now_utc();

        let mut map = self.cookies.lock();
        let mut result: Vec<HttpCookie> = Vec::new();
        let mut evictions = Vec::new();

        if let Some(list) = map.get_mut(&origin) {
            let (live, evicted) = Self::evict_expired(list, now, |_| true);
            result.extend(live);
            evictions.push((origin.clone(), evicted));
        }

        for (key, list) in map.iter_mut() {
            if key == &origin {
                continue;
            }
            let (live, evicted) = Self::evict_expired(list, now, |c| c.matches_host(&host));
            for cookie in live {
                if !result.contains(&cookie) {
                    result.push(cookie);
                }
            }
            evictions.push((key.clone(), evicted));
        }

        self.persist_evictions(&map, evictions);
        result
    }

    fn get_cookies(&self) -> Vec<HttpCookie> {
        let now = OffsetDateTime::now_utc();
        let mut map = self.cookies.lock();
        let mut result: Vec<HttpCookie> = Vec::new();
        let mut evictions = Vec::new();

        for (origin, list) in map.iter_mut() {
            let (live, evicted) = Self::evict_expired(list, now, |_| true);
            for cookie in live {
                if !result.contains(&cookie) {
                    result.push(cookie);
                }
            }
            evictions.push((origin.clone(), evicted));
        }

        self.persist_evictions(&map, evictions);
        result
    }

    fn get_uris(&self) -> Vec<CookieOrigin> {
        self.cookies.lock().all_origins()
    }

    fn remove(&self, url: &Url, cookie: &HttpCookie) -> bool {
        let Some(origin) = CookieOrigin::from_url(url) else {
            return false;
        };

        let mut map = self.cookies.lock();
        let Some(removed) = map.remove_cookie(&origin, cookie) else {
            return false;
        };

        let mut batch = WriteBatch::new();
        self.stage_origin(&mut batch, &map, &origin, [removed.name.as_str()]);
        self.flush(batch);
        true
    }

    fn remove_all(&self) -> bool {
        let mut map = self.cookies.lock();

        match self.backend.keys() {
            Ok(keys) => {
                let mut batch = WriteBatch::new();
                for key in keys.into_iter().filter(|k| self.keys.owns(k)) {
                    batch.remove(key);
                }
                self.flush(batch);
            }
            Err(e) => warn!(error = %e, "cookie store could not list keys for removal"),
        }

        let had_cookies = !map.is_empty();
        map.clear();
        had_cookies
    }
}

fn join<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items.into_iter().collect::<Vec<_>>().join(",")
}

fn split(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Name index entries escape `%` and `,` so any cookie name survives the
/// comma-joined layout.
fn join_names(names: &BTreeSet<String>) -> String {
    names
        .iter()
        .map(|name| name.replace('%', "%25").replace(',', "%2C"))
        .collect::<Vec<_>>()
        .join(",")
}

fn unescape_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if tail.starts_with("%2C") || tail.starts_with("%2c") {
            out.push(',');
            rest = &tail[3..];
        } else if tail.starts_with("%25") {
            out.push('%');
            rest = &tail[3..];
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn read(backend: &dyn KeyValueStore, key: &str) -> Option<String> {
    match backend.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key = %key, error = %e, "cookie store read failed");
            None
        }
    }
}

fn load(backend: &dyn KeyValueStore, keys: &StoreKeys) -> CookieMap {
    let mut map = CookieMap::new();
    let Some(origins) = read(backend, &keys.domains) else {
        return map;
    };

    for raw_origin in split(&origins) {
        let origin = match CookieOrigin::parse(raw_origin) {
            Ok(origin) => origin,
            Err(e) => {
                debug!(origin = %raw_origin, error = %e, "skipping unparsable origin");
                continue;
            }
        };
        let Some(names) = read(backend, &keys.names(&origin)) else {
            continue;
        };

        let mut cookies = Vec::new();
        let mut seen = BTreeSet::new();
        for name in split(&names).map(unescape_name) {
            if !seen.insert(name.clone()) {
                continue;
            }
            let Some(record) = read(backend, &keys.cookie(&origin, &name)) else {
                continue;
            };
            match codec::decode_hex(&record) {
                Ok(cookie) => cookies.push(cookie),
                Err(e) => debug!(origin = %origin, name = %name, error = %e, "skipping cookie record"),
            }
        }
        map.put(origin, cookies);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::neterror::NetError;
    use crate::storage::InMemoryStore;

    struct ReadOnlyStore(InMemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Result<Option<String>, NetError> {
            self.0.get(key)
        }

        fn apply(&self, _batch: WriteBatch) -> Result<(), NetError> {
            Err(NetError::storage("read-only"))
        }

        fn keys(&self) -> Result<Vec<String>, NetError> {
            self.0.keys()
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_add_writes_layout() {
        let backend = Arc::new(InMemoryStore::new());
        let store = PersistentCookieStore::open(backend.clone(), &CookieStoreConfig::default());
        store.add(
            &url("https://api.example.com/v1/login"),
            HttpCookie::new("sid", "1").with_domain("api.example.com"),
        );

        assert_eq!(
            backend.get("cloudnet.CookieStore.domain").unwrap().as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(
            backend
                .get("cloudnet.CookieStore.domain_https://api.example.com")
                .unwrap()
                .as_deref(),
            Some("sid")
        );
        let record = backend
            .get("cloudnet.CookieStore.cookie_https://api.example.comsid")
            .unwrap()
            .unwrap();
        assert_eq!(codec::decode_hex(&record).unwrap().value, "1");
    }

    #[test]
    fn test_domain_rewrite_marker() {
        let config = CookieStoreConfig {
            domain_rewrite_marker: Some("example".to_string()),
            ..Default::default()
        };
        let store = PersistentCookieStore::open(Arc::new(InMemoryStore::new()), &config);
        let u = url("https://www.example.com/");
        store.add(&u, HttpCookie::new("a", "1").with_domain("www.example.com"));
        store.add(&u, HttpCookie::new("b", "2").with_domain("other.org"));
        store.add(&u, HttpCookie::new("c", "3").with_domain("localexample"));

        let cookies = store.get_cookies();
        let domain_of = |name: &str| {
            cookies
                .iter()
                .find(|c| c.name == name)
                .and_then(|c| c.domain.clone())
        };
        assert_eq!(domain_of("a").as_deref(), Some(".example.com"));
        assert_eq!(domain_of("b").as_deref(), Some("other.org"));
        assert_eq!(domain_of("c").as_deref(), Some("localexample"));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let store = PersistentCookieStore::open(
            Arc::new(ReadOnlyStore(InMemoryStore::new())),
            &CookieStoreConfig::default(),
        );
        let u = url("https://example.com/");
        store.add(&u, HttpCookie::new("a", "1"));

        assert_eq!(store.get(&u).len(), 1);
        assert!(store.remove_all());
    }

    fn cookie_keys(backend: &InMemoryStore) -> Vec<String> {
        backend
            .keys()
            .unwrap()
            .into_iter()
            .filter(|k| k.starts_with("cloudnet.CookieStore.cookie_"))
            .collect()
    }

    #[test]
    fn test_remove_deletes_record_of_stored_name() {
        let backend = Arc::new(InMemoryStore::new());
        let store = PersistentCookieStore::open(backend.clone(), &CookieStoreConfig::default());
        let u = url("https://api.example.com/");
        store.add(&u, HttpCookie::new("SID", "secret").with_domain("api.example.com"));

        assert!(store.remove(&u, &HttpCookie::new("sid", "").with_domain("api.example.com")));
        assert!(cookie_keys(&backend).is_empty());
        assert!(PersistentCookieStore::open(backend, &CookieStoreConfig::default())
            .get_cookies()
            .is_empty());
    }

    #[test]
    fn test_case_variant_add_leaves_one_record() {
        let backend = Arc::new(InMemoryStore::new());
        let store = PersistentCookieStore::open(backend.clone(), &CookieStoreConfig::default());
        let u = url("https://api.example.com/");
        store.add(&u, HttpCookie::new("sid", "1").with_domain("api.example.com"));
        store.add(&u, HttpCookie::new("SID", "2").with_domain("api.example.com"));

        assert_eq!(
            cookie_keys(&backend),
            vec!["cloudnet.CookieStore.cookie_https://api.example.comSID".to_string()]
        );
    }

    #[test]
    fn test_same_name_on_two_paths_matches_after_reopen() {
        let backend = Arc::new(InMemoryStore::new());
        let store = PersistentCookieStore::open(backend.clone(), &CookieStoreConfig::default());
        let u = url("https://api.example.com/");
        store.add(&u, HttpCookie::new("t", "root").with_domain("api.example.com").with_path("/"));
        store.add(&u, HttpCookie::new("t", "api").with_domain("api.example.com").with_path("/api"));

        let before = store.get(&u);
        let reopened = PersistentCookieStore::open(backend, &CookieStoreConfig::default());
        let after = reopened.get(&u);
        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), before.len());
        assert_eq!(after[0].value, "api");
        assert_eq!(after[0].path.as_deref(), Some("/api"));
    }

    #[test]
    fn test_name_with_comma_survives_reopen() {
        let backend = Arc::new(InMemoryStore::new());
        let store = PersistentCookieStore::open(backend.clone(), &CookieStoreConfig::default());
        let u = url("https://example.com/");
        store.add(&u, HttpCookie::new("a,b", "1"));
        store.add(&u, HttpCookie::new("50%2C", "2"));
        store.add(&u, HttpCookie::new("c", "3"));

        let reopened = PersistentCookieStore::open(backend, &CookieStoreConfig::default());
        let mut names: Vec<_> = reopened.get_cookies().into_iter().map(|c| c.name).collect();
        names.sort();
        assert_eq!(names, vec!["50%2C", "a,b", "c"]);
    }

    #[test]
    fn test_unescape_name() {
        assert_eq!(unescape_name("a%2Cb"), "a,b");
        assert_eq!(unescape_name("50%252C"), "50%2C");
        assert_eq!(unescape_name("100%"), "100%");
        assert_eq!(unescape_name("%zz"), "%zz");
    }

    #[test]
    fn test_broken_record_is_skipped_alone() {
        let backend = Arc::new(InMemoryStore::new());
        let store = PersistentCookieStore::open(backend.clone(), &CookieStoreConfig::default());
        let u = url("https://example.com/");
        store.add(&u, HttpCookie::new("a", "1"));
        store.add(&u, HttpCookie::new("b", "2"));
        backend
            .put("cloudnet.CookieStore.cookie_https://example.coma", "not hex")
            .unwrap();

        let reopened = PersistentCookieStore::open(backend, &CookieStoreConfig::default());
        let names: Vec<_> = reopened.get(&u).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_concurrent_adds_lose_nothing() {
        let backend = Arc::new(InMemoryStore::new());
        let store = PersistentCookieStore::open(backend.clone(), &CookieStoreConfig::default());
        let u = url("https://example.com/");

        std::thread::scope(|scope| {
            for t in 0..8 {
                let store = &store;
                let u = &u;
                scope.spawn(move || {
                    for i in 0..25 {
                        store.add(u, HttpCookie::new(format!("c{}_{}", t, i), "v"));
                        store.get(u);
                    }
                });
            }
        });

        assert_eq!(store.get(&u).len(), 200);
        let index = backend
            .get("cloudnet.CookieStore.domain_https://example.com")
            .unwrap()
            .unwrap();
        assert_eq!(index.split(',').count(), 200);
        let reopened = PersistentCookieStore::open(backend, &CookieStoreConfig::default());
        assert_eq!(reopened.get_cookies().len(), 200);
    }

    #[test]
    fn test_remove_all_keeps_foreign_keys() {
        let backend = Arc::new(InMemoryStore::new());
        backend.put("settings.theme", "dark").unwrap();

        let store = PersistentCookieStore::open(backend.clone(), &CookieStoreConfig::default());
        store.add(&url("https://example.com/"), HttpCookie::new("a", "1"));

        assert!(store.remove_all());
        assert!(!store.remove_all());
        assert_eq!(backend.keys().unwrap(), vec!["settings.theme".to_string()]);
    }
}

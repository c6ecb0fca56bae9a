//! Cookie jar with durable persistence.
//!
//! | Type | Responsibility |
//! |------|----------------|
//! | [`HttpCookie`](httpcookie::HttpCookie) | One cookie, `Set-Cookie` parsing, expiry, domain matching |
//! | [`CookieMap`](cookiemap::CookieMap) | Origin to cookie list, no locking |
//! | [`codec`] | Binary record format stored as uppercase hex |
//! | [`PersistentCookieStore`](store::PersistentCookieStore) | Locked jar mirrored into a [`KeyValueStore`](crate::storage::KeyValueStore) |
//! | [`CookieManager`](manager::CookieManager) | Policy plus header ingestion and emission |
//!
//! ```rust,no_run
//! use cloudnet::cookies::manager::{CookieManager, CookiePolicy};
//! use cloudnet::cookies::store::{CookieStoreConfig, PersistentCookieStore};
//! use cloudnet::storage::JsonFileStore;
//! use std::sync::Arc;
//!
//! let backend = Arc::new(JsonFileStore::open("cookies.json")?);
//! let store = PersistentCookieStore::open(backend, &CookieStoreConfig::default());
//! let manager = CookieManager::new(Arc::new(store), CookiePolicy::AcceptAll);
//!
//! let url = url::Url::parse("https://api.example.com/").unwrap();
//! manager.put(&url, ["sid=abc123; Path=/"]);
//! assert_eq!(manager.cookie_header(&url).as_deref(), Some("sid=abc123;"));
//! # Ok::<(), cloudnet::base::neterror::NetError>(())
//! ```

pub mod codec;
pub mod cookiemap;
pub mod httpcookie;
pub mod manager;
pub mod psl;
pub mod store;

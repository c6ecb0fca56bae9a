use crate::cookies::httpcookie::{CookieOrigin, HttpCookie};
use std::collections::{BTreeSet, HashMap};

/// Origin -> ordered cookie list.
///
/// Plain data structure without locking; the owning store serializes access.
#[derive(Debug, Default, Clone)]
pub struct CookieMap {
    map: HashMap<CookieOrigin, Vec<HttpCookie>>,
}

impl CookieMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list stored for `origin`, returning the previous one.
    pub fn put(&mut self, origin: CookieOrigin, cookies: Vec<HttpCookie>) -> Option<Vec<HttpCookie>> {
        self.map.insert(origin, cookies)
    }

    /// Cookies for `origin`, empty when the origin is unknown.
    pub fn get(&self, origin: &CookieOrigin) -> &[HttpCookie] {
        self.map.get(origin).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_mut(&mut self, origin: &CookieOrigin) -> Option<&mut Vec<HttpCookie>> {
        self.map.get_mut(origin)
    }

    pub fn entry_or_default(&mut self, origin: CookieOrigin) -> &mut Vec<HttpCookie> {
        self.map.entry(origin).or_default()
    }

    pub fn contains_origin(&self, origin: &CookieOrigin) -> bool {
        self.map.contains_key(origin)
    }

    /// Replace any cookie with the same identity or the same name, then
    /// append. Returns the cookies that were replaced.
    ///
    /// A name occurs at most once per origin, matching the persisted layout
    /// where the record key is origin plus name.
    pub fn upsert(&mut self, origin: CookieOrigin, cookie: HttpCookie) -> Vec<HttpCookie> {
        let cookies = self.entry_or_default(origin);
        let (replaced, kept): (Vec<_>, Vec<_>) = std::mem::take(cookies)
            .into_iter()
            .partition(|c| c == &cookie || c.name == cookie.name);
        *cookies = kept;
        cookies.push(cookie);
        replaced
    }

    /// Remove the cookie equal to `cookie`, returning the stored instance.
    pub fn remove_cookie(&mut self, origin: &CookieOrigin, cookie: &HttpCookie) -> Option<HttpCookie> {
        let cookies = self.map.get_mut(origin)?;
        let idx = cookies.iter().position(|c| c == cookie)?;
        Some(cookies.remove(idx))
    }

    /// All origins, sorted so persisted indexes are stable.
    pub fn all_origins(&self) -> Vec<CookieOrigin> {
        let mut origins: Vec<_> = self.map.keys().cloned().collect();
        origins.sort();
        origins
    }

    pub fn cookie_names(&self, origin: &CookieOrigin) -> BTreeSet<String> {
        self.get(origin).iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CookieOrigin, &Vec<HttpCookie>)> {
        self.map.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&CookieOrigin, &mut Vec<HttpCookie>)> {
        self.map.iter_mut()
    }
}

use crate::session::locale;
use parking_lot::RwLock;

/// Parameters attached to every outgoing request.
///
/// Everything but the session id is fixed at construction. The session id is
/// swapped by the login/logout flow while requests are in flight; each request
/// reads it once.
#[derive(Debug)]
pub struct BaseParams {
    lang: String,
    params: Vec<(String, String)>,
    timezone_offset: String,
    country_iso_code: String,
    session_id: RwLock<Option<String>>,
}

impl BaseParams {
    pub fn builder(lang: impl Into<String>) -> BaseParamsBuilder {
        BaseParamsBuilder {
            lang: lang.into(),
            params: Vec::new(),
            timezone_offset: None,
            country_iso_code: String::new(),
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Query parameters sent by legacy services, in insertion order. `lang` comes first.
    pub fn query_params(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once(("lang", self.lang.as_str()))
            .chain(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn timezone_offset(&self) -> &str {
        &self.timezone_offset
    }

    pub fn country_iso_code(&self) -> &str {
        &self.country_iso_code
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub fn set_session_id(&self, session_id: Option<String>) {
        *self.session_id.write() = session_id;
    }

    /// A session id has been set, blank or not.
    pub fn has_session(&self) -> bool {
        self.session_id.read().is_some()
    }
}

pub struct BaseParamsBuilder {
    lang: String,
    params: Vec<(String, String)>,
    timezone_offset: Option<String>,
    country_iso_code: String,
}

impl BaseParamsBuilder {
    /// Extra query parameter. A repeated key replaces the earlier value in place.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn timezone_offset(mut self, minutes: impl Into<String>) -> Self {
        self.timezone_offset = Some(minutes.into());
        self
    }

    pub fn country_iso_code(mut self, code: impl Into<String>) -> Self {
        self.country_iso_code = code.into();
        self
    }

    pub fn build(self) -> BaseParams {
        BaseParams {
            lang: self.lang,
            params: self.params,
            timezone_offset: self
                .timezone_offset
                .unwrap_or_else(locale::timezone_offset_without_dst_minutes),
            country_iso_code: self.country_iso_code,
            session_id: RwLock::new(None),
        }
    }
}

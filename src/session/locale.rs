//! Device locale inputs for the base parameters: timezone offset and country code.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// Local timezone offset in minutes with daylight saving removed, sign
/// inverted (UTC+1 yields `"-60"`).
///
/// Falls back to UTC when the platform cannot report the local offset, which
/// happens on some Unix targets once several threads are running.
pub fn timezone_offset_without_dst_minutes() -> String {
    let year = OffsetDateTime::now_utc().year();
    let offset = standard_offset(year, |at| UtcOffset::local_offset_at(at).ok())
        .unwrap_or(UtcOffset::UTC);
    format_offset_minutes(offset)
}

/// Standard-time offset for `year`: the smaller of the offsets observed on
/// January 1st and July 1st. Daylight saving only ever adds time, so the
/// minimum is the standard offset on either hemisphere.
pub fn standard_offset(
    year: i32,
    offset_at: impl Fn(OffsetDateTime) -> Option<UtcOffset>,
) -> Option<UtcOffset> {
    let probe = |month: Month| -> Option<UtcOffset> {
        let date = Date::from_calendar_date(year, month, 1).ok()?;
        offset_at(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
    };
    match (probe(Month::January), probe(Month::July)) {
        (Some(winter), Some(summer)) => Some(winter.min(summer)),
        (Some(one), None) | (None, Some(one)) => Some(one),
        (None, None) => None,
    }
}

pub fn format_offset_minutes(offset: UtcOffset) -> String {
    let minutes = offset.whole_seconds() / 60;
    (-minutes).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhoneType {
    #[default]
    None,
    Gsm,
    Cdma,
    Sip,
}

/// What the host platform knows about the cellular network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelephonyInfo {
    pub sim_country_iso: Option<String>,
    pub network_country_iso: Option<String>,
    pub phone_type: PhoneType,
}

/// Country code from telephony: the SIM country when it is a two-letter code,
/// else the network country unless the phone is CDMA (whose network country
/// is unreliable).
pub fn resolve_country_iso(info: &TelephonyInfo) -> Option<String> {
    let two_letters = |code: &Option<String>| {
        code.as_deref()
            .filter(|c| c.chars().count() == 2)
            .map(str::to_uppercase)
    };

    let code = match two_letters(&info.sim_country_iso) {
        Some(sim) => Some(sim),
        None if info.phone_type != PhoneType::Cdma => two_letters(&info.network_country_iso),
        None => None,
    };
    code.and_then(|c| normalize_country_code(&c))
}

/// Keep only ASCII letters, uppercased. `None` when nothing is left.
pub fn normalize_country_code(code: &str) -> Option<String> {
    let normalized: String = code
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!normalized.is_empty()).then_some(normalized)
}

//! Binary record format for persisted cookies.
//!
//! ```text
//! "CNCK" | version:u8 | name | value | comment | comment_url | discard:u8 | domain
//!        | max_age:i64 | path | portlist | secure:u8 | version:i32
//!        | created_at_ms:i64 | http_only:u8
//! ```
//!
//! Strings are a presence byte followed by a big-endian `u32` length and the
//! UTF-8 bytes. Integers are big-endian. Records are stored as uppercase hex.

use crate::base::neterror::NetError;
use crate::cookies::httpcookie::HttpCookie;
use bytes::{Buf, BufMut, BytesMut};
use time::OffsetDateTime;

const MAGIC: &[u8; 4] = b"CNCK";
const FORMAT_VERSION: u8 = 1;

pub fn encode(cookie: &HttpCookie) -> Result<Vec<u8>, NetError> {
    let mut buf = BytesMut::with_capacity(64 + cookie.name.len() + cookie.value.len());
    buf.put_slice(MAGIC);
    buf.put_u8(FORMAT_VERSION);

    put_str(&mut buf, Some(&cookie.name))?;
    put_str(&mut buf, Some(&cookie.value))?;
    put_str(&mut buf, cookie.comment.as_deref())?;
    put_str(&mut buf, cookie.comment_url.as_deref())?;
    buf.put_u8(cookie.discard as u8);
    put_str(&mut buf, cookie.domain.as_deref())?;
    buf.put_i64(cookie.max_age);
    put_str(&mut buf, cookie.path.as_deref())?;
    put_str(&mut buf, cookie.portlist.as_deref())?;
    buf.put_u8(cookie.secure as u8);
    buf.put_i32(cookie.version);

    let created_ms = cookie.created_at.unix_timestamp_nanos() / 1_000_000;
    buf.put_i64(i64::try_from(created_ms).map_err(|_| NetError::cookie_decode("timestamp out of range"))?);
    buf.put_u8(cookie.http_only as u8);

    Ok(buf.to_vec())
}

pub fn decode(mut data: &[u8]) -> Result<HttpCookie, NetError> {
    let buf = &mut data;
    if buf.remaining() < MAGIC.len() + 1 || &buf[..MAGIC.len()] != MAGIC {
        return Err(NetError::cookie_decode("bad magic"));
    }
    buf.advance(MAGIC.len());
    let version = buf.get_u8();
    if version != FORMAT_VERSION {
        return Err(NetError::cookie_decode(format!(
            "unsupported format version {}",
            version
        )));
    }

    let name = get_str(buf)?.ok_or_else(|| NetError::cookie_decode("missing name"))?;
    let value = get_str(buf)?.unwrap_or_default();
    let comment = get_str(buf)?;
    let comment_url = get_str(buf)?;
    let discard = get_bool(buf)?;
    let domain = get_str(buf)?;
    let max_age = get_i64(buf)?;
    let path = get_str(buf)?;
    let portlist = get_str(buf)?;
    let secure = get_bool(buf)?;
    let cookie_version = get_i32(buf)?;
    let created_ms = get_i64(buf)?;
    let http_only = get_bool(buf)?;

    if buf.has_remaining() {
        return Err(NetError::cookie_decode("trailing bytes"));
    }

    let created_at = OffsetDateTime::from_unix_timestamp_nanos(created_ms as i128 * 1_000_000)
        .map_err(|_| NetError::cookie_decode("timestamp out of range"))?;

    Ok(HttpCookie {
        name,
        value,
        comment,
        comment_url,
        discard,
        domain: domain.map(|d| d.to_ascii_lowercase()),
        max_age,
        path,
        portlist,
        secure,
        http_only,
        version: cookie_version,
        created_at,
    })
}

/// Encode as uppercase hex, the form written to the key-value layer.
pub fn encode_hex(cookie: &HttpCookie) -> Result<String, NetError> {
    encode(cookie).map(hex::encode_upper)
}

/// Decode a hex record. Either case is accepted.
pub fn decode_hex(record: &str) -> Result<HttpCookie, NetError> {
    let bytes = hex::decode(record.trim()).map_err(|e| NetError::cookie_decode(e.to_string()))?;
    decode(&bytes)
}

fn put_str(buf: &mut BytesMut, value: Option<&str>) -> Result<(), NetError> {
    match value {
        None => buf.put_u8(0),
        Some(s) => {
            let len = u32::try_from(s.len()).map_err(|_| NetError::cookie_decode("string too long"))?;
            buf.put_u8(1);
            buf.put_u32(len);
            buf.put_slice(s.as_bytes());
        }
    }
    Ok(())
}

fn need(buf: &&[u8], n: usize) -> Result<(), NetError> {
    if buf.remaining() < n {
        return Err(NetError::cookie_decode("truncated record"));
    }
    Ok(())
}

fn get_bool(buf: &mut &[u8]) -> Result<bool, NetError> {
    need(buf, 1)?;
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(NetError::cookie_decode(format!("invalid flag {}", other))),
    }
}

fn get_i32(buf: &mut &[u8]) -> Result<i32, NetError> {
    need(buf, 4)?;
    Ok(buf.get_i32())
}

fn get_i64(buf: &mut &[u8]) -> Result<i64, NetError> {
    need(buf, 8)?;
    Ok(buf.get_i64())
}

fn get_str(buf: &mut &[u8]) -> Result<Option<String>, NetError> {
    if !get_bool(buf)? {
        return Ok(None);
    }
    need(buf, 4)?;
    let len = buf.get_u32() as usize;
    need(buf, len)?;
    let s = std::str::from_utf8(&buf[..len])
        .map_err(|_| NetError::cookie_decode("invalid utf-8"))?
        .to_string();
    buf.advance(len);
    Ok(Some(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_cookie() -> HttpCookie {
        let mut cookie = HttpCookie::new("session", "a1b2=c3")
            .with_domain(".example.com")
            .with_path("/api")
            .with_max_age(3600)
            .with_secure(true);
        cookie.comment = Some("login".to_string());
        cookie.comment_url = Some("https://example.com/cookies".to_string());
        cookie.discard = true;
        cookie.portlist = Some("80,443".to_string());
        cookie.http_only = true;
        cookie.version = 0;
        cookie
    }

    fn assert_same_fields(a: &HttpCookie, b: &HttpCookie) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.value, b.value);
        assert_eq!(a.comment, b.comment);
        assert_eq!(a.comment_url, b.comment_url);
        assert_eq!(a.discard, b.discard);
        assert_eq!(a.domain, b.domain);
        assert_eq!(a.max_age, b.max_age);
        assert_eq!(a.path, b.path);
        assert_eq!(a.portlist, b.portlist);
        assert_eq!(a.secure, b.secure);
        assert_eq!(a.http_only, b.http_only);
        assert_eq!(a.version, b.version);
        assert_eq!(
            a.created_at.unix_timestamp_nanos() / 1_000_000,
            b.created_at.unix_timestamp_nanos() / 1_000_000
        );
    }

    #[test]
    fn test_roundtrip_all_fields() {
        let cookie = full_cookie();
        let decoded = decode_hex(&encode_hex(&cookie).unwrap()).unwrap();
        assert_same_fields(&cookie, &decoded);
    }

    #[test]
    fn test_roundtrip_minimal_cookie() {
        let cookie = HttpCookie::new("a", "");
        let decoded = decode(&encode(&cookie).unwrap()).unwrap();
        assert_same_fields(&cookie, &decoded);
        assert!(decoded.domain.is_none());
    }

    #[test]
    fn test_hex_is_uppercase() {
        let record = encode_hex(&full_cookie()).unwrap();
        assert!(record.starts_with("434E434B01"));
        assert!(!record.chars().any(|c| c.is_ascii_lowercase()));
        assert!(decode_hex(&record.to_lowercase()).is_ok());
    }

    #[test]
    fn test_truncated_record_fails() {
        let bytes = encode(&full_cookie()).unwrap();
        for len in [0, 3, 5, 12, bytes.len() - 1] {
            assert!(matches!(
                decode(&bytes[..len]),
                Err(NetError::CookieDecodeFailed { .. })
            ));
        }
    }

    #[test]
    fn test_garbage_fails() {
        assert!(decode_hex("not hex at all").is_err());
        assert!(decode_hex("ACED0005").is_err());

        let mut bytes = encode(&full_cookie()).unwrap();
        bytes[4] = 9;
        assert!(decode(&bytes).is_err());
    }
}

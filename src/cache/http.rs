//! Browser-side caching: conditional request evaluation and response headers.

use crate::cache::CacheKey;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use std::time::SystemTime;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

/// The conditional parts of an incoming request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionalHeaders {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<OffsetDateTime>,
}

impl ConditionalHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        ConditionalHeaders {
            if_none_match: headers
                .get(header::IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            if_modified_since: headers
                .get(header::IF_MODIFIED_SINCE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_http_date),
        }
    }

    /// `If-None-Match` names this key. Accepts `*`, quoted, unquoted and
    /// weak tags, and comma-separated lists.
    pub fn etag_matches(&self, key: &CacheKey) -> bool {
        let Some(raw) = self.if_none_match.as_deref() else {
            return false;
        };
        raw.split(',').map(str::trim).any(|tag| {
            let tag = tag.strip_prefix("W/").unwrap_or(tag);
            tag == "*" || tag.trim_matches('"') == key.as_str()
        })
    }

    /// `If-Modified-Since` is at or after `modified` (second precision).
    pub fn not_modified_since(&self, modified: SystemTime) -> bool {
        match self.if_modified_since {
            Some(since) => since.unix_timestamp() >= OffsetDateTime::from(modified).unix_timestamp(),
            None => false,
        }
    }
}

/// Response header policy for the HTTP cache tier.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub enabled: bool,
    pub expire_days: u64,
}

impl CachePolicy {
    pub fn max_age_seconds(&self) -> u64 {
        self.expire_days * 86_400
    }

    /// Caching headers for a response identified by `key`. Empty when HTTP
    /// caching is disabled.
    pub fn headers(
        &self,
        key: &CacheKey,
        last_modified: Option<SystemTime>,
        now: OffsetDateTime,
    ) -> Vec<(HeaderName, HeaderValue)> {
        if !self.enabled {
            return Vec::new();
        }

        let max_age = self.max_age_seconds();
        let mut headers = Vec::with_capacity(4);
        let mut push = |name: HeaderName, value: String| {
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.push((name, value));
            }
        };

        push(header::CACHE_CONTROL, format!("public, max-age={}", max_age));
        push(
            header::EXPIRES,
            format_http_date(now + Duration::seconds(max_age as i64)),
        );
        push(header::ETAG, format!("\"{}\"", key));
        if let Some(modified) = last_modified {
            push(
                header::LAST_MODIFIED,
                format_http_date(OffsetDateTime::from(modified)),
            );
        }
        headers
    }
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(at: OffsetDateTime) -> String {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    at.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .unwrap_or_default()
}

/// Parse an IMF-fixdate. Obsolete HTTP date forms are not understood and
/// yield `None`, which disables the check.
pub fn parse_http_date(raw: &str) -> Option<OffsetDateTime> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    PrimitiveDateTime::parse(raw.trim(), &format)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

pub mod bucket;
pub mod object;
pub mod root;

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::storage::ObjectMeta;

fn bucket_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+([.-][-a-z0-9]+)*$").unwrap())
}

/// Validates a bucket name against the server's (deliberately loose)
/// naming rule: 3-63 characters, lowercase alphanumeric segments joined
/// by single `.` or `-`.
pub fn is_valid_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len()) && bucket_name_re().is_match(name)
}

/// RFC 1123 date format used for `Last-Modified` and parsed back for
/// `If-Modified-Since`.
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(s.trim(), "%a, %d %b %Y %H:%M:%S GMT")
        .ok()
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Parses a `Range: bytes=start-end` header against a known object size,
/// returning an inclusive `(start, end)` pair. `end` omitted means "to
/// EOF". Unsatisfiable or malformed ranges yield `None`, in which case
/// the caller falls back to a plain `200`.
pub fn parse_range(header: &str, size: u64) -> Option<(u64, u64)> {
    let spec = header.strip_prefix("bytes=")?;
    let (start_s, end_s) = spec.split_once('-')?;
    if size == 0 {
        return None;
    }
    if start_s.is_empty() {
        let suffix_len: u64 = end_s.parse().ok()?;
        if suffix_len == 0 {
            return None;
        }
        let start = size.saturating_sub(suffix_len);
        return Some((start, size - 1));
    }
    let start: u64 = start_s.parse().ok()?;
    let end = if end_s.is_empty() {
        size - 1
    } else {
        end_s.parse::<u64>().ok()?.min(size - 1)
    };
    if start > end || start >= size {
        return None;
    }
    Some((start, end))
}

/// Evaluates `If-None-Match` / `If-Modified-Since` against an object's
/// current ETag and modification time. Returns `true` when the request
/// should short-circuit with an empty `304`.
pub fn is_not_modified(headers: &HeaderMap, meta: &ObjectMeta) -> bool {
    if let Some(value) = headers.get("if-none-match").and_then(|v| v.to_str().ok()) {
        let quoted = format!("\"{}\"", meta.md5);
        if value.trim() == "*" || value.trim() == quoted {
            return true;
        }
    }
    if let Some(value) = headers
        .get("if-modified-since")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(since) = parse_http_date(value) {
            // Preserved behavior: `>=` rather than RFC 7232's `<=`, so an
            // exact second-precision match also yields 304.
            if since.timestamp() >= meta.modified.timestamp() {
                return true;
            }
        }
    }
    false
}

pub fn not_modified_response() -> Response {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::empty())
        .unwrap()
}

/// Builds the body-bearing response shared by GET/HEAD: sets ETag,
/// Last-Modified, Content-Type, any preserved Content-Encoding /
/// Content-Disposition / `x-amz-meta-*` headers, and range headers when
/// `range` is set. `body` is omitted (but headers still emitted) for
/// HEAD requests.
pub fn object_response(
    meta: &ObjectMeta,
    range: Option<(u64, u64)>,
    body: Option<Body>,
) -> Response {
    let status = if range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header("Access-Control-Allow-Origin", "*")
        .header("ETag", format!("\"{}\"", meta.md5))
        .header("Last-Modified", format_http_date(&meta.modified))
        .header("Content-Type", meta.content_type.clone());

    if let Some(encoding) = &meta.content_encoding {
        builder = builder.header("Content-Encoding", encoding);
    }
    if let Some(disposition) = &meta.content_disposition {
        builder = builder.header("Content-Disposition", disposition);
    }
    for (name, value) in &meta.custom_meta {
        if let Ok(value) = HeaderValue::from_str(value) {
            builder = builder.header(format!("x-amz-meta-{name}"), value);
        }
    }

    if let Some((start, end)) = range {
        builder = builder
            .header("Accept-Ranges", "bytes")
            .header("Content-Range", format!("bytes {}-{}/{}", start, end, meta.size))
            .header("Content-Length", (end - start + 1).to_string());
    } else {
        builder = builder.header("Content-Length", meta.size.to_string());
    }

    builder.body(body.unwrap_or_else(Body::empty)).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_name_accepts_the_documented_loose_pattern() {
        assert!(is_valid_bucket_name("my-bucket.1"));
        assert!(!is_valid_bucket_name("Au"));
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name("UPPER"));
    }

    #[test]
    fn range_parses_suffix_and_open_ended_forms() {
        assert_eq!(parse_range("bytes=1-3", 5), Some((1, 3)));
        assert_eq!(parse_range("bytes=2-", 5), Some((2, 4)));
        assert_eq!(parse_range("bytes=-2", 5), Some((3, 4)));
        assert_eq!(parse_range("bytes=10-20", 5), None);
    }

    #[test]
    fn if_modified_since_uses_greater_or_equal() {
        let modified = "Sun, 06 Nov 1994 08:49:37 GMT";
        let parsed = parse_http_date(modified).unwrap();
        let meta = ObjectMeta {
            key: "k".into(),
            size: 1,
            md5: "x".into(),
            modified: parsed,
            content_type: "text/plain".into(),
            content_encoding: None,
            content_disposition: None,
            custom_meta: vec![],
        };
        let mut headers = HeaderMap::new();
        headers.insert("if-modified-since", HeaderValue::from_static(modified));
        assert!(is_not_modified(&headers, &meta), "exact match should be 304 per preserved behavior");
    }
}

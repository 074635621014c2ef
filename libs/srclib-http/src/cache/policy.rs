//! Freshness, validation and storability rules for a private HTTP cache.

use crate::cache::CachedResponse;
use http::header::{
    CACHE_CONTROL, DATE, ETAG, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, PRAGMA,
    RANGE, VARY,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Freshness {
    /// Serve the stored entry without contacting the origin.
    Fresh,
    /// Revalidate with the origin before reuse.
    Stale,
    /// The request asked to bypass the cache for this lookup.
    Transparent,
}

/// Parsed `Cache-Control` directives; names are lowercased, quotes stripped.
#[derive(Debug, Default)]
pub(crate) struct CacheControl(HashMap<String, Option<String>>);

impl CacheControl {
    pub(crate) fn parse(headers: &HeaderMap) -> Self {
        let mut directives = HashMap::new();
        for value in headers.get_all(CACHE_CONTROL) {
            let Ok(value) = value.to_str() else { continue };
            for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match part.split_once('=') {
                    Some((name, arg)) => directives.insert(
                        name.trim().to_ascii_lowercase(),
                        Some(arg.trim().trim_matches('"').to_owned()),
                    ),
                    None => directives.insert(part.to_ascii_lowercase(), None),
                };
            }
        }
        Self(directives)
    }

    pub(crate) fn has(&self, directive: &str) -> bool {
        self.0.contains_key(directive)
    }

    fn arg(&self, directive: &str) -> Option<Option<&str>> {
        self.0.get(directive).map(Option::as_deref)
    }

    fn seconds(&self, directive: &str) -> Option<Duration> {
        self.arg(directive)
            .flatten()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Only plain GETs are looked up and stored; range requests bypass the cache.
pub(crate) fn is_cacheable_request(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::GET && !headers.contains_key(RANGE)
}

/// Methods whose success invalidates the stored GET entry for the same URI.
pub(crate) fn invalidates_entry(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn pragma_no_cache(headers: &HeaderMap) -> bool {
    headers
        .get_all(PRAGMA)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("no-cache"))
}

fn date_of(entry: &CachedResponse, headers: &HeaderMap) -> SystemTime {
    headers
        .get(DATE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
        .unwrap_or(entry.stored_at)
}

/// Classify a stored entry against the current request.
pub(crate) fn freshness(request: &HeaderMap, entry: &CachedResponse, now: SystemTime) -> Freshness {
    let stored = entry.header_map();
    let req_cc = CacheControl::parse(request);
    let resp_cc = CacheControl::parse(&stored);

    if req_cc.has("no-cache") || pragma_no_cache(request) {
        return Freshness::Transparent;
    }
    if resp_cc.has("no-cache") {
        return Freshness::Stale;
    }
    if req_cc.has("only-if-cached") {
        return Freshness::Fresh;
    }

    let date = date_of(entry, &stored);
    let mut age = now.duration_since(date).unwrap_or_default();

    let mut lifetime = match resp_cc.seconds("max-age") {
        Some(max_age) => max_age,
        None => stored
            .get(EXPIRES)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| httpdate::parse_http_date(v).ok())
            .and_then(|expires| expires.duration_since(date).ok())
            .unwrap_or_default(),
    };

    if let Some(max_age) = req_cc.seconds("max-age") {
        lifetime = max_age;
    }
    if let Some(min_fresh) = req_cc.seconds("min-fresh") {
        age = age.saturating_add(min_fresh);
    }
    if !resp_cc.has("must-revalidate") {
        match req_cc.arg("max-stale") {
            Some(None) => return Freshness::Fresh,
            Some(Some(v)) => {
                if let Ok(secs) = v.parse::<u64>() {
                    age = age.saturating_sub(Duration::from_secs(secs));
                }
            }
            None => {}
        }
    }

    if lifetime > age {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

/// Whether `stale-if-error` on the request or the stored response allows
/// serving `entry` after the origin failed.
pub(crate) fn can_serve_stale_on_error(
    request: &HeaderMap,
    entry: &CachedResponse,
    now: SystemTime,
) -> bool {
    let stored = entry.header_map();
    let req_cc = CacheControl::parse(request);
    let resp_cc = CacheControl::parse(&stored);

    let window = match (req_cc.arg("stale-if-error"), resp_cc.arg("stale-if-error")) {
        (Some(None), _) | (_, Some(None)) => return true,
        (Some(Some(v)), _) | (None, Some(Some(v))) => match v.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => return false,
        },
        (None, None) => return false,
    };

    let age = now
        .duration_since(date_of(entry, &stored))
        .unwrap_or_default();
    window >= age
}

/// Statuses cacheable by default (RFC 7231 §6.1), minus partial content.
fn is_cacheable_status(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        200 | 203 | 204 | 300 | 301 | 404 | 405 | 410 | 414 | 501
    )
}

/// Whether a response to a cacheable request may be written to disk.
pub(crate) fn is_storable(request: &HeaderMap, status: StatusCode, response: &HeaderMap) -> bool {
    is_cacheable_status(status)
        && !CacheControl::parse(request).has("no-store")
        && !CacheControl::parse(response).has("no-store")
}

fn header_joined(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join(", "))
}

/// Record a digest of each request header named by the response's `Vary`.
///
/// Only SHA-256 digests reach the disk, so `Vary: Authorization` does not
/// persist credentials. Returns `None` for `Vary: *`, which never matches a
/// later request.
pub(crate) fn vary_snapshot(
    request: &HeaderMap,
    response: &HeaderMap,
) -> Option<Vec<(String, Option<String>)>> {
    let mut snapshot = Vec::new();
    for value in response.get_all(VARY).iter().filter_map(|v| v.to_str().ok()) {
        for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if name == "*" {
                return None;
            }
            let name = name.to_ascii_lowercase();
            let current = vary_digest(request, &name);
            snapshot.push((name, current));
        }
    }
    Some(snapshot)
}

/// Whether the current request selects the same variant as the stored one.
pub(crate) fn vary_matches(request: &HeaderMap, entry: &CachedResponse) -> bool {
    entry
        .vary
        .iter()
        .all(|(name, digest)| vary_digest(request, name).as_deref() == digest.as_deref())
}

fn vary_digest(request: &HeaderMap, name: &str) -> Option<String> {
    header_joined(request, name).map(|value| hex::encode(Sha256::digest(value.as_bytes())))
}

/// Turn a request for a stale entry into a conditional request.
///
/// Validators the caller already set are left alone.
pub(crate) fn add_validators(request: &mut HeaderMap, entry: &CachedResponse) {
    let stored = entry.header_map();
    if !request.contains_key(IF_NONE_MATCH)
        && let Some(etag) = stored.get(ETAG)
    {
        request.insert(IF_NONE_MATCH, etag.clone());
    }
    if !request.contains_key(IF_MODIFIED_SINCE)
        && let Some(modified) = stored.get(LAST_MODIFIED)
    {
        request.insert(IF_MODIFIED_SINCE, modified.clone());
    }
}

/// Synthetic answer for `only-if-cached` requests that miss.
pub(crate) fn gateway_timeout_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}

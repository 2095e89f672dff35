//! Shared helpers for turning an inbound axum request into `RequestMetadata`.
//!
//! Used by both the edge filter (first touch) and the tarpit engine (which
//! receives the same raw request, rewritten, and must reconstruct metadata
//! independently since it runs as its own process).

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use chrono::Utc;

use crate::types::RequestMetadata;

/// Source-IP extraction: `X-Forwarded-For` first comma-separated token
/// (trimmed) takes precedence over the transport-level remote address.
/// IPv4-mapped IPv6 addresses are normalized to IPv4 dotted form. Returns
/// `None` if neither source yields a parseable address.
pub fn extract_source_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<IpAddr> {
    let from_xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<IpAddr>().ok());

    from_xff.or_else(|| remote.map(|a| a.ip())).map(normalize_ip)
}

fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => ip,
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
    }
}

/// Build `RequestMetadata` from the pieces available inside an axum
/// handler. `source_ip` must have already been resolved by
/// `extract_source_ip`; an empty extraction is handled by the caller
/// (pass-through with a warning), not here.
pub fn build_request_metadata(
    source_ip: IpAddr,
    method: &str,
    path: &str,
    query: &str,
    headers: &HeaderMap,
) -> RequestMetadata {
    let mut header_map = HashMap::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            header_map.insert(name.as_str().to_string(), v.to_string());
        }
    }
    let user_agent = header_map
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
        .map(|(_, v)| v.clone())
        .unwrap_or_default();

    RequestMetadata {
        source_ip,
        user_agent,
        headers: header_map,
        method: method.to_string(),
        path: path.to_string(),
        query: query.to_string(),
        timestamp_utc: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        h
    }

    #[test]
    fn test_xff_takes_precedence_over_remote() {
        let headers = headers_with(&[("x-forwarded-for", "198.51.100.9, 10.0.0.1")]);
        let remote: SocketAddr = "10.0.0.2:1234".parse().unwrap();
        let ip = extract_source_ip(&headers, Some(remote)).unwrap();
        assert_eq!(ip.to_string(), "198.51.100.9");
    }

    #[test]
    fn test_falls_back_to_remote_addr() {
        let headers = HeaderMap::new();
        let remote: SocketAddr = "203.0.113.5:4321".parse().unwrap();
        let ip = extract_source_ip(&headers, Some(remote)).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.5");
    }

    #[test]
    fn test_empty_extraction_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_source_ip(&headers, None), None);
    }

    #[test]
    fn test_xff_whitespace_trimmed() {
        let headers = headers_with(&[("x-forwarded-for", "   203.0.113.9   , 1.2.3.4")]);
        let ip = extract_source_ip(&headers, None).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.9");
    }

    #[test]
    fn test_build_request_metadata_picks_up_user_agent() {
        let headers = headers_with(&[("User-Agent", "curl/8.0"), ("Accept", "*/*")]);
        let meta = build_request_metadata(
            "203.0.113.7".parse().unwrap(),
            "GET",
            "/x",
            "",
            &headers,
        );
        assert_eq!(meta.user_agent, "curl/8.0");
        assert_eq!(meta.header("accept"), Some("*/*"));
    }
}

//! Fixed feature vector extracted from `RequestMetadata` for the
//! classifier step. Order matters and must stay in sync with whatever
//! artifact is loaded, hence `feature_names()`/`FEATURE_COUNT` existing
//! purely as a guard against drift.

use defense_common::types::RequestMetadata;

/// Request features used as classifier input.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFeatures {
    pub request_count_in_window: f64,
    pub ua_length: f64,
    pub has_accept_language: f64,
    pub has_accept: f64,
    pub has_referer: f64,
    pub path_depth: f64,
    pub query_param_count: f64,
    pub hour_of_day: f64,
    pub is_known_bad_ua: f64,
    pub is_known_benign_ua: f64,
}

impl RequestFeatures {
    pub const FEATURE_COUNT: usize = 10;

    pub fn extract(
        metadata: &RequestMetadata,
        request_count_in_window: i64,
        known_bad_uas: &[String],
        known_benign_uas: &[String],
    ) -> Self {
        let ua_lower = metadata.user_agent.to_ascii_lowercase();
        let is_known_bad_ua = known_bad_uas.iter().any(|s| ua_lower.contains(&s.to_ascii_lowercase()));
        let is_known_benign_ua = known_benign_uas.iter().any(|s| ua_lower.contains(&s.to_ascii_lowercase()));

        let path_depth = metadata.path.split('/').filter(|seg| !seg.is_empty()).count() as f64;
        let query_param_count = if metadata.query.is_empty() {
            0.0
        } else {
            metadata.query.split('&').count() as f64
        };

        Self {
            request_count_in_window: request_count_in_window as f64,
            ua_length: metadata.user_agent.len() as f64,
            has_accept_language: metadata.header("accept-language").is_some() as u8 as f64,
            has_accept: metadata.header("accept").is_some() as u8 as f64,
            has_referer: metadata.header("referer").is_some() as u8 as f64,
            path_depth,
            query_param_count,
            hour_of_day: metadata.timestamp_utc.format("%H").to_string().parse().unwrap_or(0.0),
            is_known_bad_ua: is_known_bad_ua as u8 as f64,
            is_known_benign_ua: is_known_benign_ua as u8 as f64,
        }
    }

    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.request_count_in_window,
            self.ua_length,
            self.has_accept_language,
            self.has_accept,
            self.has_referer,
            self.path_depth,
            self.query_param_count,
            self.hour_of_day,
            self.is_known_bad_ua,
            self.is_known_benign_ua,
        ]
    }

    pub fn feature_names() -> Vec<&'static str> {
        vec![
            "request_count_in_window",
            "ua_length",
            "has_accept_language",
            "has_accept",
            "has_referer",
            "path_depth",
            "query_param_count",
            "hour_of_day",
            "is_known_bad_ua",
            "is_known_benign_ua",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_metadata(ua: &str, path: &str, query: &str) -> RequestMetadata {
        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_string(), ua.to_string());
        headers.insert("Accept".to_string(), "*/*".to_string());
        RequestMetadata {
            source_ip: "203.0.113.9".parse().unwrap(),
            user_agent: ua.to_string(),
            headers,
            method: "GET".to_string(),
            path: path.to_string(),
            query: query.to_string(),
            timestamp_utc: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_to_vector_length_matches_feature_count() {
        let metadata = sample_metadata("curl/8.0", "/a/b/c", "x=1&y=2");
        let features = RequestFeatures::extract(&metadata, 5, &["curl".to_string()], &["googlebot".to_string()]);
        assert_eq!(features.to_vector().len(), RequestFeatures::FEATURE_COUNT);
        assert_eq!(RequestFeatures::feature_names().len(), RequestFeatures::FEATURE_COUNT);
    }

    #[test]
    fn test_known_bad_ua_flag() {
        let metadata = sample_metadata("Mozilla GPTBot/1.0", "/", "");
        let features = RequestFeatures::extract(&metadata, 1, &["gptbot".to_string()], &[]);
        assert_eq!(features.is_known_bad_ua, 1.0);
        assert_eq!(features.is_known_benign_ua, 0.0);
    }

    #[test]
    fn test_path_depth_and_query_count() {
        let metadata = sample_metadata("Mozilla/5.0", "/a/b/c", "x=1&y=2&z=3");
        let features = RequestFeatures::extract(&metadata, 0, &[], &[]);
        assert_eq!(features.path_depth, 3.0);
        assert_eq!(features.query_param_count, 3.0);
    }

    #[test]
    fn test_no_query_yields_zero_param_count() {
        let metadata = sample_metadata("Mozilla/5.0", "/", "");
        let features = RequestFeatures::extract(&metadata, 0, &[], &[]);
        assert_eq!(features.query_param_count, 0.0);
    }
}

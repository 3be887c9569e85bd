//! Request authentication and extraction of the core request view.
//!
//! Bearer tokens are looked up in a static table from configuration.
//! Unknown tokens are treated as anonymous; strategies decide what an
//! anonymous request may retrieve.

use std::collections::HashMap;

use axum::http::{HeaderMap, header};
use mediagate_core::config::SecurityConfig;
use mediagate_core::response::parse_http_date;
use mediagate_core::{MediaRequest, SecurityToken};
use tracing::debug;

/// Cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "mediagate_session";

/// Resolves bearer tokens to principals.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    tokens: HashMap<String, SecurityToken>,
}

impl Authenticator {
    /// Creates an authenticator from the configured token table.
    pub fn from_config(security: &SecurityConfig) -> Self {
        let tokens = security
            .tokens
            .iter()
            .map(|(token, user)| {
                (
                    token.clone(),
                    SecurityToken::new(user.username.clone(), user.roles.clone()),
                )
            })
            .collect();
        Self { tokens }
    }

    /// Registers a token.
    pub fn with_token(mut self, token: impl Into<String>, principal: SecurityToken) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    /// Principal authenticated by the `Authorization` header, if any.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<SecurityToken> {
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)?;

        let principal = self.tokens.get(provided).cloned();
        if principal.is_none() {
            debug!("Unknown bearer token, treating request as anonymous");
        }
        principal
    }

    /// Builds the core request view from HTTP headers.
    ///
    /// `fallback_base_url` is used when the request has no `Host` header.
    pub fn media_request(&self, headers: &HeaderMap, fallback_base_url: &str) -> MediaRequest {
        MediaRequest {
            token: self.authenticate(headers),
            session_id: extract_cookie_value(headers, SESSION_COOKIE),
            range: header_string(headers, header::RANGE),
            if_range: header_string(headers, header::IF_RANGE),
            if_none_match: header_string(headers, header::IF_NONE_MATCH),
            if_modified_since: header_string(headers, header::IF_MODIFIED_SINCE)
                .as_deref()
                .and_then(parse_http_date),
            base_url: base_url(headers, fallback_base_url),
        }
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn base_url(headers: &HeaderMap, fallback: &str) -> String {
    match header_string(headers, header::HOST) {
        Some(host) => {
            let forwarded = header::HeaderName::from_static("x-forwarded-proto");
            let scheme =
                header_string(headers, forwarded).unwrap_or_else(|| "http".to_string());
            format!("{scheme}://{host}")
        }
        None => fallback.trim_end_matches('/').to_string(),
    }
}

fn extract_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    let prefix = format!("{name}=");

    cookie_str
        .split(';')
        .map(|part| part.trim())
        .find_map(|part| part.strip_prefix(&prefix).map(|value| value.to_string()))
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::default().with_token("secret", SecurityToken::new("alice", ["ROLE_ADMIN"]))
    }

    #[test]
    fn test_known_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));

        let token = authenticator().authenticate(&headers).unwrap();
        assert_eq!(token.username, "alice");
        assert_eq!(token.roles, vec!["ROLE_ADMIN"]);
    }

    #[test]
    fn test_unknown_or_malformed_token_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer wrong"));
        assert_eq!(authenticator().authenticate(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic c2VjcmV0"));
        assert_eq!(authenticator().authenticate(&headers), None);
    }

    #[test]
    fn test_media_request_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("media.example.com"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; mediagate_session=abc123"),
        );
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-99"));
        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        let request = authenticator().media_request(&headers, "http://127.0.0.1:3000");

        assert_eq!(request.token, None);
        assert_eq!(request.session_id.as_deref(), Some("abc123"));
        assert_eq!(request.range.as_deref(), Some("bytes=0-99"));
        assert!(request.if_modified_since.is_some());
        assert_eq!(request.base_url, "http://media.example.com");
    }

    #[test]
    fn test_base_url_falls_back_without_host() {
        let request = authenticator().media_request(&HeaderMap::new(), "http://127.0.0.1:3000/");
        assert_eq!(request.base_url, "http://127.0.0.1:3000");
        assert_eq!(request.session_id, None);
    }
}

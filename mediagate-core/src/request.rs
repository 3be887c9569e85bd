//! Framework-neutral view of an inbound request.
//!
//! The web layer extracts these fields from HTTP headers. Everything the
//! core needs from a request travels through this type, so strategies and
//! collaborators never see transport details.

use chrono::{DateTime, Utc};

/// Authenticated principal attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    /// Name of the authenticated user
    pub username: String,
    /// Roles granted to the user, before hierarchy expansion
    pub roles: Vec<String>,
}

impl SecurityToken {
    /// Creates a token for a user holding the given roles.
    pub fn new<I, S>(username: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Inbound request as seen by the gateway.
#[derive(Debug, Clone, Default)]
pub struct MediaRequest {
    /// Principal, absent when the request carried no credentials
    pub token: Option<SecurityToken>,
    /// Session identifier, absent for session-less clients
    pub session_id: Option<String>,
    /// Raw `Range` header
    pub range: Option<String>,
    /// Raw `If-Range` header
    pub if_range: Option<String>,
    /// Raw `If-None-Match` header
    pub if_none_match: Option<String>,
    /// Parsed `If-Modified-Since` header
    pub if_modified_since: Option<DateTime<Utc>>,
    /// Scheme and authority the request was addressed to, e.g. `http://host:3000`
    pub base_url: String,
}

impl MediaRequest {
    /// Creates an anonymous request with no conditional headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches an authenticated principal.
    pub fn with_token(mut self, token: SecurityToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Attaches a session identifier.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the raw `Range` header.
    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }

    /// Returns the principal, if any.
    pub fn token(&self) -> Option<&SecurityToken> {
        self.token.as_ref()
    }
}

//! Download authorization.
//!
//! A `DownloadStrategy` decides whether a request may retrieve a media. The
//! role-based strategy consults an `AuthorizationChecker`, which stands in
//! for the host application's security subsystem.

pub mod public;
pub mod roles;
pub mod session;

use std::collections::{BTreeMap, HashSet};

pub use public::{ForbiddenDownloadStrategy, PublicDownloadStrategy};
pub use roles::RoleBasedStrategy;
pub use session::SessionDownloadStrategy;

use crate::media::Media;
use crate::request::{MediaRequest, SecurityToken};

/// Errors raised while evaluating access.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    /// Request reached the security subsystem without any credentials
    #[error("Authentication credentials could not be found")]
    CredentialsNotFound,

    /// Security subsystem failed for another reason
    #[error("Authorization backend failed: {reason}")]
    Backend {
        /// Description of the failure
        reason: String,
    },
}

/// Pluggable access-control policy gating media retrieval.
pub trait DownloadStrategy: Send + Sync {
    /// Decide whether the request may download or view the media.
    ///
    /// A request without a principal is a normal input and yields
    /// `Ok(false)`.
    ///
    /// # Errors
    /// - `AuthorizationError::Backend` - If the security subsystem failed
    fn is_granted(&self, media: &Media, request: &MediaRequest) -> Result<bool, AuthorizationError>;

    /// Stable explanation of the policy, suitable for administrators.
    fn description(&self) -> String;
}

/// The host application's answer to "does the current principal hold these
/// attributes".
pub trait AuthorizationChecker: Send + Sync {
    /// Check whether the token holds every attribute.
    ///
    /// # Errors
    /// - `AuthorizationError::CredentialsNotFound` - If no token is present
    /// - `AuthorizationError::Backend` - If the check itself failed
    fn is_granted(
        &self,
        token: Option<&SecurityToken>,
        attributes: &[String],
    ) -> Result<bool, AuthorizationError>;
}

/// Role checker with a static role hierarchy.
///
/// Every attribute must be reachable from the token's roles. With no
/// attributes nothing can vote, and the answer is `allow_if_all_abstain`.
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizationChecker {
    hierarchy: BTreeMap<String, Vec<String>>,
    allow_if_all_abstain: bool,
}

impl RoleAuthorizationChecker {
    /// Creates a checker without hierarchy that denies empty attribute sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets which roles each role implies.
    pub fn with_hierarchy(mut self, hierarchy: BTreeMap<String, Vec<String>>) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Sets the answer used when there is nothing to check.
    pub fn with_allow_if_all_abstain(mut self, allow: bool) -> Self {
        self.allow_if_all_abstain = allow;
        self
    }

    /// Roles held by the token, expanded through the hierarchy.
    pub fn reachable_roles(&self, token: &SecurityToken) -> HashSet<String> {
        let mut reachable = HashSet::new();
        let mut pending: Vec<&str> = token.roles.iter().map(String::as_str).collect();

        while let Some(role) = pending.pop() {
            if !reachable.insert(role.to_string()) {
                continue;
            }
            if let Some(implied) = self.hierarchy.get(role) {
                pending.extend(implied.iter().map(String::as_str));
            }
        }

        reachable
    }
}

impl AuthorizationChecker for RoleAuthorizationChecker {
    fn is_granted(
        &self,
        token: Option<&SecurityToken>,
        attributes: &[String],
    ) -> Result<bool, AuthorizationError> {
        let token = token.ok_or(AuthorizationError::CredentialsNotFound)?;

        if attributes.is_empty() {
            return Ok(self.allow_if_all_abstain);
        }

        let reachable = self.reachable_roles(token);
        Ok(attributes.iter().all(|role| reachable.contains(role)))
    }
}

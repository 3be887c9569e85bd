//! Role-based download strategy

use std::sync::Arc;

use tracing::debug;

use super::{AuthorizationChecker, AuthorizationError, DownloadStrategy};
use crate::media::Media;
use crate::request::MediaRequest;

/// Grants access when the principal holds all of the required roles.
pub struct RoleBasedStrategy {
    roles: Vec<String>,
    checker: Arc<dyn AuthorizationChecker>,
}

impl RoleBasedStrategy {
    /// Creates a strategy requiring every role in `roles`.
    pub fn new<I, S>(checker: Arc<dyn AuthorizationChecker>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            checker,
        }
    }

    /// Roles a principal must hold.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl DownloadStrategy for RoleBasedStrategy {
    fn is_granted(
        &self,
        media: &Media,
        request: &MediaRequest,
    ) -> Result<bool, AuthorizationError> {
        match self.checker.is_granted(request.token(), &self.roles) {
            Ok(granted) => Ok(granted),
            Err(AuthorizationError::CredentialsNotFound) => {
                debug!("No credentials on request for media {}, denying", media.id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn description(&self) -> String {
        if self.roles.is_empty() {
            return "The media can be retrieved without any specific role.".to_string();
        }
        format!(
            "The media can be retrieved by users with the following roles: {}.",
            self.roles.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::request::SecurityToken;
    use crate::security::RoleAuthorizationChecker;

    struct BrokenChecker;

    impl AuthorizationChecker for BrokenChecker {
        fn is_granted(
            &self,
            _token: Option<&SecurityToken>,
            _attributes: &[String],
        ) -> Result<bool, AuthorizationError> {
            Err(AuthorizationError::Backend {
                reason: "voter crashed".to_string(),
            })
        }
    }

    fn media() -> Media {
        Media::new(1u64, "image", "default", "default/1.jpg")
    }

    fn strategy(roles: &[&str]) -> RoleBasedStrategy {
        RoleBasedStrategy::new(
            Arc::new(RoleAuthorizationChecker::new()),
            roles.iter().copied(),
        )
    }

    #[test]
    fn test_absent_credentials_deny_instead_of_failing() {
        let strategy = strategy(&["ROLE_ADMIN"]);
        let granted = strategy.is_granted(&media(), &MediaRequest::new()).unwrap();
        assert!(!granted);
    }

    #[test]
    fn test_all_roles_required() {
        let strategy = strategy(&["ROLE_ADMIN", "ROLE_EDITOR"]);

        let admin_only = MediaRequest::new().with_token(SecurityToken::new("a", ["ROLE_ADMIN"]));
        assert!(!strategy.is_granted(&media(), &admin_only).unwrap());

        let both = MediaRequest::new().with_token(SecurityToken::new(
            "b",
            ["ROLE_ADMIN", "ROLE_EDITOR", "ROLE_USER"],
        ));
        assert!(strategy.is_granted(&media(), &both).unwrap());
    }

    #[test]
    fn test_backend_failures_propagate() {
        let strategy = RoleBasedStrategy::new(Arc::new(BrokenChecker), ["ROLE_ADMIN"]);
        let request = MediaRequest::new().with_token(SecurityToken::new("a", ["ROLE_ADMIN"]));

        let result = strategy.is_granted(&media(), &request);
        assert!(matches!(result, Err(AuthorizationError::Backend { .. })));
    }

    #[test]
    fn test_empty_role_set_delegates_to_checker() {
        let token = SecurityToken::new("a", ["ROLE_USER"]);
        let request = MediaRequest::new().with_token(token);

        let denying = strategy(&[]);
        assert!(!denying.is_granted(&media(), &request).unwrap());

        let allowing = RoleBasedStrategy::new(
            Arc::new(RoleAuthorizationChecker::new().with_allow_if_all_abstain(true)),
            Vec::<String>::new(),
        );
        assert!(allowing.is_granted(&media(), &request).unwrap());
        assert!(!allowing.is_granted(&media(), &MediaRequest::new()).unwrap());
    }

    #[test]
    fn test_description_lists_roles() {
        let strategy = strategy(&["ROLE_ADMIN", "ROLE_EDITOR"]);
        assert_eq!(
            strategy.description(),
            "The media can be retrieved by users with the following roles: \
             ROLE_ADMIN, ROLE_EDITOR."
        );
    }

    #[test]
    fn test_description_of_empty_role_set() {
        assert_eq!(
            strategy(&[]).description(),
            "The media can be retrieved without any specific role."
        );
    }

    const ROLE_POOL: &[&str] = &["ROLE_A", "ROLE_B", "ROLE_C", "ROLE_D", "ROLE_E"];

    proptest! {
        #[test]
        fn prop_adding_a_role_never_grants_more(
            held in proptest::sample::subsequence(ROLE_POOL, 0..=ROLE_POOL.len()),
            required in proptest::sample::subsequence(ROLE_POOL, 1..=ROLE_POOL.len()),
            extra in proptest::sample::select(ROLE_POOL),
        ) {
            let token = SecurityToken::new("p", held.iter().copied());
            let request = MediaRequest::new().with_token(token);
            let before = strategy(&required).is_granted(&media(), &request).unwrap();

            let mut widened = required.clone();
            widened.push(extra);
            let after = strategy(&widened).is_granted(&media(), &request).unwrap();

            prop_assert!(!after || before);
        }

        #[test]
        fn prop_absent_credentials_always_deny(
            required in proptest::sample::subsequence(ROLE_POOL, 1..=ROLE_POOL.len()),
        ) {
            let granted = strategy(&required).is_granted(&media(), &MediaRequest::new()).unwrap();
            prop_assert!(!granted);
        }
    }
}

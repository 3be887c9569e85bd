//! Mediagate Core - media resolution, download authorization and derived images
//!
//! This crate provides the gateway that turns media requests into responses:
//! repository lookup, pluggable download strategies, provider selection,
//! derived-image caching and filtering, plus configuration and tracing.

pub mod cache;
pub mod components;
pub mod config;
pub mod filter;
pub mod gateway;
pub mod media;
pub mod provider;
pub mod repository;
pub mod request;
pub mod response;
pub mod security;
pub mod tracing_setup;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

// Re-export main types for convenient access
pub use config::{ConfigError, MediaGateConfig};
pub use gateway::{ErrorKind, GatewayError, MediaGateway, MediaView};
pub use media::{DownloadMode, Format, Media, MediaId};
pub use repository::RepositoryError;
pub use request::{MediaRequest, SecurityToken};
pub use response::MediaResponse;

/// Errors raised while starting mediagate.
#[derive(Debug, thiserror::Error)]
pub enum MediaGateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaGateError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            MediaGateError::Config(ConfigError::Read { path, .. }) => {
                format!("Could not read configuration file {}", path.display())
            }
            MediaGateError::Config(e) => format!("Invalid configuration: {e}"),
            MediaGateError::Repository(RepositoryError::InvalidCatalog { path, .. }) => {
                format!("Media catalog {} is not a valid JSON array", path.display())
            }
            MediaGateError::Repository(_) => "Media catalog could not be loaded".to_string(),
            MediaGateError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to operator input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MediaGateError::Config(_)
                | MediaGateError::Repository(RepositoryError::InvalidCatalog { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, MediaGateError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_user_messages() {
        let error = MediaGateError::Repository(RepositoryError::InvalidCatalog {
            path: PathBuf::from("catalog.json"),
            reason: "expected value".to_string(),
        });
        assert_eq!(
            error.user_message(),
            "Media catalog catalog.json is not a valid JSON array"
        );
        assert!(error.is_user_error());

        let error = MediaGateError::Io(std::io::Error::other("disk"));
        assert_eq!(error.user_message(), "File system error occurred");
        assert!(!error.is_user_error());
    }
}

//! Unconditional strategies

use super::{AuthorizationError, DownloadStrategy};
use crate::media::Media;
use crate::request::MediaRequest;

/// Anyone may retrieve the media.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicDownloadStrategy;

impl DownloadStrategy for PublicDownloadStrategy {
    fn is_granted(
        &self,
        _media: &Media,
        _request: &MediaRequest,
    ) -> Result<bool, AuthorizationError> {
        Ok(true)
    }

    fn description(&self) -> String {
        "The media is publicly available.".to_string()
    }
}

/// Nobody may retrieve the media.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForbiddenDownloadStrategy;

impl DownloadStrategy for ForbiddenDownloadStrategy {
    fn is_granted(
        &self,
        _media: &Media,
        _request: &MediaRequest,
    ) -> Result<bool, AuthorizationError> {
        Ok(false)
    }

    fn description(&self) -> String {
        "The media cannot be retrieved.".to_string()
    }
}

//! Presentational result of the view operation.

use serde::Serialize;

use crate::media::{Format, Media};

/// Media metadata with the formats a client may pick from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaView {
    /// The viewed media
    pub media: Media,
    /// Format names registered for the media's context
    pub formats: Vec<String>,
    /// Format the client asked for
    pub format: Format,
}

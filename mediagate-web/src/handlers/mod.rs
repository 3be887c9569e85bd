//! HTTP request handlers organized by functionality

pub mod media;
pub mod response;

// Re-export handler functions
pub use media::{FormatQuery, download_media, filtered_image, view_media};
pub use response::{ApiError, into_http_response};

//! Grammar of filtered-image paths.
//!
//! A filtered image is requested as `{first}/{middle...}/{id}_{token}.jpg`.
//! The id must be numeric; the token is advisory and only captured.

use std::sync::LazyLock;

use regex::Regex;

use crate::media::MediaId;

static FILTER_PATH: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^([^/]*)/(.*)/([0-9]+)_([a-zA-Z_]*)\.jpg$"));

/// Components captured from a filtered-image path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPath {
    /// First path segment
    pub first_segment: String,
    /// Everything between the first segment and the file name
    pub middle: String,
    /// Identifier of the source media
    pub media_id: MediaId,
    /// Filter label embedded in the file name
    pub filter_token: String,
}

impl FilterPath {
    /// Parse a path, returning `None` when it does not follow the grammar.
    ///
    /// Paths containing `.` or `..` segments never match.
    pub fn parse(path: &str) -> Option<Self> {
        if path.split('/').any(|segment| segment == "." || segment == "..") {
            return None;
        }

        let pattern = FILTER_PATH.as_ref().ok()?;
        let captures = pattern.captures(path)?;

        Some(Self {
            first_segment: captures[1].to_string(),
            middle: captures[2].to_string(),
            media_id: MediaId::new(&captures[3]),
            filter_token: captures[4].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_id_and_token() {
        let parsed = FilterPath::parse("abc/def/123_thumb.jpg").unwrap();
        assert_eq!(parsed.first_segment, "abc");
        assert_eq!(parsed.middle, "def");
        assert_eq!(parsed.media_id, MediaId::new("123"));
        assert_eq!(parsed.filter_token, "thumb");
    }

    #[test]
    fn test_middle_may_span_segments() {
        let parsed =
            FilterPath::parse("uploads/media/default/0001/01/42_default_small.jpg").unwrap();
        assert_eq!(parsed.middle, "media/default/0001/01");
        assert_eq!(parsed.media_id, MediaId::new("42"));
        assert_eq!(parsed.filter_token, "default_small");
    }

    #[test]
    fn test_rejects_other_extensions() {
        assert_eq!(FilterPath::parse("abc/123_thumb.png"), None);
        assert_eq!(FilterPath::parse("abc/def/123_thumb.png"), None);
        assert_eq!(FilterPath::parse("abc/def/123_thumbxjpg"), None);
    }

    #[test]
    fn test_rejects_non_numeric_id() {
        assert_eq!(FilterPath::parse("abc/def/xyz_thumb.jpg"), None);
        assert_eq!(FilterPath::parse("abc/def/_thumb.jpg"), None);
    }

    #[test]
    fn test_requires_three_parts() {
        assert_eq!(FilterPath::parse("123_thumb.jpg"), None);
        assert_eq!(FilterPath::parse("abc/123_thumb.jpg"), None);
    }

    #[test]
    fn test_rejects_dot_segments() {
        assert_eq!(FilterPath::parse("abc/../123_thumb.jpg"), None);
        assert_eq!(FilterPath::parse("abc/./def/123_thumb.jpg"), None);
        assert_eq!(FilterPath::parse("../def/123_thumb.jpg"), None);
    }
}

//! HTTP byte range parsing (RFC 7233)
//!
//! Only single ranges are honored. Multi-range requests and malformed
//! headers fall back to serving the whole file, which a client must accept.

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte position
    pub start: u64,
    /// Last byte position, inclusive
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by this range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; a parsed range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value of the `Content-Range` header for this range.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// The requested range lies outside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Range not satisfiable for file of {file_size} bytes")]
pub struct RangeNotSatisfiable {
    /// Size of the file the range was checked against
    pub file_size: u64,
}

/// Parse a `Range` header against a file size.
///
/// Returns `Ok(None)` when the whole file should be served: the header is
/// malformed, names several ranges, or already covers the entire file.
///
/// # Errors
/// - `RangeNotSatisfiable` - If the range starts past the end of the file
///
/// # Examples
/// ```
/// use mediagate_core::response::range::{ByteRange, parse_range_header};
/// let range = parse_range_header("bytes=100-199", 1000).unwrap();
/// assert_eq!(range, Some(ByteRange { start: 100, end: 199 }));
/// ```
pub fn parse_range_header(
    header: &str,
    file_size: u64,
) -> Result<Option<ByteRange>, RangeNotSatisfiable> {
    let Some(ranges) = header.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    if ranges.contains(',') {
        return Ok(None);
    }
    let Some((start_str, end_str)) = ranges.split_once('-') else {
        return Ok(None);
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());
    let unsatisfiable = RangeNotSatisfiable { file_size };

    let (start, end) = if start_str.is_empty() {
        // Suffix range: the last N bytes
        let Ok(suffix) = end_str.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || file_size == 0 {
            return Err(unsatisfiable);
        }
        (file_size.saturating_sub(suffix), file_size - 1)
    } else {
        let Ok(start) = start_str.parse::<u64>() else {
            return Ok(None);
        };
        let end = if end_str.is_empty() {
            file_size.saturating_sub(1)
        } else {
            match end_str.parse::<u64>() {
                Ok(end) if end >= start => end.min(file_size.saturating_sub(1)),
                _ => return Ok(None),
            }
        };
        if start >= file_size {
            return Err(unsatisfiable);
        }
        (start, end)
    };

    if start == 0 && end + 1 == file_size {
        return Ok(None);
    }

    Ok(Some(ByteRange { start, end }))
}

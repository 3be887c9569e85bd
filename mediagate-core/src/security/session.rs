//! Session-limited download strategy

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::{AuthorizationError, DownloadStrategy};
use crate::media::Media;
use crate::request::MediaRequest;

/// Sessions tracked before the least recently granted one is forgotten.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Grants a fixed number of retrievals per session.
///
/// The budget is shared by every media of the context the strategy is bound
/// to. Requests without a session are denied. Only sessions that were
/// granted something are tracked, in an LRU of bounded size.
pub struct SessionDownloadStrategy {
    times: u32,
    counters: Mutex<LruCache<String, u32>>,
}

impl SessionDownloadStrategy {
    /// Creates a strategy allowing `times` retrievals per session.
    pub fn new(times: u32) -> Self {
        Self::with_max_sessions(times, DEFAULT_MAX_SESSIONS)
    }

    /// Creates a strategy tracking at most `max_sessions` sessions.
    pub fn with_max_sessions(times: u32, max_sessions: usize) -> Self {
        let capacity = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            times,
            counters: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Retrievals already granted to a session.
    pub fn used(&self, session_id: &str) -> u32 {
        self.counters.lock().peek(session_id).copied().unwrap_or(0)
    }

    /// Number of sessions currently tracked.
    pub fn tracked_sessions(&self) -> usize {
        self.counters.lock().len()
    }
}

impl DownloadStrategy for SessionDownloadStrategy {
    fn is_granted(
        &self,
        media: &Media,
        request: &MediaRequest,
    ) -> Result<bool, AuthorizationError> {
        let Some(session_id) = request.session_id.as_deref() else {
            return Ok(false);
        };

        let mut counters = self.counters.lock();
        let used = counters.get(session_id).copied().unwrap_or(0);
        if used >= self.times {
            debug!(
                "Session {} exhausted its {} downloads (media {})",
                session_id, self.times, media.id
            );
            return Ok(false);
        }

        match counters.get_mut(session_id) {
            Some(count) => *count += 1,
            None => {
                counters.push(session_id.to_string(), 1);
            }
        }
        Ok(true)
    }

    fn description(&self) -> String {
        format!(
            "The media can be retrieved {} time(s) per session.",
            self.times
        )
    }
}

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{NaiveDateTime, Utc};
use reqwest::{header::HeaderMap, StatusCode};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const MAX_DOUBLINGS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How often and how patiently the execution backend client retries a request.
///
/// `max_attempts` counts the first request, so `1` never retries. Delays double
/// from `base_backoff` up to `max_backoff`; with `jitter` each delay is drawn
/// from its upper half.
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            jitter: false,
            ..Self::default()
        }
    }

    /// True when the zero-based `attempt` that just failed may be followed by another.
    pub fn allows_retry_after(&self, attempt: usize) -> bool {
        attempt.saturating_add(1) < self.max_attempts.max(1)
    }

    /// Backoff before the attempt following `attempt`, without any server hint.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let doublings = u32::try_from(attempt).unwrap_or(u32::MAX).min(MAX_DOUBLINGS);
        let ceiling = self.max_backoff.max(self.base_backoff);
        let full = self
            .base_backoff
            .checked_mul(1_u32 << doublings)
            .unwrap_or(ceiling)
            .min(ceiling);
        if !self.jitter {
            return full;
        }
        let floor = full / 2;
        let spread_ms = u64::try_from((full - floor).as_millis()).unwrap_or(u64::MAX);
        floor + Duration::from_millis(entropy() % spread_ms.saturating_add(1))
    }

    /// Delay before retrying, stretched to a server `Retry-After` hint but never past
    /// `max_backoff`.
    pub fn delay(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(attempt);
        match retry_after {
            Some(hint) => hint.clamp(backoff, self.max_backoff.max(backoff)),
            None => backoff,
        }
    }
}

fn entropy() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::from(elapsed.subsec_nanos()))
        .unwrap_or_default()
}

/// Statuses worth another attempt: timeouts, conflicts, throttling and server faults.
pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_MANY_REQUESTS
    ) || status.as_u16() == 425
        || status.is_server_error()
}

pub(crate) fn is_retryable_transport(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// Reads `Retry-After` as delay seconds or an IMF-fixdate; past dates mean no wait.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let retry_at = NaiveDateTime::parse_from_str(value, IMF_FIXDATE)
        .ok()?
        .and_utc();
    Some((retry_at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

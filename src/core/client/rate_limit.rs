//! Rate-limit observation and the dispatch gate.
//!
//! Tracks `X-RateLimit-*` headers across responses and derives a
//! "pause-until" instant the engine honors before dispatching.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;

#[derive(Debug, Default)]
struct RateState {
    limit: Option<u64>,
    remaining: Option<u64>,
    /// Reset timestamp in epoch seconds.
    reset_at: Option<u64>,
    pause_until: Option<Instant>,
}

/// Per-engine record of the server's rate-limit signals.
///
/// Updates are non-suspending, so a plain mutex suffices; the gate's sleep
/// happens outside the lock.
#[derive(Debug)]
pub(crate) struct RateLimitTracker {
    enabled: bool,
    buffer: f64,
    default_retry_after: Duration,
    state: Mutex<RateState>,
}

impl RateLimitTracker {
    pub(crate) fn new(enabled: bool, buffer: f64, default_retry_after: Duration) -> Self {
        Self {
            enabled,
            buffer,
            default_retry_after,
            state: Mutex::new(RateState::default()),
        }
    }

    /// Record the rate headers of a response; on 429 derive the pause the
    /// server asked for, otherwise pause proactively when the remaining
    /// quota falls under the configured buffer.
    pub(crate) fn observe(&self, status: u16, headers: &HeaderMap) {
        let retry_after = header_str(headers, "retry-after").and_then(parse_retry_after);

        let mut state = self.state.lock().expect("rate limit state poisoned");
        if let Some(limit) = header_u64(headers, "x-ratelimit-limit") {
            state.limit = Some(limit);
        }
        if let Some(remaining) = header_u64(headers, "x-ratelimit-remaining") {
            state.remaining = Some(remaining);
        }
        if let Some(reset) = header_str(headers, "x-ratelimit-reset").and_then(parse_reset) {
            state.reset_at = Some(reset);
        }

        if status == 429 {
            let wait = retry_after.unwrap_or(self.default_retry_after);
            state.pause_until = Some(Instant::now() + wait);
            tracing::warn!(wait_secs = wait.as_secs_f64(), "rate limit hit (429)");
            return;
        }

        if !self.enabled {
            return;
        }

        if let (Some(remaining), Some(limit)) = (state.remaining, state.limit)
            && limit > 0
            && remaining as f64 <= limit as f64 * self.buffer
            && let Some(reset_at) = state.reset_at
        {
            let now_epoch = epoch_now();
            if reset_at > now_epoch {
                let candidate = Instant::now() + Duration::from_secs(reset_at - now_epoch);
                // Never pause past what a Retry-After already demanded.
                state.pause_until = Some(state.pause_until.map_or(candidate, |p| p.min(candidate)));
                tracing::info!(
                    remaining,
                    limit,
                    "rate limit approaching, pausing until reset"
                );
            }
        }
    }

    /// Time left until dispatch is allowed again, when a pause is pending.
    pub(crate) fn pause_remaining(&self) -> Option<Duration> {
        let state = self.state.lock().expect("rate limit state poisoned");
        state
            .pause_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
    }

    /// Suspend until any pending pause has elapsed. Cancellable by dropping
    /// the future.
    pub(crate) async fn gate(&self) {
        if let Some(wait) = self.pause_remaining() {
            tracing::info!(wait_secs = wait.as_secs_f64(), "waiting out rate limit pause");
            tokio::time::sleep(wait).await;
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|v| v.trim().parse().ok())
}

/// `Retry-After` is either delay seconds or an HTTP-date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = when.timestamp() - chrono::Utc::now().timestamp();
    Some(Duration::from_secs(delta.max(0) as u64))
}

/// `X-RateLimit-Reset` is an epoch timestamp, occasionally an HTTP-date.
fn parse_reset(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(epoch) = value.parse::<u64>() {
        return Some(epoch);
    }
    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    u64::try_from(when.timestamp()).ok()
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

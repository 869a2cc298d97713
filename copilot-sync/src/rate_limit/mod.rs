//! Rate limiting utilities for GitHub API.
//!
//! GitHub reports its rate limit budget on every API response through the
//! `x-ratelimit-*` headers and, when throttling, a `retry-after` header. This
//! module reads those headers and waits (for a bounded time) when the budget
//! runs low.

mod info;

pub use info::RateLimitInfo;

use std::time::Duration;
use tracing::{info, warn};

/// Maximum time to wait for rate limit reset (1 minute).
///
/// A sync pass is interactive; anything longer is reported as a failure
/// instead.
const MAX_WAIT_SECS: u64 = 60;

/// Minimum remaining requests before proactively waiting.
const MIN_REMAINING_THRESHOLD: u32 = 5;

/// Waits if the rate limit is low, returning true if we waited.
///
/// This function proactively waits when remaining requests fall below
/// `MIN_REMAINING_THRESHOLD` to avoid hitting hard limits. Resets further
/// away than `MAX_WAIT_SECS` are not waited for at all.
///
/// # Arguments
///
/// * `info` - Current rate limit information
/// * `now` - Current Unix time in seconds
pub async fn wait_if_needed(info: &RateLimitInfo, now: u64) -> bool {
    if info.remaining >= MIN_REMAINING_THRESHOLD {
        return false;
    }

    if info.reset <= now {
        return false;
    }

    let wait_secs = info.reset - now;
    if wait_secs > MAX_WAIT_SECS {
        warn!(
            wait_secs,
            max_wait = MAX_WAIT_SECS,
            "Rate limit reset too far in future, not waiting"
        );
        return false;
    }

    info!(
        remaining = info.remaining,
        wait_secs, "Rate limit low, waiting for reset"
    );

    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
    true
}

/// Waits for a `retry-after` duration if it is within `MAX_WAIT_SECS`.
///
/// Returns true if we waited.
pub async fn wait_for_retry_after(retry_after_secs: u64) -> bool {
    if retry_after_secs > MAX_WAIT_SECS {
        warn!(
            retry_after = retry_after_secs,
            max_wait = MAX_WAIT_SECS,
            "Retry-After too long, not waiting"
        );
        return false;
    }
    info!(retry_after = retry_after_secs, "Received Retry-After header, waiting");
    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
    true
}

/// Current Unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

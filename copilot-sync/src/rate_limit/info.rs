//! Rate limit information.

use std::collections::BTreeMap;

/// Rate limit information for a specific resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Requests remaining in the current window.
    pub remaining: u32,

    /// Unix timestamp when the rate limit resets.
    pub reset: u64,

    /// Total requests allowed per window.
    pub limit: u32,
}

impl RateLimitInfo {
    /// Reads `x-ratelimit-remaining`, `x-ratelimit-reset` and
    /// `x-ratelimit-limit` from lowercase-keyed response headers.
    ///
    /// Returns `None` unless both remaining and reset are present and numeric.
    #[must_use]
    pub fn from_headers(headers: &BTreeMap<String, String>) -> Option<Self> {
        let number = |name: &str| headers.get(name)?.trim().parse::<u64>().ok();

        let remaining = number("x-ratelimit-remaining")?;
        let reset = number("x-ratelimit-reset")?;
        let limit = number("x-ratelimit-limit").unwrap_or(remaining);

        Some(Self {
            remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
            reset,
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
        })
    }

    /// Returns true if no requests remain in the current window.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_rate_limit_headers() {
        let info = RateLimitInfo::from_headers(&headers(&[
            ("x-ratelimit-remaining", "10"),
            ("x-ratelimit-reset", "1234567890"),
            ("x-ratelimit-limit", "60"),
        ]))
        .unwrap();

        assert_eq!(info.remaining, 10);
        assert_eq!(info.reset, 1234567890);
        assert_eq!(info.limit, 60);
        assert!(!info.is_exhausted());
    }

    #[test]
    fn missing_headers_yield_none() {
        assert_eq!(RateLimitInfo::from_headers(&headers(&[])), None);
        assert_eq!(
            RateLimitInfo::from_headers(&headers(&[("x-ratelimit-remaining", "abc")])),
            None
        );
    }
}

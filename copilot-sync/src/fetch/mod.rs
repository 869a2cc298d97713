//! Authenticated fetch collaborator.
//!
//! The content index never talks to HTTP directly. It goes through the
//! [`Fetcher`] trait, which returns raw status/headers/body triples and
//! supports two authentication modes: a silent attempt with whatever
//! credentials are already available, and an interactive attempt that may
//! ask the user to sign in.

mod error;
mod github;

pub use error::FetchError;
pub use github::{GitHubFetcher, SignIn, TokenSignIn};

use crate::rate_limit::RateLimitInfo;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How much user interaction a fetch may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Use existing credentials only; never prompt.
    Silent,
    /// Sign in interactively if needed before fetching.
    Interactive,
}

/// A GET request to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL.
    pub url: String,

    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// Creates a request without extra headers.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A response as returned by the transport, whatever its status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response headers, keyed by lowercase name.
    pub headers: BTreeMap<String, String>,

    /// Response body decoded as UTF-8.
    pub body: String,
}

impl FetchResponse {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Adds a response header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Looks up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Rate limit state advertised by the response headers, if any.
    #[must_use]
    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        RateLimitInfo::from_headers(&self.headers)
    }

    /// Returns true if the server refused the request because the rate
    /// limit is exhausted.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self.status {
            429 => true,
            403 => self.header("retry-after").is_some()
                || self.rate_limit().is_some_and(|info| info.is_exhausted()),
            _ => false,
        }
    }

    /// Returns true for authorization-class failures (401, or 403 that is
    /// not a rate limit).
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        match self.status {
            401 => true,
            403 => !self.is_rate_limited(),
            _ => false,
        }
    }
}

/// Transport for GET requests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issues `request`. Non-2xx statuses are returned as responses; only
    /// transport-level problems are errors.
    async fn fetch(
        &self,
        request: &FetchRequest,
        mode: AuthMode,
    ) -> Result<FetchResponse, FetchError>;
}

/// Fetches silently first, escalating to interactive sign-in at most once.
///
/// If the silent attempt comes back with an authorization-class status the
/// request is retried exactly once in [`AuthMode::Interactive`]. Whatever that
/// retry returns is final; callers classify it. If sign-in is unavailable or
/// fails, the silent response is returned so it still reads as an
/// authorization failure.
///
/// # Errors
///
/// Returns [`FetchError`] if either attempt fails at the transport level.
pub async fn fetch_with_escalation(
    fetcher: &dyn Fetcher,
    request: &FetchRequest,
) -> Result<FetchResponse, FetchError> {
    let response = fetcher.fetch(request, AuthMode::Silent).await?;
    if !response.is_auth_failure() {
        return Ok(response);
    }

    info!(url = %request.url, status = response.status, "Authorization required, signing in");
    match fetcher.fetch(request, AuthMode::Interactive).await {
        Ok(retried) => {
            debug!(url = %request.url, status = retried.status, "Retried after sign-in");
            Ok(retried)
        }
        Err(e @ (FetchError::SignInUnavailable | FetchError::SignInFailed { .. })) => {
            warn!(url = %request.url, error = %e, "Sign-in did not complete");
            Ok(response)
        }
        Err(e) => Err(e),
    }
}

//! GitHub-backed [`Fetcher`] built on octocrab.

use super::{AuthMode, FetchError, FetchRequest, FetchResponse, Fetcher};
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use octocrab::Octocrab;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Obtains a GitHub token interactively.
#[async_trait]
pub trait SignIn: Send + Sync {
    /// Returns a token to use for subsequent requests.
    async fn sign_in(&self) -> Result<String, FetchError>;
}

/// A [`SignIn`] that hands out a token supplied up front.
#[derive(Clone)]
pub struct TokenSignIn {
    token: String,
}

impl TokenSignIn {
    /// Wraps `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl SignIn for TokenSignIn {
    async fn sign_in(&self) -> Result<String, FetchError> {
        if self.token.trim().is_empty() {
            return Err(FetchError::SignInFailed {
                message: "the configured token is empty".to_string(),
            });
        }
        Ok(self.token.clone())
    }
}

/// Fetches over the GitHub API (and raw content host) using octocrab.
///
/// Starts out with whatever credentials it was built with (possibly none).
/// The first interactive request runs [`SignIn`] and swaps in an
/// authenticated client for the rest of the session.
pub struct GitHubFetcher {
    client: RwLock<Octocrab>,
    sign_in: Option<Arc<dyn SignIn>>,
    signed_in: Mutex<bool>,
}

impl GitHubFetcher {
    /// Creates an unauthenticated fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the client cannot be built.
    pub fn anonymous() -> Result<Self, FetchError> {
        Ok(Self::from_client(Octocrab::builder().build()?, false))
    }

    /// Creates a fetcher authenticated with a personal access token.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the client cannot be built.
    pub fn with_token(token: String) -> Result<Self, FetchError> {
        Ok(Self::from_client(build_client(token)?, true))
    }

    fn from_client(client: Octocrab, signed_in: bool) -> Self {
        Self {
            client: RwLock::new(client),
            sign_in: None,
            signed_in: Mutex::new(signed_in),
        }
    }

    /// Sets the collaborator used for interactive sign-in.
    #[must_use]
    pub fn with_sign_in(mut self, sign_in: Arc<dyn SignIn>) -> Self {
        self.sign_in = Some(sign_in);
        self
    }

    /// Runs sign-in once per session; later calls are no-ops.
    async fn ensure_signed_in(&self) -> Result<(), FetchError> {
        let mut signed_in = self.signed_in.lock().await;
        if *signed_in {
            return Ok(());
        }

        let sign_in = self.sign_in.as_ref().ok_or(FetchError::SignInUnavailable)?;
        info!("Signing in to GitHub");
        let token = sign_in.sign_in().await?;
        *self.client.write().await = build_client(token)?;
        *signed_in = true;
        Ok(())
    }
}

fn build_client(token: String) -> Result<Octocrab, FetchError> {
    Ok(Octocrab::builder().personal_token(token).build()?)
}

fn to_header_map(headers: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let invalid = || FetchError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[async_trait]
impl Fetcher for GitHubFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        mode: AuthMode,
    ) -> Result<FetchResponse, FetchError> {
        if mode == AuthMode::Interactive {
            self.ensure_signed_in().await?;
        }

        let transport = |e: octocrab::Error| FetchError::Transport {
            url: request.url.clone(),
            message: e.to_string(),
        };

        let client = self.client.read().await.clone();
        let headers = to_header_map(&request.headers)?;
        debug!(url = %request.url, ?mode, "Fetching");

        let response = client
            ._get_with_headers(request.url.as_str(), Some(headers))
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();
        let body = client.body_to_string(response).await.map_err(transport)?;

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_header_map() {
        let map = to_header_map(&[
            ("Accept".to_string(), "application/vnd.github+json".to_string()),
            ("X-GitHub-Api-Version".to_string(), "2022-11-28".to_string()),
        ])
        .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map["accept"], "application/vnd.github+json");
    }

    #[test]
    fn rejects_invalid_header_names() {
        let result = to_header_map(&[("bad header".to_string(), "x".to_string())]);
        assert!(matches!(result, Err(FetchError::InvalidHeader { .. })));
    }

    #[tokio::test]
    async fn token_sign_in_rejects_empty_tokens() {
        assert_eq!(TokenSignIn::new("ghp_x").sign_in().await.unwrap(), "ghp_x");
        assert!(matches!(
            TokenSignIn::new("  ").sign_in().await,
            Err(FetchError::SignInFailed { .. })
        ));
    }

    #[tokio::test]
    async fn interactive_without_sign_in_is_unavailable() {
        let fetcher = GitHubFetcher::anonymous().unwrap();
        let result = fetcher
            .fetch(&FetchRequest::get("https://api.github.com/"), AuthMode::Interactive)
            .await;
        assert!(matches!(result, Err(FetchError::SignInUnavailable)));
    }
}

//! Remote content index.
//!
//! Lists the installable items in configured repositories through the
//! GitHub contents API and downloads their contents. Listings are cached per
//! repository for a fixed TTL.
//!
//! Failures are isolated per (repository, category) pair: a missing remote
//! directory lists as empty, and any other failure is recorded on the
//! [`RepositoryListing`] while the remaining categories still list.

mod error;
mod item;
mod listing;

pub use error::IndexError;
pub use item::RepositoryItem;
pub use listing::{ListingFailure, RepositoryListing};

use crate::cache::TtlCache;
use crate::category::Category;
use crate::clock::{Clock, SystemClock};
use crate::config::{normalize_url, GitHubCoordinates, RepositoryConfig};
use crate::fetch::{fetch_with_escalation, FetchRequest, FetchResponse, Fetcher};
use crate::rate_limit::{unix_now, wait_for_retry_after, wait_if_needed};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Lists and downloads remote items, caching listings.
pub struct ContentIndex {
    fetcher: Arc<dyn Fetcher>,
    cache: TtlCache<Vec<RepositoryItem>>,
}

impl ContentIndex {
    /// Creates an index with the given listing TTL.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, ttl: Duration) -> Self {
        Self::with_clock(fetcher, ttl, Arc::new(SystemClock))
    }

    /// Creates an index whose cache reads time from `clock`.
    #[must_use]
    pub fn with_clock(fetcher: Arc<dyn Fetcher>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            cache: TtlCache::with_clock(ttl, clock),
        }
    }

    /// Lists every item in `repository`, one request per configured category.
    ///
    /// Categories are listed concurrently. A fully successful listing is
    /// cached; a partial one is returned but not cached so the next call
    /// retries the failed categories.
    pub async fn list_items(&self, repository: &RepositoryConfig) -> RepositoryListing {
        let key = cache_key(repository);
        if let Some(items) = self.cache.get(&key) {
            debug!(repository = %repository.name, count = items.len(), "Listing served from cache");
            return RepositoryListing {
                repository_name: repository.name.clone(),
                repository_url: repository.url.clone(),
                items,
                failures: Vec::new(),
                from_cache: true,
            };
        }

        let span = info_span!("list", repository = %repository.name);
        async {
            let mut listing = RepositoryListing {
                repository_name: repository.name.clone(),
                repository_url: repository.url.clone(),
                items: Vec::new(),
                failures: Vec::new(),
                from_cache: false,
            };

            let coordinates = match repository.coordinates() {
                Ok(coordinates) => coordinates,
                Err(e) => {
                    warn!(error = %e, "Repository is not listable");
                    listing.failures = repository
                        .paths
                        .keys()
                        .map(|&category| ListingFailure {
                            category,
                            error: e.to_string(),
                        })
                        .collect();
                    return listing;
                }
            };

            let results = join_all(repository.paths.iter().map(|(&category, path)| {
                let coordinates = &coordinates;
                async move {
                    let result = self
                        .list_category(repository, coordinates, category, path)
                        .await;
                    (category, result)
                }
            }))
            .await;

            for (category, result) in results {
                match result {
                    Ok(items) => {
                        debug!(%category, count = items.len(), "Listed category");
                        listing.items.extend(items);
                    }
                    Err(e) => {
                        warn!(%category, error = %e, "Failed to list category");
                        listing.failures.push(ListingFailure {
                            category,
                            error: e.to_string(),
                        });
                    }
                }
            }

            listing::sort_items(&mut listing.items);

            if listing.is_complete() {
                self.cache.insert(key, listing.items.clone());
            }

            info!(
                count = listing.items.len(),
                failed_categories = listing.failures.len(),
                "Listing complete"
            );
            listing
        }
        .instrument(span)
        .await
    }

    /// Lists several repositories concurrently, preserving their order.
    pub async fn list_all(&self, repositories: &[RepositoryConfig]) -> Vec<RepositoryListing> {
        join_all(repositories.iter().map(|repository| self.list_items(repository))).await
    }

    /// Downloads the contents of `item`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the file is gone,
    /// [`IndexError::AuthRequired`] if access is denied even after signing in,
    /// and other [`IndexError`] variants for network or HTTP failures.
    pub async fn download_content(&self, item: &RepositoryItem) -> Result<String, IndexError> {
        let url = &item.raw_content_url;
        debug!(item = %item.name, url = %url, "Downloading");

        let response = self.fetch(FetchRequest::get(url.as_str())).await?;
        if response.is_success() {
            return Ok(response.body);
        }
        Err(classify(url, &response))
    }

    /// Drops the cached listing for `repository`.
    pub fn invalidate(&self, repository: &RepositoryConfig) {
        if self.cache.invalidate(&cache_key(repository)) {
            debug!(repository = %repository.name, "Invalidated cached listing");
        }
    }

    /// Drops every cached listing.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    async fn list_category(
        &self,
        repository: &RepositoryConfig,
        coordinates: &GitHubCoordinates,
        category: Category,
        path: &str,
    ) -> Result<Vec<RepositoryItem>, IndexError> {
        let url = listing::contents_url(coordinates, path, repository.branch.as_deref())?;
        let request = FetchRequest::get(url.as_str())
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION);

        let response = self.fetch(request).await?;

        if let Some(info) = response.rate_limit() {
            wait_if_needed(&info, unix_now()).await;
        }

        if response.is_not_found() {
            debug!(%category, path, "Remote path does not exist");
            return Ok(Vec::new());
        }
        if !response.is_success() {
            return Err(classify(&url, &response));
        }

        listing::parse_listing(&response.body, &url, category, repository, coordinates)
    }

    /// Fetches with sign-in escalation, retrying once after a short
    /// `retry-after`.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, IndexError> {
        let response = self.fetch_once(&request).await?;
        if response.is_rate_limited() {
            let retry_after = response
                .header("retry-after")
                .and_then(|value| value.trim().parse::<u64>().ok());
            if let Some(secs) = retry_after {
                if wait_for_retry_after(secs).await {
                    return self.fetch_once(&request).await;
                }
            }
        }
        Ok(response)
    }

    async fn fetch_once(&self, request: &FetchRequest) -> Result<FetchResponse, IndexError> {
        fetch_with_escalation(self.fetcher.as_ref(), request)
            .await
            .map_err(|source| IndexError::Network {
                url: request.url.clone(),
                source,
            })
    }
}

/// Repositories are keyed by URL; display names need not be unique.
fn cache_key(repository: &RepositoryConfig) -> String {
    format!("listing:{}", normalize_url(&repository.url))
}

/// Maps a non-success response to an error.
fn classify(url: &str, response: &FetchResponse) -> IndexError {
    let url = url.to_string();
    if response.is_not_found() {
        IndexError::NotFound { url }
    } else if response.is_rate_limited() {
        IndexError::RateLimited {
            url,
            reset: response.rate_limit().map(|info| info.reset),
        }
    } else if response.is_auth_failure() {
        IndexError::AuthRequired { url }
    } else {
        IndexError::Http {
            url,
            status: response.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fetch::{AuthMode, FetchError};
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned responses by URL prefix and counts requests.
    #[derive(Default)]
    struct FakeFetcher {
        routes: HashMap<String, FetchResponse>,
        calls: Mutex<Vec<(String, AuthMode)>>,
    }

    impl FakeFetcher {
        fn route(mut self, url: &str, response: FetchResponse) -> Self {
            self.routes.insert(url.to_string(), response);
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(
            &self,
            request: &FetchRequest,
            mode: AuthMode,
        ) -> Result<FetchResponse, FetchError> {
            self.calls.lock().unwrap().push((request.url.clone(), mode));
            Ok(self
                .routes
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| FetchResponse::new(404, "")))
        }
    }

    const AGENTS_URL: &str =
        "https://api.github.com/repos/acme/prompts/contents/agents?ref=main";
    const PROMPTS_URL: &str =
        "https://api.github.com/repos/acme/prompts/contents/prompts?ref=main";

    fn repository() -> RepositoryConfig {
        RepositoryConfig::new("Acme", "https://github.com/acme/prompts")
            .with_branch("main")
            .with_paths([
                (Category::Agents, "agents".to_string()),
                (Category::Prompts, "prompts".to_string()),
            ])
    }

    fn agents_body() -> FetchResponse {
        FetchResponse::new(
            200,
            r#"[
                {"name": "zed.agent.md", "path": "agents/zed.agent.md", "type": "file",
                 "download_url": "https://raw.example/zed.agent.md"},
                {"name": "alpha.agent.md", "path": "agents/alpha.agent.md", "type": "file",
                 "download_url": "https://raw.example/alpha.agent.md"},
                {"name": "README.md", "path": "agents/README.md", "type": "file",
                 "download_url": "https://raw.example/README.md"}
            ]"#,
        )
    }

    #[tokio::test]
    async fn missing_category_lists_empty() {
        let fetcher = Arc::new(FakeFetcher::default().route(AGENTS_URL, agents_body()));
        let index = ContentIndex::new(fetcher, Duration::from_secs(300));

        let listing = index.list_items(&repository()).await;

        assert!(listing.is_complete());
        let names: Vec<_> = listing.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["alpha.agent.md", "zed.agent.md"]);
    }

    #[tokio::test]
    async fn failure_is_isolated_per_category() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .route(AGENTS_URL, agents_body())
                .route(PROMPTS_URL, FetchResponse::new(500, "boom")),
        );
        let index = ContentIndex::new(fetcher.clone(), Duration::from_secs(300));

        let listing = index.list_items(&repository()).await;

        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.failures.len(), 1);
        assert_eq!(listing.failures[0].category, Category::Prompts);

        // Partial listings aren't cached.
        let again = index.list_items(&repository()).await;
        assert!(!again.from_cache);
        assert_eq!(fetcher.call_count(), 4);
    }

    #[tokio::test]
    async fn caches_listing_until_ttl_expires() {
        let fetcher = Arc::new(FakeFetcher::default().route(AGENTS_URL, agents_body()));
        let clock = Arc::new(ManualClock::default());
        let index =
            ContentIndex::with_clock(fetcher.clone(), Duration::from_secs(300), clock.clone());

        index.list_items(&repository()).await;
        assert_eq!(fetcher.call_count(), 2);

        clock.advance(TimeDelta::minutes(4));
        let cached = index.list_items(&repository()).await;
        assert!(cached.from_cache);
        assert_eq!(cached.items.len(), 2);
        assert_eq!(fetcher.call_count(), 2);

        clock.advance(TimeDelta::minutes(2));
        let fresh = index.list_items(&repository()).await;
        assert!(!fresh.from_cache);
        assert_eq!(fetcher.call_count(), 4);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let fetcher = Arc::new(FakeFetcher::default().route(AGENTS_URL, agents_body()));
        let index = ContentIndex::new(fetcher.clone(), Duration::from_secs(300));

        index.list_items(&repository()).await;
        index.invalidate(&repository());
        let listing = index.list_items(&repository()).await;

        assert!(!listing.from_cache);
        assert_eq!(fetcher.call_count(), 4);
    }

    #[tokio::test]
    async fn auth_failure_escalates_once_then_reports_auth_required() {
        let fetcher = Arc::new(
            FakeFetcher::default().route(AGENTS_URL, FetchResponse::new(401, "")),
        );
        let index = ContentIndex::new(fetcher.clone(), Duration::from_secs(300));
        let repository = repository().with_paths([(Category::Agents, "agents".to_string())]);

        let listing = index.list_items(&repository).await;

        assert_eq!(listing.failures.len(), 1);
        assert!(listing.failures[0].error.contains("Authorization required"));
        let modes: Vec<_> = fetcher.calls.lock().unwrap().iter().map(|(_, m)| *m).collect();
        assert_eq!(modes, [AuthMode::Silent, AuthMode::Interactive]);
    }

    #[tokio::test]
    async fn download_not_found_is_an_error() {
        let fetcher = Arc::new(
            FakeFetcher::default().route("https://raw.example/a", FetchResponse::new(200, "body")),
        );
        let index = ContentIndex::new(fetcher, Duration::from_secs(300));
        let item = |url: &str| RepositoryItem {
            name: "a.agent.md".to_string(),
            category: Category::Agents,
            title: "A".to_string(),
            raw_content_url: url.to_string(),
            source_repository_name: "Acme".to_string(),
            source_repository_url: "https://github.com/acme/prompts".to_string(),
        };

        assert_eq!(
            index.download_content(&item("https://raw.example/a")).await.unwrap(),
            "body"
        );
        assert!(matches!(
            index.download_content(&item("https://raw.example/missing")).await,
            Err(IndexError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn same_named_repositories_are_cached_separately() {
        let other_agents = "https://api.github.com/repos/acme/other/contents/agents?ref=main";
        let fetcher = Arc::new(
            FakeFetcher::default()
                .route(AGENTS_URL, agents_body())
                .route(
                    other_agents,
                    FetchResponse::new(
                        200,
                        r#"[{"name": "other.agent.md", "path": "agents/other.agent.md",
                             "type": "file", "download_url": "https://raw.example/other.agent.md"}]"#,
                    ),
                ),
        );
        let index = ContentIndex::new(fetcher, Duration::from_secs(300));
        let first = repository().with_paths([(Category::Agents, "agents".to_string())]);
        let second = RepositoryConfig::new("Acme", "https://github.com/acme/other")
            .with_branch("main")
            .with_paths([(Category::Agents, "agents".to_string())]);

        index.list_items(&first).await;
        let listing = index.list_items(&second).await;

        assert!(!listing.from_cache);
        let names: Vec<_> = listing.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["other.agent.md"]);
        assert!(index.list_items(&first).await.from_cache);
    }

    /// Answers 401 to silent requests and has no way to sign in.
    struct Anonymous;

    #[async_trait]
    impl Fetcher for Anonymous {
        async fn fetch(
            &self,
            _request: &FetchRequest,
            mode: AuthMode,
        ) -> Result<FetchResponse, FetchError> {
            match mode {
                AuthMode::Silent => Ok(FetchResponse::new(401, "")),
                AuthMode::Interactive => Err(FetchError::SignInUnavailable),
            }
        }
    }

    #[tokio::test]
    async fn download_without_sign_in_reports_auth_required() {
        let index = ContentIndex::new(Arc::new(Anonymous), Duration::from_secs(300));
        let item = RepositoryItem {
            name: "a.agent.md".to_string(),
            category: Category::Agents,
            title: "A".to_string(),
            raw_content_url: "https://raw.example/a".to_string(),
            source_repository_name: "Acme".to_string(),
            source_repository_url: "https://github.com/acme/prompts".to_string(),
        };

        assert!(matches!(
            index.download_content(&item).await,
            Err(IndexError::AuthRequired { .. })
        ));

        let repository = repository().with_paths([(Category::Agents, "agents".to_string())]);
        let listing = index.list_items(&repository).await;
        assert!(listing.failures[0].error.contains("Authorization required"));
    }

    #[tokio::test]
    async fn exhausted_rate_limit_is_not_an_auth_failure() {
        let fetcher = Arc::new(FakeFetcher::default().route(
            AGENTS_URL,
            FetchResponse::new(403, "")
                .with_header("x-ratelimit-remaining", "0")
                .with_header("x-ratelimit-reset", "1")
                .with_header("x-ratelimit-limit", "60"),
        ));
        let index = ContentIndex::new(fetcher.clone(), Duration::from_secs(300));
        let repository = repository().with_paths([(Category::Agents, "agents".to_string())]);

        let listing = index.list_items(&repository).await;

        assert!(listing.failures[0].error.contains("Rate limit exceeded"));
        let modes: Vec<_> = fetcher.calls.lock().unwrap().iter().map(|(_, m)| *m).collect();
        assert_eq!(modes, [AuthMode::Silent]);
    }
}

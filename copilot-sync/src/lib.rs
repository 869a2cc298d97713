#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod backup;
pub mod cache;
pub mod category;
pub mod clock;
pub mod config;
pub mod deploy;
pub mod fetch;
pub(crate) mod fsutil;
pub mod index;
pub mod merge;
pub mod notify;
pub mod rate_limit;
pub mod tracker;
pub mod workspace;

pub use backup::{BackupEntry, BackupError, BackupManager, CleanupReport, TreeCopier};
pub use cache::TtlCache;
pub use category::Category;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, RepositoryConfig, SyncConfig};
pub use deploy::{
    CategoryCounts, ConfigFileReport, ConfigFileStatus, DeployError, Deployer, DeploymentSummary,
    ItemOutcome, RestoreReport, SourceFailure, SyncOptions,
};
pub use fetch::{
    fetch_with_escalation, AuthMode, FetchError, FetchRequest, FetchResponse, Fetcher,
    GitHubFetcher, SignIn, TokenSignIn,
};
pub use index::{ContentIndex, IndexError, ListingFailure, RepositoryItem, RepositoryListing};
pub use merge::{merge, ConfigFileKind, MergeError, MergePlan};
pub use notify::{LogNotifier, NotificationLevel, Notifier};
pub use rate_limit::RateLimitInfo;
pub use tracker::{scan, InstalledItemTracker, InstalledItems};
pub use workspace::{DiscoveredWorkspace, FixedWorkspace, WorkspaceError, WorkspaceResolver};

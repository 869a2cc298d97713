//! Deployment orchestration.
//!
//! A [`Deployer`] ties the other components together for one workspace:
//! list remote items, decide per item whether anything needs writing,
//! snapshot directories before overwriting them, write, and reconcile the
//! managed config files. Failures are folded into a [`DeploymentSummary`];
//! only an unusable workspace or configuration, and failed restores, are
//! returned as errors.

mod error;
mod outcome;
mod summary;

pub use error::DeployError;
pub use outcome::{ConfigFileReport, ConfigFileStatus, ItemOutcome, SourceFailure};
pub use summary::{CategoryCounts, DeploymentSummary};

use crate::backup::{BackupEntry, BackupManager, CleanupReport};
use crate::category::Category;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::fetch::Fetcher;
use crate::fsutil::write_atomic;
use crate::index::{ContentIndex, RepositoryItem, RepositoryListing};
use crate::merge::{
    load_templates, ConfigFileKind, ConfigTemplates, ExistingDocument, MergePlan, VSCODE_DIR,
};
use crate::notify::{NotificationLevel, Notifier};
use crate::tracker::{category_dir, InstalledItemTracker, InstalledItems, MANAGED_ROOT};
use crate::workspace::WorkspaceResolver;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Options for a sync or install pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Plan only: download and compare, but write nothing.
    pub dry_run: bool,

    /// Drop cached listings before listing.
    pub refresh: bool,
}

/// Result of restoring a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Category that was restored.
    pub category: Category,

    /// Backup that was restored.
    pub restored: String,

    /// Snapshot of the directory as it was before the restore, if it existed.
    pub safety_backup: Option<String>,
}

/// Orchestrates syncs, installs and backups for one workspace.
pub struct Deployer {
    root: PathBuf,
    config: SyncConfig,
    fetcher: Arc<dyn Fetcher>,
    index: ContentIndex,
    tracker: InstalledItemTracker,
    backups: BackupManager,
    templates: ConfigTemplates,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Deployer {
    /// Builds a deployer for the workspace supplied by `workspace`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Workspace`] if no workspace is open, or
    /// [`DeployError::Config`] if a template override can't be loaded.
    pub fn new(
        workspace: &dyn WorkspaceResolver,
        config: SyncConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, DeployError> {
        let root = workspace.resolve()?;
        let templates = load_templates(&config.templates)?;
        let index = ContentIndex::new(fetcher.clone(), ttl(&config));
        info!(root = %root.display(), "Using workspace");

        Ok(Self {
            tracker: InstalledItemTracker::new(&root),
            root,
            config,
            fetcher,
            index,
            backups: BackupManager::new(),
            templates,
            notifier: None,
        })
    }

    /// Uses `clock` for listing expiry and backup ids/retention.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.index =
            ContentIndex::with_clock(self.fetcher.clone(), ttl(&self.config), clock.clone());
        self.backups = std::mem::take(&mut self.backups).with_clock(clock);
        self
    }

    /// Replaces the backup manager.
    #[must_use]
    pub fn with_backup_manager(mut self, backups: BackupManager) -> Self {
        self.backups = backups;
        self
    }

    /// Sends pass results to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Lists every enabled repository.
    pub async fn list(&self, refresh: bool) -> Vec<RepositoryListing> {
        let repositories = self.config.enabled_repositories();
        if refresh {
            for repository in &repositories {
                self.index.invalidate(repository);
            }
        }
        self.index.list_all(&repositories).await
    }

    /// Installs every item from every enabled repository.
    ///
    /// # Errors
    ///
    /// Never fails for item, listing or config file problems; those are in
    /// the summary. The `Result` is kept for parity with the other passes.
    pub async fn sync(&self, options: SyncOptions) -> Result<DeploymentSummary, DeployError> {
        let span = info_span!("sync", dry_run = options.dry_run);
        async {
            let listings = self.list(options.refresh).await;
            let mut summary = DeploymentSummary::new(options.dry_run);
            let items = collect_items(&listings, &mut summary);

            info!(count = items.len(), "Deploying items");
            self.deploy(items, options.dry_run, &mut summary).await;
            self.reconcile_config_files(options.dry_run, &mut summary);
            self.notify_summary("Sync", &summary);
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Installs only the selected `(category, filename)` pairs.
    ///
    /// Selections not offered by any enabled repository are recorded as
    /// failed items.
    ///
    /// # Errors
    ///
    /// See [`Deployer::sync`].
    pub async fn install_items(
        &self,
        selection: &[(Category, String)],
        options: SyncOptions,
    ) -> Result<DeploymentSummary, DeployError> {
        let span = info_span!("install", count = selection.len(), dry_run = options.dry_run);
        async {
            let listings = self.list(options.refresh).await;
            let mut summary = DeploymentSummary::new(options.dry_run);
            let available = collect_items(&listings, &mut summary);

            let mut items = Vec::with_capacity(selection.len());
            let mut seen = HashSet::new();
            for (category, name) in selection {
                if !seen.insert((*category, name.as_str())) {
                    continue;
                }
                match available
                    .iter()
                    .find(|item| item.install_key() == (*category, name.as_str()))
                {
                    Some(item) => items.push(item.clone()),
                    None => {
                        warn!(%category, name = %name, "Item not offered by any repository");
                        summary.record_result(ItemOutcome::Failed {
                            category: *category,
                            name: name.clone(),
                            source: None,
                            error: "not found in any enabled repository".to_string(),
                        });
                    }
                }
            }

            self.deploy(items, options.dry_run, &mut summary).await;
            self.reconcile_config_files(options.dry_run, &mut summary);
            self.notify_summary("Install", &summary);
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Snapshots a category directory.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Backup`] if the copy fails.
    pub fn backup_category(&self, category: Category) -> Result<Option<String>, DeployError> {
        Ok(self.backups.backup(&category_dir(&self.root, category))?)
    }

    /// Backups of a category directory, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Backup`] if the managed directory can't be read.
    pub fn list_backups(&self, category: Category) -> Result<Vec<BackupEntry>, DeployError> {
        Ok(self.backups.list(&self.managed_root(), category.as_str())?)
    }

    /// Replaces a category directory with one of its backups.
    ///
    /// The current directory is snapshotted first, so the restore itself can
    /// be undone.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Backup`] if the snapshot or the restore fails.
    /// A failed restore has already been rolled back.
    pub fn restore_category(
        &self,
        category: Category,
        id: &str,
    ) -> Result<RestoreReport, DeployError> {
        let safety_backup = self.backup_category(category)?;
        if let Err(e) = self.backups.restore(&self.managed_root(), category.as_str(), id) {
            self.notify(NotificationLevel::Error, &format!("Restore of {category} failed: {e}"));
            return Err(e.into());
        }
        self.notify(
            NotificationLevel::Success,
            &format!("Restored {category} from backup {id}"),
        );
        Ok(RestoreReport {
            category,
            restored: id.to_string(),
            safety_backup,
        })
    }

    /// Applies the configured retention to every category directory and every
    /// managed config file.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Backup`] if backups can't be listed.
    pub fn cleanup_backups(&self) -> Result<BTreeMap<String, CleanupReport>, DeployError> {
        let days = self.config.backup_retention_days;
        let mut reports = BTreeMap::new();

        for category in Category::ALL {
            let report = self.backups.cleanup(&self.managed_root(), category.as_str(), days)?;
            reports.insert(category.as_str().to_string(), report);
        }
        let vscode = self.root.join(VSCODE_DIR);
        for kind in ConfigFileKind::ALL {
            let report = self.backups.cleanup(&vscode, kind.file_name(), days)?;
            reports.insert(kind.file_name().to_string(), report);
        }

        Ok(reports)
    }

    /// Current installed state.
    #[must_use]
    pub fn status(&self) -> InstalledItems {
        self.tracker.scan()
    }

    fn managed_root(&self) -> PathBuf {
        self.root.join(MANAGED_ROOT)
    }

    /// Downloads and compares every item concurrently, snapshots each
    /// category that is about to have a file replaced, then writes.
    async fn deploy(
        &self,
        items: Vec<RepositoryItem>,
        dry_run: bool,
        summary: &mut DeploymentSummary,
    ) {
        let prepared: Vec<Prepared> = stream::iter(items)
            .map(|item| self.prepare_item(item))
            .buffer_unordered(self.config.resolve_concurrency())
            .collect()
            .await;

        let mut writes = Vec::new();
        for prepared in prepared {
            match prepared {
                Prepared::Done(outcome) => summary.record_result(outcome),
                Prepared::Write(write) => writes.push(write),
            }
        }

        let snapshot_failures = if self.config.backup_before_overwrite && !dry_run {
            self.snapshot_replaced(&writes, summary)
        } else {
            BTreeMap::new()
        };

        for write in writes {
            let outcome = match snapshot_failures.get(&write.item.category) {
                Some(e) if write.replaced => {
                    write.failed(format!("backup before overwrite failed: {e}"))
                }
                _ => self.finish_item(write, dry_run),
            };
            summary.record_result(outcome);
        }
    }

    async fn prepare_item(&self, item: RepositoryItem) -> Prepared {
        let span = info_span!("item", category = %item.category, name = %item.name);
        async move {
            let content = match self.index.download_content(&item).await {
                Ok(content) => content,
                Err(e) => {
                    error!(error = %e, "Download failed");
                    return Prepared::Done(failed(&item, e.to_string()));
                }
            };

            let path = self.tracker.path_of(item.category, &item.name);
            let existing = match std::fs::read(&path) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to read installed file");
                    return Prepared::Done(failed(&item, e.to_string()));
                }
            };

            if existing.as_deref() == Some(content.as_bytes()) {
                debug!("Already up to date");
                return Prepared::Done(ItemOutcome::Unchanged {
                    category: item.category,
                    name: item.name.clone(),
                });
            }

            Prepared::Write(PendingWrite {
                replaced: existing.is_some(),
                item,
                path,
                content,
            })
        }
        .instrument(span)
        .await
    }

    /// Backs up each category with a pending replacement once, before any
    /// write of the pass. Returns the error for each category that failed.
    fn snapshot_replaced(
        &self,
        writes: &[PendingWrite],
        summary: &mut DeploymentSummary,
    ) -> BTreeMap<Category, String> {
        let categories: BTreeSet<Category> = writes
            .iter()
            .filter(|write| write.replaced)
            .map(|write| write.item.category)
            .collect();

        let mut failures = BTreeMap::new();
        for category in categories {
            match self.backups.backup(&category_dir(&self.root, category)) {
                Ok(Some(id)) => {
                    info!(%category, backup = %id, "Snapshotted before overwrite");
                    summary.backups.push((category, id));
                }
                Ok(None) => {}
                Err(e) => {
                    error!(%category, error = %e, "Backup before overwrite failed");
                    failures.insert(category, e.to_string());
                }
            }
        }
        failures
    }

    fn finish_item(&self, write: PendingWrite, dry_run: bool) -> ItemOutcome {
        let _span =
            info_span!("item", category = %write.item.category, name = %write.item.name).entered();
        if !dry_run {
            if let Err(e) = write_atomic(&write.path, write.content.as_bytes()) {
                error!(path = %write.path.display(), error = %e, "Write failed");
                return write.failed(e.to_string());
            }
        }

        info!(replaced = write.replaced, dry_run, "Installed");
        ItemOutcome::Installed {
            category: write.item.category,
            name: write.item.name,
            source: write.item.source_repository_name,
            replaced: write.replaced,
        }
    }

    fn reconcile_config_files(&self, dry_run: bool, summary: &mut DeploymentSummary) {
        for kind in ConfigFileKind::ALL {
            let status = self.reconcile_config_file(kind, dry_run);
            if let ConfigFileStatus::Failed { error } = &status {
                error!(file = %kind, error = %error, "Failed to reconcile config file");
            }
            summary.record_config_file(ConfigFileReport { kind, status });
        }
    }

    fn reconcile_config_file(&self, kind: ConfigFileKind, dry_run: bool) -> ConfigFileStatus {
        let plan = match MergePlan::prepare(&self.root, kind, self.templates.get(kind)) {
            Ok(plan) => plan,
            Err(e) => return ConfigFileStatus::Failed { error: e.to_string() },
        };

        if !plan.needs_write() {
            return ConfigFileStatus::Unchanged;
        }

        let status = match &plan.existing {
            ExistingDocument::Missing => ConfigFileStatus::Created,
            ExistingDocument::Valid(_) => ConfigFileStatus::Updated,
            ExistingDocument::Invalid { .. } => ConfigFileStatus::Replaced { backup: None },
        };
        if dry_run {
            return status;
        }

        let status = if plan.replaces_invalid() {
            match self.backups.backup(&plan.path) {
                Ok(backup) => {
                    self.notify(
                        NotificationLevel::Warning,
                        &format!("{kind} was not valid JSON and has been replaced by the template"),
                    );
                    ConfigFileStatus::Replaced { backup }
                }
                Err(e) => {
                    return ConfigFileStatus::Failed {
                        error: format!("backup of malformed file failed: {e}"),
                    }
                }
            }
        } else {
            status
        };

        match plan.apply() {
            Ok(()) => {
                info!(file = %kind, "Reconciled config file");
                status
            }
            Err(e) => ConfigFileStatus::Failed { error: e.to_string() },
        }
    }

    fn notify_summary(&self, operation: &str, summary: &DeploymentSummary) {
        let verb = if summary.dry_run { "would install" } else { "installed" };
        let message = format!(
            "{operation}: {verb} {}, {} unchanged, {} failed",
            summary.installed, summary.unchanged, summary.failed
        );
        let level = if summary.all_success() {
            NotificationLevel::Success
        } else if summary.installed > 0 || summary.unchanged > 0 {
            NotificationLevel::Warning
        } else {
            NotificationLevel::Error
        };
        self.notify(level, &message);
    }

    fn notify(&self, level: NotificationLevel, message: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(level, message);
        }
    }
}

fn ttl(config: &SyncConfig) -> Duration {
    Duration::from_secs(config.cache_ttl_secs)
}

/// Flattens listings into one item per `(category, filename)`.
///
/// Repositories are visited in configured order; the first to offer a
/// filename wins. Listing failures are recorded in `summary`.
fn collect_items(
    listings: &[RepositoryListing],
    summary: &mut DeploymentSummary,
) -> Vec<RepositoryItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for listing in listings {
        for failure in &listing.failures {
            summary.record_source_failure(SourceFailure {
                repository: listing.repository_name.clone(),
                category: failure.category,
                error: failure.error.clone(),
            });
        }
        for item in &listing.items {
            if seen.insert((item.category, item.name.clone())) {
                items.push(item.clone());
            } else {
                debug!(
                    repository = %listing.repository_name,
                    category = %item.category,
                    name = %item.name,
                    "Skipping duplicate item"
                );
                summary.duplicates_skipped += 1;
            }
        }
    }

    items
}

fn failed(item: &RepositoryItem, error: String) -> ItemOutcome {
    ItemOutcome::Failed {
        category: item.category,
        name: item.name.clone(),
        source: Some(item.source_repository_name.clone()),
        error,
    }
}

/// An item after download and comparison.
enum Prepared {
    /// Nothing left to do.
    Done(ItemOutcome),
    /// The file differs from what is installed.
    Write(PendingWrite),
}

struct PendingWrite {
    item: RepositoryItem,
    path: PathBuf,
    content: String,
    replaced: bool,
}

impl PendingWrite {
    fn failed(&self, error: String) -> ItemOutcome {
        failed(&self.item, error)
    }
}

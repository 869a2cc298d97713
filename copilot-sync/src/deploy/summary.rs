//! Deployment summary.

use super::outcome::{ConfigFileReport, ConfigFileStatus, ItemOutcome, SourceFailure};
use crate::category::Category;
use std::collections::BTreeMap;

/// Counts for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    /// Files written.
    pub installed: usize,
    /// Files already up to date.
    pub unchanged: usize,
    /// Items or listings that failed.
    pub failed: usize,
}

/// Summary of a sync or install pass.
#[derive(Debug, Clone, Default)]
pub struct DeploymentSummary {
    /// Number of files written.
    pub installed: usize,

    /// Number of files already byte-identical.
    pub unchanged: usize,

    /// Number of failed items plus failed (repository, category) listings.
    pub failed: usize,

    /// Items listed by more than one repository and skipped after the first.
    pub duplicates_skipped: usize,

    /// Breakdown per category.
    pub per_category: BTreeMap<Category, CategoryCounts>,

    /// Every item outcome, in completion order.
    pub items: Vec<ItemOutcome>,

    /// Listings that failed.
    pub source_failures: Vec<SourceFailure>,

    /// Managed config file outcomes.
    pub config_files: Vec<ConfigFileReport>,

    /// Category snapshots taken before overwriting, as (category, backup id).
    pub backups: Vec<(Category, String)>,

    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl DeploymentSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Updates the summary with an item outcome.
    pub fn record_result(&mut self, outcome: ItemOutcome) {
        let counts = self.per_category.entry(outcome.category()).or_default();
        match &outcome {
            ItemOutcome::Installed { .. } => {
                self.installed += 1;
                counts.installed += 1;
            }
            ItemOutcome::Unchanged { .. } => {
                self.unchanged += 1;
                counts.unchanged += 1;
            }
            ItemOutcome::Failed { .. } => {
                self.failed += 1;
                counts.failed += 1;
            }
        }
        self.items.push(outcome);
    }

    /// Records a listing that failed.
    pub fn record_source_failure(&mut self, failure: SourceFailure) {
        self.failed += 1;
        self.per_category.entry(failure.category).or_default().failed += 1;
        self.source_failures.push(failure);
    }

    /// Records a config file outcome.
    pub fn record_config_file(&mut self, report: ConfigFileReport) {
        self.config_files.push(report);
    }

    /// Number of config files that failed to reconcile.
    #[must_use]
    pub fn config_failures(&self) -> usize {
        self.config_files
            .iter()
            .filter(|report| matches!(report.status, ConfigFileStatus::Failed { .. }))
            .count()
    }

    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.config_failures() > 0
    }

    /// Returns true if all operations were successful.
    #[must_use]
    pub fn all_success(&self) -> bool {
        !self.has_failures()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConfigFileKind;

    #[test]
    fn can_record_result() {
        let mut summary = DeploymentSummary::new(false);

        summary.record_result(ItemOutcome::Installed {
            category: Category::Agents,
            name: "a.agent.md".to_string(),
            source: "Acme".to_string(),
            replaced: false,
        });
        summary.record_result(ItemOutcome::Unchanged {
            category: Category::Agents,
            name: "b.agent.md".to_string(),
        });

        assert_eq!(summary.installed, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(
            summary.per_category[&Category::Agents],
            CategoryCounts {
                installed: 1,
                unchanged: 1,
                failed: 0
            }
        );
        assert!(summary.all_success());
    }

    #[test]
    fn source_failures_count_as_failed() {
        let mut summary = DeploymentSummary::new(false);

        summary.record_source_failure(SourceFailure {
            repository: "Down".to_string(),
            category: Category::Prompts,
            error: "Network failure".to_string(),
        });

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.per_category[&Category::Prompts].failed, 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn config_failures_are_failures() {
        let mut summary = DeploymentSummary::new(false);

        summary.record_config_file(ConfigFileReport {
            kind: ConfigFileKind::Mcp,
            status: ConfigFileStatus::Failed {
                error: "denied".to_string(),
            },
        });

        assert_eq!(summary.failed, 0);
        assert!(summary.has_failures());
    }
}

//! Directory snapshots and transactional restore.
//!
//! A backup of `<root>/<name>` is a full copy stored next to it as
//! `<root>/<name>.backup-<timestamp>`, where the timestamp is UTC with the
//! colons removed (`2026-01-31T094512.123Z`). Backup ids are those
//! timestamps; they sort chronologically as strings.
//!
//! Restoring goes through a temporary snapshot at `<root>/<name>.temp` so the
//! live directory always ends up either untouched or fully restored.

mod error;

pub use error::BackupError;

use crate::clock::{Clock, SystemClock};
use crate::fsutil::{copy_dir_all, remove_dir_if_exists};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Separator between a target name and a backup id.
pub const BACKUP_MARKER: &str = ".backup-";

/// Suffix of the transient snapshot used while restoring.
pub const TEMP_SUFFIX: &str = ".temp";

const ID_FORMAT: &str = "%Y-%m-%dT%H%M%S%.3fZ";

/// Copies directory trees.
pub trait TreeCopier: Send + Sync {
    /// Recursively copies `source` to `destination`, creating it.
    fn copy_tree(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

/// Plain recursive copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCopier;

impl TreeCopier for FsCopier {
    fn copy_tree(&self, source: &Path, destination: &Path) -> io::Result<()> {
        copy_dir_all(source, destination)
    }
}

/// One backup found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    /// Backup id (timestamp suffix).
    pub id: String,

    /// Location of the backup.
    pub path: PathBuf,

    /// Last modification time, if the filesystem reports one.
    pub modified: Option<DateTime<Utc>>,
}

/// Result of a retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Ids that were deleted.
    pub removed: Vec<String>,

    /// Ids that were due for deletion but could not be removed, with the error.
    pub failed: Vec<(String, String)>,
}

/// Creates, lists, restores and prunes backups.
pub struct BackupManager {
    clock: Arc<dyn Clock>,
    copier: Arc<dyn TreeCopier>,
}

impl Default for BackupManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupManager {
    /// Creates a manager using the system clock and a plain copier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            copier: Arc::new(FsCopier),
        }
    }

    /// Replaces the clock used for ids and retention.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the tree copier.
    #[must_use]
    pub fn with_copier(mut self, copier: Arc<dyn TreeCopier>) -> Self {
        self.copier = copier;
        self
    }

    /// Snapshots the file or directory at `path` next to itself.
    ///
    /// Returns `None` without doing anything when `path` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError`] if the copy fails. A partial copy is removed.
    pub fn backup(&self, path: &Path) -> Result<Option<String>, BackupError> {
        if !path.exists() {
            debug!(path = %path.display(), "Nothing to back up");
            return Ok(None);
        }

        let (parent, name) = split_target(path)?;
        let base_id = self.clock.now().format(ID_FORMAT).to_string();

        let mut id = base_id.clone();
        let mut attempt = 0;
        while backup_path(parent, name, &id).exists() {
            attempt += 1;
            id = format!("{base_id}-{attempt}");
        }
        let destination = backup_path(parent, name, &id);

        let result = if path.is_dir() {
            self.copier.copy_tree(path, &destination)
        } else {
            std::fs::copy(path, &destination).map(|_| ())
        };

        if let Err(e) = result {
            if let Err(cleanup) = remove_path(&destination) {
                warn!(
                    path = %destination.display(),
                    error = %cleanup,
                    "Failed to remove partial backup"
                );
            }
            return Err(BackupError::io(&destination, e));
        }

        info!(path = %path.display(), id = %id, "Created backup");
        Ok(Some(id))
    }

    /// Replaces `<root>/<target>` with the backup `id`.
    ///
    /// The live directory is first copied to `<target>.temp`. Only then is it
    /// deleted and the backup copied in. If that fails, the partial directory
    /// is removed and the snapshot copied back.
    ///
    /// # Errors
    ///
    /// - [`BackupError::NotFound`] if the backup does not exist
    /// - [`BackupError::Io`] if the snapshot could not be taken (live untouched)
    /// - [`BackupError::RestoreFailed`] if the restore failed but was rolled back
    /// - [`BackupError::RollbackFailed`] if the rollback failed too; the
    ///   snapshot is left in place
    pub fn restore(&self, root: &Path, target: &str, id: &str) -> Result<(), BackupError> {
        validate_name("target name", target)?;
        validate_name("backup id", id)?;

        let source = backup_path(root, target, id);
        if !source.is_dir() {
            return Err(BackupError::NotFound {
                target: target.to_string(),
                id: id.to_string(),
            });
        }

        let live = root.join(target);
        let snapshot = root.join(format!("{target}{TEMP_SUFFIX}"));
        remove_dir_if_exists(&snapshot).map_err(|e| BackupError::io(&snapshot, e))?;

        let had_live = live.exists();
        if had_live {
            if let Err(e) = self.copier.copy_tree(&live, &snapshot) {
                if let Err(cleanup) = remove_dir_if_exists(&snapshot) {
                    warn!(
                        path = %snapshot.display(),
                        error = %cleanup,
                        "Failed to remove partial snapshot"
                    );
                }
                return Err(BackupError::io(&snapshot, e));
            }
        }

        let replaced =
            remove_dir_if_exists(&live).and_then(|()| self.copier.copy_tree(&source, &live));

        match replaced {
            Ok(()) => {
                if let Err(e) = remove_dir_if_exists(&snapshot) {
                    warn!(
                        path = %snapshot.display(),
                        error = %e,
                        "Failed to remove restore snapshot"
                    );
                }
                info!(dir = %target, id = %id, "Restored backup");
                Ok(())
            }
            Err(source) => {
                warn!(dir = %target, id = %id, error = %source, "Restore failed, rolling back");
                match self.roll_back(&live, &snapshot, had_live) {
                    Ok(()) => Err(BackupError::RestoreFailed {
                        target: target.to_string(),
                        source,
                    }),
                    Err(rollback) => {
                        error!(dir = %target, error = %rollback, "Rollback failed");
                        Err(BackupError::RollbackFailed {
                            target: target.to_string(),
                            snapshot: snapshot.display().to_string(),
                            source: rollback,
                        })
                    }
                }
            }
        }
    }

    fn roll_back(&self, live: &Path, snapshot: &Path, had_live: bool) -> io::Result<()> {
        remove_dir_if_exists(live)?;
        if had_live {
            self.copier.copy_tree(snapshot, live)?;
            remove_dir_if_exists(snapshot)?;
        }
        Ok(())
    }

    /// Backups of `<root>/<target>`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Io`] if `root` can't be read. A missing root
    /// lists as empty.
    pub fn list(&self, root: &Path, target: &str) -> Result<Vec<BackupEntry>, BackupError> {
        validate_name("target name", target)?;

        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackupError::io(root, e)),
        };

        let prefix = format!("{target}{BACKUP_MARKER}");
        let mut backups: Vec<BackupEntry> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let id = name.strip_prefix(&prefix)?;
                if id.is_empty() {
                    return None;
                }
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Utc>::from);
                Some(BackupEntry {
                    id: id.to_string(),
                    path: entry.path(),
                    modified,
                })
            })
            .collect();

        backups.sort_by(|a, b| id_order(&b.id).cmp(&id_order(&a.id)));
        Ok(backups)
    }

    /// Deletes backups of `<root>/<target>` modified more than
    /// `retention_days` ago.
    ///
    /// Failure to delete one backup is logged and does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Io`] only if the backups can't be listed.
    pub fn cleanup(
        &self,
        root: &Path,
        target: &str,
        retention_days: u32,
    ) -> Result<CleanupReport, BackupError> {
        let cutoff = self.clock.now() - TimeDelta::days(i64::from(retention_days));
        let mut report = CleanupReport::default();

        for entry in self.list(root, target)? {
            let Some(modified) = entry.modified else {
                debug!(id = %entry.id, "Backup has no modification time, keeping");
                continue;
            };
            if modified >= cutoff {
                continue;
            }
            match remove_path(&entry.path) {
                Ok(()) => {
                    info!(dir = %target, id = %entry.id, "Removed expired backup");
                    report.removed.push(entry.id);
                }
                Err(e) => {
                    warn!(
                        path = %entry.path.display(),
                        error = %e,
                        "Failed to remove expired backup"
                    );
                    report.failed.push((entry.id, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

/// Path of backup `id` of `<root>/<target>`.
#[must_use]
pub fn backup_path(root: &Path, target: &str, id: &str) -> PathBuf {
    root.join(format!("{target}{BACKUP_MARKER}{id}"))
}

/// Splits an id into its timestamp and collision counter so `-10` sorts
/// after `-9`.
fn id_order(id: &str) -> (&str, u32) {
    id.rsplit_once('-')
        .filter(|(base, _)| base.ends_with('Z'))
        .and_then(|(base, n)| Some((base, n.parse().ok()?)))
        .unwrap_or((id, 0))
}

fn split_target(path: &Path) -> Result<(&Path, &str), BackupError> {
    let invalid = || BackupError::InvalidName {
        what: "backup source",
        value: path.display().to_string(),
    };
    let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
    let parent = path.parent().ok_or_else(invalid)?;
    Ok((parent, name))
}

fn validate_name(what: &'static str, value: &str) -> Result<(), BackupError> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(BackupError::InvalidName {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn remove_path(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        remove_dir_if_exists(path)
    } else {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn write_tree(dir: &Path, files: &[(&str, &str)]) {
        for (name, contents) in files {
            let path = dir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
    }

    fn read_tree(dir: &Path) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        for entry in fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let name = entry.file_name().into_string().unwrap();
            if entry.file_type().unwrap().is_dir() {
                for (child, contents) in read_tree(&entry.path()) {
                    files.insert(format!("{name}/{child}"), contents);
                }
            } else {
                files.insert(name, fs::read_to_string(entry.path()).unwrap());
            }
        }
        files
    }

    /// Copies normally until told to fail, then writes one file and errors.
    struct FailingCopier {
        fail_on_call: usize,
        calls: AtomicUsize,
    }

    impl TreeCopier for FailingCopier {
        fn copy_tree(&self, source: &Path, destination: &Path) -> io::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == self.fail_on_call {
                fs::create_dir_all(destination)?;
                fs::write(destination.join("partial.md"), "half")?;
                return Err(io::Error::other("disk full"));
            }
            copy_dir_all(source, destination)
        }
    }

    #[test]
    fn backup_of_missing_path_is_noop() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::new();

        assert_eq!(manager.backup(&temp.path().join("agents")).unwrap(), None);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn backup_copies_tree_and_lists_newest_first() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("agents");
        write_tree(&live, &[("a.agent.md", "A"), ("nested/b.md", "B")]);
        let clock = Arc::new(ManualClock::default());
        let manager = BackupManager::new().with_clock(clock.clone());

        let first = manager.backup(&live).unwrap().unwrap();
        clock.advance(TimeDelta::seconds(5));
        let second = manager.backup(&live).unwrap().unwrap();

        assert!(!first.contains(':'));
        assert_eq!(
            read_tree(&backup_path(temp.path(), "agents", &first)),
            read_tree(&live)
        );
        let ids: Vec<_> = manager
            .list(temp.path(), "agents")
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, [second, first]);
    }

    #[test]
    fn colliding_ids_get_a_counter() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("prompts");
        write_tree(&live, &[("p.prompt.md", "P")]);
        let manager = BackupManager::new().with_clock(Arc::new(ManualClock::default()));

        let first = manager.backup(&live).unwrap().unwrap();
        let second = manager.backup(&live).unwrap().unwrap();

        assert_eq!(second, format!("{first}-1"));
    }

    #[test]
    fn colliding_ids_list_in_counter_order() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("prompts");
        write_tree(&live, &[("p.prompt.md", "P")]);
        let manager = BackupManager::new().with_clock(Arc::new(ManualClock::default()));

        let mut created: Vec<String> = (0..12)
            .map(|_| manager.backup(&live).unwrap().unwrap())
            .collect();
        created.reverse();

        let ids: Vec<_> = manager
            .list(temp.path(), "prompts")
            .unwrap()
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(ids, created);
        assert!(ids[1].ends_with("-10"));
    }

    #[test]
    fn backs_up_single_files() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("settings.json");
        fs::write(&file, "{ broken").unwrap();

        let id = BackupManager::new().backup(&file).unwrap().unwrap();

        assert_eq!(
            fs::read_to_string(backup_path(temp.path(), "settings.json", &id)).unwrap(),
            "{ broken"
        );
    }

    #[test]
    fn restore_replaces_live_directory() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("agents");
        write_tree(&live, &[("old.agent.md", "old")]);
        let manager = BackupManager::new();
        let id = manager.backup(&live).unwrap().unwrap();

        fs::remove_file(live.join("old.agent.md")).unwrap();
        write_tree(&live, &[("new.agent.md", "new")]);
        manager.restore(temp.path(), "agents", &id).unwrap();

        assert_eq!(
            read_tree(&live),
            BTreeMap::from([("old.agent.md".to_string(), "old".to_string())])
        );
        assert!(!temp.path().join("agents.temp").exists());
    }

    #[test]
    fn failed_restore_rolls_back_to_previous_contents() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("agents");
        write_tree(&live, &[("backed-up.agent.md", "v1")]);
        let id = BackupManager::new().backup(&live).unwrap().unwrap();

        fs::remove_file(live.join("backed-up.agent.md")).unwrap();
        write_tree(&live, &[("current.agent.md", "v2"), ("deep/x.md", "x")]);
        let before = read_tree(&live);

        // Call 0 takes the snapshot, call 1 copies the backup in.
        let manager = BackupManager::new().with_copier(Arc::new(FailingCopier {
            fail_on_call: 1,
            calls: AtomicUsize::new(0),
        }));
        let result = manager.restore(temp.path(), "agents", &id);

        assert!(matches!(result, Err(BackupError::RestoreFailed { .. })));
        assert_eq!(read_tree(&live), before);
        assert!(!temp.path().join("agents.temp").exists());
    }

    #[test]
    fn failed_snapshot_leaves_live_untouched() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("agents");
        write_tree(&live, &[("a.agent.md", "A")]);
        let id = BackupManager::new().backup(&live).unwrap().unwrap();
        write_tree(&live, &[("b.agent.md", "B")]);
        let before = read_tree(&live);

        let manager = BackupManager::new().with_copier(Arc::new(FailingCopier {
            fail_on_call: 0,
            calls: AtomicUsize::new(0),
        }));
        let result = manager.restore(temp.path(), "agents", &id);

        assert!(matches!(result, Err(BackupError::Io { .. })));
        assert_eq!(read_tree(&live), before);
        assert!(!temp.path().join("agents.temp").exists());
    }

    #[test]
    fn failed_rollback_keeps_snapshot() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("agents");
        write_tree(&live, &[("a.agent.md", "A")]);
        let id = BackupManager::new().backup(&live).unwrap().unwrap();

        // Restore copy fails, then the rollback copy fails too.
        struct FailAfterSnapshot(AtomicUsize);
        impl TreeCopier for FailAfterSnapshot {
            fn copy_tree(&self, source: &Path, destination: &Path) -> io::Result<()> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    copy_dir_all(source, destination)
                } else {
                    Err(io::Error::other("io error"))
                }
            }
        }
        let manager =
            BackupManager::new().with_copier(Arc::new(FailAfterSnapshot(AtomicUsize::new(0))));

        let result = manager.restore(temp.path(), "agents", &id);

        assert!(matches!(result, Err(BackupError::RollbackFailed { .. })));
        assert_eq!(
            read_tree(&temp.path().join("agents.temp")),
            BTreeMap::from([("a.agent.md".to_string(), "A".to_string())])
        );
    }

    #[test]
    fn restore_unknown_backup_fails() {
        let temp = TempDir::new().unwrap();
        let result = BackupManager::new().restore(temp.path(), "agents", "2020-01-01T000000.000Z");
        assert!(matches!(result, Err(BackupError::NotFound { .. })));

        let result = BackupManager::new().restore(temp.path(), "agents", "../etc");
        assert!(matches!(result, Err(BackupError::InvalidName { .. })));
    }

    #[test]
    fn cleanup_removes_only_expired_backups() {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("instructions");
        write_tree(&live, &[("r.instructions.md", "R")]);
        let clock = Arc::new(ManualClock::default());
        let manager = BackupManager::new().with_clock(clock.clone());
        let id = manager.backup(&live).unwrap().unwrap();

        let report = manager.cleanup(temp.path(), "instructions", 7).unwrap();
        assert!(report.removed.is_empty());

        clock.advance(TimeDelta::days(8));
        let report = manager.cleanup(temp.path(), "instructions", 7).unwrap();

        assert_eq!(report.removed, [id]);
        assert!(manager.list(temp.path(), "instructions").unwrap().is_empty());
        assert!(live.exists());
    }
}

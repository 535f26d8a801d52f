//! Version-control status snapshots and the classifier that diffs two consecutive polls.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitStatus {
    #[default]
    Modified,
    Untracked,
    Deleted,
}

impl GitStatus {
    fn is_modified(&self) -> bool {
        *self == GitStatus::Modified
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GitStat {
    #[serde(default, skip_serializing_if = "GitStatus::is_modified")]
    pub status: GitStatus,
    #[serde(default)]
    pub added: u64,
    #[serde(default)]
    pub deleted: u64,
}

impl GitStat {
    pub fn modified(added: u64, deleted: u64) -> Self {
        Self {
            status: GitStatus::Modified,
            added,
            deleted,
        }
    }

    pub fn untracked(lines: u64) -> Self {
        Self {
            status: GitStatus::Untracked,
            added: lines,
            deleted: 0,
        }
    }

    pub fn deleted(lines: u64) -> Self {
        Self {
            status: GitStatus::Deleted,
            added: 0,
            deleted: lines,
        }
    }

    fn counts(&self) -> (u64, u64) {
        (self.added, self.deleted)
    }
}

pub type GitSnapshot = BTreeMap<String, GitStat>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub path: String,
    pub stat: Option<GitStat>,
}

impl ChangedPath {
    fn with_stat(path: &str, stat: GitStat) -> Self {
        Self {
            path: path.to_string(),
            stat: Some(stat),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub new_untracked: Vec<ChangedPath>,
    pub new_deleted: Vec<ChangedPath>,
    pub no_longer_untracked: Vec<ChangedPath>,
    pub files_modified: Vec<ChangedPath>,
    /// Structural change only; line-count edits in `files_modified` never set this.
    pub has_changes: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.new_untracked.is_empty()
            && self.new_deleted.is_empty()
            && self.no_longer_untracked.is_empty()
            && self.files_modified.is_empty()
    }

    pub fn untracked(paths: &[&str]) -> Self {
        Self {
            new_untracked: paths
                .iter()
                .map(|path| ChangedPath::with_stat(path, GitStat::untracked(0)))
                .collect(),
            has_changes: !paths.is_empty(),
            ..Self::default()
        }
    }
}

/// Diffs two consecutive snapshots.
///
/// An empty `previous` means there is no tree to patch yet, so nothing is reported.
pub fn classify(previous: &GitSnapshot, current: &GitSnapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();
    if previous.is_empty() {
        if !current.is_empty() {
            debug!(
                "initial status load ({} paths); skipping change detection",
                current.len()
            );
        }
        return changes;
    }

    for (path, stat) in current {
        let before = previous.get(path);
        match (stat.status, before) {
            (GitStatus::Untracked, None) => {
                changes.new_untracked.push(ChangedPath::with_stat(path, *stat));
            }
            (GitStatus::Deleted, Some(before)) if before.status != GitStatus::Deleted => {
                changes.new_deleted.push(ChangedPath::with_stat(path, *stat));
            }
            (GitStatus::Modified, Some(before)) if before.counts() != stat.counts() => {
                changes
                    .files_modified
                    .push(ChangedPath::with_stat(path, *stat));
            }
            _ => {}
        }
    }

    for (path, stat) in previous {
        let was_structural = matches!(stat.status, GitStatus::Untracked | GitStatus::Deleted);
        if was_structural && !current.contains_key(path) {
            changes.no_longer_untracked.push(ChangedPath {
                path: path.clone(),
                stat: None,
            });
        }
    }

    changes.has_changes = !changes.new_untracked.is_empty()
        || !changes.new_deleted.is_empty()
        || !changes.no_longer_untracked.is_empty();
    changes
}

pub fn snapshots_equal(lhs: &GitSnapshot, rhs: &GitSnapshot) -> bool {
    lhs == rhs
}

pub fn normalize_snapshot(raw: impl IntoIterator<Item = (String, GitStat)>) -> GitSnapshot {
    raw.into_iter()
        .map(|(path, stat)| (path::normalize(&path), stat))
        .collect()
}

#[derive(Debug, Default)]
pub struct GitObservation {
    pub changes: ChangeSet,
    /// Whether the badge snapshot differs from the one previously shown.
    pub snapshot_changed: bool,
}

/// Holds the reference snapshot between poll ticks.
#[derive(Debug, Default)]
pub struct GitTracker {
    previous: GitSnapshot,
    current: GitSnapshot,
}

impl GitTracker {
    pub fn current(&self) -> &GitSnapshot {
        &self.current
    }

    pub fn observe(&mut self, result: Result<GitSnapshot, BackendError>) -> GitObservation {
        match result {
            Ok(snapshot) => {
                let snapshot = normalize_snapshot(snapshot);
                let changes = classify(&self.previous, &snapshot);
                let snapshot_changed = !snapshots_equal(&self.current, &snapshot);
                if snapshot_changed {
                    self.current = snapshot.clone();
                }
                self.previous = snapshot;
                GitObservation {
                    changes,
                    snapshot_changed,
                }
            }
            Err(err) => {
                warn!("failed to load git stats: {err}");
                let snapshot_changed = !self.current.is_empty();
                self.reset();
                GitObservation {
                    changes: ChangeSet::default(),
                    snapshot_changed,
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.previous.clear();
        self.current.clear();
    }
}

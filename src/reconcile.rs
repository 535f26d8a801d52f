use crate::git::ChangeSet;

/// What the session does with one poll's change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Only additions: insert them into the existing tree.
    Patch,
    /// Deletions or reappearances: relist and rebuild.
    Reload,
    /// Line counts moved; refresh badges only.
    BadgesOnly,
    Nothing,
}

pub fn decide(changes: &ChangeSet) -> Reconcile {
    let additions_only = !changes.new_untracked.is_empty()
        && changes.new_deleted.is_empty()
        && changes.no_longer_untracked.is_empty();
    if additions_only {
        Reconcile::Patch
    } else if changes.has_changes {
        Reconcile::Reload
    } else if !changes.files_modified.is_empty() {
        Reconcile::BadgesOnly
    } else {
        Reconcile::Nothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{ChangedPath, GitStat};

    fn changed(path: &str) -> ChangedPath {
        ChangedPath {
            path: path.to_string(),
            stat: Some(GitStat::deleted(1)),
        }
    }

    #[test]
    fn additions_alone_patch() {
        assert_eq!(decide(&ChangeSet::untracked(&["/r/a"])), Reconcile::Patch);
    }

    #[test]
    fn additions_with_deletions_reload() {
        let mut changes = ChangeSet::untracked(&["/r/a"]);
        changes.new_deleted.push(changed("/r/b"));
        assert_eq!(decide(&changes), Reconcile::Reload);

        let mut changes = ChangeSet::untracked(&["/r/a"]);
        changes.no_longer_untracked.push(changed("/r/c"));
        assert_eq!(decide(&changes), Reconcile::Reload);
    }

    #[test]
    fn modifications_only_touch_badges() {
        let changes = ChangeSet {
            files_modified: vec![ChangedPath {
                path: "/r/m".into(),
                stat: Some(GitStat::modified(2, 1)),
            }],
            ..ChangeSet::default()
        };
        assert_eq!(decide(&changes), Reconcile::BadgesOnly);
        assert_eq!(decide(&ChangeSet::default()), Reconcile::Nothing);
    }
}

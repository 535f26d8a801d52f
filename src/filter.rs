//! Display projections over the canonical tree.
//!
//! Each filter maps a forest to a smaller forest and never touches its input, so the
//! session can chain them in any order.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::fs::Entry;
use crate::git::{GitSnapshot, GitStatus};
use crate::path;
use crate::tree::{Tree, TreeNode, collect_paths};

pub trait TreeFilter {
    fn apply(&self, tree: &[Arc<TreeNode>]) -> Tree;
}

pub fn apply_filters(tree: &[Arc<TreeNode>], filters: &[&dyn TreeFilter]) -> Tree {
    let mut current: Tree = tree.to_vec();
    for filter in filters {
        current = filter.apply(&current);
    }
    current
}

/// Keeps files with a status entry, synthesizing placeholders for deleted files.
pub struct GitFilter<'a> {
    snapshot: &'a GitSnapshot,
    root: Option<String>,
}

impl<'a> GitFilter<'a> {
    pub fn new(snapshot: &'a GitSnapshot) -> Self {
        Self {
            snapshot,
            root: None,
        }
    }

    /// Deleted files whose parent is `root` are appended at the top level.
    pub fn with_root(mut self, root: &str) -> Self {
        self.root = Some(path::normalize(root));
        self
    }
}

impl TreeFilter for GitFilter<'_> {
    fn apply(&self, tree: &[Arc<TreeNode>]) -> Tree {
        let root = self
            .root
            .clone()
            .or_else(|| tree.first().map(|node| node.entry.parent_path.clone()))
            .unwrap_or_default();
        filter_with_root(tree, self.snapshot, &root)
    }
}

/// Root is taken from the first node's parent, as the listing reports it.
pub fn filter_by_git_changes(tree: &[Arc<TreeNode>], snapshot: &GitSnapshot) -> Tree {
    GitFilter::new(snapshot).apply(tree)
}

fn filter_with_root(tree: &[Arc<TreeNode>], snapshot: &GitSnapshot, root: &str) -> Tree {
    let mut existing = HashSet::new();
    collect_paths(tree, &mut existing);

    let mut deleted_by_dir: BTreeMap<String, Vec<Arc<TreeNode>>> = BTreeMap::new();
    for (file_path, stat) in snapshot {
        if stat.status != GitStatus::Deleted || existing.contains(file_path) {
            continue;
        }
        let parent = path::parent_of(file_path).unwrap_or("").to_string();
        let placeholder = TreeNode::leaf(Entry::deleted_placeholder(file_path, &parent));
        deleted_by_dir
            .entry(parent)
            .or_default()
            .push(Arc::new(placeholder));
    }

    let mut result = filter_nodes(tree, snapshot, &deleted_by_dir);
    if let Some(at_root) = deleted_by_dir.get(root) {
        result.extend(at_root.iter().cloned());
    }
    result
}

fn filter_nodes(
    nodes: &[Arc<TreeNode>],
    snapshot: &GitSnapshot,
    deleted_by_dir: &BTreeMap<String, Vec<Arc<TreeNode>>>,
) -> Tree {
    nodes
        .iter()
        .filter_map(|node| {
            if node.is_dir() {
                let mut children = filter_nodes(node.children(), snapshot, deleted_by_dir);
                if let Some(deleted) = deleted_by_dir.get(node.path()) {
                    children.extend(deleted.iter().cloned());
                }
                (!children.is_empty()).then(|| Arc::new(node.with_children(children)))
            } else if snapshot.contains_key(node.path()) {
                Some(node.clone())
            } else {
                None
            }
        })
        .collect()
}

/// Keeps matched paths and their ancestor directories.
pub struct SearchFilter {
    matches: HashSet<String>,
    ancestors: HashSet<String>,
}

impl SearchFilter {
    pub fn new<I, S>(matches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matches: HashSet<String> = matches
            .into_iter()
            .map(|path| path::normalize(path.as_ref()))
            .collect();
        let ancestors = matches
            .iter()
            .flat_map(|path| path::ancestors_within(path, ""))
            .collect();
        Self { matches, ancestors }
    }

    pub fn from_entries(entries: &[Entry]) -> Self {
        Self::new(entries.iter().map(|entry| entry.path.as_str()))
    }
}

impl TreeFilter for SearchFilter {
    fn apply(&self, tree: &[Arc<TreeNode>]) -> Tree {
        self.filter_nodes(tree)
    }
}

impl SearchFilter {
    fn filter_nodes(&self, nodes: &[Arc<TreeNode>]) -> Tree {
        nodes
            .iter()
            .filter(|node| self.matches.contains(node.path()) || self.ancestors.contains(node.path()))
            .map(|node| match node.children.as_deref() {
                Some(children) => Arc::new(node.with_children(self.filter_nodes(children))),
                None => node.clone(),
            })
            .collect()
    }
}

pub fn filter_by_search(tree: &[Arc<TreeNode>], matches: &[Entry]) -> Tree {
    SearchFilter::from_entries(matches).apply(tree)
}

/// Directories to open so every match is visible.
pub fn expansion_for_matches(matches: &[Entry], root: &str) -> Vec<String> {
    let root = path::normalize(root);
    let mut seen = HashSet::new();
    let mut expand = Vec::new();
    for entry in matches {
        let entry_path = path::normalize(&entry.path);
        let mut candidates = path::ancestors_within(&entry_path, &root);
        if entry.is_dir {
            candidates.push(entry_path);
        }
        for candidate in candidates {
            if seen.insert(candidate.clone()) {
                expand.push(candidate);
            }
        }
    }
    expand
}

/// Appends deleted files directly inside `dir` to a single-level listing.
pub fn merge_deleted_into_listing(
    mut entries: Vec<Entry>,
    snapshot: &GitSnapshot,
    dir: &str,
) -> Vec<Entry> {
    let dir = path::normalize(dir);
    for (file_path, stat) in snapshot {
        if stat.status == GitStatus::Deleted && path::parent_of(file_path) == Some(dir.as_str()) {
            entries.push(Entry::deleted_placeholder(file_path, &dir));
        }
    }
    entries
}

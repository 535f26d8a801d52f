//! Cheap tree updates for newly untracked files.
//!
//! Only the ancestor chain of an inserted file is rebuilt; every other subtree keeps its
//! `Arc` so consumers comparing by pointer see it as unchanged.

use std::collections::HashSet;
use std::sync::Arc;

use log::trace;

use crate::fs::Entry;
use crate::git::ChangeSet;
use crate::path;
use crate::tree::{Tree, TreeNode, sort_nodes};

pub fn patch_tree(tree: &[Arc<TreeNode>], changes: &ChangeSet, root: &str) -> Tree {
    let root = path::normalize(root);
    let mut next: Tree = tree.to_vec();

    for change in &changes.new_untracked {
        let file_path = path::normalize(&change.path);
        if locate(&next, &file_path).is_some() {
            continue;
        }
        let Some(parent) = path::parent_of(&file_path).map(str::to_string) else {
            continue;
        };

        if parent == root {
            let node = TreeNode::new(Entry::new(&file_path, &parent, false, Some(0)));
            next.push(Arc::new(node));
            sort_nodes(&mut next);
            continue;
        }

        let node = Arc::new(TreeNode::new(Entry::new(&file_path, &parent, false, None)));
        match insert_under(&next, &parent, node) {
            Some(updated) => next = updated,
            None => trace!("no directory node for {parent}; skipping {file_path}"),
        }
    }

    next
}

/// Newly untracked paths under `root` that the patched tree still lacks.
///
/// These sit in directories the tree has never seen, so only a relist can place them.
pub fn unresolved_untracked(tree: &[Arc<TreeNode>], changes: &ChangeSet, root: &str) -> Vec<String> {
    let root = path::normalize(root);
    changes
        .new_untracked
        .iter()
        .map(|change| path::normalize(&change.path))
        .filter(|file_path| path::is_within(file_path, &root))
        .filter(|file_path| locate(tree, file_path).is_none())
        .collect()
}

/// Flat entries for newly untracked files not already in `existing`.
pub fn untracked_entries(changes: &ChangeSet, existing: &[Entry], root: &str) -> Vec<Entry> {
    let root = path::normalize(root);
    let known: HashSet<&str> = existing.iter().map(|entry| entry.path.as_str()).collect();
    let mut added = Vec::new();
    for change in &changes.new_untracked {
        let file_path = path::normalize(&change.path);
        if known.contains(file_path.as_str()) || added.iter().any(|e: &Entry| e.path == file_path)
        {
            continue;
        }
        let parent = path::parent_of(&file_path).unwrap_or("").to_string();
        let depth = (parent == root).then_some(0);
        added.push(Entry::new(&file_path, &parent, false, depth));
    }
    added
}

/// Walks only the branch whose path prefixes `target`.
fn locate<'a>(nodes: &'a [Arc<TreeNode>], target: &str) -> Option<&'a Arc<TreeNode>> {
    let mut level = nodes;
    loop {
        let next = level
            .iter()
            .find(|node| node.path() == target || path::is_within(target, node.path()))?;
        if next.path() == target {
            return Some(next);
        }
        level = next.children();
    }
}

fn insert_under(
    nodes: &[Arc<TreeNode>],
    parent: &str,
    child: Arc<TreeNode>,
) -> Option<Vec<Arc<TreeNode>>> {
    let index = nodes
        .iter()
        .position(|node| node.path() == parent || path::is_within(parent, node.path()))?;
    let node = &nodes[index];

    let children = if node.path() == parent {
        if !node.is_dir() {
            return None;
        }
        let mut children = node.children().to_vec();
        children.push(child);
        sort_nodes(&mut children);
        children
    } else {
        insert_under(node.children(), parent, child)?
    };

    let mut level = nodes.to_vec();
    level[index] = Arc::new(node.with_children(children));
    Some(level)
}

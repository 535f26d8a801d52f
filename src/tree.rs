use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::trace;
use serde::Serialize;

use crate::fs::Entry;
use crate::path;
use crate::selection::ExpandedFolders;

pub type Tree = Vec<Arc<TreeNode>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub entry: Entry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Arc<TreeNode>>>,
}

#[derive(Debug, Clone)]
pub struct VisibleRow {
    pub depth: usize,
    pub node: Arc<TreeNode>,
}

impl TreeNode {
    pub fn new(entry: Entry) -> Self {
        let children = entry.is_dir.then(Vec::new);
        Self { entry, children }
    }

    pub fn leaf(entry: Entry) -> Self {
        Self {
            entry,
            children: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn is_dir(&self) -> bool {
        self.entry.is_dir
    }

    pub fn children(&self) -> &[Arc<TreeNode>] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn with_children(&self, children: Vec<Arc<TreeNode>>) -> Self {
        Self {
            entry: self.entry.clone(),
            children: Some(children),
        }
    }
}

struct PendingNode {
    entry: Entry,
    children: Vec<usize>,
}

/// Builds the canonical forest for `root` from a flat listing.
///
/// Entries whose parent never shows up in the listing are dropped. Duplicate paths keep the
/// last entry seen.
pub fn build_tree(entries: &[Entry], root: &str) -> Tree {
    let root = path::normalize(root);
    let mut slots: Vec<PendingNode> = Vec::with_capacity(entries.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(entries.len());

    for entry in entries {
        let entry = entry.clone().normalized();
        match index.get(&entry.path) {
            Some(&slot) => slots[slot].entry = entry,
            None => {
                index.insert(entry.path.clone(), slots.len());
                slots.push(PendingNode {
                    entry,
                    children: Vec::new(),
                });
            }
        }
    }

    let mut roots = Vec::new();
    let mut dropped = 0usize;
    for slot in 0..slots.len() {
        let parent = &slots[slot].entry.parent_path;
        if parent.is_empty() || *parent == root {
            roots.push(slot);
            continue;
        }
        match index.get(parent.as_str()).copied() {
            Some(parent_slot) if parent_slot != slot && slots[parent_slot].entry.is_dir => {
                slots[parent_slot].children.push(slot);
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        trace!("tree build dropped {dropped} entries with unresolved parents under {root}");
    }

    let mut tree: Tree = roots.into_iter().map(|slot| freeze(&slots, slot)).collect();
    sort_nodes(&mut tree);
    tree
}

fn freeze(slots: &[PendingNode], slot: usize) -> Arc<TreeNode> {
    let pending = &slots[slot];
    let mut node = TreeNode::new(pending.entry.clone());
    if let Some(children) = node.children.as_mut() {
        children.extend(pending.children.iter().map(|&child| freeze(slots, child)));
        sort_nodes(children);
    }
    Arc::new(node)
}

/// Directories first, then case-insensitive name order.
pub fn compare_nodes(lhs: &TreeNode, rhs: &TreeNode) -> Ordering {
    match (lhs.is_dir(), rhs.is_dir()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => lhs.name().to_lowercase().cmp(&rhs.name().to_lowercase()),
    }
}

pub fn sort_nodes(nodes: &mut [Arc<TreeNode>]) {
    nodes.sort_by(|lhs, rhs| compare_nodes(lhs, rhs));
}

pub fn contains_path(tree: &[Arc<TreeNode>], target: &str) -> bool {
    tree.iter()
        .any(|node| node.path() == target || contains_path(node.children(), target))
}

pub fn collect_paths(tree: &[Arc<TreeNode>], out: &mut HashSet<String>) {
    for node in tree {
        out.insert(node.path().to_string());
        collect_paths(node.children(), out);
    }
}

pub fn collect_dirs(tree: &[Arc<TreeNode>], out: &mut HashSet<String>) {
    for node in tree {
        if node.is_dir() {
            out.insert(node.path().to_string());
            collect_dirs(node.children(), out);
        }
    }
}

pub fn count_nodes(tree: &[Arc<TreeNode>]) -> usize {
    tree.iter()
        .map(|node| 1 + count_nodes(node.children()))
        .sum()
}

pub fn find_node<'a>(tree: &'a [Arc<TreeNode>], target: &str) -> Option<&'a Arc<TreeNode>> {
    for node in tree {
        if node.path() == target {
            return Some(node);
        }
        if let Some(found) = find_node(node.children(), target) {
            return Some(found);
        }
    }
    None
}

/// Rows the sidebar shows: every top-level node, plus the children of expanded directories.
pub fn visible_rows(tree: &[Arc<TreeNode>], expanded: &ExpandedFolders) -> Vec<VisibleRow> {
    let mut rows = Vec::new();
    collect_rows(tree, 0, expanded, &mut rows);
    rows
}

fn collect_rows(
    nodes: &[Arc<TreeNode>],
    depth: usize,
    expanded: &ExpandedFolders,
    rows: &mut Vec<VisibleRow>,
) {
    for node in nodes {
        rows.push(VisibleRow {
            depth,
            node: node.clone(),
        });
        if node.is_dir() && expanded.contains(node.path()) {
            collect_rows(node.children(), depth + 1, expanded, rows);
        }
    }
}

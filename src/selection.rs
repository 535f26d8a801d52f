use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::path;

/// Directory paths the user has opened. Keyed by path so it survives tree rebuilds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedFolders {
    paths: BTreeSet<String>,
}

impl ExpandedFolders {
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn insert(&mut self, path: &str) -> bool {
        self.paths.insert(path::normalize(path))
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.paths.remove(path)
    }

    /// Returns whether the folder is expanded after the toggle.
    pub fn toggle(&mut self, path: &str) -> bool {
        let path = path::normalize(path);
        if self.paths.remove(&path) {
            false
        } else {
            self.paths.insert(path);
            true
        }
    }

    pub fn merge<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.insert(path.as_ref());
        }
    }

    pub fn replace<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.paths.clear();
        self.merge(paths);
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileIntent {
    #[default]
    Modify,
    Create,
    Delete,
    Reference,
}

impl FileIntent {
    pub fn label(self) -> &'static str {
        match self {
            FileIntent::Modify => "modify",
            FileIntent::Create => "create",
            FileIntent::Delete => "delete",
            FileIntent::Reference => "reference",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "modify" => Some(FileIntent::Modify),
            "create" => Some(FileIntent::Create),
            "delete" => Some(FileIntent::Delete),
            "reference" => Some(FileIntent::Reference),
            _ => None,
        }
    }
}

impl fmt::Display for FileIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Selected files and the intent attached to each. A path has an intent iff it is selected.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    intents: BTreeMap<String, FileIntent>,
}

impl Selection {
    pub fn is_selected(&self, path: &str) -> bool {
        self.intents.contains_key(path)
    }

    /// Selects with the default intent, or deselects. Returns whether the path is now selected.
    pub fn toggle(&mut self, path: &str) -> bool {
        let path = path::normalize(path);
        if self.intents.remove(&path).is_some() {
            false
        } else {
            self.intents.insert(path, FileIntent::default());
            true
        }
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.intents.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.intents.clear();
    }

    /// Only selected paths carry an intent; setting one on an unselected path is ignored.
    pub fn set_intent(&mut self, path: &str, intent: FileIntent) -> bool {
        match self.intents.get_mut(path) {
            Some(slot) => {
                *slot = intent;
                true
            }
            None => false,
        }
    }

    pub fn intent(&self, path: &str) -> Option<FileIntent> {
        self.intents.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FileIntent)> {
        self.intents.iter().map(|(path, intent)| (path.as_str(), *intent))
    }

    /// `Files:` preamble listing each selection relative to `base`.
    pub fn prompt_preamble(&self, base: &str) -> Option<String> {
        if self.intents.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .iter()
            .map(|(path, intent)| format!("- {} ({intent})", path::relative_to(path, base)))
            .collect();
        Some(format!("Files:\n{}\n\n", lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_folder_flips_state() {
        let mut expanded = ExpandedFolders::default();
        assert!(expanded.toggle("/r/src/"));
        assert!(expanded.contains("/r/src"));
        assert!(!expanded.toggle("/r/src"));
        assert!(expanded.is_empty());
    }

    #[test]
    fn merge_keeps_existing_paths() {
        let mut expanded = ExpandedFolders::default();
        expanded.insert("/r/a");
        expanded.merge(["/r/b", "/r/a"]);
        assert_eq!(expanded.iter().collect::<Vec<_>>(), vec!["/r/a", "/r/b"]);
        expanded.replace(["/r/c"]);
        assert_eq!(expanded.len(), 1);
    }

    #[test]
    fn selection_and_intent_move_together() {
        let mut selection = Selection::default();
        assert!(!selection.set_intent("/r/a.rs", FileIntent::Delete));
        assert!(selection.toggle("/r/a.rs"));
        assert_eq!(selection.intent("/r/a.rs"), Some(FileIntent::Modify));
        assert!(selection.set_intent("/r/a.rs", FileIntent::Delete));
        assert!(!selection.toggle("/r/a.rs"));
        assert_eq!(selection.intent("/r/a.rs"), None);
        assert!(!selection.is_selected("/r/a.rs"));
    }

    #[test]
    fn prompt_preamble_lists_relative_paths() {
        let mut selection = Selection::default();
        assert!(selection.prompt_preamble("/r").is_none());
        selection.toggle("/r/src/a.rs");
        selection.toggle("/r/b.md");
        selection.set_intent("/r/b.md", FileIntent::Reference);
        assert_eq!(
            selection.prompt_preamble("/r").expect("preamble"),
            "Files:\n- b.md (reference)\n- src/a.rs (modify)\n\n"
        );
    }

    #[test]
    fn intent_parses_labels() {
        assert_eq!(FileIntent::parse(" Create "), Some(FileIntent::Create));
        assert_eq!(FileIntent::parse("rename"), None);
    }
}

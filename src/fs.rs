use serde::{Deserialize, Serialize};

use crate::path;

/// One filesystem item as reported by the listing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub parent_path: String,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
}

impl Entry {
    pub fn new(path: &str, parent_path: &str, is_dir: bool, depth: Option<usize>) -> Self {
        let path = path::normalize(path);
        Self {
            name: path::file_name_of(&path).to_string(),
            parent_path: path::normalize(parent_path),
            path,
            is_dir,
            depth,
            is_deleted: false,
        }
    }

    /// A file that only exists in the status snapshot.
    pub fn deleted_placeholder(path: &str, parent_path: &str) -> Self {
        Self {
            is_deleted: true,
            ..Self::new(path, parent_path, false, None)
        }
    }

    pub fn normalized(mut self) -> Self {
        self.path = path::normalize(&self.path);
        self.parent_path = path::normalize(&self.parent_path);
        self
    }
}

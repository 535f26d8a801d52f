//! Path keys shared by the tree, the status snapshot, and the search index.
//!
//! Every path that is used as a map key or compared against another path goes through
//! [`normalize`] first: backslashes become forward slashes and trailing slashes are dropped.

pub const SEPARATOR: char = '/';

pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let replaced = path.replace('\\', "/");
    let trimmed = replaced.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        // "/" stays the filesystem root rather than collapsing into the empty sentinel.
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Everything before the last separator. Returns `None` for a bare name.
pub fn parent_of(path: &str) -> Option<&str> {
    let idx = path.rfind(SEPARATOR)?;
    if idx == 0 { Some("/") } else { Some(&path[..idx]) }
}

pub fn file_name_of(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Ancestor directories of `path`, nearest first, stopping before `root`.
///
/// When `path` does not live under `root` the walk continues up to (but not including) the
/// filesystem root.
pub fn ancestors_within(path: &str, root: &str) -> Vec<String> {
    let mut ancestors = Vec::new();
    let mut current = path;
    while let Some(parent) = parent_of(current) {
        if parent == root || parent == "/" || parent.is_empty() {
            break;
        }
        ancestors.push(parent.to_string());
        current = parent;
    }
    ancestors
}

pub fn is_within(path: &str, root: &str) -> bool {
    path.len() > root.len()
        && path.starts_with(root)
        && (root.ends_with(SEPARATOR) || path[root.len()..].starts_with(SEPARATOR))
}

/// `path` relative to `base`, `"."` when equal, or `path` unchanged when outside `base`.
pub fn relative_to(path: &str, base: &str) -> String {
    let path = normalize(path);
    let base = normalize(base);
    if path == base {
        return ".".to_string();
    }
    if is_within(&path, &base) {
        return path[base.len()..]
            .trim_start_matches(SEPARATOR)
            .to_string();
    }
    path
}

fn is_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// True for `/`, the empty path, and drive roots such as `C:` or `C:\`.
pub fn is_filesystem_root(path: &str) -> bool {
    let path = normalize(path);
    path.is_empty() || path == "/" || is_drive(&path)
}

/// `path` in the form handed to a shell's `cd`: normalized, with drive roots keeping their
/// separator so they name the root and not the drive's current directory.
pub fn shell_dir(path: &str) -> String {
    let path = normalize(path);
    if is_drive(&path) { format!("{path}/") } else { path }
}

/// The directory one level above `path`, never climbing past `/` or a drive root.
pub fn parent_dir(path: &str) -> String {
    let path = normalize(path);
    match parent_of(&path) {
        Some(parent) => shell_dir(parent),
        None if is_drive(&path) => shell_dir(&path),
        None => "/".to_string(),
    }
}

/// Single-quotes `path` for a POSIX shell.
pub fn escape_shell_path(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rewrites_separators_and_trailing_slashes() {
        assert_eq!(normalize("C:\\work\\repo\\"), "C:/work/repo");
        assert_eq!(normalize("/home/me/repo//"), "/home/me/repo");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn parent_and_name_split_on_last_separator() {
        assert_eq!(parent_of("/repo/src/main.rs"), Some("/repo/src"));
        assert_eq!(parent_of("/repo"), Some("/"));
        assert_eq!(parent_of("main.rs"), None);
        assert_eq!(file_name_of("/repo/src/main.rs"), "main.rs");
        assert_eq!(file_name_of("main.rs"), "main.rs");
    }

    #[test]
    fn ancestors_stop_at_root() {
        assert_eq!(
            ancestors_within("/repo/a/b/c.txt", "/repo"),
            vec!["/repo/a/b".to_string(), "/repo/a".to_string()]
        );
        assert!(ancestors_within("/repo/c.txt", "/repo").is_empty());
    }

    #[test]
    fn relative_to_handles_prefix_collisions() {
        assert_eq!(relative_to("/repo/src/lib.rs", "/repo"), "src/lib.rs");
        assert_eq!(relative_to("/repo", "/repo/"), ".");
        assert_eq!(relative_to("/repository/x", "/repo"), "/repository/x");
    }

    #[test]
    fn filesystem_roots_include_drives() {
        assert!(is_filesystem_root("/"));
        assert!(is_filesystem_root(""));
        assert!(is_filesystem_root("C:\\"));
        assert!(is_filesystem_root("d:"));
        assert!(!is_filesystem_root("/home"));
        assert!(!is_filesystem_root("C:\\Users"));
    }

    #[test]
    fn parent_dir_stops_at_roots() {
        assert_eq!(parent_dir("/home/me"), "/home");
        assert_eq!(parent_dir("/home"), "/");
        assert_eq!(parent_dir("C:\\Users\\me"), "C:/Users");
        assert_eq!(parent_dir("C:\\Users"), "C:/");
        assert_eq!(parent_dir("C:/"), "C:/");
        assert_eq!(shell_dir("C:"), "C:/");
    }

    #[test]
    fn escape_shell_path_quotes_single_quotes() {
        assert_eq!(escape_shell_path("/tmp/it's here"), "'/tmp/it'\\''s here'");
    }
}

//! Services the sidebar consumes: directory listings, git status, and terminal queries.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::SystemTime;

use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{trace, warn};
use walkdir::WalkDir;

use crate::fs::Entry;
use crate::git::{GitSnapshot, GitStat, GitStatus};
use crate::path;

const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    ".cache",
    ".next",
    ".nuxt",
    "__pycache__",
    ".venv",
    "venv",
];

const MAX_COUNTED_BYTES: u64 = 1024 * 1024;
const BINARY_SNIFF_BYTES: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLimits {
    pub max_depth: usize,
    pub max_files: usize,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_files: 10_000,
        }
    }
}

#[derive(Debug)]
pub enum BackendError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Command {
        program: String,
        message: String,
    },
    SessionNotFound(String),
    Unsupported(&'static str),
    Parse(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            BackendError::Command { program, message } => {
                write!(f, "failed to execute {program}: {message}")
            }
            BackendError::SessionNotFound(id) => write!(f, "session not found: {id}"),
            BackendError::Unsupported(what) => write!(f, "{what} is not supported here"),
            BackendError::Parse(message) => write!(f, "unexpected response: {message}"),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The command-execution service. Calls are made from poller threads, hence `Send + Sync`.
pub trait Backend: Send + Sync {
    fn read_directory(&self, path: &str) -> Result<Vec<Entry>, BackendError>;

    fn read_directory_recursive(
        &self,
        path: &str,
        limits: ListingLimits,
    ) -> Result<Vec<Entry>, BackendError>;

    fn get_git_stats(&self, path: &str) -> Result<GitSnapshot, BackendError>;

    fn get_terminal_cwd(&self, session_id: &str) -> Result<String, BackendError>;

    fn get_current_branch(&self, repo_path: &str) -> Result<Option<String>, BackendError>;

    fn write_to_terminal(&self, session_id: &str, data: &str) -> Result<(), BackendError>;
}

/// Answers every request from the local machine.
///
/// Terminal session ids are process ids; writing to a terminal needs a PTY owner and is
/// unsupported here.
pub struct LocalBackend {
    ignored: GlobSet,
    line_counts: Mutex<HashMap<PathBuf, CountedFile>>,
}

/// Size and mtime a line count was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy)]
struct CountedFile {
    stamp: FileStamp,
    lines: u64,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::with_ignored(IGNORED_DIRS)
    }

    pub fn with_ignored(patterns: &[&str]) -> Self {
        Self {
            ignored: ignored_dirs(patterns),
            line_counts: Mutex::new(HashMap::new()),
        }
    }

    fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignored.is_match(name)
    }

    /// Line count for an untracked file's badge.
    ///
    /// Anything but a small regular text file counts as zero. A count is reused while the
    /// file's size and mtime stay the same.
    fn untracked_lines(&self, file: &Path) -> u64 {
        let Ok(metadata) = fs::metadata(file) else {
            return 0;
        };
        if !metadata.is_file() || metadata.len() > MAX_COUNTED_BYTES {
            return 0;
        }
        let stamp = FileStamp {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        };
        if let Ok(counts) = self.line_counts.lock() {
            if let Some(counted) = counts.get(file).filter(|counted| counted.stamp == stamp) {
                return counted.lines;
            }
        }

        let lines = match fs::read(file) {
            Ok(bytes) if !looks_binary(&bytes) => {
                String::from_utf8_lossy(&bytes).lines().count() as u64
            }
            Ok(_) => 0,
            Err(err) => {
                trace!("cannot count lines in {}: {err}", file.display());
                return 0;
            }
        };
        if let Ok(mut counts) = self.line_counts.lock() {
            counts.insert(file.to_path_buf(), CountedFile { stamp, lines });
        }
        lines
    }
}

fn ignored_dirs(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => warn!("ignoring invalid directory pattern {pattern}: {err}"),
        }
    }
    builder.build().unwrap_or_else(|err| {
        warn!("failed to compile ignore set: {err}");
        GlobSet::empty()
    })
}

impl Backend for LocalBackend {
    fn read_directory(&self, dir: &str) -> Result<Vec<Entry>, BackendError> {
        let dir_path = PathBuf::from(dir);
        let io_err = |source| BackendError::Io {
            path: dir_path.clone(),
            source,
        };
        let parent = path::normalize(dir);

        let mut entries = Vec::new();
        for item in fs::read_dir(&dir_path).map_err(io_err)? {
            let item = item.map_err(io_err)?;
            let metadata = item.metadata().map_err(io_err)?;
            let full = item.path();
            entries.push(Entry::new(
                &full.to_string_lossy(),
                &parent,
                metadata.is_dir(),
                Some(0),
            ));
        }
        sort_listing(&mut entries);
        Ok(entries)
    }

    fn read_directory_recursive(
        &self,
        dir: &str,
        limits: ListingLimits,
    ) -> Result<Vec<Entry>, BackendError> {
        let root = PathBuf::from(dir);
        let metadata = fs::metadata(&root).map_err(|source| BackendError::Io {
            path: root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(BackendError::Io {
                path: root,
                source: std::io::Error::other("not a directory"),
            });
        }

        let mut entries = Vec::new();
        let walker = WalkDir::new(&root)
            .max_depth(limits.max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|item| {
                !(item.depth() > 0
                    && item.file_type().is_dir()
                    && item
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.is_ignored_dir(name)))
            });

        for item in walker {
            if entries.len() >= limits.max_files {
                warn!(
                    "reached max file limit of {} under {}",
                    limits.max_files,
                    root.display()
                );
                break;
            }
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    trace!("skipping unreadable entry: {err}");
                    continue;
                }
            };
            if item.depth() == 0 || item.path_is_symlink() {
                continue;
            }
            let full = item.path();
            let parent = full
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| dir.to_string());
            entries.push(Entry::new(
                &full.to_string_lossy(),
                &parent,
                item.file_type().is_dir(),
                Some(item.depth() - 1),
            ));
        }

        sort_listing(&mut entries);
        Ok(entries)
    }

    fn get_git_stats(&self, dir: &str) -> Result<GitSnapshot, BackendError> {
        let Some(git_root) = find_git_root(Path::new(dir)) else {
            return Ok(GitSnapshot::new());
        };
        let mut stats = BTreeMap::new();

        let diff = run_git(&git_root, &["diff", "HEAD", "--numstat", "--no-renames", "-z"])?;
        for record in diff.split('\0').filter(|record| !record.is_empty()) {
            let Some((added, deleted, relative)) = parse_numstat(record) else {
                trace!("skipping unparsable numstat record {record:?}");
                continue;
            };
            let absolute = git_root.join(relative);
            let stat = if absolute.exists() {
                GitStat::modified(added, deleted)
            } else {
                GitStat {
                    status: GitStatus::Deleted,
                    added,
                    deleted,
                }
            };
            stats.insert(path::normalize(&absolute.to_string_lossy()), stat);
        }

        let untracked = run_git(
            &git_root,
            &["ls-files", "--others", "--exclude-standard", "-z"],
        )?;
        let mut seen = HashSet::new();
        for relative in untracked.split('\0').filter(|line| !line.is_empty()) {
            let absolute = git_root.join(relative);
            let key = path::normalize(&absolute.to_string_lossy());
            if stats.contains_key(&key) {
                continue;
            }
            let lines = self.untracked_lines(&absolute);
            seen.insert(absolute);
            stats.insert(key, GitStat::untracked(lines));
        }
        if let Ok(mut counts) = self.line_counts.lock() {
            counts.retain(|counted, _| seen.contains(counted));
        }

        Ok(stats)
    }

    fn get_terminal_cwd(&self, session_id: &str) -> Result<String, BackendError> {
        let pid: u32 = session_id
            .parse()
            .map_err(|_| BackendError::SessionNotFound(session_id.to_string()))?;
        process_cwd(pid)
    }

    fn get_current_branch(&self, repo_path: &str) -> Result<Option<String>, BackendError> {
        let head_path = Path::new(repo_path).join(".git").join("HEAD");
        if !head_path.exists() {
            return Ok(None);
        }
        let head = fs::read_to_string(&head_path).map_err(|source| BackendError::Io {
            path: head_path,
            source,
        })?;
        Ok(head
            .trim()
            .strip_prefix("ref: refs/heads/")
            .map(str::to_string))
    }

    fn write_to_terminal(&self, _session_id: &str, _data: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("writing to a terminal"))
    }
}

#[cfg(target_os = "linux")]
fn process_cwd(pid: u32) -> Result<String, BackendError> {
    let link = PathBuf::from(format!("/proc/{pid}/cwd"));
    fs::read_link(&link)
        .map(|target| path::normalize(&target.to_string_lossy()))
        .map_err(|source| BackendError::Io { path: link, source })
}

#[cfg(not(target_os = "linux"))]
fn process_cwd(_pid: u32) -> Result<String, BackendError> {
    Err(BackendError::Unsupported("reading a process working directory"))
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| candidate.join(".git").exists())
        .map(Path::to_path_buf)
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<String, BackendError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|err| BackendError::Command {
            program: format!("git {}", args.join(" ")),
            message: err.to_string(),
        })?;
    if !output.status.success() {
        // A repository without commits has no HEAD to diff against; treat as no changes.
        trace!(
            "git {} exited with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Ok(String::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// One `--numstat -z` record without renames: `added\tdeleted\tpath`. Binary files report `-`.
fn parse_numstat(record: &str) -> Option<(u64, u64, &str)> {
    let mut fields = record.splitn(3, '\t');
    let added = fields.next()?;
    let deleted = fields.next()?;
    let relative = fields.next().filter(|relative| !relative.is_empty())?;
    Some((added.parse().unwrap_or(0), deleted.parse().unwrap_or(0), relative))
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0)
}

fn sort_listing(entries: &mut [Entry]) {
    entries.sort_by(|lhs, rhs| match (lhs.is_dir, rhs.is_dir) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => lhs.name.to_lowercase().cmp(&rhs.name.to_lowercase()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ignore_set_matches_build_dirs() {
        let backend = LocalBackend::new();
        assert!(backend.is_ignored_dir("node_modules"));
        assert!(backend.is_ignored_dir(".git"));
        assert!(!backend.is_ignored_dir("src"));
    }

    #[test]
    fn custom_ignore_patterns_support_globs() {
        let backend = LocalBackend::with_ignored(&["*.egg-info", "["]);
        assert!(backend.is_ignored_dir("pkg.egg-info"));
        assert!(!backend.is_ignored_dir("target"));
    }

    #[test]
    fn non_numeric_session_id_is_not_found() {
        let err = LocalBackend::new()
            .get_terminal_cwd("abc")
            .expect_err("invalid id");
        assert!(matches!(err, BackendError::SessionNotFound(id) if id == "abc"));
    }

    #[test]
    fn numstat_records_parse_with_tabs_in_names() {
        assert_eq!(parse_numstat("3\t1\tsrc/main.rs"), Some((3, 1, "src/main.rs")));
        assert_eq!(parse_numstat("-\t-\tlogo.png"), Some((0, 0, "logo.png")));
        assert_eq!(parse_numstat("1\t0\tweird\tname.txt"), Some((1, 0, "weird\tname.txt")));
        assert_eq!(parse_numstat("1\t0"), None);
    }

    #[test]
    fn untracked_line_counts_skip_binary_and_follow_edits() {
        let temp = tempfile::tempdir().expect("temp dir");
        let text = temp.path().join("notes.txt");
        let binary = temp.path().join("blob.bin");
        fs::write(&text, "a\nb\n").expect("write text");
        fs::write(&binary, [0u8, 1, 2, b'\n']).expect("write binary");

        let backend = LocalBackend::new();
        assert_eq!(backend.untracked_lines(&text), 2);
        assert_eq!(backend.untracked_lines(&binary), 0);
        assert_eq!(backend.untracked_lines(temp.path()), 0);

        fs::write(&text, "a\nb\nc\nd\n").expect("rewrite text");
        assert_eq!(backend.untracked_lines(&text), 4);
    }

    #[test]
    fn errors_render_readably() {
        let err = BackendError::Command {
            program: "git status".into(),
            message: "not found".into(),
        };
        assert_eq!(err.to_string(), "failed to execute git status: not found");
    }
}

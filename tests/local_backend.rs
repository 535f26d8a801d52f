use std::fs;
use std::path::Path;
use std::process::Command;

use sidetree::backend::{Backend, ListingLimits, LocalBackend};
use sidetree::git::{GitStat, GitStatus};
use sidetree::tree::{build_tree, count_nodes};

fn root_of(temp: &tempfile::TempDir) -> String {
    let canonical = temp.path().canonicalize().expect("canonical temp dir");
    canonical.to_string_lossy().replace('\\', "/")
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write file");
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("run git");
    assert!(status.success(), "git {} failed", args.join(" "));
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/trunk"]);
    git(dir, &["add", "."]);
    git(
        dir,
        &[
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
            "commit",
            "-q",
            "-m",
            "init",
        ],
    );
}

#[test]
fn recursive_listing_skips_ignored_dirs_and_builds_a_tree() {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = root_of(&temp);
    write(&temp.path().join("src/main.rs"), "fn main() {}\n");
    write(&temp.path().join("src/util/mod.rs"), "");
    write(&temp.path().join("node_modules/pkg/index.js"), "");
    write(&temp.path().join("README.md"), "hello\n");

    let backend = LocalBackend::new();
    let entries = backend
        .read_directory_recursive(&root, ListingLimits::default())
        .expect("list directory");

    assert!(entries.iter().all(|entry| !entry.path.contains("node_modules")));
    let main = entries
        .iter()
        .find(|entry| entry.path.ends_with("/src/main.rs"))
        .expect("main.rs listed");
    assert_eq!(main.parent_path, format!("{root}/src"));
    assert_eq!(main.depth, Some(1));

    let tree = build_tree(&entries, &root);
    assert_eq!(count_nodes(&tree), entries.len());
    assert_eq!(tree[0].name(), "src");
    assert_eq!(tree.last().map(|node| node.name()), Some("README.md"));
}

#[test]
fn recursive_listing_honours_limits() {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = root_of(&temp);
    write(&temp.path().join("a/b/c/deep.txt"), "");
    for index in 0..5 {
        write(&temp.path().join(format!("file{index}.txt")), "");
    }

    let backend = LocalBackend::new();
    let shallow = backend
        .read_directory_recursive(
            &root,
            ListingLimits {
                max_depth: 1,
                max_files: 100,
            },
        )
        .expect("shallow listing");
    assert!(shallow.iter().all(|entry| entry.depth == Some(0)));

    let capped = backend
        .read_directory_recursive(
            &root,
            ListingLimits {
                max_depth: 10,
                max_files: 3,
            },
        )
        .expect("capped listing");
    assert_eq!(capped.len(), 3);
}

#[test]
fn missing_directory_is_an_error() {
    let temp = tempfile::tempdir().expect("temp dir");
    let missing = temp.path().join("gone");
    let backend = LocalBackend::new();
    let err = backend
        .read_directory_recursive(&missing.to_string_lossy(), ListingLimits::default())
        .expect_err("listing a missing directory fails");
    assert!(err.to_string().contains("gone"));
}

#[test]
fn single_level_listing_sorts_dirs_first() {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = root_of(&temp);
    write(&temp.path().join("b.txt"), "");
    write(&temp.path().join("A.txt"), "");
    write(&temp.path().join("zdir/inner.txt"), "");

    let backend = LocalBackend::new();
    let names: Vec<String> = backend
        .read_directory(&root)
        .expect("read directory")
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names, vec!["zdir", "A.txt", "b.txt"]);
}

#[test]
fn directory_outside_a_repository_has_no_git_stats() {
    if !git_available() {
        eprintln!("git stats test skipped: git not available");
        return;
    }
    let temp = tempfile::tempdir().expect("temp dir");
    let root = root_of(&temp);
    if Path::new(&root)
        .ancestors()
        .any(|candidate| candidate.join(".git").exists())
    {
        eprintln!("git stats test skipped: temp dir lives inside a repository");
        return;
    }
    let backend = LocalBackend::new();
    let stats = backend.get_git_stats(&root).expect("git stats");
    assert!(stats.is_empty());
    assert_eq!(backend.get_current_branch(&root).expect("branch"), None);
}

#[test]
fn git_stats_report_modified_untracked_and_deleted() {
    if !git_available() {
        eprintln!("git stats test skipped: git not available");
        return;
    }
    let temp = tempfile::tempdir().expect("temp dir");
    let root = root_of(&temp);
    let dir = temp.path();
    write(&dir.join("kept.txt"), "one\ntwo\n");
    write(&dir.join("doomed.txt"), "bye\n");
    init_repo(dir);

    write(&dir.join("kept.txt"), "one\ntwo\nthree\n");
    fs::remove_file(dir.join("doomed.txt")).expect("remove file");
    write(&dir.join("fresh.txt"), "a\nb\nc\n");

    let backend = LocalBackend::new();
    let stats = backend.get_git_stats(&root).expect("git stats");

    assert_eq!(
        stats.get(&format!("{root}/kept.txt")),
        Some(&GitStat::modified(1, 0))
    );
    assert_eq!(
        stats.get(&format!("{root}/fresh.txt")),
        Some(&GitStat::untracked(3))
    );
    let doomed = stats
        .get(&format!("{root}/doomed.txt"))
        .expect("deleted file reported");
    assert_eq!(doomed.status, GitStatus::Deleted);
    assert_eq!(doomed.deleted, 1);

    assert_eq!(
        backend.get_current_branch(&root).expect("branch").as_deref(),
        Some("trunk")
    );
}

#[test]
fn git_stats_split_staged_renames_and_keep_unicode_names() {
    if !git_available() {
        eprintln!("git stats test skipped: git not available");
        return;
    }
    let temp = tempfile::tempdir().expect("temp dir");
    let root = root_of(&temp);
    let dir = temp.path();
    write(&dir.join("old.txt"), "x\ny\n");
    write(&dir.join("café.txt"), "one\n");
    init_repo(dir);

    git(dir, &["mv", "old.txt", "new.txt"]);
    write(&dir.join("café.txt"), "one\ntwo\n");
    write(&dir.join("blob.bin"), "\0\0binary\n");

    let backend = LocalBackend::new();
    let stats = backend.get_git_stats(&root).expect("git stats");

    assert!(stats.keys().all(|key| !key.contains("=>") && !key.contains('"')));
    let old = stats
        .get(&format!("{root}/old.txt"))
        .expect("renamed-away path reported");
    assert_eq!(old.status, GitStatus::Deleted);
    assert_eq!(
        stats.get(&format!("{root}/new.txt")),
        Some(&GitStat::modified(2, 0))
    );
    assert_eq!(
        stats.get(&format!("{root}/café.txt")),
        Some(&GitStat::modified(1, 0))
    );
    assert_eq!(
        stats.get(&format!("{root}/blob.bin")),
        Some(&GitStat::untracked(0))
    );
}

#[cfg(target_os = "linux")]
#[test]
fn terminal_cwd_reads_the_process_directory() {
    let backend = LocalBackend::new();
    let pid = std::process::id().to_string();
    let cwd = backend.get_terminal_cwd(&pid).expect("own cwd");
    let expected = std::env::current_dir()
        .and_then(|dir| dir.canonicalize())
        .expect("current dir");
    assert_eq!(cwd, expected.to_string_lossy().replace('\\', "/"));
}

use std::path::PathBuf;
use std::time::{Duration, Instant};

use pico_args::Arguments;
use serde::Serialize;
use sidetree::backend::{Backend, ListingLimits, LocalBackend};
use sidetree::filter::{filter_by_git_changes, filter_by_search};
use sidetree::search::SearchIndex;
use sidetree::tree::{build_tree, count_nodes};

#[derive(Serialize)]
struct Snapshot {
    root: String,
    entries: usize,
    nodes: usize,
    git_paths: usize,
    search_query: Option<String>,
    search_matches: usize,
    list_ms: u128,
    build_ms: u128,
    index_ms: u128,
    search_ms: u128,
    git_ms: u128,
    filter_ms: u128,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("bench_tree: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = Arguments::from_env();
    let snapshot_path: Option<PathBuf> = args
        .opt_value_from_str("--snapshot")
        .map_err(|e| e.to_string())?;
    let query: Option<String> = args
        .opt_value_from_str("--search")
        .map_err(|e| e.to_string())?;
    let root_arg: Option<String> = args.opt_free_from_str().map_err(|e| e.to_string())?;
    let leftover = args.finish();
    if !leftover.is_empty() {
        return Err("unexpected positional arguments".into());
    }

    let root = match root_arg {
        Some(raw) => PathBuf::from(expand_path(&raw)?),
        None => std::env::current_dir().map_err(|e| e.to_string())?,
    };
    if !root.exists() {
        return Err(format!("{} does not exist", root.display()));
    }
    let canonical = root
        .canonicalize()
        .map_err(|err| format!("failed to canonicalize {}: {err}", root.display()))?;
    let root = canonical.to_string_lossy().into_owned();

    let backend = LocalBackend::new();

    let (entries, list_time) =
        timed(|| backend.read_directory_recursive(&root, ListingLimits::default()));
    let entries = entries.map_err(|err| err.to_string())?;

    let (tree, build_time) = timed(|| build_tree(&entries, &root));
    let (index, index_time) = timed(|| SearchIndex::build(&entries));

    let (matches, search_time) = timed(|| match (&index, &query) {
        (Some(index), Some(query)) => index.search(query).unwrap_or_default(),
        _ => Vec::new(),
    });

    let (git_stats, git_time) = timed(|| backend.get_git_stats(&root));
    let git_stats = git_stats.unwrap_or_else(|err| {
        eprintln!("bench_tree: git stats unavailable: {err}");
        Default::default()
    });

    let (filtered, filter_time) = timed(|| {
        let searched = if query.is_some() {
            filter_by_search(&tree, &matches)
        } else {
            tree.clone()
        };
        filter_by_git_changes(&searched, &git_stats)
    });

    println!(
        "Tree built: {} entries, {} nodes ({} after filters), {} git paths, {} matches",
        entries.len(),
        count_nodes(&tree),
        count_nodes(&filtered),
        git_stats.len(),
        matches.len(),
    );
    println!(
        "list {list_time:?}, build {build_time:?}, index {index_time:?}, search {search_time:?}, git {git_time:?}, filter {filter_time:?}"
    );

    if let Some(path) = snapshot_path {
        let snapshot = Snapshot {
            root: root.clone(),
            entries: entries.len(),
            nodes: count_nodes(&tree),
            git_paths: git_stats.len(),
            search_query: query,
            search_matches: matches.len(),
            list_ms: list_time.as_millis(),
            build_ms: build_time.as_millis(),
            index_ms: index_time.as_millis(),
            search_ms: search_time.as_millis(),
            git_ms: git_time.as_millis(),
            filter_ms: filter_time.as_millis(),
        };
        let json = serde_json::to_string_pretty(&snapshot).map_err(|err| err.to_string())?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| err.to_string())?;
            }
        }
        std::fs::write(&path, json).map_err(|err| err.to_string())?;
        println!("Snapshot written to {}", path.display());
    }

    Ok(())
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}

fn expand_path(raw: &str) -> Result<String, String> {
    shellexpand::full(raw)
        .map(|cow| cow.into_owned())
        .map_err(|err| err.to_string())
}

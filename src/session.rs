//! The sidebar's state container.
//!
//! Everything the sidebar shows lives here and is only mutated from the thread that owns the
//! session. Background pollers deliver results over channels; `pump` drains them, discards
//! results fetched for a path or terminal the session no longer cares about, and reconciles the
//! rest into the tree.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use log::{debug, info, trace, warn};

use crate::backend::{Backend, BackendError, ListingLimits};
use crate::debounce::Debouncer;
use crate::filter::{
    GitFilter, SearchFilter, TreeFilter, apply_filters, expansion_for_matches,
    merge_deleted_into_listing,
};
use crate::fs::Entry;
use crate::git::{GitSnapshot, GitTracker, normalize_snapshot};
use crate::notice::{Notice, NoticeAction, Notices};
use crate::patch::{patch_tree, unresolved_untracked, untracked_entries};
use crate::path;
use crate::poller::{
    BranchPoll, CwdPoll, GitPoll, PollerConfig, PollerError, spawn_branch_poller,
    spawn_cwd_poller, spawn_git_poller,
};
use crate::reconcile::{Reconcile, decide};
use crate::search::SearchIndex;
use crate::selection::{ExpandedFolders, FileIntent, Selection};
use crate::tree::{Tree, VisibleRow, build_tree, collect_dirs, visible_rows};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub pollers: PollerConfig,
    pub limits: ListingLimits,
    pub search_debounce: Duration,
    pub notice_duration: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pollers: PollerConfig::default(),
            limits: ListingLimits::default(),
            search_debounce: Duration::from_millis(200),
            notice_duration: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeStatus {
    /// No terminal session to follow yet.
    Waiting,
    Loading,
    Ready,
    Failed(String),
}

/// Where the single-level folder view points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderLocation {
    /// The folder view has not been loaded.
    Idle,
    /// No terminal session to follow yet.
    Waiting,
    At(String),
    Failed(String),
}

pub struct SidebarSession {
    backend: Arc<dyn Backend>,
    config: SessionConfig,
    open: bool,
    session_id: Option<String>,
    root: Option<String>,
    entries: Vec<Entry>,
    tree: Tree,
    index: Option<SearchIndex>,
    query: String,
    search: Debouncer<String>,
    results: Option<Vec<Entry>>,
    expanded: ExpandedFolders,
    selection: Selection,
    git: GitTracker,
    git_only: bool,
    branch: Option<String>,
    status: TreeStatus,
    notices: Notices,
    folders: Vec<Entry>,
    folder_location: FolderLocation,
    git_poll: Option<GitPoll>,
    cwd_poll: Option<CwdPoll>,
    branch_poll: Option<BranchPoll>,
}

impl SidebarSession {
    pub fn new(backend: Arc<dyn Backend>, config: SessionConfig) -> Self {
        let search = Debouncer::new(config.search_debounce);
        Self {
            backend,
            config,
            open: false,
            session_id: None,
            root: None,
            entries: Vec::new(),
            tree: Vec::new(),
            index: None,
            query: String::new(),
            search,
            results: None,
            expanded: ExpandedFolders::default(),
            selection: Selection::default(),
            git: GitTracker::default(),
            git_only: false,
            branch: None,
            status: TreeStatus::Waiting,
            notices: Notices::default(),
            folders: Vec::new(),
            folder_location: FolderLocation::Idle,
            git_poll: None,
            cwd_poll: None,
            branch_poll: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn status(&self) -> &TreeStatus {
        &self.status
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn git_snapshot(&self) -> &GitSnapshot {
        self.git.current()
    }

    pub fn git_only(&self) -> bool {
        self.git_only
    }

    pub fn expanded(&self) -> &ExpandedFolders {
        &self.expanded
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn search_query(&self) -> &str {
        &self.query
    }

    pub fn search_results(&self) -> Option<&[Entry]> {
        self.results.as_deref()
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn search_index(&self) -> Option<&SearchIndex> {
        self.index.as_ref()
    }

    pub fn folders(&self) -> &[Entry] {
        &self.folders
    }

    pub fn folder_location(&self) -> &FolderLocation {
        &self.folder_location
    }

    pub fn set_terminal_session(&mut self, session_id: Option<String>) -> Result<(), PollerError> {
        if self.session_id == session_id {
            return Ok(());
        }
        debug!("terminal session -> {session_id:?}");
        self.session_id = session_id;
        self.cwd_poll = None;
        if self.session_id.is_none() {
            self.status = TreeStatus::Waiting;
        }
        self.sync_pollers()
    }

    /// Points the session at `root` directly, without waiting for the cwd poller.
    pub fn set_root(&mut self, root: &str) -> Result<(), PollerError> {
        let root = path::normalize(root);
        if self.root.as_deref() == Some(root.as_str()) {
            return Ok(());
        }
        self.switch_root(root);
        self.sync_pollers()
    }

    pub fn open(&mut self) -> Result<(), PollerError> {
        if !self.open {
            self.open = true;
            info!("sidebar opened");
        }
        self.sync_pollers()
    }

    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.stop_pollers();
        self.expanded.clear();
        self.git.reset();
        info!("sidebar closed");
    }

    /// Detaches every poller. Fetches already running finish in the background and their
    /// results are dropped with the channel.
    fn stop_pollers(&mut self) {
        if let Some(poll) = self.git_poll.take() {
            poll.detach();
        }
        if let Some(poll) = self.cwd_poll.take() {
            poll.detach();
        }
        if let Some(poll) = self.branch_poll.take() {
            poll.detach();
        }
    }

    /// Starts the pollers whose enabling condition holds and stops the rest.
    pub fn sync_pollers(&mut self) -> Result<(), PollerError> {
        let pollers = self.config.pollers.clone();

        match (self.open, self.session_id.clone()) {
            (true, Some(id)) => {
                if self.cwd_poll.as_ref().map(|poll| poll.key()) != Some(id.as_str()) {
                    self.cwd_poll =
                        Some(spawn_cwd_poller(self.backend.clone(), id, pollers.cwd_interval)?);
                }
            }
            _ => self.cwd_poll = None,
        }

        match (self.open, self.root.clone()) {
            (true, Some(root)) => {
                if self.git_poll.as_ref().map(|poll| poll.key()) != Some(root.as_str()) {
                    self.git_poll = Some(spawn_git_poller(
                        self.backend.clone(),
                        root.clone(),
                        pollers.git_interval,
                    )?);
                }
                if self.branch_poll.as_ref().map(|poll| poll.key()) != Some(root.as_str()) {
                    self.branch_poll = Some(spawn_branch_poller(
                        self.backend.clone(),
                        root,
                        pollers.branch_interval,
                    )?);
                }
            }
            _ => {
                self.git_poll = None;
                self.branch_poll = None;
            }
        }
        Ok(())
    }

    /// Drains poller results and the search debouncer. Returns how many events were applied.
    pub fn pump(&mut self, now: Instant) -> Result<usize, PollerError> {
        let mut applied = 0;

        let cwd_events: Vec<_> = self
            .cwd_poll
            .as_ref()
            .map(|poll| poll.events.try_iter().collect())
            .unwrap_or_default();
        for event in cwd_events {
            if self.handle_cwd(&event.key, event.value)? {
                applied += 1;
            }
        }

        let git_events: Vec<_> = self
            .git_poll
            .as_ref()
            .map(|poll| poll.events.try_iter().collect())
            .unwrap_or_default();
        for event in git_events {
            if self.handle_git_poll(&event.key, event.value) {
                applied += 1;
            }
        }

        let branch_events: Vec<_> = self
            .branch_poll
            .as_ref()
            .map(|poll| poll.events.try_iter().collect())
            .unwrap_or_default();
        for event in branch_events {
            if self.handle_branch(&event.key, event.value) {
                applied += 1;
            }
        }

        if let Some(query) = self.search.poll(now) {
            self.run_search(&query);
            if self.results.as_ref().is_some_and(Vec::is_empty) {
                self.notices.raise(
                    format!("No files match \"{}\"", query.trim()),
                    self.config.notice_duration,
                    None,
                );
            }
            applied += 1;
        }

        self.notices.expire(Local::now());
        Ok(applied)
    }

    /// Lists the root recursively and rebuilds the tree and search index.
    ///
    /// Without a root the terminal's cwd is asked for first; without a terminal the session
    /// stays `Waiting`.
    pub fn load_tree(&mut self) {
        let root = match self.resolve_root() {
            Ok(Some(root)) => root,
            Ok(None) => {
                self.tree.clear();
                self.status = TreeStatus::Waiting;
                return;
            }
            Err(err) => {
                self.fail_load(err);
                return;
            }
        };

        self.status = TreeStatus::Loading;
        match self
            .backend
            .read_directory_recursive(&root, self.config.limits)
        {
            Ok(entries) => {
                self.entries = entries.into_iter().map(Entry::normalized).collect();
                self.tree = build_tree(&self.entries, &root);
                self.index = SearchIndex::build(&self.entries);
                self.status = TreeStatus::Ready;
                debug!("loaded {} entries under {root}", self.entries.len());
                self.refresh_search_results();
            }
            Err(err) => self.fail_load(err),
        }
    }

    fn resolve_root(&mut self) -> Result<Option<String>, BackendError> {
        if let Some(root) = &self.root {
            return Ok(Some(root.clone()));
        }
        let Some(id) = self.session_id.clone() else {
            return Ok(None);
        };
        let cwd = path::normalize(&self.backend.get_terminal_cwd(&id)?);
        self.root = Some(cwd.clone());
        Ok(Some(cwd))
    }

    fn fail_load(&mut self, err: BackendError) {
        warn!("failed to load directory tree: {err}");
        self.tree.clear();
        self.entries.clear();
        self.index = None;
        self.status = TreeStatus::Failed(err.to_string());
        self.notices.raise(
            format!("Failed to load directory tree: {err}"),
            self.config.notice_duration,
            Some(NoticeAction::RetryLoad),
        );
    }

    /// Runs a notice's action and dismisses it. Returns false for unknown ids.
    pub fn run_notice_action(&mut self, id: u64) -> bool {
        let Some(notice) = self.notices.dismiss(id) else {
            return false;
        };
        match notice.action {
            Some(NoticeAction::RetryLoad) => self.load_tree(),
            None => {}
        }
        true
    }

    pub fn dismiss_notice(&mut self, id: u64) -> Option<Notice> {
        self.notices.dismiss(id)
    }

    fn switch_root(&mut self, root: String) {
        info!("root -> {root}");
        self.root = Some(root);
        self.clear_search();
        self.git.reset();
        self.branch = None;
        self.load_tree();
    }

    /// Applies one cwd poll result. Returns whether the root changed.
    pub fn handle_cwd(
        &mut self,
        key: &str,
        result: Result<String, BackendError>,
    ) -> Result<bool, PollerError> {
        if self.session_id.as_deref() != Some(key) {
            trace!("discarding cwd result for stale session {key}");
            return Ok(false);
        }
        let cwd = match result {
            Ok(cwd) => path::normalize(&cwd),
            Err(err) => {
                debug!("cwd poll failed for {key}: {err}");
                return Ok(false);
            }
        };
        if self.root.as_deref() == Some(cwd.as_str()) {
            return Ok(false);
        }
        self.switch_root(cwd.clone());
        if matches!(self.folder_location, FolderLocation::At(_)) {
            self.list_folders(&cwd);
        }
        self.sync_pollers()?;
        Ok(true)
    }

    /// Applies one git poll result. Returns whether anything visible changed.
    pub fn handle_git_poll(&mut self, key: &str, result: Result<GitSnapshot, BackendError>) -> bool {
        let Some(root) = self.root.clone() else {
            return false;
        };
        if root != key {
            trace!("discarding git stats for stale path {key}");
            return false;
        }

        let observation = self.git.observe(result);
        match decide(&observation.changes) {
            Reconcile::Patch => {
                debug!(
                    "patching {} new untracked files",
                    observation.changes.new_untracked.len()
                );
                let patched = patch_tree(&self.tree, &observation.changes, &root);
                if !unresolved_untracked(&patched, &observation.changes, &root).is_empty() {
                    debug!("untracked files outside known directories; reloading");
                    self.load_tree();
                    return true;
                }
                self.tree = patched;
                let added = untracked_entries(&observation.changes, &self.entries, &root);
                if !added.is_empty() {
                    self.entries.extend(added);
                    self.index = SearchIndex::build(&self.entries);
                    self.refresh_search_results();
                }
                true
            }
            Reconcile::Reload => {
                debug!("structural git changes; reloading");
                self.load_tree();
                true
            }
            Reconcile::BadgesOnly | Reconcile::Nothing => observation.snapshot_changed,
        }
    }

    pub fn handle_branch(&mut self, key: &str, result: Result<Option<String>, BackendError>) -> bool {
        if self.root.as_deref() != Some(key) {
            trace!("discarding branch for stale path {key}");
            return false;
        }
        match result {
            Ok(branch) if branch != self.branch => {
                self.branch = branch;
                true
            }
            Ok(_) => false,
            Err(err) => {
                debug!("branch poll failed for {key}: {err}");
                false
            }
        }
    }

    pub fn set_search_query(&mut self, query: &str, now: Instant) {
        self.query = query.to_string();
        if query.trim().is_empty() {
            self.search.cancel();
            self.results = None;
            return;
        }
        self.search.push(query.to_string(), now);
    }

    pub fn clear_search(&mut self) {
        self.query.clear();
        self.search.cancel();
        self.results = None;
    }

    fn run_search(&mut self, query: &str) {
        let Some(index) = &self.index else {
            self.results = None;
            return;
        };
        let results = index.search(query);
        if let (Some(matches), Some(root)) = (&results, &self.root) {
            self.expanded.merge(expansion_for_matches(matches, root));
        }
        trace!(
            "search {query:?} -> {} matches",
            results.as_ref().map_or(0, Vec::len)
        );
        self.results = results;
    }

    fn refresh_search_results(&mut self) {
        if self.results.is_some() && !self.query.trim().is_empty() {
            let query = self.query.clone();
            self.run_search(&query);
        }
    }

    /// The tree as shown: search projection first, then the git-changes projection.
    pub fn displayed_tree(&self) -> Tree {
        let search = self.results.as_deref().map(SearchFilter::from_entries);
        let git = self.git_only.then(|| {
            let filter = GitFilter::new(self.git.current());
            match &self.root {
                Some(root) => filter.with_root(root),
                None => filter,
            }
        });

        let mut filters: Vec<&dyn TreeFilter> = Vec::new();
        if let Some(search) = &search {
            filters.push(search);
        }
        if let Some(git) = &git {
            filters.push(git);
        }
        apply_filters(&self.tree, &filters)
    }

    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        visible_rows(&self.displayed_tree(), &self.expanded)
    }

    /// Flips the git-changes view; turning it on expands every directory.
    pub fn toggle_git_filter(&mut self) -> bool {
        self.git_only = !self.git_only;
        if self.git_only && !self.tree.is_empty() {
            self.expand_all();
        }
        self.git_only
    }

    pub fn expand_all(&mut self) {
        let mut dirs = HashSet::new();
        collect_dirs(&self.tree, &mut dirs);
        self.expanded.replace(dirs);
    }

    pub fn toggle_folder(&mut self, folder: &str) -> bool {
        self.expanded.toggle(&path::normalize(folder))
    }

    pub fn toggle_file_selection(&mut self, file: &str) -> bool {
        self.selection.toggle(&path::normalize(file))
    }

    pub fn remove_file_from_selection(&mut self, file: &str) -> bool {
        self.selection.remove(&path::normalize(file))
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn set_file_intent(&mut self, file: &str, intent: FileIntent) -> bool {
        self.selection.set_intent(&path::normalize(file), intent)
    }

    pub fn selection_prompt(&self) -> Option<String> {
        let base = self.root.as_deref()?;
        self.selection.prompt_preamble(base)
    }

    /// Changes the shell's directory to `dir` by typing a `cd` into the terminal.
    pub fn navigate_to(&self, dir: &str) -> Result<(), BackendError> {
        let Some(id) = &self.session_id else {
            return Err(BackendError::SessionNotFound(String::new()));
        };
        let command = format!("cd {}\r", path::escape_shell_path(&path::shell_dir(dir)));
        self.backend.write_to_terminal(id, &command)
    }

    /// Loads the single-level folder view.
    ///
    /// With a target the terminal is sent there first; either way the listing follows the
    /// directory the terminal reports afterwards. A shell that has not processed the `cd` yet is
    /// caught up by the cwd poller, which relists the folder view when the directory changes.
    pub fn load_folders(&mut self, target: Option<&str>) {
        let Some(id) = self.session_id.clone() else {
            self.folders.clear();
            self.folder_location = FolderLocation::Waiting;
            return;
        };
        if let Some(target) = target {
            if let Err(err) = self.navigate_to(target) {
                warn!("failed to navigate terminal to {target}: {err}");
            }
        }
        match self.backend.get_terminal_cwd(&id) {
            Ok(cwd) => self.list_folders(&path::normalize(&cwd)),
            Err(err) => {
                warn!("failed to read terminal cwd for folder view: {err}");
                self.folders.clear();
                self.folder_location = FolderLocation::Failed(err.to_string());
            }
        }
    }

    /// Moves the folder view one level up. Returns false at `/` or a drive root.
    pub fn navigate_to_parent(&mut self) -> bool {
        let FolderLocation::At(current) = &self.folder_location else {
            return false;
        };
        if path::is_filesystem_root(current) {
            return false;
        }
        let parent = path::parent_dir(current);
        self.load_folders(Some(&parent));
        true
    }

    fn list_folders(&mut self, dir: &str) {
        let entries = match self.backend.read_directory(dir) {
            Ok(entries) => entries.into_iter().map(Entry::normalized).collect(),
            Err(err) => {
                warn!("failed to list {dir}: {err}");
                self.folders.clear();
                self.folder_location = FolderLocation::Failed(err.to_string());
                return;
            }
        };
        self.folders = match self.backend.get_git_stats(dir) {
            Ok(snapshot) => merge_deleted_into_listing(entries, &normalize_snapshot(snapshot), dir),
            Err(err) => {
                debug!("no deleted files merged into {dir}: {err}");
                entries
            }
        };
        self.folder_location = FolderLocation::At(dir.to_string());
    }
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, trace};

use crate::backend::{Backend, BackendError};
use crate::git::GitSnapshot;

const SHUTDOWN_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub git_interval: Duration,
    pub cwd_interval: Duration,
    pub branch_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            git_interval: Duration::from_secs(1),
            cwd_interval: Duration::from_millis(500),
            branch_interval: Duration::from_millis(500),
        }
    }
}

/// One tick's result, tagged with the key (path or session id) the poller was started for.
#[derive(Debug, Clone)]
pub struct PollEvent<T> {
    pub key: String,
    pub value: T,
    pub timestamp: Instant,
}

#[derive(Debug)]
pub enum PollerError {
    ThreadSpawn(std::io::Error),
}

impl fmt::Display for PollerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollerError::ThreadSpawn(err) => write!(f, "failed to spawn poller thread: {err}"),
        }
    }
}

impl std::error::Error for PollerError {}

/// Owner of one polling thread.
///
/// Dropping the handle only signals shutdown; the thread finishes any fetch in progress on its
/// own and exits once it notices the flag or finds the receiver gone. `stop` additionally waits
/// for it.
pub struct PollHandle<T> {
    pub events: Receiver<PollEvent<T>>,
    key: String,
    shutdown: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl<T> PollHandle<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Signals shutdown and blocks until the thread has exited.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }

    /// Signals shutdown without waiting for a fetch that is still running.
    pub fn detach(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|handle| handle.is_finished())
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.join.take() {
            trace!("detaching poller for {}", self.key);
            drop(handle);
        }
    }
}

/// Runs `fetch(key)` immediately and then every `interval` until the handle is stopped.
///
/// A fetch that is running when the handle goes away is allowed to finish; its result is sent
/// into a channel nobody reads, and the thread exits.
pub fn spawn_poller<T, F>(
    name: &str,
    key: String,
    interval: Duration,
    mut fetch: F,
) -> Result<PollHandle<T>, PollerError>
where
    T: Send + 'static,
    F: FnMut(&str) -> T + Send + 'static,
{
    let (event_tx, event_rx) = unbounded();
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let key_clone = key.clone();
    let thread_name = format!("sidetree-{name}");

    let join = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            debug!("{thread_name} polling {key_clone} every {interval:?}");
            run_polling_loop(&key_clone, interval, &shutdown_clone, &event_tx, &mut fetch);
            debug!("{thread_name} stopped for {key_clone}");
        })
        .map_err(PollerError::ThreadSpawn)?;

    Ok(PollHandle {
        events: event_rx,
        key,
        shutdown,
        join: Some(join),
    })
}

fn run_polling_loop<T, F>(
    key: &str,
    interval: Duration,
    shutdown: &AtomicBool,
    event_tx: &Sender<PollEvent<T>>,
    fetch: &mut F,
) where
    F: FnMut(&str) -> T,
{
    while !shutdown.load(Ordering::SeqCst) {
        let value = fetch(key);
        let event = PollEvent {
            key: key.to_string(),
            value,
            timestamp: Instant::now(),
        };
        if event_tx.send(event).is_err() {
            break;
        }
        trace!("poll tick key={key}");

        let deadline = Instant::now() + interval;
        while !shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SHUTDOWN_SLICE));
        }
    }
}

pub type GitPoll = PollHandle<Result<GitSnapshot, BackendError>>;
pub type CwdPoll = PollHandle<Result<String, BackendError>>;
pub type BranchPoll = PollHandle<Result<Option<String>, BackendError>>;

pub fn spawn_git_poller(
    backend: Arc<dyn Backend>,
    root: String,
    interval: Duration,
) -> Result<GitPoll, PollerError> {
    spawn_poller("git", root, interval, move |path| backend.get_git_stats(path))
}

pub fn spawn_cwd_poller(
    backend: Arc<dyn Backend>,
    session_id: String,
    interval: Duration,
) -> Result<CwdPoll, PollerError> {
    spawn_poller("cwd", session_id, interval, move |id| {
        backend.get_terminal_cwd(id)
    })
}

pub fn spawn_branch_poller(
    backend: Arc<dyn Backend>,
    repo_path: String,
    interval: Duration,
) -> Result<BranchPoll, PollerError> {
    spawn_poller("branch", repo_path, interval, move |path| {
        backend.get_current_branch(path)
    })
}

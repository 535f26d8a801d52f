use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use env_logger::Env;
use pico_args::Arguments;
use shellexpand::full;
use sidetree::backend::{Backend, LocalBackend};
use sidetree::session::{SessionConfig, SidebarSession, TreeStatus};
use sidetree::util::{format_notice_time, format_row};

const WATCH_TICK: Duration = Duration::from_millis(100);

struct Options {
    root: Option<String>,
    session: Option<String>,
    git_poll_ms: Option<u64>,
    max_depth: Option<usize>,
    max_files: Option<usize>,
    search: Option<String>,
    ticks: Option<u64>,
    watch: bool,
    git_only: bool,
    json: bool,
}

fn main() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(""))
        .format_timestamp_secs()
        .try_init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(err) => {
            eprintln!("sidetree: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = run(options) {
        eprintln!("sidetree: {err}");
        process::exit(1);
    }
}

fn parse_args() -> Result<Options, String> {
    let mut args = Arguments::from_env();
    let watch = args.contains("--watch");
    let git_only = args.contains("--git-only");
    let json = args.contains("--json");
    let git_poll_ms = args
        .opt_value_from_str::<_, u64>("--git-poll-ms")
        .map_err(|err| err.to_string())?;
    let max_depth = args
        .opt_value_from_str::<_, usize>("--max-depth")
        .map_err(|err| err.to_string())?;
    let max_files = args
        .opt_value_from_str::<_, usize>("--max-files")
        .map_err(|err| err.to_string())?;
    let search = args
        .opt_value_from_str::<_, String>("--search")
        .map_err(|err| err.to_string())?;
    let ticks = args
        .opt_value_from_str::<_, u64>("--ticks")
        .map_err(|err| err.to_string())?;
    let session = args
        .opt_value_from_str::<_, String>("--session")
        .map_err(|err| err.to_string())?;
    let root: Option<String> = args.opt_free_from_str().map_err(|err| err.to_string())?;

    let leftover = args.finish();
    if !leftover.is_empty() {
        let extras: Vec<String> = leftover
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        return Err(format!("unexpected arguments: {}", extras.join(" ")));
    }

    Ok(Options {
        root,
        session,
        git_poll_ms,
        max_depth,
        max_files,
        search,
        ticks,
        watch,
        git_only,
        json,
    })
}

fn run(options: Options) -> Result<(), String> {
    let mut config = SessionConfig::default();
    if let Some(ms) = options.git_poll_ms {
        config.pollers.git_interval = Duration::from_millis(ms.max(100));
    }
    if let Some(depth) = options.max_depth {
        config.limits.max_depth = depth;
    }
    if let Some(files) = options.max_files {
        config.limits.max_files = files.max(1);
    }
    let debounce = config.search_debounce;

    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new());
    let mut session = SidebarSession::new(backend.clone(), config);

    match (&options.root, &options.session) {
        (Some(raw), _) => {
            let root = resolve_root(raw)?;
            session.set_root(&root).map_err(|err| err.to_string())?;
        }
        (None, Some(_)) => {}
        (None, None) => {
            let cwd = std::env::current_dir().map_err(|err| err.to_string())?;
            session
                .set_root(&cwd.to_string_lossy())
                .map_err(|err| err.to_string())?;
        }
    }
    if let Some(id) = options.session.clone() {
        session
            .set_terminal_session(Some(id))
            .map_err(|err| err.to_string())?;
        if session.root().is_none() {
            session.load_tree();
        }
    }

    if let Some(root) = session.root().map(str::to_string) {
        session.handle_git_poll(&root, backend.get_git_stats(&root));
        session.handle_branch(&root, backend.get_current_branch(&root));
    }
    if options.git_only {
        session.toggle_git_filter();
    } else {
        session.expand_all();
    }
    if let Some(query) = &options.search {
        let now = Instant::now();
        session.set_search_query(query, now);
        session.pump(now + debounce).map_err(|err| err.to_string())?;
    }

    render(&session, options.json)?;

    if !options.watch {
        return Ok(());
    }

    session.open().map_err(|err| err.to_string())?;
    let mut tick = 0u64;
    loop {
        if options.ticks.is_some_and(|limit| tick >= limit) {
            break;
        }
        thread::sleep(WATCH_TICK);
        tick += 1;
        let applied = session
            .pump(Instant::now())
            .map_err(|err| err.to_string())?;
        if applied > 0 {
            render(&session, options.json)?;
        }
    }
    session.close();
    Ok(())
}

fn resolve_root(raw: &str) -> Result<String, String> {
    let expanded = full(raw).map_err(|err| err.to_string())?;
    let path = PathBuf::from(expanded.as_ref());
    if !path.exists() {
        return Err(format!("{} does not exist", path.display()));
    }
    if !path.is_dir() {
        return Err(format!("{} is not a directory", path.display()));
    }
    let canonical = path
        .canonicalize()
        .map_err(|err| format!("failed to canonicalize {}: {err}", path.display()))?;
    Ok(canonical.to_string_lossy().into_owned())
}

fn render(session: &SidebarSession, json: bool) -> Result<(), String> {
    if json {
        let tree = session.displayed_tree();
        let out = serde_json::to_string_pretty(&tree).map_err(|err| err.to_string())?;
        println!("{out}");
        return Ok(());
    }

    let root = session.root().unwrap_or("(no directory)");
    match session.branch() {
        Some(branch) => println!("{root} [{branch}]"),
        None => println!("{root}"),
    }
    match session.status() {
        TreeStatus::Waiting => println!("Waiting for terminal..."),
        TreeStatus::Loading => println!("Loading..."),
        TreeStatus::Failed(message) => println!("Error loading directory: {message}"),
        TreeStatus::Ready => {
            let snapshot = session.git_snapshot();
            for row in session.visible_rows() {
                let expanded = session.expanded().contains(row.node.path());
                println!("{}", format_row(&row, snapshot, expanded));
            }
        }
    }
    for notice in session.notices().iter() {
        let action = notice
            .action
            .map(|action| format!(" ({})", action.label()))
            .unwrap_or_default();
        eprintln!(
            "[{}] {}{action}",
            format_notice_time(notice.raised_at),
            notice.message
        );
    }
    Ok(())
}

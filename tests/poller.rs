use std::sync::Arc;
use std::time::{Duration, Instant};

use sidetree::backend::{Backend, LocalBackend};
use sidetree::poller::{spawn_branch_poller, spawn_git_poller, spawn_poller};

#[test]
fn git_poller_reports_for_its_path() {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = temp
        .path()
        .canonicalize()
        .expect("canonical temp dir")
        .to_string_lossy()
        .into_owned();

    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new());
    let handle = spawn_git_poller(backend, root.clone(), Duration::from_millis(50))
        .expect("spawn git poller");
    let event = handle
        .events
        .recv_timeout(Duration::from_secs(5))
        .expect("first git tick");

    assert_eq!(event.key, root);
    assert_eq!(handle.key(), root);
    handle.stop();
}

#[test]
fn branch_poller_keeps_ticking_until_stopped() {
    let temp = tempfile::tempdir().expect("temp dir");
    std::fs::create_dir_all(temp.path().join(".git")).expect("create .git");
    std::fs::write(temp.path().join(".git/HEAD"), "ref: refs/heads/feature\n").expect("write HEAD");
    let root = temp.path().to_string_lossy().into_owned();

    let backend: Arc<dyn Backend> = Arc::new(LocalBackend::new());
    let handle = spawn_branch_poller(backend, root, Duration::from_millis(20))
        .expect("spawn branch poller");
    let events = handle.events.clone();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut ticks = 0;
    while Instant::now() < deadline && ticks < 3 {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(event) => {
                let branch = event.value.expect("branch read");
                assert_eq!(branch.as_deref(), Some("feature"));
                ticks += 1;
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(err) => panic!("poll channel error: {err}"),
        }
    }
    assert_eq!(ticks, 3, "expected repeated branch ticks");

    handle.stop();
    while events.try_recv().is_ok() {}
    std::thread::sleep(Duration::from_millis(100));
    assert!(events.try_recv().is_err(), "no ticks after stop");
}

#[test]
fn dropping_the_handle_stops_the_thread() {
    let handle = spawn_poller("drop", "k".into(), Duration::from_millis(10), |_| ())
        .expect("spawn poller");
    let events = handle.events.clone();
    events
        .recv_timeout(Duration::from_secs(2))
        .expect("first tick");
    drop(handle);
    std::thread::sleep(Duration::from_millis(60));
    while events.try_recv().is_ok() {}
    std::thread::sleep(Duration::from_millis(60));
    assert!(events.try_recv().is_err());
}

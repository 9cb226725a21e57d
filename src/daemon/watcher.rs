//! Directory watcher: one source thread pumping filesystem events into
//! a callback.
//!
//! The callback runs on the source thread and is expected to hand the
//! event straight to the worker pool; anything slow belongs in a task.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{BigsiError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A running watch on one directory.
pub struct DirWatcher {
    // Held so the native monitor stays alive; dropped on stop
    watcher: RecommendedWatcher,
    thread: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

impl DirWatcher {
    /// Watch `path` (non-recursive) and invoke `on_event` with the
    /// paths of every create or modify notification.
    pub fn start<F>(path: &Path, on_event: F) -> Result<DirWatcher>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(tx, notify::Config::default())?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        info!("watching directory: {}", path.display());

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("bigsid-watcher".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(Ok(event)) => {
                            if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                                && !event.paths.is_empty()
                            {
                                on_event(event.paths);
                            }
                        }
                        Ok(Err(e)) => warn!("watch event error: {}", e),
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("watcher thread exiting");
            })
            .map_err(|e| BigsiError::Thread(format!("could not spawn watcher thread: {}", e)))?;

        Ok(DirWatcher {
            watcher,
            thread,
            stop,
        })
    }

    /// Stop the watch and join the source thread.
    pub fn stop(self) -> Result<()> {
        let DirWatcher {
            watcher,
            thread,
            stop,
        } = self;
        stop.store(true, Ordering::Release);
        // Dropping the native watcher closes the event channel
        drop(watcher);
        thread
            .join()
            .map_err(|_| BigsiError::Thread("watcher thread panicked".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Instant;
    use tempfile::tempdir;

    fn wait_until(deadline: Duration, mut probe: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if probe() {
                return true;
            }
            thread::sleep(Duration::from_millis(50));
        }
        false
    }

    #[test]
    fn file_creation_reaches_the_callback() {
        let dir = tempdir().unwrap();
        let seen: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let watcher = DirWatcher::start(dir.path(), move |paths| {
            seen_clone.lock().unwrap().extend(paths);
        })
        .unwrap();

        let target = dir.path().join("incoming.fa");
        let mut f = File::create(&target).unwrap();
        writeln!(f, ">seq").unwrap();
        writeln!(f, "ACGT").unwrap();
        f.sync_all().unwrap();
        drop(f);

        assert!(
            wait_until(Duration::from_secs(5), || {
                seen.lock().unwrap().iter().any(|p| p.ends_with("incoming.fa"))
            }),
            "watcher never reported the new file"
        );
        watcher.stop().unwrap();
    }

    #[test]
    fn stop_joins_cleanly_without_events() {
        let dir = tempdir().unwrap();
        let watcher = DirWatcher::start(dir.path(), |_| {}).unwrap();
        watcher.stop().unwrap();
    }

    #[test]
    fn missing_directory_is_a_watcher_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("not-there");
        assert!(matches!(
            DirWatcher::start(&missing, |_| {}),
            Err(BigsiError::Watcher(_))
        ));
    }
}

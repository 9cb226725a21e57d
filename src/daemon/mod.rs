//! The background service: detach, watch a directory, sketch incoming
//! sequence files through the worker pool, and shut down cleanly on
//! SIGTERM.
//!
//! Lifecycle: INIT -> DETACHED -> RUNNING -> STOPPING -> STOPPED. The
//! stopping order is fixed: watcher first (no new events), then drain
//! and destroy the pool, then freeze-and-flush whatever was ingested,
//! then clear the pid/running handshake in the config file.

pub mod pool;
pub mod watcher;

use std::path::Path;
use std::sync::{Arc, Mutex};

use daemonize::Daemonize;
use log::{error, info, warn};
use signal_hook::consts::SIGTERM;
use signal_hook::iterator::Signals;

use crate::bigsi::Bigsi;
use crate::config::Config;
use crate::error::{BigsiError, Result};
use crate::logging;
use crate::sketch::{self, SketchParams};
use self::pool::WorkerPool;
use self::watcher::DirWatcher;

/// Shared between the watcher callback tasks and the shutdown path.
/// The `Option` lets shutdown take ownership for the freeze.
type SharedIndex = Arc<Mutex<Option<Bigsi>>>;

/// Run the daemon until SIGTERM. With `foreground` set the detach is
/// skipped and logs stay on stderr (the caller set that logger up).
pub fn run(mut config: Config, pool_size: usize, foreground: bool) -> Result<()> {
    if !foreground {
        Daemonize::new()
            .working_directory(&config.working_dir)
            .umask(0o000)
            .start()
            .map_err(|e| BigsiError::Daemon(e.to_string()))?;
        // We are the detached child; stdio now points at /dev/null
        logging::init_file_logger(&config.log_file())?;
    }

    info!("started the bigsid daemon");
    let pid = std::process::id() as i32;
    info!("daemon pid: {}", pid);

    // Handshake: other subcommands find us through the config file
    config.pid = pid;
    config.running = true;
    let config_path = config.config_file.clone();
    config.store(&config_path)?;

    let (num_bits, num_hashes) = config.bloom_params()?;
    let params = SketchParams {
        k_size: config.k_size,
        sketch_size: config.sketch_size,
        num_bits,
        num_hashes,
    };
    let index: SharedIndex = Arc::new(Mutex::new(Some(Bigsi::new(
        num_bits,
        num_hashes,
        &config.index_dir(),
    )?)));

    // Signal handler registered before the watcher so no window exists
    // where an early SIGTERM is lost
    let mut signals = Signals::new([SIGTERM])?;

    let pool = Arc::new(WorkerPool::new(pool_size)?);
    info!("created worker pool of {} threads", pool_size);

    let watcher = {
        let pool = Arc::clone(&pool);
        let index = Arc::clone(&index);
        DirWatcher::start(&config.watch_dir, move |paths| {
            let index = Arc::clone(&index);
            let task_params = params;
            pool.submit(move || {
                for path in paths {
                    if let Err(e) = ingest_file(&path, &task_params, &index) {
                        warn!("skipping {}: {}", path.display(), e);
                    }
                }
            });
        })?
    };

    // RUNNING: block until a termination signal arrives
    let _ = signals.forever().next();
    info!("sigterm received, shutting down the bigsid daemon");

    // STOPPING: release everything even when a step fails, report the
    // first failure afterwards
    let mut first_err: Option<BigsiError> = None;

    if let Err(e) = watcher.stop() {
        error!("stopping the directory watcher: {}", e);
        first_err.get_or_insert(e);
    }

    pool.wait();
    match Arc::try_unwrap(pool) {
        Ok(pool) => {
            if let Err(e) = pool.destroy() {
                error!("destroying the worker pool: {}", e);
                first_err.get_or_insert(e);
            }
        }
        // Drop joins the workers as a fallback
        Err(pool) => drop(pool),
    }
    info!("stopped the worker threads");

    if let Err(e) = persist_index(&index) {
        error!("persisting the index: {}", e);
        first_err.get_or_insert(e);
    }

    config.pid = -1;
    config.running = false;
    if let Err(e) = config.store(&config_path) {
        error!("clearing the running flag: {}", e);
        first_err.get_or_insert(e);
    }

    match first_err {
        None => {
            info!("stopped the bigsid daemon");
            Ok(())
        }
        Some(e) => Err(e),
    }
}

/// Sketch every record of one file into the shared build-phase index.
fn ingest_file(path: &Path, params: &SketchParams, index: &SharedIndex) -> Result<()> {
    if !path.is_file() {
        return Ok(());
    }
    let blooms = sketch::blooms_from_file(path, params)?;
    if blooms.is_empty() {
        return Ok(());
    }
    let count = blooms.len();

    let mut guard = index.lock().unwrap();
    let bigsi = guard.as_mut().ok_or(BigsiError::Unfrozen)?;
    bigsi.add(blooms.iter().map(|(id, bf)| (id.as_str(), bf)), count)?;
    info!("ingested {} records from {}", count, path.display());
    Ok(())
}

/// Freeze and flush the ingested colours; an empty index is released
/// without touching disk.
fn persist_index(index: &SharedIndex) -> Result<()> {
    let Some(mut bigsi) = index.lock().unwrap().take() else {
        return Ok(());
    };
    if bigsi.colours() == 0 {
        info!("no sequences ingested, nothing to persist");
        return bigsi.destroy();
    }
    info!("indexing {} colours before exit", bigsi.colours());
    bigsi.index()?;
    bigsi.flush()
}

//! The start / stop / info subcommand bodies.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::info;
use signal_hook::consts::SIGTERM;

use crate::config::Config;
use crate::daemon;
use crate::logging;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// True when a pid names a live process we may signal.
fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // Signal 0 probes for existence without delivering anything
    unsafe { libc::kill(pid, 0) == 0 }
}

fn send_sigterm(pid: i32) -> Result<()> {
    let ret = unsafe { libc::kill(pid, SIGTERM) };
    if ret != 0 {
        bail!(
            "could not signal pid {}: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
    Ok(())
}

/// Start the daemon: write the config handshake file, then detach (or
/// stay in the foreground) and run until terminated.
pub fn start(
    config_path: &Path,
    watch_dir: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    threads: usize,
    foreground: bool,
    verbose: bool,
) -> Result<()> {
    let mut config = if config_path.exists() {
        Config::load(config_path)
            .with_context(|| format!("failed to load config: {}", config_path.display()))?
    } else {
        Config::default()
    };

    if config.running && pid_alive(config.pid) {
        bail!(
            "a bigsid daemon is already running (pid {}); stop it first",
            config.pid
        );
    }

    if let Some(dir) = watch_dir {
        config.watch_dir = dir;
    }
    if let Some(dir) = working_dir {
        config.working_dir = dir;
    }
    config.validate()?;

    fs::create_dir_all(&config.working_dir).with_context(|| {
        format!("could not create working dir: {}", config.working_dir.display())
    })?;
    fs::create_dir_all(&config.watch_dir)
        .with_context(|| format!("could not create watch dir: {}", config.watch_dir.display()))?;

    // The daemon chdirs into the working dir; absolute paths keep the
    // record meaningful from anywhere
    config.working_dir = fs::canonicalize(&config.working_dir)?;
    config.watch_dir = fs::canonicalize(&config.watch_dir)?;

    // The daemon rewrites pid/running after the detach; this write
    // pins the rest of the record (and the config_file path) first
    config.store(config_path)?;

    if foreground {
        logging::init_logger(verbose);
    }
    daemon::run(config, threads, foreground)?;
    Ok(())
}

/// Signal the running daemon, then wait for it to clear the running
/// flag in the config file.
pub fn stop(config_path: &Path, timeout_secs: u64) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config: {}", config_path.display()))?;

    if !config.running || config.pid <= 0 {
        bail!("no running daemon recorded in {}", config_path.display());
    }
    if !pid_alive(config.pid) {
        bail!(
            "config records pid {} but no such process is running; remove the stale file",
            config.pid
        );
    }

    info!("sending SIGTERM to pid {}", config.pid);
    send_sigterm(config.pid)?;

    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    loop {
        if let Ok(current) = Config::load(config_path) {
            if !current.running {
                info!("daemon stopped");
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            bail!(
                "daemon (pid {}) did not stop within {}s",
                config.pid,
                timeout_secs
            );
        }
        thread::sleep(STOP_POLL_INTERVAL);
    }
}

/// Print the daemon's pid, or the whole config record.
pub fn info_cmd(config_path: &Path, pid_only: bool) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config: {}", config_path.display()))?;

    if pid_only {
        println!("{}", config.pid);
    } else {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stop_without_a_daemon_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bigsid.json");
        let mut config = Config::default();
        config.store(&path).unwrap();

        let err = stop(&path, 1).unwrap_err();
        assert!(err.to_string().contains("no running daemon"));
    }

    #[test]
    fn stop_rejects_a_stale_pid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bigsid.json");
        let mut config = Config::default();
        config.running = true;
        // A pid from far beyond the default pid_max
        config.pid = i32::MAX - 1;
        config.store(&path).unwrap();

        let err = stop(&path, 1).unwrap_err();
        assert!(err.to_string().contains("no such process"));
    }

    #[test]
    fn pid_alive_detects_ourselves() {
        assert!(pid_alive(std::process::id() as i32));
        assert!(!pid_alive(-1));
        assert!(!pid_alive(0));
    }
}

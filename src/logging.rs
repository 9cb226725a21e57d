use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use crate::error::{BigsiError, Result};

static START_TIME: OnceLock<Instant> = OnceLock::new();

fn builder(verbose: bool) -> env_logger::Builder {
    START_TIME.set(Instant::now()).ok();

    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level).format(|buf, record| {
        let elapsed = START_TIME.get().unwrap().elapsed();
        let hours = elapsed.as_secs() / 3600;
        let minutes = (elapsed.as_secs() % 3600) / 60;
        let seconds = elapsed.as_secs() % 60;

        writeln!(
            buf,
            "[{:02}:{:02}:{:02}] {}: {}",
            hours,
            minutes,
            seconds,
            record.level(),
            record.args()
        )
    });
    builder
}

/// Initialize the logger with custom formatting showing elapsed time.
///
/// If verbose is true, sets log level to Info, otherwise to Warn.
/// Output format: [HH:MM:SS] LEVEL: message
/// All output goes to stderr.
pub fn init_logger(verbose: bool) {
    builder(verbose)
        .target(env_logger::Target::Stderr)
        .init();
}

/// Divert the log to a file; used by the daemon once detached, where
/// stderr points at /dev/null.
pub fn init_file_logger(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| BigsiError::io(path, "open log", e))?;
    builder(true)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

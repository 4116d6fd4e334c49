//! Diagnostic logging setup.
//!
//! Standard output carries the driver result line, so diagnostics go to a
//! log file and fall back to standard error.

use std::io;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::files::{self, FileError};

/// Default directory for driver logs.
pub const DEFAULT_LOG_DIR: &str = "/var/log/qingcloud-flex-volume";

/// Log file name inside the log directory.
pub const LOG_FILE_NAME: &str = "qingcloud-flex-volume.log";

/// Where diagnostics are written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogTarget {
    /// Appending to this file.
    File(Utf8PathBuf),
    /// The log file was unusable.
    Stderr,
}

fn open_log_file(log_dir: &Utf8Path) -> Result<(std::fs::File, Utf8PathBuf), FileError> {
    files::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = files::open_append(&path)?;
    Ok((file, path))
}

/// Installs the global subscriber. `RUST_LOG` selects the filter and
/// defaults to `info`.
///
/// A subscriber that is already installed is left in place.
pub fn init_logging(log_dir: &Utf8Path) -> LogTarget {
    let (writer, target) = match open_log_file(log_dir) {
        Ok((file, path)) => (BoxMakeWriter::new(Mutex::new(file)), LogTarget::File(path)),
        Err(_) => (BoxMakeWriter::new(io::stderr), LogTarget::Stderr),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("subscriber already installed");
    }
    target
}

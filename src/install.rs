//! Installs the driver binary into the kubelet exec plugin directory.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::info;

use crate::files::{self, FileError};

/// Default kubelet exec plugin directory.
pub const DEFAULT_DRIVER_DIR: &str = "/usr/libexec/kubernetes/kubelet-plugins/volume/exec/";

/// Plugin directory name: `<vendor>~<driver>`.
pub const DRIVER_DIR_NAME: &str = "qingcloud~flex-volume";

/// Executable name the kubelet invokes inside the plugin directory.
pub const DRIVER_FILE_NAME: &str = "flex-volume";

/// Errors raised while installing the driver.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InstallError {
    /// The running executable could not be located.
    #[error("cannot locate the running executable: {message}")]
    CurrentExe {
        /// Underlying error message.
        message: String,
    },
    /// Creating the directory or the link failed.
    #[error(transparent)]
    Files(#[from] FileError),
}

/// Returns where the driver is installed under `driver_dir`.
#[must_use]
pub fn install_target(driver_dir: &Utf8Path) -> Utf8PathBuf {
    driver_dir.join(DRIVER_DIR_NAME).join(DRIVER_FILE_NAME)
}

/// Hard-links `executable` into `driver_dir`, replacing a previous install,
/// and returns the installed path.
///
/// # Errors
///
/// Returns [`InstallError::Files`] when the directory or link cannot be
/// created.
pub fn install_driver(
    driver_dir: &Utf8Path,
    executable: &Utf8Path,
) -> Result<Utf8PathBuf, InstallError> {
    let target = install_target(driver_dir);
    files::create_dir_all(&driver_dir.join(DRIVER_DIR_NAME))?;
    files::replace_hard_link(executable, &target)?;
    info!(target = %target, "driver installed");
    Ok(target)
}

/// Returns the path of the running executable.
///
/// # Errors
///
/// Returns [`InstallError::CurrentExe`] when the path is unavailable or not
/// UTF-8.
pub fn current_executable() -> Result<Utf8PathBuf, InstallError> {
    let path = std::env::current_exe().map_err(|err| InstallError::CurrentExe {
        message: err.to_string(),
    })?;
    Utf8PathBuf::from_path_buf(path).map_err(|path| InstallError::CurrentExe {
        message: format!("non-UTF-8 path {}", path.display()),
    })
}

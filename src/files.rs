//! Filesystem helpers built on `cap-std` ambient directories.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs::OpenOptions;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised by filesystem helpers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FileError {
    /// The path cannot be split into a directory and a file name.
    #[error("invalid path {path}: {message}")]
    InvalidPath {
        /// Offending path.
        path: Utf8PathBuf,
        /// Explanation.
        message: String,
    },
    /// An I/O operation failed.
    #[error("i/o error on {path}: {message}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
}

impl FileError {
    fn io(path: &Utf8Path, err: &io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), FileError> {
    let file_name = path.file_name().ok_or_else(|| FileError::InvalidPath {
        path: path.to_path_buf(),
        message: String::from("path has no file name"),
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    Ok((parent, file_name))
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &str), FileError> {
    let (parent, file_name) = split(path)?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| FileError::io(parent, &err))?;
    Ok((dir, file_name))
}

/// Reads a UTF-8 file.
///
/// # Errors
///
/// Returns [`FileError`] when the file cannot be opened or read.
pub fn read_to_string(path: &Utf8Path) -> Result<String, FileError> {
    let (dir, file_name) = open_parent(path)?;
    dir.read_to_string(file_name)
        .map_err(|err| FileError::io(path, &err))
}

/// Returns `true` when `path` exists. A missing parent directory counts as
/// absent.
///
/// # Errors
///
/// Returns [`FileError`] when the parent exists but cannot be inspected.
pub fn exists(path: &Utf8Path) -> Result<bool, FileError> {
    let (parent, file_name) = split(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir
            .try_exists(file_name)
            .map_err(|err| FileError::io(path, &err)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(FileError::io(parent, &err)),
    }
}

/// Creates `path` and any missing parents.
///
/// # Errors
///
/// Returns [`FileError::Io`] when creation fails.
pub fn create_dir_all(path: &Utf8Path) -> Result<(), FileError> {
    Dir::create_ambient_dir_all(path, ambient_authority()).map_err(|err| FileError::io(path, &err))
}

/// Removes an empty directory.
///
/// # Errors
///
/// Returns [`FileError::Io`] when removal fails.
pub fn remove_dir(path: &Utf8Path) -> Result<(), FileError> {
    let (dir, name) = open_parent(path)?;
    dir.remove_dir(name).map_err(|err| FileError::io(path, &err))
}

/// Opens `path` for appending, creating it when absent.
///
/// # Errors
///
/// Returns [`FileError`] when the parent directory or the file cannot be
/// opened.
pub fn open_append(path: &Utf8Path) -> Result<std::fs::File, FileError> {
    let (dir, name) = open_parent(path)?;
    dir.open_with(name, OpenOptions::new().append(true).create(true))
        .map(cap_std::fs_utf8::File::into_std)
        .map_err(|err| FileError::io(path, &err))
}

/// Hard-links `source` to `target`, replacing an existing `target`. Across
/// filesystems the file is copied instead.
///
/// # Errors
///
/// Returns [`FileError`] when either directory cannot be opened or the
/// link cannot be created.
pub fn replace_hard_link(source: &Utf8Path, target: &Utf8Path) -> Result<(), FileError> {
    let (source_dir, source_name) = open_parent(source)?;
    let (target_dir, target_name) = open_parent(target)?;
    match target_dir.remove_file(target_name) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(FileError::io(target, &err)),
    }
    match source_dir.hard_link(source_name, &target_dir, target_name) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => source_dir
            .copy(source_name, &target_dir, target_name)
            .map(|_bytes| ())
            .map_err(|copy_err| FileError::io(target, &copy_err)),
        Err(err) => Err(FileError::io(target, &err)),
    }
}

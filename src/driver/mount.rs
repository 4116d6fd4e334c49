//! Format-and-mount helpers over external commands.

use std::ffi::OsString;

use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandOutput, CommandRunner};

/// `blkid -p` exits with 2 when the device carries no recognised signature.
const BLKID_NO_SIGNATURE: i32 = 2;

/// Errors raised while probing, formatting, mounting, or unmounting.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MountError {
    /// The helper could not be started.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The helper exited unsuccessfully.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command name.
        program: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable exit status.
        status_text: String,
        /// Captured standard error.
        stderr: String,
    },
}

impl MountError {
    fn failure(program: &str, output: CommandOutput) -> Self {
        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Self::CommandFailure {
            program: program.to_owned(),
            status: output.code,
            status_text,
            stderr: output.stderr.trim().to_owned(),
        }
    }
}

/// Mount operations backed by `mountpoint`, `blkid`, `mkfs`, `mount`, and
/// `umount`.
#[derive(Debug)]
pub struct Mounter<'a, R> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> Mounter<'a, R> {
    /// Wraps a command runner.
    #[must_use]
    pub const fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    fn run_checked(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, MountError> {
        let output = self.runner.run(program, args)?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(MountError::failure(program, output))
        }
    }

    /// Reports whether `dir` is a mountpoint.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::Command`] when `mountpoint` cannot be run.
    pub fn is_mountpoint(&self, dir: &str) -> Result<bool, MountError> {
        let args = [OsString::from("-q"), OsString::from(dir)];
        Ok(self.runner.run("mountpoint", &args)?.is_success())
    }

    /// Returns the filesystem on `device`, or `None` when it is blank.
    ///
    /// # Errors
    ///
    /// Returns [`MountError`] when `blkid` fails for another reason.
    pub fn probe_filesystem(&self, device: &str) -> Result<Option<String>, MountError> {
        let program = "blkid";
        let args = [
            OsString::from("-p"),
            OsString::from("-s"),
            OsString::from("TYPE"),
            OsString::from("-o"),
            OsString::from("value"),
            OsString::from(device),
        ];
        let output = self.runner.run(program, &args)?;
        if output.is_success() {
            let fs_type = output.stdout.trim();
            return Ok((!fs_type.is_empty()).then(|| fs_type.to_owned()));
        }
        if output.code == Some(BLKID_NO_SIGNATURE) {
            return Ok(None);
        }
        Err(MountError::failure(program, output))
    }

    /// Creates a filesystem of `fs_type` on `device`.
    ///
    /// # Errors
    ///
    /// Returns [`MountError`] when `mkfs` fails.
    pub fn format(&self, device: &str, fs_type: &str) -> Result<(), MountError> {
        let program = format!("mkfs.{fs_type}");
        let mut args = Vec::with_capacity(3);
        if matches!(fs_type, "ext3" | "ext4") {
            args.push(OsString::from("-F"));
            args.push(OsString::from("-m0"));
        }
        args.push(OsString::from(device));
        info!(device, fs_type, "formatting device");
        self.run_checked(&program, &args)?;
        Ok(())
    }

    /// Mounts `device` on `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MountError`] when `mount` fails.
    pub fn mount(
        &self,
        device: &str,
        dir: &str,
        fs_type: &str,
        flags: &[String],
    ) -> Result<(), MountError> {
        let mut args = vec![OsString::from("-t"), OsString::from(fs_type)];
        if !flags.is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(flags.join(",")));
        }
        args.push(OsString::from(device));
        args.push(OsString::from(dir));
        self.run_checked("mount", &args)?;
        Ok(())
    }

    /// Formats `device` when it carries no filesystem, then mounts it.
    ///
    /// # Errors
    ///
    /// Returns [`MountError`] when any step fails.
    pub fn format_and_mount(
        &self,
        device: &str,
        dir: &str,
        fs_type: &str,
        flags: &[String],
    ) -> Result<(), MountError> {
        if self.probe_filesystem(device)?.is_none() {
            self.format(device, fs_type)?;
        }
        self.mount(device, dir, fs_type, flags)
    }

    /// Unmounts `dir`; a directory that is not mounted is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`MountError`] when `umount` fails.
    pub fn unmount(&self, dir: &str) -> Result<(), MountError> {
        if !self.is_mountpoint(dir)? {
            return Ok(());
        }
        self.run_checked("umount", &[OsString::from(dir)])?;
        Ok(())
    }
}

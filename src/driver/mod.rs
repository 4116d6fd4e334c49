//! FlexVolume exec driver: maps one verb invocation onto the volume
//! manager and the mount helpers, producing a single [`OperationResult`].

mod mount;
mod options;
mod result;

use std::time::Duration;

use camino::Utf8Path;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::files;
use crate::types::{InstanceId, VolumeId};
use crate::volume::VolumeManager;

pub use mount::{MountError, Mounter};
pub use options::{
    DEFAULT_FS_TYPE, DriverOptions, InvalidOptions, OPTION_FLAGS, OPTION_FS_TYPE,
    OPTION_PV_OR_VOLUME_NAME, OPTION_READ_WRITE, OPTION_VOLUME_ID,
};
pub use result::{OperationResult, Status};

/// Interval between device existence checks in `waitforattach`.
pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Verbs understood by the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verb {
    /// Protocol handshake.
    Init,
    /// Attach a volume to a node.
    Attach,
    /// Detach a volume from a node.
    Detach,
    /// Format if needed, then mount the device on a global directory.
    MountDevice,
    /// Unmount the global directory.
    UnmountDevice,
    /// Block until the device node appears.
    WaitForAttach,
    /// Report a unique volume name.
    GetVolumeName,
    /// Report attachment state.
    IsAttached,
}

impl Verb {
    /// Parses a verb as passed on the command line.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let verb = match raw {
            "init" => Self::Init,
            "attach" => Self::Attach,
            "detach" => Self::Detach,
            "mountdevice" => Self::MountDevice,
            "unmountdevice" => Self::UnmountDevice,
            "waitforattach" => Self::WaitForAttach,
            "getvolumename" => Self::GetVolumeName,
            "isattached" => Self::IsAttached,
            _ => return None,
        };
        Some(verb)
    }

    /// Command-line spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Attach => "attach",
            Self::Detach => "detach",
            Self::MountDevice => "mountdevice",
            Self::UnmountDevice => "unmountdevice",
            Self::WaitForAttach => "waitforattach",
            Self::GetVolumeName => "getvolumename",
            Self::IsAttached => "isattached",
        }
    }

    const fn usage(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Attach => "attach <json options> <node name>",
            Self::Detach => "detach <volume id or name> <node name>",
            Self::MountDevice => "mountdevice <mount dir> <device> <json options>",
            Self::UnmountDevice => "unmountdevice <mount dir>",
            Self::WaitForAttach => "waitforattach <device> <json options>",
            Self::GetVolumeName => "getvolumename <json options>",
            Self::IsAttached => "isattached <json options> <node name>",
        }
    }

    const fn arity(self) -> usize {
        match self {
            Self::Init => 0,
            Self::UnmountDevice | Self::GetVolumeName => 1,
            Self::Attach | Self::Detach | Self::WaitForAttach | Self::IsAttached => 2,
            Self::MountDevice => 3,
        }
    }
}

/// Usage failure returned when a verb is missing or lacks arguments.
#[must_use]
pub fn usage_failure(verb: Option<Verb>) -> OperationResult {
    verb.map_or_else(
        || {
            OperationResult::failure(
                "usage: qingcloud-flex-volume init|attach|detach|mountdevice|unmountdevice|waitforattach|getvolumename|isattached",
            )
        },
        |known| OperationResult::failure(format!("usage: {}", known.usage())),
    )
}

/// Outcome of checking a call before any volume manager is built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Dispatch {
    /// The call is already answered: `init`, an unknown verb, or missing
    /// arguments.
    Done(OperationResult),
    /// The verb needs the volume manager or the mount helpers.
    Run(Verb),
}

/// Answers the calls that need no remote access.
#[must_use]
pub fn dispatch(verb: &str, args: &[String]) -> Dispatch {
    let Some(parsed) = Verb::parse(verb) else {
        info!(verb, "verb not supported");
        return Dispatch::Done(OperationResult::not_supported(verb));
    };
    if args.len() < parsed.arity() {
        return Dispatch::Done(usage_failure(Some(parsed)));
    }
    if parsed == Verb::Init {
        return Dispatch::Done(OperationResult::success());
    }
    Dispatch::Run(parsed)
}

/// Dispatches driver verbs.
#[derive(Debug)]
pub struct FlexDriver<M, R> {
    manager: M,
    runner: R,
    device_poll: Duration,
}

impl<M: VolumeManager, R: CommandRunner> FlexDriver<M, R> {
    /// Creates a driver over a volume manager and a command runner.
    #[must_use]
    pub const fn new(manager: M, runner: R) -> Self {
        Self {
            manager,
            runner,
            device_poll: DEVICE_POLL_INTERVAL,
        }
    }

    /// Overrides the device poll interval used by `waitforattach`.
    #[must_use]
    pub const fn with_device_poll(mut self, interval: Duration) -> Self {
        self.device_poll = interval;
        self
    }

    /// Runs one verb. Unknown verbs are reported as not supported, and
    /// missing arguments fail before any remote call; extra arguments are
    /// ignored.
    pub async fn execute(&self, verb: &str, args: &[String]) -> OperationResult {
        let parsed = match dispatch(verb, args) {
            Dispatch::Done(result) => return result,
            Dispatch::Run(parsed) => parsed,
        };
        debug!(verb = parsed.as_str(), args = args.len(), "executing driver call");

        let result = match (parsed, args) {
            (Verb::Attach, [options, node, ..]) => self.attach(options, node).await,
            (Verb::Detach, [volume, node, ..]) => self.detach(volume, node).await,
            (Verb::MountDevice, [dir, device, options, ..]) => {
                self.mount_device(dir, device, options)
            }
            (Verb::UnmountDevice, [dir, ..]) => self.unmount_device(dir),
            (Verb::WaitForAttach, [device, options, ..]) => {
                self.wait_for_attach(device, options).await
            }
            (Verb::GetVolumeName, [options, ..]) => Self::volume_name(options),
            (Verb::IsAttached, [options, node, ..]) => self.is_attached(options, node).await,
            _ => usage_failure(Some(parsed)),
        };

        if result.status == Status::Failure {
            let message = result.message.as_deref().unwrap_or_default();
            warn!(verb, message, "driver call failed");
        }
        result
    }

    async fn attach(&self, raw_options: &str, node: &str) -> OperationResult {
        let options = match DriverOptions::parse(raw_options) {
            Ok(options) => options,
            Err(err) => return OperationResult::failure(err.to_string()),
        };
        let Some(volume_id) = options.volume_id() else {
            return OperationResult::failure("attach requires the volumeID option");
        };
        let volume = VolumeId::from(volume_id);
        let instance = InstanceId::from(node);

        if let Some(name) = options.pv_or_volume_name()
            && !VolumeId::looks_like_id(name)
            && let Err(err) = self.manager.update_volume(&volume, name).await
        {
            return OperationResult::failure(format!(
                "Error updating volume ({volume}) name to ({name}): {err}"
            ));
        }

        match self.manager.attach_volume(&volume, &instance).await {
            Ok(device) => {
                info!(volume_id = %volume, instance_id = %instance, device, "volume attached");
                OperationResult::success().with_device(device)
            }
            Err(err) => OperationResult::failure(format!(
                "Error attaching volume {volume} to node {node}: {err}"
            )),
        }
    }

    async fn detach(&self, volume_or_name: &str, node: &str) -> OperationResult {
        let volume = if VolumeId::looks_like_id(volume_or_name) {
            VolumeId::from(volume_or_name)
        } else {
            match self.manager.volume_id_by_name(volume_or_name).await {
                Ok(found) => found,
                Err(err) => {
                    return OperationResult::failure(format!(
                        "Error resolving volume name ({volume_or_name}): {err}"
                    ));
                }
            }
        };
        let instance = InstanceId::from(node);

        match self.manager.detach_volume(&volume, &instance).await {
            Ok(()) => {
                info!(volume_id = %volume, instance_id = %instance, "volume detached");
                OperationResult::success()
            }
            Err(err) => {
                OperationResult::failure(format!("Error detaching volume {volume}: {err}"))
            }
        }
    }

    fn mount_device(&self, dir: &str, device: &str, raw_options: &str) -> OperationResult {
        let options = match DriverOptions::parse(raw_options) {
            Ok(options) => options,
            Err(err) => return OperationResult::failure(err.to_string()),
        };
        let mounter = Mounter::new(&self.runner);
        let dir_path = Utf8Path::new(dir);

        if let Err(err) = files::create_dir_all(dir_path) {
            return OperationResult::failure(err.to_string());
        }
        match mounter.is_mountpoint(dir) {
            Ok(true) => {
                debug!(dir, "already mounted");
                return OperationResult::success();
            }
            Ok(false) => {}
            Err(err) => return OperationResult::failure(err.to_string()),
        }

        let fs_type = options.fs_type();
        match mounter.format_and_mount(device, dir, fs_type, &options.mount_flags()) {
            Ok(()) => {
                info!(device, dir, fs_type, "device mounted");
                OperationResult::success()
            }
            Err(err) => {
                if let Err(cleanup) = files::remove_dir(dir_path) {
                    debug!(dir, error = %cleanup, "mount directory left in place");
                }
                OperationResult::failure(format!(
                    "FormatAndMount device ({device}) dir ({dir}): {err}"
                ))
            }
        }
    }

    fn unmount_device(&self, dir: &str) -> OperationResult {
        match Mounter::new(&self.runner).unmount(dir) {
            Ok(()) => OperationResult::success(),
            Err(err) => OperationResult::failure(err.to_string()),
        }
    }

    async fn wait_for_attach(&self, device: &str, raw_options: &str) -> OperationResult {
        let options = match DriverOptions::parse(raw_options) {
            Ok(options) => options,
            Err(err) => return OperationResult::failure(err.to_string()),
        };
        let volume_id = options.volume_id().unwrap_or_default();
        if device.is_empty() {
            return OperationResult::failure(format!(
                "WaitForAttach failed for volume {volume_id}: device is empty"
            ));
        }

        loop {
            match tokio::fs::try_exists(device).await {
                Ok(true) => {
                    info!(volume_id, device, "device present");
                    return OperationResult::success().with_device(device);
                }
                Ok(false) => debug!(volume_id, device, "device not present yet"),
                Err(err) => warn!(volume_id, device, error = %err, "cannot check device"),
            }
            sleep(self.device_poll).await;
        }
    }

    fn volume_name(raw_options: &str) -> OperationResult {
        match DriverOptions::parse(raw_options) {
            Ok(options) => options.volume_id().map_or_else(
                || OperationResult::not_supported("getvolumename is not supported"),
                |volume_id| OperationResult::success().with_volume_name(volume_id),
            ),
            Err(err) => OperationResult::failure(err.to_string()),
        }
    }

    async fn is_attached(&self, raw_options: &str, node: &str) -> OperationResult {
        let options = match DriverOptions::parse(raw_options) {
            Ok(options) => options,
            Err(err) => return OperationResult::failure(err.to_string()),
        };
        let Some(volume_id) = options.volume_id() else {
            return OperationResult::failure("isattached requires the volumeID option");
        };
        let volume = VolumeId::from(volume_id);
        let instance = InstanceId::from(node);

        match self.manager.volume_is_attached(&volume, &instance).await {
            Ok(attached) => OperationResult::success().with_attached(attached),
            Err(err) => OperationResult::failure(err.to_string()),
        }
    }
}

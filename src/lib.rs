//! Block-volume lifecycle management for QingCloud.
//!
//! The crate plans volume sizes, waits on asynchronous provider jobs, and
//! manages create, attach, detach, and delete through a [`ControlPlane`]
//! abstraction. Two adapters sit on top of the [`VolumeManager`]: the
//! FlexVolume exec driver used by the kubelet and a provisioner used by a
//! dynamic-provisioning controller.

pub mod backend;
pub mod capacity;
pub mod command;
pub mod config;
pub mod driver;
pub mod files;
pub mod install;
pub mod job;
pub mod logging;
pub mod manager;
pub mod provisioner;
pub mod qingcloud;
pub mod test_support;
pub mod types;
pub mod volume;

pub use backend::{ControlPlane, JobStatus, RemoteError, VolumeQuery, VolumeRecord};
pub use capacity::{CapacityError, TierLimits, plan};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, QingCloudConfig};
pub use driver::{Dispatch, FlexDriver, OperationResult, Status, Verb, dispatch, usage_failure};
pub use install::{InstallError, current_executable, install_driver};
pub use job::{JobError, JobWaiter};
pub use logging::{LogTarget, init_logging};
pub use manager::CloudVolumeManager;
pub use provisioner::{ProvisionError, ProvisionRequest, ProvisionedVolume, VolumeProvisioner};
pub use qingcloud::QingCloudApi;
pub use types::{InstanceId, JobId, VolumeId};
pub use volume::{VolumeError, VolumeManager, VolumeOptions, VolumeType};

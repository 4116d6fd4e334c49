//! Control-plane abstraction for the remote block storage service.
//!
//! Every mutating call returns a [`JobId`] that must be polled through
//! [`ControlPlane::describe_job`] until the job reaches a terminal state.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::types::{InstanceId, JobId, VolumeId};
use crate::volume::VolumeOptions;

/// Boxed future returned by control-plane and volume manager operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Device binding of a volume to an instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attachment {
    /// Instance holding the volume.
    pub instance_id: InstanceId,
    /// Device path assigned by the hypervisor, possibly empty while the
    /// attach job is still settling.
    pub device: String,
}

/// Snapshot of a remote volume as reported by a describe call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeRecord {
    /// Volume identifier.
    pub id: VolumeId,
    /// Human-assigned volume name.
    pub name: String,
    /// Size in GiB.
    pub size_gb: u32,
    /// Provider status (for example `available` or `in-use`).
    pub status: String,
    /// Current attachment, if any.
    pub attachment: Option<Attachment>,
}

impl VolumeRecord {
    /// Returns `true` when the volume is bound to `instance`.
    #[must_use]
    pub fn is_attached_to(&self, instance: &InstanceId) -> bool {
        self.attachment
            .as_ref()
            .is_some_and(|attachment| attachment.instance_id == *instance)
    }

    /// Returns the non-empty device path on `instance`, if any.
    #[must_use]
    pub fn device_on(&self, instance: &InstanceId) -> Option<&str> {
        self.attachment
            .as_ref()
            .filter(|attachment| attachment.instance_id == *instance)
            .map(|attachment| attachment.device.as_str())
            .filter(|device| !device.is_empty())
    }
}

/// Snapshot of a compute instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceRecord {
    /// Instance identifier.
    pub id: InstanceId,
    /// Hardware class; `None` or `0` denotes a standard instance.
    pub instance_class: Option<i64>,
}

/// Selector for describe-volume calls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VolumeQuery<'a> {
    /// Exact lookup by identifier.
    Ids(&'a [VolumeId]),
    /// Fuzzy lookup by name or identifier fragment.
    SearchWord(&'a str),
}

/// Response to a create-volume call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreatedVolumes {
    /// Job tracking the creation.
    pub job_id: JobId,
    /// Identifiers allocated for the new volumes.
    pub volume_ids: Vec<VolumeId>,
}

/// Status reported for an asynchronous job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum JobStatus {
    /// Queued and not yet started.
    Pending,
    /// In progress, or reported with an unrecognised status.
    Working,
    /// Terminal success.
    Successful,
    /// Terminal failure with the raw provider status.
    Failed {
        /// Provider status string.
        status: String,
    },
}

impl JobStatus {
    /// Maps the provider's status string onto a [`JobStatus`].
    #[must_use]
    pub fn from_remote(status: &str) -> Self {
        match status {
            "successful" => Self::Successful,
            "failed" | "done with failure" => Self::Failed {
                status: status.to_owned(),
            },
            "pending" => Self::Pending,
            _ => Self::Working,
        }
    }
}

/// Errors raised while talking to the control plane.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteError {
    /// The API rejected the request.
    #[error("{action} rejected with code {code}: {message}")]
    Api {
        /// Action being invoked.
        action: String,
        /// Provider return code.
        code: i64,
        /// Provider message.
        message: String,
    },
    /// The request never produced a response.
    #[error("{action} transport failure: {message}")]
    Transport {
        /// Action being invoked.
        action: String,
        /// Underlying transport message.
        message: String,
    },
    /// The response could not be decoded.
    #[error("{action} returned an unreadable response: {message}")]
    Decode {
        /// Action being invoked.
        action: String,
        /// Decoder message.
        message: String,
    },
}

impl RemoteError {
    /// Returns `true` when the provider message contains `marker`.
    ///
    /// Used to recognise benign outcomes such as a volume that has already
    /// been deleted.
    #[must_use]
    pub fn mentions(&self, marker: &str) -> bool {
        match self {
            Self::Api { message, .. } => message.contains(marker),
            Self::Transport { .. } | Self::Decode { .. } => false,
        }
    }

    /// Returns `true` for failures that may succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Remote calls consumed by the volume manager.
pub trait ControlPlane: Send + Sync {
    /// Requests creation of a volume.
    fn create_volumes<'a>(
        &'a self,
        options: &'a VolumeOptions,
    ) -> BackendFuture<'a, CreatedVolumes, RemoteError>;

    /// Requests deletion of volumes.
    fn delete_volumes<'a>(&'a self, volumes: &'a [VolumeId])
    -> BackendFuture<'a, JobId, RemoteError>;

    /// Requests attachment of volumes to an instance.
    fn attach_volumes<'a>(
        &'a self,
        volumes: &'a [VolumeId],
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, JobId, RemoteError>;

    /// Requests detachment of volumes from an instance.
    fn detach_volumes<'a>(
        &'a self,
        volumes: &'a [VolumeId],
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, JobId, RemoteError>;

    /// Describes volumes matching `query`.
    fn describe_volumes<'a>(
        &'a self,
        query: VolumeQuery<'a>,
    ) -> BackendFuture<'a, Vec<VolumeRecord>, RemoteError>;

    /// Renames a volume.
    fn modify_volume_attributes<'a>(
        &'a self,
        volume: &'a VolumeId,
        name: &'a str,
    ) -> BackendFuture<'a, (), RemoteError>;

    /// Describes running instances.
    fn describe_instances<'a>(
        &'a self,
        instances: &'a [InstanceId],
    ) -> BackendFuture<'a, Vec<InstanceRecord>, RemoteError>;

    /// Reports the status of a job, or `None` when the job is unknown.
    fn describe_job<'a>(&'a self, job: &'a JobId)
    -> BackendFuture<'a, Option<JobStatus>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("successful", JobStatus::Successful)]
    #[case("pending", JobStatus::Pending)]
    #[case("working", JobStatus::Working)]
    #[case("rebooting", JobStatus::Working)]
    #[case("failed", JobStatus::Failed { status: String::from("failed") })]
    #[case("done with failure", JobStatus::Failed { status: String::from("done with failure") })]
    fn job_status_maps_remote_strings(#[case] raw: &str, #[case] expected: JobStatus) {
        assert_eq!(JobStatus::from_remote(raw), expected);
    }

    #[rstest]
    fn remote_error_matches_markers_only_on_api_errors() {
        let api = RemoteError::Api {
            action: String::from("DeleteVolumes"),
            code: 2100,
            message: String::from("resource vol-1 has already been deleted"),
        };
        let transport = RemoteError::Transport {
            action: String::from("DeleteVolumes"),
            message: String::from("already been deleted"),
        };

        assert!(api.mentions("already been deleted"));
        assert!(!transport.mentions("already been deleted"));
        assert!(transport.is_transient());
    }

    #[rstest]
    fn device_lookup_ignores_other_instances_and_empty_devices() {
        let mut record = VolumeRecord {
            id: VolumeId::from("vol-1"),
            name: String::from("data"),
            size_gb: 10,
            status: String::from("in-use"),
            attachment: Some(Attachment {
                instance_id: InstanceId::from("i-1"),
                device: String::new(),
            }),
        };

        assert!(record.is_attached_to(&InstanceId::from("i-1")));
        assert_eq!(record.device_on(&InstanceId::from("i-1")), None);

        record.attachment = Some(Attachment {
            instance_id: InstanceId::from("i-1"),
            device: String::from("/dev/sdc"),
        });
        assert_eq!(record.device_on(&InstanceId::from("i-1")), Some("/dev/sdc"));
        assert_eq!(record.device_on(&InstanceId::from("i-2")), None);
    }
}

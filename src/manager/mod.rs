//! [`VolumeManager`] implementation over a [`ControlPlane`].
//!
//! Every operation is a short, independently retryable transaction. Attach
//! and detach describe the volume first so repeated calls are safe, and
//! job waits on create, delete, and attach are best-effort: the describe
//! that follows is the authoritative result.

mod attach;
mod create;
mod detach;
mod lookup;
mod tier;

use std::collections::BTreeMap;
use std::slice;

use camino::Utf8PathBuf;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::backend::{BackendFuture, ControlPlane, RemoteError, VolumeQuery, VolumeRecord};
use crate::job::JobWaiter;
use crate::types::{InstanceId, JobId, VolumeId};
use crate::volume::{TierFuture, VolumeError, VolumeManager, VolumeOptions, VolumeType};

/// Default location of the instance identity file.
pub const DEFAULT_INSTANCE_ID_FILE: &str = "/etc/qingcloud/instance-id";

/// Volume manager backed by a remote control plane.
#[derive(Debug)]
pub struct CloudVolumeManager<P> {
    plane: P,
    waiter: JobWaiter,
    instance_id_file: Utf8PathBuf,
    default_tier: OnceCell<VolumeType>,
}

impl<P: ControlPlane> CloudVolumeManager<P> {
    /// Creates a manager that reads the local instance identity from
    /// `instance_id_file` when detecting the default tier.
    #[must_use]
    pub fn new(plane: P, instance_id_file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            plane,
            waiter: JobWaiter::default(),
            instance_id_file: instance_id_file.into(),
            default_tier: OnceCell::new(),
        }
    }

    /// Replaces the job waiter.
    #[must_use]
    pub const fn with_waiter(mut self, waiter: JobWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    async fn describe_one(&self, volume: &VolumeId) -> Result<Option<VolumeRecord>, RemoteError> {
        let records = self
            .plane
            .describe_volumes(VolumeQuery::Ids(slice::from_ref(volume)))
            .await?;
        Ok(records.into_iter().find(|record| record.id == *volume))
    }

    /// Waits for `job`, logging instead of failing.
    async fn settle(&self, job: &JobId, operation: &'static str) {
        if let Err(err) = self.waiter.wait(&self.plane, job).await {
            warn!(job_id = %job, operation, error = %err, "job wait did not complete");
        }
    }
}

impl<P: ControlPlane> VolumeManager for CloudVolumeManager<P> {
    fn create_volume<'a>(
        &'a self,
        options: &'a VolumeOptions,
    ) -> BackendFuture<'a, VolumeId, VolumeError> {
        Box::pin(async move { self.create(options).await })
    }

    fn delete_volume<'a>(&'a self, volume: &'a VolumeId) -> BackendFuture<'a, bool, VolumeError> {
        Box::pin(async move { self.delete(volume).await })
    }

    fn attach_volume<'a>(
        &'a self,
        volume: &'a VolumeId,
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, String, VolumeError> {
        Box::pin(async move { self.attach(volume, instance).await })
    }

    fn detach_volume<'a>(
        &'a self,
        volume: &'a VolumeId,
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, (), VolumeError> {
        Box::pin(async move { self.detach(volume, instance).await })
    }

    fn volume_is_attached<'a>(
        &'a self,
        volume: &'a VolumeId,
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, bool, VolumeError> {
        Box::pin(async move { self.is_attached(volume, instance).await })
    }

    fn disks_are_attached<'a>(
        &'a self,
        volumes: &'a [VolumeId],
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, BTreeMap<VolumeId, bool>, VolumeError> {
        Box::pin(async move { self.attachment_map(volumes, instance).await })
    }

    fn update_volume<'a>(
        &'a self,
        volume: &'a VolumeId,
        name: &'a str,
    ) -> BackendFuture<'a, (), VolumeError> {
        Box::pin(async move { self.rename(volume, name).await })
    }

    fn volume_id_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> BackendFuture<'a, VolumeId, VolumeError> {
        Box::pin(async move { self.find_by_name(name).await })
    }

    fn default_volume_type(&self) -> TierFuture<'_> {
        Box::pin(async move { self.cached_tier().await })
    }
}

#[cfg(test)]
mod tests;

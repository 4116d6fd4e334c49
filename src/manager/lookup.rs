//! Read-only queries and renames.

use std::collections::BTreeMap;

use tracing::info;

use crate::backend::{ControlPlane, VolumeQuery};
use crate::types::{InstanceId, VolumeId};
use crate::volume::VolumeError;

use super::CloudVolumeManager;

impl<P: ControlPlane> CloudVolumeManager<P> {
    pub(super) async fn is_attached(
        &self,
        volume: &VolumeId,
        instance: &InstanceId,
    ) -> Result<bool, VolumeError> {
        Ok(self
            .describe_one(volume)
            .await?
            .is_some_and(|record| record.is_attached_to(instance)))
    }

    pub(super) async fn attachment_map(
        &self,
        volumes: &[VolumeId],
        instance: &InstanceId,
    ) -> Result<BTreeMap<VolumeId, bool>, VolumeError> {
        let mut attached: BTreeMap<VolumeId, bool> =
            volumes.iter().map(|volume| (volume.clone(), false)).collect();
        if volumes.is_empty() {
            return Ok(attached);
        }

        let records = self
            .plane
            .describe_volumes(VolumeQuery::Ids(volumes))
            .await?;
        for record in records {
            if let Some(flag) = attached.get_mut(&record.id) {
                *flag = record.is_attached_to(instance);
            }
        }
        Ok(attached)
    }

    pub(super) async fn rename(&self, volume: &VolumeId, name: &str) -> Result<(), VolumeError> {
        self.plane.modify_volume_attributes(volume, name).await?;
        info!(volume_id = %volume, name, "volume renamed");
        Ok(())
    }

    /// The provider search is fuzzy, so only an exact name match counts.
    pub(super) async fn find_by_name(&self, name: &str) -> Result<VolumeId, VolumeError> {
        let not_found = || VolumeError::NotFound {
            name: name.to_owned(),
        };
        if name.trim().is_empty() {
            return Err(not_found());
        }
        let records = self
            .plane
            .describe_volumes(VolumeQuery::SearchWord(name))
            .await?;
        records
            .into_iter()
            .find(|record| record.name == name)
            .map(|record| record.id)
            .ok_or_else(not_found)
    }
}

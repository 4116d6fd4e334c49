//! Volume creation and deletion.

use std::slice;

use tracing::info;

use crate::backend::ControlPlane;
use crate::types::VolumeId;
use crate::volume::{VolumeError, VolumeOptions};

use super::CloudVolumeManager;

/// Provider message fragment for deleting a volume that is already gone.
pub(super) const ALREADY_DELETED: &str = "already been deleted";

impl<P: ControlPlane> CloudVolumeManager<P> {
    pub(super) async fn create(&self, options: &VolumeOptions) -> Result<VolumeId, VolumeError> {
        let created = self
            .plane
            .create_volumes(options)
            .await
            .map_err(|err| VolumeError::Creation {
                name: options.name.clone(),
                message: err.to_string(),
            })?;

        let volume = created
            .volume_ids
            .into_iter()
            .next()
            .ok_or_else(|| VolumeError::Creation {
                name: options.name.clone(),
                message: String::from("no volume identifier returned"),
            })?;

        self.settle(&created.job_id, "create").await;
        info!(
            volume_id = %volume,
            name = %options.name,
            size_gb = options.capacity_gb,
            volume_type = %options.volume_type,
            "volume created"
        );
        Ok(volume)
    }

    pub(super) async fn delete(&self, volume: &VolumeId) -> Result<bool, VolumeError> {
        let job = match self.plane.delete_volumes(slice::from_ref(volume)).await {
            Ok(job) => job,
            Err(err) if err.mentions(ALREADY_DELETED) => {
                info!(volume_id = %volume, "volume already deleted");
                return Ok(false);
            }
            Err(err) => {
                return Err(VolumeError::Deletion {
                    volume_id: volume.clone(),
                    message: err.to_string(),
                });
            }
        };

        self.settle(&job, "delete").await;
        info!(volume_id = %volume, "volume deleted");
        Ok(true)
    }
}

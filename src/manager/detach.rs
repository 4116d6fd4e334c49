//! Idempotent detach.

use std::slice;

use tracing::{info, warn};

use crate::backend::ControlPlane;
use crate::types::{InstanceId, VolumeId};
use crate::volume::VolumeError;

use super::CloudVolumeManager;

/// Provider message fragment for detaching a volume that is no longer bound.
const ALREADY_DETACHED: &str = "already been detached";

impl<P: ControlPlane> CloudVolumeManager<P> {
    pub(super) async fn detach(
        &self,
        volume: &VolumeId,
        instance: &InstanceId,
    ) -> Result<(), VolumeError> {
        match self.describe_one(volume).await {
            Ok(current) => {
                if !current.is_some_and(|found| found.is_attached_to(instance)) {
                    info!(volume_id = %volume, instance_id = %instance, "volume not attached");
                    return Ok(());
                }
            }
            Err(err) => {
                warn!(volume_id = %volume, error = %err, "describe before detach failed");
            }
        }

        let detach_error = |message: String| VolumeError::Detach {
            volume_id: volume.clone(),
            instance_id: instance.clone(),
            message,
        };

        let job = match self
            .plane
            .detach_volumes(slice::from_ref(volume), instance)
            .await
        {
            Ok(job) => job,
            Err(err) if err.mentions(ALREADY_DETACHED) => {
                info!(volume_id = %volume, instance_id = %instance, "volume already detached");
                return Ok(());
            }
            Err(err) => return Err(detach_error(err.to_string())),
        };

        self.waiter
            .wait(&self.plane, &job)
            .await
            .map_err(|err| detach_error(err.to_string()))?;
        info!(volume_id = %volume, instance_id = %instance, "volume detached");
        Ok(())
    }
}

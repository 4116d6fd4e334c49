//! Idempotent attach.

use std::slice;

use tracing::{debug, info};

use crate::backend::ControlPlane;
use crate::types::{InstanceId, VolumeId};
use crate::volume::VolumeError;

use super::CloudVolumeManager;

/// Provider message fragment for attaching a volume that is already bound to
/// the requested instance.
const ALREADY_ATTACHED: &str = "already attached to instance";

impl<P: ControlPlane> CloudVolumeManager<P> {
    pub(super) async fn attach(
        &self,
        volume: &VolumeId,
        instance: &InstanceId,
    ) -> Result<String, VolumeError> {
        let current = self.describe_one(volume).await?;
        if let Some(device) = current
            .as_ref()
            .and_then(|found| found.device_on(instance))
        {
            debug!(volume_id = %volume, instance_id = %instance, device, "volume already attached");
            return Ok(device.to_owned());
        }

        match self
            .plane
            .attach_volumes(slice::from_ref(volume), instance)
            .await
        {
            Ok(job) => self.settle(&job, "attach").await,
            Err(err) if err.mentions(ALREADY_ATTACHED) => {
                debug!(volume_id = %volume, instance_id = %instance, "attach raced with another caller");
            }
            Err(err) => {
                return Err(VolumeError::Attach {
                    volume_id: volume.clone(),
                    instance_id: instance.clone(),
                    message: err.to_string(),
                });
            }
        }

        let Some(record) = self.describe_one(volume).await? else {
            return Err(VolumeError::Attach {
                volume_id: volume.clone(),
                instance_id: instance.clone(),
                message: String::from("volume missing after attach"),
            });
        };

        if let Some(attachment) = record.attachment.as_ref()
            && attachment.instance_id != *instance
        {
            return Err(VolumeError::Attach {
                volume_id: volume.clone(),
                instance_id: instance.clone(),
                message: format!("volume is attached to instance {}", attachment.instance_id),
            });
        }

        let device = record
            .device_on(instance)
            .ok_or_else(|| VolumeError::DeviceMissing {
                volume_id: volume.clone(),
                instance_id: instance.clone(),
            })?;
        info!(volume_id = %volume, instance_id = %instance, device, "volume attached");
        Ok(device.to_owned())
    }
}

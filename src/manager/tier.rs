//! Default tier detection from the local instance class.

use std::slice;

use tracing::{info, warn};

use crate::backend::ControlPlane;
use crate::files;
use crate::types::InstanceId;
use crate::volume::VolumeType;

use super::CloudVolumeManager;

/// Maps an instance class onto the tier its local disks support.
pub(crate) const fn tier_for_class(instance_class: Option<i64>) -> VolumeType {
    match instance_class {
        None | Some(0) => VolumeType::HighPerformance,
        Some(_) => VolumeType::SuperHighPerformance,
    }
}

impl<P: ControlPlane> CloudVolumeManager<P> {
    /// Detects the tier once per manager; concurrent callers share the
    /// first detection.
    pub(super) async fn cached_tier(&self) -> VolumeType {
        *self
            .default_tier
            .get_or_init(|| self.detect_tier())
            .await
    }

    async fn detect_tier(&self) -> VolumeType {
        let fallback = VolumeType::default();
        let raw = match files::read_to_string(&self.instance_id_file) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "cannot read instance identity, using default volume type");
                return fallback;
            }
        };
        let instance = InstanceId::new(raw.trim());
        if instance.is_blank() {
            warn!(path = %self.instance_id_file, "instance identity is empty, using default volume type");
            return fallback;
        }

        match self
            .plane
            .describe_instances(slice::from_ref(&instance))
            .await
        {
            Ok(records) => {
                let Some(record) = records.into_iter().find(|record| record.id == instance) else {
                    warn!(instance_id = %instance, "instance not found, using default volume type");
                    return fallback;
                };
                let tier = tier_for_class(record.instance_class);
                info!(instance_id = %instance, volume_type = %tier, "detected default volume type");
                tier
            }
            Err(err) => {
                warn!(instance_id = %instance, error = %err, "instance lookup failed, using default volume type");
                fallback
            }
        }
    }
}

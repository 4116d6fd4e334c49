//! Dynamic provisioning: turns a storage claim into a volume and a
//! persistent-volume description, and deletes volumes on release.
//!
//! The controller loop that watches claims lives outside this crate; it
//! hands requests to [`VolumeProvisioner`] and stores the returned
//! [`ProvisionedVolume`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::capacity::{self, CapacityError};
use crate::driver::{DEFAULT_FS_TYPE, OPTION_FS_TYPE, OPTION_VOLUME_ID};
use crate::types::VolumeId;
use crate::volume::{VolumeError, VolumeManager, VolumeOptions, VolumeType};

/// Name of the exec driver that mounts provisioned volumes.
pub const FLEX_DRIVER_NAME: &str = "qingcloud/flex-volume";
/// Identity recorded on every provisioned volume.
pub const PROVISIONER_NAME: &str = "qingcloud/volume-provisioner";

const ANNOTATION_CREATED_BY: &str = "kubernetes.io/createdby";
const CREATED_BY: &str = "qingcloud-volume-provisioner";
const ANNOTATION_PROVISIONER_ID: &str = "Provisioner_Id";

/// Claim access modes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AccessMode {
    /// Mounted read-write by one node.
    ReadWriteOnce,
    /// Mounted read-only by many nodes.
    ReadOnlyMany,
    /// Mounted read-write by many nodes.
    ReadWriteMany,
}

/// What happens to the volume when its claim is released.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ReclaimPolicy {
    /// Delete the backing volume.
    #[default]
    Delete,
    /// Keep the backing volume.
    Retain,
    /// Scrub and reuse; treated like `Delete` for the backing volume.
    Recycle,
}

/// A claim to provision.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    /// Name chosen for the persistent volume; also used as the volume name.
    pub pv_name: String,
    /// Requested storage in bytes.
    pub capacity_bytes: u64,
    /// Access modes requested by the claim.
    pub access_modes: Vec<AccessMode>,
    /// Whether the claim carries a label selector.
    #[serde(default)]
    pub has_selector: bool,
    /// Storage class parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Claim annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Storage class of the claim.
    #[serde(default)]
    pub storage_class_name: Option<String>,
    /// Reclaim policy from the storage class.
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
}

/// Exec-driver source embedded in the persistent volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlexVolumeSource {
    /// Driver name.
    pub driver: String,
    /// Filesystem to create and mount.
    pub fs_type: String,
    /// Whether mounts are read-only.
    pub read_only: bool,
    /// Driver options; carries `volumeID`.
    pub options: BTreeMap<String, String>,
}

/// Persistent-volume description returned to the controller.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedVolume {
    /// Persistent-volume name.
    pub name: String,
    /// Capacity such as `20Gi`.
    pub capacity: String,
    /// Supported access modes.
    pub access_modes: Vec<AccessMode>,
    /// Reclaim policy.
    pub reclaim_policy: ReclaimPolicy,
    /// Storage class name, empty when the claim had none.
    pub storage_class_name: String,
    /// Provenance annotations.
    pub annotations: BTreeMap<String, String>,
    /// Exec-driver source; `None` for volumes from other provisioners.
    pub flex_volume: Option<FlexVolumeSource>,
}

impl ProvisionedVolume {
    /// Returns the backing volume identifier, if recorded.
    #[must_use]
    pub fn volume_id(&self) -> Option<VolumeId> {
        self.flex_volume
            .as_ref()
            .and_then(|source| source.options.get(OPTION_VOLUME_ID))
            .filter(|id| !id.is_empty())
            .map(|id| VolumeId::from(id.as_str()))
    }
}

/// Errors raised while provisioning or deleting.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Label selectors cannot be honoured.
    #[error("claim selectors are not supported for dynamic provisioning")]
    SelectorUnsupported,
    /// Only `ReadWriteOnce` is supported.
    #[error("volumes only support ReadWriteOnce mounts")]
    AccessModeUnsupported,
    /// A storage class parameter is not recognised.
    #[error("invalid parameter '{key}' for qingcloud/volume-provisioner")]
    InvalidParameter {
        /// Offending key as given.
        key: String,
    },
    /// The `type` parameter is not a known tier code.
    #[error("invalid volume type '{value}', it can only be 0, 2, or 3")]
    InvalidVolumeType {
        /// Offending value.
        value: String,
    },
    /// The request does not fit the tier.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    /// The volume manager failed.
    #[error(transparent)]
    Volume(#[from] VolumeError),
    /// The persistent volume has no name.
    #[error("volume name cannot be empty")]
    MissingName,
    /// The persistent volume does not carry a volume identifier.
    #[error("volume {name} has no volumeID option")]
    MissingVolumeId {
        /// Persistent-volume name.
        name: String,
    },
    /// The persistent volume was not created by this provisioner.
    #[error("volume {name} is not supported by qingcloud/volume-provisioner")]
    ForeignVolume {
        /// Persistent-volume name.
        name: String,
    },
}

#[derive(Debug, Default)]
struct ClassParameters {
    volume_type: Option<VolumeType>,
    fs_type: Option<String>,
}

impl ClassParameters {
    fn parse(parameters: &BTreeMap<String, String>) -> Result<Self, ProvisionError> {
        let mut parsed = Self::default();
        for (key, value) in parameters {
            match key.to_ascii_lowercase().as_str() {
                "type" => {
                    let tier = value.parse::<VolumeType>().map_err(|_| {
                        ProvisionError::InvalidVolumeType {
                            value: value.clone(),
                        }
                    })?;
                    parsed.volume_type = Some(tier);
                }
                "fstype" => {
                    debug!(fs_type = value.as_str(), "fstype set by storage class");
                    parsed.fs_type = Some(value.clone());
                }
                _ => return Err(ProvisionError::InvalidParameter { key: key.clone() }),
            }
        }
        Ok(parsed)
    }
}

/// Provisioner over a [`VolumeManager`].
#[derive(Debug)]
pub struct VolumeProvisioner<M> {
    manager: M,
}

impl<M: VolumeManager> VolumeProvisioner<M> {
    /// Wraps a volume manager.
    #[must_use]
    pub const fn new(manager: M) -> Self {
        Self { manager }
    }

    /// Creates a volume for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the claim is unsupported, a parameter
    /// is invalid, the size does not fit the tier, or creation fails.
    pub async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionedVolume, ProvisionError> {
        if request.has_selector {
            return Err(ProvisionError::SelectorUnsupported);
        }
        if !request.access_modes.contains(&AccessMode::ReadWriteOnce) {
            return Err(ProvisionError::AccessModeUnsupported);
        }
        let parameters = ClassParameters::parse(&request.parameters)?;

        let volume_type = match parameters.volume_type {
            Some(tier) => tier,
            None => self.manager.default_volume_type().await,
        };
        let capacity_gb = capacity::plan(request.capacity_bytes, volume_type)?;
        let options = VolumeOptions {
            capacity_gb,
            volume_type,
            name: request.pv_name.clone(),
        };
        let volume_id = self.manager.create_volume(&options).await?;
        info!(volume_id = %volume_id, capacity_gb, %volume_type, "provisioned volume");

        let fs_type = request
            .annotations
            .get(OPTION_FS_TYPE)
            .cloned()
            .or(parameters.fs_type)
            .unwrap_or_else(|| DEFAULT_FS_TYPE.to_owned());

        Ok(ProvisionedVolume {
            name: request.pv_name.clone(),
            capacity: format!("{capacity_gb}Gi"),
            access_modes: vec![AccessMode::ReadWriteOnce],
            reclaim_policy: request.reclaim_policy,
            storage_class_name: request.storage_class_name.clone().unwrap_or_default(),
            annotations: BTreeMap::from([
                (ANNOTATION_CREATED_BY.to_owned(), CREATED_BY.to_owned()),
                (
                    ANNOTATION_PROVISIONER_ID.to_owned(),
                    PROVISIONER_NAME.to_owned(),
                ),
            ]),
            flex_volume: Some(FlexVolumeSource {
                driver: FLEX_DRIVER_NAME.to_owned(),
                fs_type,
                read_only: false,
                options: BTreeMap::from([(
                    OPTION_VOLUME_ID.to_owned(),
                    volume_id.as_str().to_owned(),
                )]),
            }),
        })
    }

    /// Deletes the backing volume of `volume` unless it is retained.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the description is incomplete or not
    /// ours, or deletion fails.
    pub async fn delete(&self, volume: &ProvisionedVolume) -> Result<(), ProvisionError> {
        if volume.name.is_empty() {
            return Err(ProvisionError::MissingName);
        }
        if volume.reclaim_policy == ReclaimPolicy::Retain {
            debug!(name = volume.name.as_str(), "retaining volume");
            return Ok(());
        }
        let is_ours = volume
            .flex_volume
            .as_ref()
            .is_some_and(|source| source.driver == FLEX_DRIVER_NAME);
        if !is_ours {
            return Err(ProvisionError::ForeignVolume {
                name: volume.name.clone(),
            });
        }
        let Some(volume_id) = volume.volume_id() else {
            return Err(ProvisionError::MissingVolumeId {
                name: volume.name.clone(),
            });
        };

        if self.manager.delete_volume(&volume_id).await? {
            info!(volume_id = %volume_id, "deleted volume");
        } else {
            info!(volume_id = %volume_id, "volume already deleted");
        }
        Ok(())
    }
}

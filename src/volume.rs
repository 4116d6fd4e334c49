//! Volume lifecycle abstractions shared by the driver and the provisioner.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use thiserror::Error;

use crate::backend::{BackendFuture, RemoteError};
use crate::job::JobError;
use crate::types::{InstanceId, VolumeId};

/// Performance tier of a volume. Discriminants are the provider wire codes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum VolumeType {
    /// Standard high-performance SSD.
    #[default]
    HighPerformance,
    /// Large, cheaper capacity tier.
    HighCapacity,
    /// Super-high-performance SSD available on enterprise instances.
    SuperHighPerformance,
}

impl VolumeType {
    /// Returns the provider wire code for the tier.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::HighPerformance => 0,
            Self::HighCapacity => 2,
            Self::SuperHighPerformance => 3,
        }
    }

    /// Maps a wire code onto a tier.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::HighPerformance),
            2 => Some(Self::HighCapacity),
            3 => Some(Self::SuperHighPerformance),
            _ => None,
        }
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Raised when a string is not a known tier code.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unsupported volume type '{0}', expected one of 0, 2, 3")]
pub struct ParseVolumeTypeError(pub String);

impl FromStr for VolumeType {
    type Err = ParseVolumeTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| ParseVolumeTypeError(value.to_owned()))
    }
}

/// Parameters for a single volume creation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeOptions {
    /// Size in GiB, already planned for the tier.
    pub capacity_gb: u32,
    /// Target tier.
    pub volume_type: VolumeType,
    /// Human-assigned name.
    pub name: String,
}

/// Errors raised by [`VolumeManager`] operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VolumeError {
    /// The create request was rejected or returned no volume.
    #[error("failed to create volume {name}: {message}")]
    Creation {
        /// Requested volume name.
        name: String,
        /// Failure detail.
        message: String,
    },
    /// The delete request was rejected.
    #[error("failed to delete volume {volume_id}: {message}")]
    Deletion {
        /// Volume identifier.
        volume_id: VolumeId,
        /// Failure detail.
        message: String,
    },
    /// The volume could not be attached.
    #[error("failed to attach volume {volume_id} to instance {instance_id}: {message}")]
    Attach {
        /// Volume identifier.
        volume_id: VolumeId,
        /// Target instance.
        instance_id: InstanceId,
        /// Failure detail.
        message: String,
    },
    /// The volume could not be detached.
    #[error("failed to detach volume {volume_id} from instance {instance_id}: {message}")]
    Detach {
        /// Volume identifier.
        volume_id: VolumeId,
        /// Instance the volume was bound to.
        instance_id: InstanceId,
        /// Failure detail.
        message: String,
    },
    /// Attach reported success but no device path is visible.
    #[error("volume {volume_id} attached to instance {instance_id} without a device path")]
    DeviceMissing {
        /// Volume identifier.
        volume_id: VolumeId,
        /// Target instance.
        instance_id: InstanceId,
    },
    /// A name lookup returned no volumes.
    #[error("no volume named '{name}'")]
    NotFound {
        /// Name searched for.
        name: String,
    },
    /// Unclassified control-plane failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// A strict job wait failed.
    #[error(transparent)]
    Job(#[from] JobError),
}

/// Future resolving to a tier; tier detection never fails.
pub type TierFuture<'a> = Pin<Box<dyn Future<Output = VolumeType> + Send + 'a>>;

/// Volume lifecycle operations used by the driver and the provisioner.
///
/// Implementations must be safe to call concurrently for distinct volumes.
pub trait VolumeManager: Send + Sync {
    /// Creates a volume and returns its identifier.
    fn create_volume<'a>(
        &'a self,
        options: &'a VolumeOptions,
    ) -> BackendFuture<'a, VolumeId, VolumeError>;

    /// Deletes a volume. Returns `false` when it was already gone.
    fn delete_volume<'a>(&'a self, volume: &'a VolumeId) -> BackendFuture<'a, bool, VolumeError>;

    /// Attaches a volume and returns the device path on `instance`.
    fn attach_volume<'a>(
        &'a self,
        volume: &'a VolumeId,
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, String, VolumeError>;

    /// Detaches a volume from `instance`.
    fn detach_volume<'a>(
        &'a self,
        volume: &'a VolumeId,
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, (), VolumeError>;

    /// Reports whether a volume is bound to `instance`.
    fn volume_is_attached<'a>(
        &'a self,
        volume: &'a VolumeId,
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, bool, VolumeError>;

    /// Reports attachment for several volumes in one describe call.
    fn disks_are_attached<'a>(
        &'a self,
        volumes: &'a [VolumeId],
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, BTreeMap<VolumeId, bool>, VolumeError>;

    /// Renames a volume.
    fn update_volume<'a>(
        &'a self,
        volume: &'a VolumeId,
        name: &'a str,
    ) -> BackendFuture<'a, (), VolumeError>;

    /// Resolves a volume name to its identifier.
    fn volume_id_by_name<'a>(&'a self, name: &'a str)
    -> BackendFuture<'a, VolumeId, VolumeError>;

    /// Returns the tier used when a caller does not pick one.
    ///
    /// Detection failures fall back to [`VolumeType::HighPerformance`].
    fn default_volume_type(&self) -> TierFuture<'_>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", VolumeType::HighPerformance)]
    #[case("2", VolumeType::HighCapacity)]
    #[case(" 3 ", VolumeType::SuperHighPerformance)]
    fn parses_tier_codes(#[case] raw: &str, #[case] expected: VolumeType) {
        assert_eq!(raw.parse::<VolumeType>(), Ok(expected));
        assert_eq!(expected.to_string(), raw.trim());
    }

    #[rstest]
    #[case("1")]
    #[case("hp")]
    #[case("")]
    fn rejects_unknown_tier_codes(#[case] raw: &str) {
        let err = raw.parse::<VolumeType>().expect_err("code should be rejected");
        assert_eq!(err, ParseVolumeTypeError(raw.to_owned()));
    }

    #[rstest]
    fn default_tier_is_high_performance() {
        assert_eq!(VolumeType::default(), VolumeType::HighPerformance);
    }
}

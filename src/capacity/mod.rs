//! Maps requested byte sizes onto billable, tier-valid volume sizes.

use thiserror::Error;

use crate::volume::VolumeType;

/// Bytes in one GiB.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Size limits for a volume tier, in GiB.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TierLimits {
    /// Smallest size the provider accepts.
    pub min_gb: u32,
    /// Largest size the provider accepts.
    pub max_gb: u32,
    /// Sizes must be a multiple of this step.
    pub step_gb: u32,
}

impl TierLimits {
    /// Returns the limits for `tier`.
    #[must_use]
    pub const fn for_tier(tier: VolumeType) -> Self {
        match tier {
            VolumeType::HighPerformance | VolumeType::SuperHighPerformance => Self {
                min_gb: 10,
                max_gb: 1000,
                step_gb: 10,
            },
            VolumeType::HighCapacity => Self {
                min_gb: 100,
                max_gb: 5000,
                step_gb: 50,
            },
        }
    }
}

/// Raised when a request cannot fit the tier.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CapacityError {
    /// The request is larger than the tier maximum.
    #[error("requested {requested_gb} GiB exceeds the {max_gb} GiB limit for volume type {tier}")]
    AboveMaximum {
        /// Requested size after rounding up to whole GiB.
        requested_gb: u64,
        /// Tier maximum.
        max_gb: u32,
        /// Tier the request targeted.
        tier: VolumeType,
    },
}

/// Plans the size in GiB for a request of `requested_bytes` on `tier`.
///
/// Bytes are rounded up to whole GiB, raised to the tier minimum, and rounded
/// up to the tier step. Requests above the maximum are rejected before the
/// step is applied.
///
/// # Errors
///
/// Returns [`CapacityError::AboveMaximum`] when the request does not fit.
pub fn plan(requested_bytes: u64, tier: VolumeType) -> Result<u32, CapacityError> {
    let limits = TierLimits::for_tier(tier);
    let requested_gb = requested_bytes.div_ceil(GIB);
    if requested_gb > u64::from(limits.max_gb) {
        return Err(CapacityError::AboveMaximum {
            requested_gb,
            max_gb: limits.max_gb,
            tier,
        });
    }

    let within = u32::try_from(requested_gb)
        .unwrap_or(limits.max_gb)
        .max(limits.min_gb);
    Ok(within.next_multiple_of(limits.step_gb))
}

/// Converts a size in GiB back to bytes.
#[must_use]
pub fn gib_to_bytes(size_gb: u32) -> u64 {
    u64::from(size_gb).saturating_mul(GIB)
}

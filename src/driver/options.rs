//! JSON options passed by the node agent.

use serde_json::{Map, Value};
use thiserror::Error;

/// Option carrying the volume identifier.
pub const OPTION_VOLUME_ID: &str = "volumeID";
/// Option carrying the filesystem type.
pub const OPTION_FS_TYPE: &str = "kubernetes.io/fsType";
/// Option carrying `rw` or `ro`.
pub const OPTION_READ_WRITE: &str = "kubernetes.io/readwrite";
/// Option carrying the persistent-volume or volume name.
pub const OPTION_PV_OR_VOLUME_NAME: &str = "kubernetes.io/pvOrVolumeName";
/// Option carrying comma-separated extra mount flags.
pub const OPTION_FLAGS: &str = "flags";
/// Filesystem used when none is requested.
pub const DEFAULT_FS_TYPE: &str = "ext4";

/// Raised when the options argument is not a JSON object.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Invalid json options: {raw}")]
pub struct InvalidOptions {
    /// The argument as received.
    pub raw: String,
}

/// Parsed driver options. Non-string values are ignored by the getters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DriverOptions(Map<String, Value>);

impl DriverOptions {
    /// Parses a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidOptions`] when `raw` is not valid JSON or not an
    /// object.
    pub fn parse(raw: &str) -> Result<Self, InvalidOptions> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            _ => Err(InvalidOptions {
                raw: raw.to_owned(),
            }),
        }
    }

    /// Returns a non-empty string option.
    #[must_use]
    pub fn string(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// The `volumeID` option.
    #[must_use]
    pub fn volume_id(&self) -> Option<&str> {
        self.string(OPTION_VOLUME_ID)
    }

    /// The requested filesystem, defaulting to ext4.
    #[must_use]
    pub fn fs_type(&self) -> &str {
        self.string(OPTION_FS_TYPE).unwrap_or(DEFAULT_FS_TYPE)
    }

    /// The persistent-volume or volume name.
    #[must_use]
    pub fn pv_or_volume_name(&self) -> Option<&str> {
        self.string(OPTION_PV_OR_VOLUME_NAME)
    }

    /// Mount flags: the `flags` list followed by the read-write mode.
    #[must_use]
    pub fn mount_flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .string(OPTION_FLAGS)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|flag| !flag.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(mode) = self.string(OPTION_READ_WRITE) {
            flags.push(mode.to_owned());
        }
        flags
    }
}

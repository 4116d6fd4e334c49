//! Configuration loading via `ortho-config` and the SDK client file.

use camino::Utf8Path;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::files::{self, FileError};
use crate::manager::DEFAULT_INSTANCE_ID_FILE;

/// Default location of the client configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/qingcloud/client.yaml";

const DEFAULT_HOST: &str = "api.qingcloud.com";
const DEFAULT_PORT: u16 = 443;
const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_URI: &str = "/iaas";
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// QingCloud API credentials and endpoint, derived from environment
/// variables and discovered configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "QINGCLOUD",
    discovery(
        app_name = "qingcloud",
        env_var = "QINGCLOUD_CONFIG_PATH",
        config_file_name = "client.yaml",
        dotfile_name = ".qingcloud.yaml",
        project_file_name = "qingcloud.yaml"
    )
)]
pub struct QingCloudConfig {
    /// API access key identifier.
    #[serde(alias = "qy_access_key_id")]
    pub access_key_id: String,
    /// API secret used to sign requests.
    #[serde(alias = "qy_secret_access_key")]
    pub secret_access_key: String,
    /// Zone hosting the volumes (for example `pek3a`).
    pub zone: String,
    /// API host name.
    #[ortho_config(default = DEFAULT_HOST.to_owned())]
    pub host: String,
    /// API port.
    #[ortho_config(default = 443)]
    pub port: u16,
    /// `https` or `http`.
    #[ortho_config(default = DEFAULT_PROTOCOL.to_owned())]
    pub protocol: String,
    /// API path prefix.
    #[ortho_config(default = DEFAULT_URI.to_owned())]
    pub uri: String,
    /// Retries after a transport failure.
    #[ortho_config(default = 3)]
    pub connection_retries: u32,
    /// Per-request timeout in seconds.
    #[ortho_config(default = 30)]
    pub connection_timeout: u64,
    /// File holding the local instance identifier.
    #[ortho_config(default = DEFAULT_INSTANCE_ID_FILE.to_owned())]
    pub instance_id_file: String,
}

impl Default for QingCloudConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            zone: String::new(),
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            protocol: DEFAULT_PROTOCOL.to_owned(),
            uri: DEFAULT_URI.to_owned(),
            connection_retries: DEFAULT_RETRIES,
            connection_timeout: DEFAULT_TIMEOUT_SECS,
            instance_id_file: DEFAULT_INSTANCE_ID_FILE.to_owned(),
        }
    }
}

/// Layout of the SDK `client.yaml` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClientFile {
    qy_access_key_id: Option<String>,
    qy_secret_access_key: Option<String>,
    zone: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    protocol: Option<String>,
    uri: Option<String>,
    connection_retries: Option<u32>,
    connection_timeout: Option<u64>,
    instance_id_file: Option<String>,
}

impl ClientFile {
    fn into_config(self) -> QingCloudConfig {
        let defaults = QingCloudConfig::default();
        QingCloudConfig {
            access_key_id: self.qy_access_key_id.unwrap_or(defaults.access_key_id),
            secret_access_key: self
                .qy_secret_access_key
                .unwrap_or(defaults.secret_access_key),
            zone: self.zone.unwrap_or(defaults.zone),
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            protocol: self.protocol.unwrap_or(defaults.protocol),
            uri: self.uri.unwrap_or(defaults.uri),
            connection_retries: self
                .connection_retries
                .unwrap_or(defaults.connection_retries),
            connection_timeout: self
                .connection_timeout
                .unwrap_or(defaults.connection_timeout),
            instance_id_file: self.instance_id_file.unwrap_or(defaults.instance_id_file),
        }
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    yaml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, yaml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            yaml_key,
        }
    }
}

impl QingCloudConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to client.yaml",
                metadata.description, metadata.env_var, metadata.yaml_key
            )));
        }
        Ok(())
    }

    /// Parses an SDK-style `client.yaml` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is not valid YAML.
    pub fn from_client_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = files::read_to_string(path)?;
        Self::from_client_yaml(&contents)
    }

    fn from_client_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(ClientFile::default().into_config());
        }
        serde_yaml::from_str::<ClientFile>(contents)
            .map(ClientFile::into_config)
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, discovered configuration files, and `QINGCLOUD_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("qingcloud-flex-volume")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reads `path` when it exists and falls back to layered sources
    /// otherwise. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let config = if files::exists(path)? {
            Self::from_client_file(path)?
        } else {
            Self::load_without_cli_args()?
        };
        config.validate()?;
        Ok(config)
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// the client file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] for an unknown protocol.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.access_key_id,
            &FieldMetadata::new(
                "API access key ID",
                "QINGCLOUD_ACCESS_KEY_ID",
                "qy_access_key_id",
            ),
        )?;
        Self::require_field(
            &self.secret_access_key,
            &FieldMetadata::new(
                "API secret access key",
                "QINGCLOUD_SECRET_ACCESS_KEY",
                "qy_secret_access_key",
            ),
        )?;
        Self::require_field(
            &self.zone,
            &FieldMetadata::new("zone", "QINGCLOUD_ZONE", "zone"),
        )?;
        Self::require_field(
            &self.host,
            &FieldMetadata::new("API host", "QINGCLOUD_HOST", "host"),
        )?;
        if !matches!(self.protocol.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "protocol must be http or https, got '{}'",
                self.protocol
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the YAML parser or the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// The configuration file could not be read.
    #[error(transparent)]
    Read(#[from] FileError),
    /// The HTTP client could not be built from the configured settings.
    #[error("cannot build API client: {0}")]
    Client(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests;

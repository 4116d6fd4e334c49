//! Command-line interface definitions for the `qingcloud-flex-volume` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `qingcloud-flex-volume` binary.
#[derive(Debug, Parser)]
#[command(
    name = "qingcloud-flex-volume",
    version,
    about = "FlexVolume driver for QingCloud block volumes",
    long_about = "FlexVolume driver for QingCloud block volumes.\n\nEvery call prints one JSON result line on standard output. Diagnostics go to the log directory."
)]
pub(crate) struct Cli {
    /// Hard-link this binary into the kubelet plugin directory and exit.
    #[arg(long)]
    pub(crate) install: bool,
    /// Kubelet exec plugin directory used by `--install`.
    #[arg(
        long,
        value_name = "DIR",
        default_value = "/usr/libexec/kubernetes/kubelet-plugins/volume/exec/"
    )]
    pub(crate) driver_dir: String,
    /// QingCloud client configuration file.
    #[arg(
        long,
        value_name = "PATH",
        env = "QINGCLOUD_CONFIG_PATH",
        default_value = "/etc/qingcloud/client.yaml"
    )]
    pub(crate) qingcloud_config: String,
    /// Directory receiving the driver log file.
    #[arg(
        long,
        value_name = "DIR",
        env = "LOG_DIR",
        default_value = "/var/log/qingcloud-flex-volume"
    )]
    pub(crate) log_dir: String,
    /// Driver verb followed by its arguments, for example
    /// `attach '{"volumeID":"vol-xxxx"}' i-node1`.
    #[arg(value_name = "VERB", trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) operation: Vec<String>,
}

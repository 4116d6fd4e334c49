//! Binary entry point for the QingCloud FlexVolume driver.
//!
//! The kubelet runs the binary once per call and reads exactly one JSON
//! line from standard output.

mod cli;

use std::io::{self, Write};
use std::process;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use clap::error::ErrorKind;
use thiserror::Error;
use tracing::{error, info};

use qingcloud_volume::{
    CloudVolumeManager, ConfigError, Dispatch, FlexDriver, InstallError, OperationResult,
    ProcessCommandRunner, QingCloudApi, QingCloudConfig, Status, current_executable, dispatch,
    init_logging, install_driver, usage_failure,
};

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("Error init FlexVolumePlugin: {0}")]
    Init(#[from] ConfigError),
    #[error("Error installing driver: {0}")]
    Install(#[from] InstallError),
}

#[derive(Debug)]
enum Response {
    Installed(Utf8PathBuf),
    Driver(OperationResult),
}

#[tokio::main]
async fn main() {
    let response = match Cli::try_parse() {
        Ok(cli) => run(cli)
            .await
            .unwrap_or_else(|err| Response::Driver(OperationResult::failure(err.to_string()))),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.print().ok();
            process::exit(0);
        }
        Err(err) => Response::Driver(OperationResult::failure(err.to_string().trim_end())),
    };

    process::exit(emit(io::stdout(), &response));
}

async fn run(cli: Cli) -> Result<Response, CliError> {
    init_logging(Utf8Path::new(&cli.log_dir));
    info!(args = ?cli.operation, "driver called");

    if cli.install {
        let executable = current_executable()?;
        let target = install_driver(Utf8Path::new(&cli.driver_dir), &executable)?;
        return Ok(Response::Installed(target));
    }

    let Some((verb, args)) = cli.operation.split_first() else {
        return Ok(Response::Driver(usage_failure(None)));
    };
    if let Dispatch::Done(result) = dispatch(verb, args) {
        return Ok(Response::Driver(result));
    }

    let config = QingCloudConfig::load_from_path(Utf8Path::new(&cli.qingcloud_config))?;
    let api = QingCloudApi::new(&config)?;
    let manager = CloudVolumeManager::new(api, config.instance_id_file.as_str());
    let driver = FlexDriver::new(manager, ProcessCommandRunner);
    Ok(Response::Driver(driver.execute(verb, args).await))
}

fn emit(mut target: impl Write, response: &Response) -> i32 {
    match response {
        Response::Installed(path) => {
            writeln!(target, "Install driver to {path}").ok();
            0
        }
        Response::Driver(result) => {
            let json = result.to_json();
            match result.status {
                Status::Success => info!(response = json.as_str(), "ResponseSuccess"),
                Status::NotSupported => info!(response = json.as_str(), "ResponseNotSupported"),
                Status::Failure => error!(response = json.as_str(), "ResponseFailure"),
            }
            writeln!(target, "{json}").ok();
            result.exit_code()
        }
    }
}

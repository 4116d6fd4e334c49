//! Shared fixtures for driver BDD scenarios.

use std::collections::BTreeMap;
use std::time::Duration;

use qingcloud_volume::test_support::{MemoryControlPlane, PlaneAction, ScriptedRunner};
use qingcloud_volume::{CloudVolumeManager, FlexDriver, JobWaiter, OperationResult, VolumeId};
use rstest::fixture;
use thiserror::Error;

/// Identity file that never exists, so tier detection falls back quietly.
const MISSING_IDENTITY: &str = "/nonexistent/qingcloud/instance-id";

pub type TestDriver = FlexDriver<CloudVolumeManager<MemoryControlPlane>, ScriptedRunner>;

#[derive(Clone, Debug)]
pub struct DriverContext {
    pub plane: MemoryControlPlane,
    pub runner: ScriptedRunner,
    pub volumes: BTreeMap<String, VolumeId>,
    pub outcome: Option<OperationResult>,
}

#[derive(Clone, Debug, Error)]
pub enum DriverTestError {
    #[error("unknown volume '{0}' in scenario")]
    UnknownVolume(String),
    #[error("unknown control-plane action '{0}'")]
    UnknownAction(String),
}

impl DriverContext {
    pub fn driver(&self) -> TestDriver {
        let manager = CloudVolumeManager::new(self.plane.clone(), MISSING_IDENTITY).with_waiter(
            JobWaiter::new(Duration::from_millis(1), Duration::from_millis(50)),
        );
        FlexDriver::new(manager, self.runner.clone())
    }

    pub fn volume(&self, name: &str) -> Result<VolumeId, DriverTestError> {
        self.volumes
            .get(name)
            .cloned()
            .ok_or_else(|| DriverTestError::UnknownVolume(name.to_owned()))
    }

    pub fn options_for(&self, name: &str) -> Result<String, DriverTestError> {
        let volume = self.volume(name)?;
        Ok(format!(
            r#"{{"volumeID":"{volume}","kubernetes.io/fsType":"ext4","kubernetes.io/pvOrVolumeName":"{name}"}}"#
        ))
    }
}

pub fn parse_action(raw: &str) -> Result<PlaneAction, DriverTestError> {
    match raw {
        "create" => Ok(PlaneAction::Create),
        "delete" => Ok(PlaneAction::Delete),
        "attach" => Ok(PlaneAction::Attach),
        "detach" => Ok(PlaneAction::Detach),
        "describe" => Ok(PlaneAction::Describe),
        "modify" => Ok(PlaneAction::Modify),
        _ => Err(DriverTestError::UnknownAction(raw.to_owned())),
    }
}

#[fixture]
pub fn driver_context() -> DriverContext {
    DriverContext {
        plane: MemoryControlPlane::new(),
        runner: ScriptedRunner::new(),
        volumes: BTreeMap::new(),
        outcome: None,
    }
}

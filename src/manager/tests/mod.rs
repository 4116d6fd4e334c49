//! Unit tests for the cloud volume manager.

mod create;
mod detach;
mod lookup;

use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;

use crate::job::JobWaiter;
use crate::test_support::MemoryControlPlane;
use crate::types::InstanceId;

use super::CloudVolumeManager;

pub(super) struct Harness {
    pub(super) plane: MemoryControlPlane,
    pub(super) manager: CloudVolumeManager<MemoryControlPlane>,
    pub(super) instance: InstanceId,
    pub(super) identity_dir: TempDir,
}

impl Harness {
    pub(super) fn identity_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.identity_dir.path().join("instance-id"))
            .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()))
    }

    pub(super) fn write_identity(&self, contents: &str) {
        std::fs::write(self.identity_path(), contents).expect("write identity file");
    }
}

pub(super) const fn fast_waiter() -> JobWaiter {
    JobWaiter::new(Duration::from_millis(1), Duration::from_millis(50))
}

#[fixture]
pub(super) fn harness() -> Harness {
    let identity_dir = TempDir::new().expect("tempdir");
    let identity = Utf8PathBuf::from_path_buf(identity_dir.path().join("instance-id"))
        .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));
    let plane = MemoryControlPlane::new();
    let manager = CloudVolumeManager::new(plane.clone(), identity).with_waiter(fast_waiter());
    Harness {
        plane,
        manager,
        instance: InstanceId::from("i-node1"),
        identity_dir,
    }
}

//! Create and delete behaviour.

use rstest::rstest;

use super::{Harness, harness};
use crate::backend::JobStatus;
use crate::test_support::PlaneAction;
use crate::types::VolumeId;
use crate::volume::{VolumeError, VolumeManager, VolumeOptions, VolumeType};

fn options(name: &str) -> VolumeOptions {
    VolumeOptions {
        capacity_gb: 20,
        volume_type: VolumeType::HighCapacity,
        name: name.to_owned(),
    }
}

#[rstest]
#[tokio::test]
async fn create_returns_the_new_volume_id(harness: Harness) {
    let volume = harness
        .manager
        .create_volume(&options("pvc-data"))
        .await
        .expect("create should succeed");

    let record = harness.plane.volume(&volume).expect("volume stored");
    assert_eq!(record.name, "pvc-data");
    assert_eq!(record.size_gb, 20);
    assert_eq!(harness.plane.call_count(PlaneAction::DescribeJob), 1);
}

#[rstest]
#[tokio::test]
async fn create_ignores_failed_job_waits(harness: Harness) {
    harness
        .plane
        .script_job_statuses([JobStatus::Failed {
            status: String::from("failed"),
        }]);

    let volume = harness.manager.create_volume(&options("pvc-data")).await;

    assert!(volume.is_ok(), "best-effort wait should not fail: {volume:?}");
}

#[rstest]
#[tokio::test]
async fn create_surfaces_rejections(harness: Harness) {
    harness
        .plane
        .reject_next(PlaneAction::Create, "quota exceeded");

    let err = harness
        .manager
        .create_volume(&options("pvc-data"))
        .await
        .expect_err("rejection should surface");

    assert!(
        matches!(err, VolumeError::Creation { ref name, ref message } if name == "pvc-data" && message.contains("quota exceeded")),
        "unexpected error: {err}"
    );
}

#[rstest]
#[tokio::test]
async fn delete_reports_whether_the_volume_existed(harness: Harness) {
    let volume = harness.plane.insert_volume("old", 10);

    let first = harness.manager.delete_volume(&volume).await;
    let second = harness.manager.delete_volume(&volume).await;

    assert_eq!(first, Ok(true));
    assert_eq!(second, Ok(false));
    assert!(harness.plane.volume(&volume).is_none());
}

#[rstest]
#[tokio::test]
async fn delete_surfaces_other_rejections(harness: Harness) {
    let volume = VolumeId::from("vol-locked");
    harness
        .plane
        .reject_next(PlaneAction::Delete, "volume is in use");

    let err = harness
        .manager
        .delete_volume(&volume)
        .await
        .expect_err("rejection should surface");

    assert!(matches!(err, VolumeError::Deletion { .. }), "unexpected error: {err}");
}

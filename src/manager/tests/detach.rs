//! Detach idempotency and strict job waits.

use rstest::rstest;

use super::{Harness, harness};
use crate::backend::{JobStatus, RemoteError};
use crate::test_support::PlaneAction;
use crate::types::InstanceId;
use crate::volume::{VolumeError, VolumeManager};

#[rstest]
#[tokio::test]
async fn detaching_an_unattached_volume_skips_the_remote_call(harness: Harness) {
    let volume = harness.plane.insert_volume("data", 10);

    harness
        .manager
        .detach_volume(&volume, &harness.instance)
        .await
        .expect("detach of free volume succeeds");

    assert_eq!(harness.plane.call_count(PlaneAction::Detach), 0);
}

#[rstest]
#[tokio::test]
async fn volume_bound_to_another_instance_is_left_alone(harness: Harness) {
    let volume = harness.plane.insert_volume("data", 10);
    let other = InstanceId::from("i-other");
    harness.plane.bind(&volume, &other, "/dev/sdb");

    harness
        .manager
        .detach_volume(&volume, &harness.instance)
        .await
        .expect("nothing to detach here");

    assert!(harness.plane.volume(&volume).is_some_and(|record| record.is_attached_to(&other)));
    assert_eq!(harness.plane.call_count(PlaneAction::Detach), 0);
}

#[rstest]
#[tokio::test]
async fn detaches_and_waits_for_the_job(harness: Harness) {
    let volume = harness.plane.insert_volume("data", 10);
    harness.plane.bind(&volume, &harness.instance, "/dev/sdb");

    harness
        .manager
        .detach_volume(&volume, &harness.instance)
        .await
        .expect("detach succeeds");

    assert!(harness.plane.volume(&volume).is_some_and(|record| record.attachment.is_none()));
    assert_eq!(harness.plane.call_count(PlaneAction::Detach), 1);
    assert_eq!(harness.plane.call_count(PlaneAction::DescribeJob), 1);
}

#[rstest]
#[tokio::test]
async fn failed_detach_job_is_an_error(harness: Harness) {
    let volume = harness.plane.insert_volume("data", 10);
    harness.plane.bind(&volume, &harness.instance, "/dev/sdb");
    harness.plane.script_job_statuses([JobStatus::Failed {
        status: String::from("failed"),
    }]);

    let err = harness
        .manager
        .detach_volume(&volume, &harness.instance)
        .await
        .expect_err("job failure surfaces");

    assert!(matches!(err, VolumeError::Detach { .. }), "unexpected error: {err}");
}

#[rstest]
#[tokio::test]
async fn detach_timeout_is_an_error(harness: Harness) {
    let volume = harness.plane.insert_volume("data", 10);
    harness.plane.bind(&volume, &harness.instance, "/dev/sdb");
    harness
        .plane
        .script_job_statuses(std::iter::repeat_n(JobStatus::Working, 10_000));

    let err = harness
        .manager
        .detach_volume(&volume, &harness.instance)
        .await
        .expect_err("timeout surfaces");

    assert!(
        matches!(err, VolumeError::Detach { ref message, .. } if message.contains("timeout")),
        "unexpected error: {err}"
    );
}

#[rstest]
#[tokio::test]
async fn describe_failure_still_attempts_detach(harness: Harness) {
    let volume = harness.plane.insert_volume("data", 10);
    harness.plane.fail_next(
        PlaneAction::Describe,
        RemoteError::Transport {
            action: String::from("DescribeVolumes"),
            message: String::from("connection refused"),
        },
    );

    harness
        .manager
        .detach_volume(&volume, &harness.instance)
        .await
        .expect("already-detached answer is benign");

    assert_eq!(harness.plane.call_count(PlaneAction::Detach), 1);
}

#[rstest]
#[tokio::test]
async fn other_detach_rejections_surface(harness: Harness) {
    let volume = harness.plane.insert_volume("data", 10);
    harness.plane.bind(&volume, &harness.instance, "/dev/sdb");
    harness
        .plane
        .reject_next(PlaneAction::Detach, "instance is busy");

    let err = harness
        .manager
        .detach_volume(&volume, &harness.instance)
        .await
        .expect_err("rejection surfaces");

    assert!(
        matches!(err, VolumeError::Detach { ref message, .. } if message.contains("instance is busy")),
        "unexpected error: {err}"
    );
}

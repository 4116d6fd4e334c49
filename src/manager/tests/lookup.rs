//! Attachment queries, rename, and name lookup.

use rstest::rstest;

use super::{Harness, harness};
use crate::test_support::PlaneAction;
use crate::types::{InstanceId, VolumeId};
use crate::volume::{VolumeError, VolumeManager};

#[rstest]
#[tokio::test]
async fn reports_attachment_per_instance(harness: Harness) {
    let volume = harness.plane.insert_volume("data", 10);
    harness.plane.bind(&volume, &harness.instance, "/dev/sdb");

    let here = harness.manager.volume_is_attached(&volume, &harness.instance).await;
    let there = harness
        .manager
        .volume_is_attached(&volume, &InstanceId::from("i-other"))
        .await;
    let missing = harness
        .manager
        .volume_is_attached(&VolumeId::from("vol-ghost"), &harness.instance)
        .await;

    assert_eq!(here, Ok(true));
    assert_eq!(there, Ok(false));
    assert_eq!(missing, Ok(false));
}

#[rstest]
#[tokio::test]
async fn maps_several_disks_in_one_describe(harness: Harness) {
    let bound = harness.plane.insert_volume("a", 10);
    let free = harness.plane.insert_volume("b", 10);
    let ghost = VolumeId::from("vol-ghost");
    harness.plane.bind(&bound, &harness.instance, "/dev/sdb");

    let map = harness
        .manager
        .disks_are_attached(&[bound.clone(), free.clone(), ghost.clone()], &harness.instance)
        .await
        .expect("describe succeeds");

    assert_eq!(map.get(&bound), Some(&true));
    assert_eq!(map.get(&free), Some(&false));
    assert_eq!(map.get(&ghost), Some(&false));
    assert_eq!(harness.plane.call_count(PlaneAction::Describe), 1);
}

#[rstest]
#[tokio::test]
async fn empty_disk_list_makes_no_remote_call(harness: Harness) {
    let map = harness
        .manager
        .disks_are_attached(&[], &harness.instance)
        .await
        .expect("empty query");

    assert!(map.is_empty());
    assert!(harness.plane.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn renames_then_finds_by_exact_name(harness: Harness) {
    let _decoy = harness.plane.insert_volume("pv-data-old", 10);
    let volume = harness.plane.insert_volume("scratch", 10);

    harness
        .manager
        .update_volume(&volume, "pv-data")
        .await
        .expect("rename succeeds");
    let found = harness.manager.volume_id_by_name("pv-data").await;

    assert_eq!(found, Ok(volume));
}

#[rstest]
#[tokio::test]
async fn unknown_name_is_not_found(harness: Harness) {
    let err = harness
        .manager
        .volume_id_by_name("nothing")
        .await
        .expect_err("no match");

    assert_eq!(
        err,
        VolumeError::NotFound {
            name: String::from("nothing"),
        }
    );
}

#[rstest]
#[tokio::test]
async fn near_miss_names_are_not_found(harness: Harness) {
    let _similar = harness.plane.insert_volume("pvc-10", 10);

    let err = harness
        .manager
        .volume_id_by_name("pvc-1")
        .await
        .expect_err("only exact names match");

    assert_eq!(
        err,
        VolumeError::NotFound {
            name: String::from("pvc-1"),
        }
    );
}

#[rstest]
#[case("")]
#[case("  ")]
#[tokio::test]
async fn blank_names_fail_without_a_remote_call(harness: Harness, #[case] name: &str) {
    let _any = harness.plane.insert_volume("data", 10);

    let err = harness
        .manager
        .volume_id_by_name(name)
        .await
        .expect_err("blank names never match");

    assert!(matches!(err, VolumeError::NotFound { .. }));
    assert!(harness.plane.calls().is_empty());
}

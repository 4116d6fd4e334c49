//! BDD scenarios for driver calls.

use rstest_bdd_macros::scenario;

use super::test_helpers::{DriverContext, driver_context};

#[scenario(
    path = "tests/features/driver.feature",
    name = "Attach a fresh volume and report its device"
)]
fn scenario_attach_fresh_volume(driver_context: DriverContext) {
    drop(driver_context);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Attaching twice reports the same device"
)]
fn scenario_attach_twice(driver_context: DriverContext) {
    drop(driver_context);
}

#[scenario(path = "tests/features/driver.feature", name = "Detach a volume by name")]
fn scenario_detach_by_name(driver_context: DriverContext) {
    drop(driver_context);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Detaching a detached volume makes no remote detach"
)]
fn scenario_detach_detached(driver_context: DriverContext) {
    drop(driver_context);
}

#[scenario(path = "tests/features/driver.feature", name = "Report attachment state")]
fn scenario_is_attached(driver_context: DriverContext) {
    drop(driver_context);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Unknown verbs are not supported"
)]
fn scenario_unknown_verb(driver_context: DriverContext) {
    drop(driver_context);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Missing arguments fail without remote calls"
)]
fn scenario_missing_arguments(driver_context: DriverContext) {
    drop(driver_context);
}

#[scenario(
    path = "tests/features/driver.feature",
    name = "Remote rejections become failures"
)]
fn scenario_remote_rejection(driver_context: DriverContext) {
    drop(driver_context);
}

//! BDD step definitions for driver calls.

use std::fmt;

use qingcloud_volume::test_support::PlaneAction;
use qingcloud_volume::{InstanceId, OperationResult, Status};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{DriverContext, DriverTestError, parse_action};

/// Quoted text captured from a step.
#[derive(Clone, Debug, Eq, PartialEq)]
struct StepText(String);

impl StepText {
    fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for StepText {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for StepText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl std::str::FromStr for StepText {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(value.to_owned()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Setup(#[from] DriverTestError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn run(
    mut driver_context: DriverContext,
    verb: &str,
    args: &[String],
) -> Result<DriverContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let driver = driver_context.driver();
    let result = runtime.block_on(async { driver.execute(verb, args).await });
    driver_context.outcome = Some(result);
    Ok(driver_context)
}

fn outcome(driver_context: &DriverContext) -> Result<&OperationResult, StepError> {
    driver_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("no driver call was made")))
}

#[given("a volume named \"{name}\"")]
fn volume_named(mut driver_context: DriverContext, name: StepText) -> DriverContext {
    let volume = driver_context.plane.insert_volume(name.as_ref(), 10);
    driver_context.volumes.insert(name.into_inner(), volume);
    driver_context
}

#[given("volume \"{name}\" is attached to node \"{node}\"")]
fn volume_attached(
    mut driver_context: DriverContext,
    name: StepText,
    node: StepText,
) -> DriverContext {
    let volume = driver_context.plane.insert_volume(name.as_ref(), 10);
    driver_context
        .plane
        .bind(&volume, &InstanceId::from(node.into_inner()), "/dev/sdc");
    driver_context.volumes.insert(name.into_inner(), volume);
    driver_context
}

#[given("the control plane rejects the next attach with \"{message}\"")]
fn reject_next_attach(driver_context: DriverContext, message: StepText) -> DriverContext {
    driver_context
        .plane
        .reject_next(PlaneAction::Attach, message.as_ref());
    driver_context
}

#[when("the kubelet attaches \"{name}\" to node \"{node}\"")]
fn attach(
    driver_context: DriverContext,
    name: StepText,
    node: StepText,
) -> Result<DriverContext, StepError> {
    let options = driver_context.options_for(name.as_ref())?;
    run(driver_context, "attach", &[options, node.into_inner()])
}

#[when("the kubelet detaches \"{name}\" from node \"{node}\"")]
fn detach(
    driver_context: DriverContext,
    name: StepText,
    node: StepText,
) -> Result<DriverContext, StepError> {
    run(
        driver_context,
        "detach",
        &[name.into_inner(), node.into_inner()],
    )
}

#[when("the kubelet asks whether \"{name}\" is attached to node \"{node}\"")]
fn is_attached(
    driver_context: DriverContext,
    name: StepText,
    node: StepText,
) -> Result<DriverContext, StepError> {
    let options = driver_context.options_for(name.as_ref())?;
    run(driver_context, "isattached", &[options, node.into_inner()])
}

#[when("the kubelet calls \"{verb}\"")]
fn bare_call(driver_context: DriverContext, verb: StepText) -> Result<DriverContext, StepError> {
    run(driver_context, verb.as_ref(), &[])
}

#[then("the result status is \"{status}\"")]
fn result_status(driver_context: &DriverContext, status: StepText) -> Result<(), StepError> {
    let result = outcome(driver_context)?;
    let actual = match result.status {
        Status::Success => "Success",
        Status::Failure => "Failure",
        Status::NotSupported => "Not supported",
    };
    if actual == status.as_ref() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {status}, got {actual}: {:?}",
            result.message
        )))
    }
}

#[then("the reported device is \"{device}\"")]
fn reported_device(driver_context: &DriverContext, device: StepText) -> Result<(), StepError> {
    let result = outcome(driver_context)?;
    if result.device.as_deref() == Some(device.as_ref()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected device {device}, got {:?}",
            result.device
        )))
    }
}

#[then("the result reports attached")]
fn reports_attached(driver_context: &DriverContext) -> Result<(), StepError> {
    match outcome(driver_context)?.attached {
        Some(true) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected attached, got {other:?}"
        ))),
    }
}

#[then("the exit code is {code}")]
fn exit_code(driver_context: &DriverContext, code: i32) -> Result<(), StepError> {
    let actual = outcome(driver_context)?.exit_code();
    if actual == code {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected exit code {code}, got {actual}"
        )))
    }
}

#[then("the failure message mentions \"{fragment}\"")]
fn failure_mentions(driver_context: &DriverContext, fragment: StepText) -> Result<(), StepError> {
    let result = outcome(driver_context)?;
    match result.message.as_deref() {
        Some(message) if message.contains(fragment.as_ref()) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected message mentioning {fragment}, got {other:?}"
        ))),
    }
}

#[then("volume \"{name}\" is not attached")]
fn volume_not_attached(driver_context: &DriverContext, name: StepText) -> Result<(), StepError> {
    let volume = driver_context.volume(name.as_ref())?;
    let record = driver_context
        .plane
        .volume(&volume)
        .ok_or_else(|| StepError::Assertion(format!("volume {name} vanished")))?;
    match record.attachment {
        None => Ok(()),
        Some(attachment) => Err(StepError::Assertion(format!(
            "volume {name} still attached to {}",
            attachment.instance_id
        ))),
    }
}

#[then("the control plane saw {count} \"{action}\" calls")]
fn saw_calls(
    driver_context: &DriverContext,
    count: usize,
    action: StepText,
) -> Result<(), StepError> {
    let kind = parse_action(action.as_ref())?;
    let actual = driver_context.plane.call_count(kind);
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} {action} calls, got {actual}"
        )))
    }
}

#[then("the control plane saw no calls")]
fn saw_no_calls(driver_context: &DriverContext) -> Result<(), StepError> {
    let calls = driver_context.plane.calls();
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected calls: {calls:?}")))
    }
}
